use buslink::Device;

use crate::cmd::TargetArgs;
use crate::exit::CliResult;
#[cfg(any(not(feature = "usb"), not(feature = "serial")))]
use crate::exit::{CliError, USAGE};

/// Open and negotiate the device selected on the command line.
pub fn open(target: &TargetArgs) -> CliResult<Device> {
    match &target.uart {
        Some(path) => open_uart(path, target.baud),
        None => open_usb(target.usb.unwrap_or(0)),
    }
}

#[cfg(feature = "serial")]
fn open_uart(path: &str, baud: u32) -> CliResult<Device> {
    buslink::host::open_serial(path, baud)
        .map_err(|err| crate::exit::host_error(&format!("open {path}"), err))
}

#[cfg(not(feature = "serial"))]
fn open_uart(_path: &str, _baud: u32) -> CliResult<Device> {
    Err(CliError::new(
        USAGE,
        "built without UART support (enable the `serial` feature)",
    ))
}

#[cfg(feature = "usb")]
fn open_usb(index: usize) -> CliResult<Device> {
    let devices = buslink::host::list_usb_devices()
        .map_err(|err| crate::exit::host_error("usb discovery", err))?;
    let count = devices.len();
    devices.into_iter().nth(index).ok_or_else(|| {
        crate::exit::CliError::new(
            crate::exit::TRANSPORT_ERROR,
            format!("no buslink USB device at index {index} ({count} found)"),
        )
    })
}

#[cfg(not(feature = "usb"))]
fn open_usb(_index: usize) -> CliResult<Device> {
    Err(CliError::new(
        USAGE,
        "built without USB support (enable the `usb` feature)",
    ))
}
