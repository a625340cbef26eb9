use serde::Serialize;

use crate::cmd::ListArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::OutputFormat;

#[cfg_attr(not(feature = "usb"), allow(dead_code))]
#[derive(Debug, Serialize)]
struct DeviceRow {
    index: usize,
    serial: String,
    transport: &'static str,
    req_max_size: usize,
    resp_max_size: usize,
}

#[derive(Debug, Serialize)]
struct ListOutput {
    devices: Vec<DeviceRow>,
}

pub fn run(_args: ListArgs, format: OutputFormat) -> CliResult<i32> {
    let devices = discover_rows()?;
    print_list(&ListOutput { devices }, format);
    Ok(SUCCESS)
}

#[cfg(feature = "usb")]
fn discover_rows() -> CliResult<Vec<DeviceRow>> {
    let devices = buslink::host::list_usb_devices()
        .map_err(|err| crate::exit::host_error("usb discovery", err))?;

    Ok(devices
        .iter()
        .enumerate()
        .map(|(index, device)| {
            let limits = device.limits();
            DeviceRow {
                index,
                serial: device
                    .serial()
                    .unwrap_or_else(|err| format!("<unavailable: {err}>")),
                transport: device.transport_kind().name(),
                req_max_size: limits.req_max_size,
                resp_max_size: limits.resp_max_size,
            }
        })
        .collect())
}

#[cfg(not(feature = "usb"))]
fn discover_rows() -> CliResult<Vec<DeviceRow>> {
    Err(crate::exit::CliError::new(
        crate::exit::USAGE,
        "built without USB support (enable the `usb` feature)",
    ))
}

fn print_list(out: &ListOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => crate::output::print_json(out),
        OutputFormat::Table => {
            let mut table = crate::output::table(vec!["INDEX", "SERIAL", "REQ MAX", "RESP MAX"]);
            for row in &out.devices {
                table.add_row(vec![
                    row.index.to_string(),
                    row.serial.clone(),
                    row.req_max_size.to_string(),
                    row.resp_max_size.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            if out.devices.is_empty() {
                println!("no buslink devices found");
            }
            for row in &out.devices {
                println!(
                    "[{}] {} ({}, req {} / resp {})",
                    row.index, row.serial, row.transport, row.req_max_size, row.resp_max_size
                );
            }
        }
        OutputFormat::Raw => {
            for row in &out.devices {
                println!("{}", row.serial);
            }
        }
    }
}
