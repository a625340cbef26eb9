use std::io;
use std::time::Duration;

use rusb::{Context, Device, DeviceHandle, UsbContext};
use tracing::{debug, warn};

use crate::descriptor::{self, BulkPair, Direction, EndpointSummary, InterfaceSummary};
use crate::error::{Result, TransportError};
use crate::packet::BulkPipe;

/// Bulk endpoint pair on a claimed buslink USB interface.
pub struct UsbPipe {
    handle: DeviceHandle<Context>,
    pair: BulkPair,
    location: String,
}

impl UsbPipe {
    /// Human-readable bus location (`bus:address`).
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Interface and endpoints the pipe was opened on.
    pub fn endpoints(&self) -> BulkPair {
        self.pair
    }
}

impl BulkPipe for UsbPipe {
    fn write_bulk(&mut self, data: &[u8], timeout: Duration) -> io::Result<usize> {
        self.handle
            .write_bulk(self.pair.ep_out, data, timeout)
            .map_err(usb_to_io)
    }

    fn read_bulk(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        self.handle
            .read_bulk(self.pair.ep_in, buf, timeout)
            .map_err(usb_to_io)
    }

    fn max_packet_size(&self) -> usize {
        self.pair.out_packet_size
    }

    fn reset(&mut self) -> io::Result<()> {
        self.handle.reset().map_err(usb_to_io)?;
        if let Err(err) = self.handle.claim_interface(self.pair.interface) {
            debug!(location = %self.location, error = %err, "re-claim after reset failed");
        }
        Ok(())
    }
}

impl Drop for UsbPipe {
    fn drop(&mut self) {
        let _ = self.handle.release_interface(self.pair.interface);
    }
}

fn usb_to_io(err: rusb::Error) -> io::Error {
    let kind = match err {
        rusb::Error::Timeout => io::ErrorKind::TimedOut,
        rusb::Error::NoDevice => io::ErrorKind::NotConnected,
        rusb::Error::Pipe => io::ErrorKind::BrokenPipe,
        rusb::Error::Interrupted => io::ErrorKind::Interrupted,
        rusb::Error::Access => io::ErrorKind::PermissionDenied,
        rusb::Error::NotFound => io::ErrorKind::NotFound,
        _ => return io::Error::other(err),
    };
    io::Error::new(kind, err)
}

/// Open every attached device exposing a buslink interface.
///
/// Devices that cannot be opened or do not match are skipped.
pub fn open_all() -> Result<Vec<UsbPipe>> {
    let context = Context::new().map_err(|err| TransportError::Open {
        target: "usb".to_string(),
        reason: err.to_string(),
    })?;
    let devices = context.devices().map_err(|err| TransportError::Open {
        target: "usb".to_string(),
        reason: err.to_string(),
    })?;

    let mut pipes = Vec::new();
    for device in devices.iter() {
        let location = format!("{:03}:{:03}", device.bus_number(), device.address());
        match try_open(&device, &location) {
            Ok(Some(pipe)) => {
                debug!(%location, "found buslink interface");
                pipes.push(pipe);
            }
            Ok(None) => {}
            Err(err) => debug!(%location, error = %err, "skipping usb device"),
        }
    }
    Ok(pipes)
}

fn try_open(device: &Device<Context>, location: &str) -> rusb::Result<Option<UsbPipe>> {
    let config = device.active_config_descriptor()?;

    let mut candidates = Vec::new();
    for interface in config.interfaces() {
        for desc in interface.descriptors() {
            let summary = InterfaceSummary {
                number: desc.interface_number(),
                alt_setting: desc.setting_number(),
                class_code: desc.class_code(),
                endpoints: desc
                    .endpoint_descriptors()
                    .map(|ep| EndpointSummary {
                        address: ep.address(),
                        direction: match ep.direction() {
                            rusb::Direction::In => Direction::In,
                            rusb::Direction::Out => Direction::Out,
                        },
                        bulk: ep.transfer_type() == rusb::TransferType::Bulk,
                        max_packet_size: ep.max_packet_size(),
                    })
                    .collect(),
            };
            if let Some(pair) = descriptor::match_interface(&summary) {
                candidates.push((pair, desc.description_string_index()));
            }
        }
    }
    if candidates.is_empty() {
        return Ok(None);
    }

    let mut handle = device.open()?;
    for (pair, string_index) in candidates {
        let Some(index) = string_index else {
            continue;
        };
        let name = match handle.read_string_descriptor_ascii(index) {
            Ok(name) => name,
            Err(err) => {
                warn!(%location, error = %err, "cannot read interface string");
                continue;
            }
        };
        if !descriptor::string_matches(&name) {
            continue;
        }
        handle.claim_interface(pair.interface)?;
        return Ok(Some(UsbPipe {
            handle,
            pair,
            location: location.to_string(),
        }));
    }
    Ok(None)
}
