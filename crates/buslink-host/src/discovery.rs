//! Opening links and negotiating their payload limits.
//!
//! Negotiation asks the device for its request and response limits through
//! the normal call path. A device reporting less than the protocol defaults,
//! or failing the queries, gets exactly one reset and one more attempt.

use buslink_transport::{Transport, TransportError};
use buslink_wire::Limits;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{Error, Result};

/// Query and apply the device's payload limits.
pub fn negotiate(device: &Device) -> Result<Limits> {
    let limits = Limits::new(device.req_max_size()?, device.resp_max_size()?);
    if !limits.meets_defaults() {
        return Err(Error::Misconfigured(limits));
    }
    device.set_limits(limits);
    Ok(limits)
}

/// Like [`negotiate`], resetting the device once and retrying on failure.
pub fn negotiate_with_reset(device: &Device) -> Result<Limits> {
    match negotiate(device) {
        Ok(limits) => Ok(limits),
        Err(err) => {
            warn!(error = %err, "negotiation failed, resetting device");
            device.reset()?;
            negotiate(device)
        }
    }
}

/// Negotiate every opened candidate and keep the ones that pass.
///
/// Candidates that failed to open, or that fail negotiation after the
/// reset, are skipped.
pub fn discover<I>(candidates: I) -> Vec<Device>
where
    I: IntoIterator<Item = std::result::Result<Box<dyn Transport>, TransportError>>,
{
    let mut devices = Vec::new();
    for candidate in candidates {
        let transport = match candidate {
            Ok(transport) => transport,
            Err(err) => {
                debug!(error = %err, "skipping candidate");
                continue;
            }
        };
        let device = Device::new(transport);
        match negotiate_with_reset(&device) {
            Ok(limits) => {
                info!(
                    req_max_size = limits.req_max_size,
                    resp_max_size = limits.resp_max_size,
                    "device ready"
                );
                devices.push(device);
            }
            Err(err) => debug!(error = %err, "dropping candidate"),
        }
    }
    devices
}

/// Find and negotiate every attached buslink USB device.
#[cfg(feature = "usb")]
pub fn list_usb_devices() -> Result<Vec<Device>> {
    use buslink_transport::{usb, PacketTransport};

    let pipes = usb::open_all()?;
    debug!(count = pipes.len(), "usb candidates");
    Ok(discover(pipes.into_iter().map(|pipe| {
        let pair = pipe.endpoints();
        debug!(
            location = pipe.location(),
            interface = pair.interface,
            ep_out = pair.ep_out,
            ep_in = pair.ep_in,
            max_packet_size = pair.out_packet_size,
            "negotiating usb candidate"
        );
        Ok(Box::new(PacketTransport::new(pipe)) as Box<dyn Transport>)
    })))
}

/// Open a UART link and negotiate its limits. No reset is attempted.
#[cfg(feature = "serial")]
pub fn open_serial(path: &str, baud: u32) -> Result<Device> {
    use buslink_transport::{SerialStream, StreamTransport, DEFAULT_TIMEOUT};

    let port = SerialStream::open(path, baud, DEFAULT_TIMEOUT)?;
    let device = Device::new(Box::new(StreamTransport::new(port)?));
    let limits = negotiate(&device)?;
    info!(path, baud, req_max_size = limits.req_max_size, "serial device ready");
    Ok(device)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use buslink_transport::TransportKind;
    use buslink_wire::{metadata, RequestHeader, Response};

    use super::*;

    /// Reports `before` as both limits until reset, `after` afterwards.
    struct Flaky {
        before: u16,
        after: u16,
        resets: Arc<AtomicUsize>,
        limits: Limits,
    }

    impl Flaky {
        fn new(before: u16, after: u16) -> (Self, Arc<AtomicUsize>) {
            let resets = Arc::new(AtomicUsize::new(0));
            let flaky = Self {
                before,
                after,
                resets: Arc::clone(&resets),
                limits: Limits::default(),
            };
            (flaky, resets)
        }
    }

    impl Transport for Flaky {
        fn exchange(
            &mut self,
            header: &RequestHeader,
            _payload: &[u8],
        ) -> buslink_transport::Result<Response> {
            let size = if self.resets.load(Ordering::SeqCst) == 0 {
                self.before
            } else {
                self.after
            };
            match header.periph_fn {
                metadata::REQ_MAX_SIZE | metadata::RESP_MAX_SIZE => {
                    Ok(Response::ok(size.to_le_bytes().to_vec()))
                }
                _ => Ok(Response::error(buslink_wire::DeviceError::NotSupported)),
            }
        }

        fn set_limits(&mut self, limits: Limits) {
            self.limits = limits;
        }

        fn limits(&self) -> Limits {
            self.limits
        }

        fn reset(&mut self) -> buslink_transport::Result<()> {
            self.resets.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn kind(&self) -> TransportKind {
            TransportKind::Packet
        }
    }

    fn boxed(t: Flaky) -> std::result::Result<Box<dyn Transport>, TransportError> {
        Ok(Box::new(t))
    }

    #[test]
    fn good_device_needs_no_reset() {
        let (flaky, resets) = Flaky::new(512, 512);
        let devices = discover([boxed(flaky)]);
        assert_eq!(devices.len(), 1);
        assert_eq!(resets.load(Ordering::SeqCst), 0);
        assert_eq!(devices[0].limits(), Limits::new(512, 512));
    }

    #[test]
    fn undersized_device_recovers_after_one_reset() {
        let (flaky, resets) = Flaky::new(64, 1024);
        let devices = discover([boxed(flaky)]);
        assert_eq!(devices.len(), 1);
        assert_eq!(resets.load(Ordering::SeqCst), 1);
        assert_eq!(devices[0].limits(), Limits::new(1024, 1024));
    }

    #[test]
    fn persistently_undersized_device_is_dropped() {
        let (bad, bad_resets) = Flaky::new(64, 64);
        let (good, _) = Flaky::new(512, 512);
        let devices = discover([boxed(bad), boxed(good)]);
        assert_eq!(devices.len(), 1);
        assert_eq!(bad_resets.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn open_failures_are_skipped() {
        let (good, _) = Flaky::new(512, 512);
        let failed = Err(TransportError::Open {
            target: "usb 001:004".to_string(),
            reason: "access denied".to_string(),
        });
        let devices = discover([failed, boxed(good)]);
        assert_eq!(devices.len(), 1);
    }

    #[test]
    fn negotiate_without_reset_reports_misconfiguration() {
        let (flaky, resets) = Flaky::new(128, 1024);
        let device = Device::new(Box::new(flaky));
        let err = negotiate(&device).unwrap_err();
        assert!(matches!(err, Error::Misconfigured(limits) if limits.req_max_size == 128));
        assert_eq!(resets.load(Ordering::SeqCst), 0);
        assert_eq!(device.limits(), Limits::default());
    }
}
