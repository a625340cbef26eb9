//! Built-in metadata peripheral (class 0).

use buslink_wire::{DeviceError, Limits, PeriphId};
use tracing::debug;

use crate::registry::{ClassPeripheral, Handler, PeripheralBuilder};

fn expect_len(req: &[u8], len: usize) -> Result<(), DeviceError> {
    if req.len() != len {
        return Err(DeviceError::InvalidArgsFormat);
    }
    Ok(())
}

fn put_size(out: &mut Vec<u8>, size: usize) {
    let size = u16::try_from(size).unwrap_or(u16::MAX);
    out.extend_from_slice(&size.to_le_bytes());
}

/// Build the metadata class.
///
/// `counts[id]` is the instance count of class `id`, captured once at boot.
pub(crate) fn peripheral(
    serial: String,
    limits: Limits,
    counts: Vec<u16>,
    custom: Option<Handler>,
) -> ClassPeripheral {
    let builder = PeripheralBuilder::new(PeriphId::Metadata.name(), 1)
        .function(move |_, req, out| {
            expect_len(req, 0)?;
            out.extend_from_slice(serial.as_bytes());
            Ok(())
        })
        .function(move |_, req, out| {
            expect_len(req, 2)?;
            let id = u16::from_le_bytes([req[0], req[1]]);
            let count = counts
                .get(usize::from(id))
                .ok_or(DeviceError::NotSupported)?;
            debug!(periph_id = id, count, "num_inst");
            out.extend_from_slice(&count.to_le_bytes());
            Ok(())
        })
        .function(|_, req, out| {
            out.extend_from_slice(req);
            Ok(())
        })
        .function(move |_, req, out| {
            expect_len(req, 0)?;
            put_size(out, limits.req_max_size);
            Ok(())
        })
        .function(move |_, req, out| {
            expect_len(req, 0)?;
            put_size(out, limits.resp_max_size);
            Ok(())
        });

    let builder = match custom {
        Some(hook) => builder.function(move |idx, req, out| hook(idx, req, out)),
        None => builder.function(|_, _, _| Err(DeviceError::NotSupported)),
    };
    builder.build()
}
