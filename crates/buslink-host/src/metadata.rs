//! Typed helpers for the metadata peripheral (class 0, instance 0).

use buslink_wire::{metadata, PeriphId};
use bytes::Bytes;

use crate::device::Device;
use crate::error::{Error, Result};

const META: u16 = PeriphId::Metadata as u16;

fn read_u16(function: &'static str, payload: &[u8]) -> Result<u16> {
    let bytes: [u8; 2] = payload
        .try_into()
        .map_err(|_| Error::UnexpectedResponse {
            function,
            detail: format!("expected 2 bytes, got {}", payload.len()),
        })?;
    Ok(u16::from_le_bytes(bytes))
}

impl Device {
    /// Device serial string.
    pub fn serial(&self) -> Result<String> {
        let payload = self.call(META, 0, metadata::SERIAL, &[])?;
        String::from_utf8(payload.to_vec()).map_err(|err| Error::UnexpectedResponse {
            function: "serial",
            detail: err.to_string(),
        })
    }

    /// Number of instances of a peripheral class.
    pub fn num_inst(&self, periph_id: u16) -> Result<u16> {
        let payload = self.call(META, 0, metadata::NUM_INST, &periph_id.to_le_bytes())?;
        read_u16("num_inst", &payload)
    }

    /// Send `data` and get it back unchanged.
    pub fn echo(&self, data: &[u8]) -> Result<Bytes> {
        self.call(META, 0, metadata::ECHO, data)
    }

    /// Largest request payload the device accepts.
    pub fn req_max_size(&self) -> Result<usize> {
        let payload = self.call(META, 0, metadata::REQ_MAX_SIZE, &[])?;
        read_u16("req_max_size", &payload).map(usize::from)
    }

    /// Largest response payload the device may send.
    pub fn resp_max_size(&self) -> Result<usize> {
        let payload = self.call(META, 0, metadata::RESP_MAX_SIZE, &[])?;
        read_u16("resp_max_size", &payload).map(usize::from)
    }

    /// Application-defined metadata function. Devices without a custom hook
    /// answer `NotSupported`.
    pub fn custom(&self, payload: &[u8]) -> Result<Bytes> {
        self.call(META, 0, metadata::CUSTOM, payload)
    }
}
