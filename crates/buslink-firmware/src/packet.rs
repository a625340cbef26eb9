use buslink_wire::{
    decode_request, encode_response, Limits, Request, Response, WireError, REQ_HEADER_SIZE,
};
use bytes::BytesMut;
use tracing::{trace, warn};

use crate::config::FirmwareConfig;
use crate::error::{InterfaceError, Result};
use crate::interface::Interface;

/// Device side of a bulk endpoint pair.
pub trait PacketPort: Send {
    /// Block until one packet arrives. Returns its length; zero is a ZLP.
    fn read_packet(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Send one packet of at most [`max_packet_size`](Self::max_packet_size)
    /// bytes. An empty slice sends a ZLP.
    fn write_packet(&mut self, data: &[u8]) -> Result<()>;

    fn max_packet_size(&self) -> usize;
}

/// Firmware interface over bulk packets.
///
/// A message is every packet up to and including the first short one.
pub struct PacketInterface<P> {
    name: String,
    port: P,
    limits: Limits,
    packet: Vec<u8>,
    rx: Vec<u8>,
    tx: BytesMut,
}

impl<P: PacketPort> PacketInterface<P> {
    pub fn new(name: impl Into<String>, port: P, config: &FirmwareConfig) -> Self {
        let mps = port.max_packet_size();
        Self {
            name: name.into(),
            port,
            limits: config.limits,
            packet: vec![0u8; mps],
            rx: Vec::with_capacity(REQ_HEADER_SIZE + config.limits.req_max_size),
            tx: BytesMut::new(),
        }
    }

    pub fn get_ref(&self) -> &P {
        &self.port
    }
}

impl<P: PacketPort> Interface for PacketInterface<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self) -> Result<()> {
        if self.packet.is_empty() {
            return Err(InterfaceError::Init(
                "max packet size must be nonzero".to_string(),
            ));
        }
        Ok(())
    }

    fn get_request(&mut self) -> Result<Request> {
        let mps = self.packet.len();
        let cap = REQ_HEADER_SIZE + self.limits.req_max_size;
        self.rx.clear();
        let mut total = 0usize;

        loop {
            let n = self.port.read_packet(&mut self.packet)?;
            total += n;
            if total <= cap {
                self.rx.extend_from_slice(&self.packet[..n]);
            }
            if n < mps {
                break;
            }
        }

        if total > cap {
            warn!(
                interface = %self.name,
                len = total,
                max = cap,
                "oversized request drained"
            );
            return Err(WireError::PayloadTooLarge {
                size: total - REQ_HEADER_SIZE,
                max: self.limits.req_max_size,
            }
            .into());
        }
        trace!(interface = %self.name, len = total, "request received");
        Ok(decode_request(&self.rx, self.limits.req_max_size)?)
    }

    fn send_response(&mut self, response: &Response) -> Result<()> {
        let size = response.payload.len();
        if size > self.limits.resp_max_size {
            return Err(InterfaceError::ResponseTooLarge {
                size,
                max: self.limits.resp_max_size,
            });
        }
        self.tx.clear();
        encode_response(response, &mut self.tx)?;

        let mps = self.packet.len();
        for chunk in self.tx.chunks(mps) {
            self.port.write_packet(chunk)?;
        }
        if self.tx.len() % mps == 0 {
            self.port.write_packet(&[])?;
        }
        Ok(())
    }
}
