use std::io;
use std::time::Duration;

use buslink_wire::{
    decode_response, Limits, RequestHeader, Response, REQ_HEADER_SIZE, RESP_HEADER_SIZE,
};
use bytes::{BufMut, BytesMut};
use tracing::{debug, trace};

use crate::error::{Result, Stage, TransportError};
use crate::traits::{Transport, TransportConfig, TransportKind};

/// A pair of bulk endpoints (one OUT, one IN) on a packet-oriented link.
///
/// Timeouts surface as `io::ErrorKind::TimedOut`.
pub trait BulkPipe: Send {
    /// Write `data` to the OUT endpoint. An empty slice sends a zero-length packet.
    fn write_bulk(&mut self, data: &[u8], timeout: Duration) -> io::Result<usize>;

    /// Read one transfer from the IN endpoint. The transfer ends at the first
    /// short packet or when `buf` is full.
    fn read_bulk(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;

    /// Max packet size of the OUT endpoint.
    fn max_packet_size(&self) -> usize;

    /// Reset the device behind the pipe.
    fn reset(&mut self) -> io::Result<()>;
}

impl<P: BulkPipe + ?Sized> BulkPipe for Box<P> {
    fn write_bulk(&mut self, data: &[u8], timeout: Duration) -> io::Result<usize> {
        (**self).write_bulk(data, timeout)
    }

    fn read_bulk(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        (**self).read_bulk(buf, timeout)
    }

    fn max_packet_size(&self) -> usize {
        (**self).max_packet_size()
    }

    fn reset(&mut self) -> io::Result<()> {
        (**self).reset()
    }
}

/// Whether a transfer of `len` bytes must be followed by a zero-length packet
/// so the receiver sees a short packet.
pub fn needs_zlp(len: usize, max_packet_size: usize) -> bool {
    max_packet_size != 0 && len % max_packet_size == 0
}

/// Receive buffer size for responses of up to `resp_max` payload bytes.
///
/// Rounded past the last full packet so a terminating short packet or ZLP
/// still fits and ends the transfer.
fn rx_capacity(resp_max: usize, max_packet_size: usize) -> usize {
    let len = RESP_HEADER_SIZE + resp_max;
    if max_packet_size == 0 {
        return len;
    }
    (len / max_packet_size + 1) * max_packet_size
}

/// Packet-oriented transport: one bulk write per request, one bulk read per
/// response.
///
/// A failed exchange may leave a late response queued on the IN endpoint.
/// The pipe is reset before the next request goes out so that response is
/// never handed to a later caller.
pub struct PacketTransport<P> {
    pipe: P,
    config: TransportConfig,
    tx: BytesMut,
    rx: Vec<u8>,
    stale: bool,
}

impl<P: BulkPipe> PacketTransport<P> {
    pub fn new(pipe: P) -> Self {
        Self::with_config(pipe, TransportConfig::default())
    }

    pub fn with_config(pipe: P, config: TransportConfig) -> Self {
        let limits = config.limits;
        let rx = vec![0u8; rx_capacity(limits.resp_max_size, pipe.max_packet_size())];
        Self {
            pipe,
            config,
            tx: BytesMut::with_capacity(REQ_HEADER_SIZE + limits.req_max_size),
            rx,
            stale: false,
        }
    }

    pub fn get_ref(&self) -> &P {
        &self.pipe
    }

    pub fn get_mut(&mut self) -> &mut P {
        &mut self.pipe
    }

    pub fn into_inner(self) -> P {
        self.pipe
    }

    fn io_error(&self, stage: Stage, err: io::Error) -> TransportError {
        TransportError::from_io(stage, self.config.timeout, err)
    }

    fn reset_pipe(&mut self) -> Result<()> {
        self.pipe
            .reset()
            .map_err(|err| self.io_error(Stage::Reset, err))?;
        self.stale = false;
        Ok(())
    }

    fn transfer(&mut self, header: &RequestHeader, payload: &[u8]) -> Result<Response> {
        let timeout = self.config.timeout;

        self.tx.clear();
        self.tx.put_slice(&header.to_bytes());
        self.tx.put_slice(payload);
        let expected = self.tx.len();

        let written = self
            .pipe
            .write_bulk(&self.tx, timeout)
            .map_err(|err| self.io_error(Stage::Request, err))?;
        if written != expected {
            return Err(TransportError::ShortWrite { written, expected });
        }

        let mps = self.pipe.max_packet_size();
        if needs_zlp(expected, mps) {
            trace!(len = expected, mps, "sending zero-length packet");
            self.pipe
                .write_bulk(&[], timeout)
                .map_err(|err| self.io_error(Stage::ZeroLengthPacket, err))?;
        }

        let read = self
            .pipe
            .read_bulk(&mut self.rx, timeout)
            .map_err(|err| self.io_error(Stage::Response, err))?;
        let response = decode_response(&self.rx[..read], self.config.limits.resp_max_size)?;

        debug!(
            periph_id = header.periph_id,
            periph_idx = header.periph_idx,
            periph_fn = header.periph_fn,
            req_len = expected,
            resp_len = read,
            retcode = response.retcode,
            "packet exchange complete"
        );
        Ok(response)
    }
}

impl<P: BulkPipe> Transport for PacketTransport<P> {
    fn exchange(&mut self, header: &RequestHeader, payload: &[u8]) -> Result<Response> {
        debug_assert_eq!(header.payload_len(), payload.len());

        if self.stale {
            debug!("discarding pending response from a failed exchange");
            self.reset_pipe()?;
        }

        let result = self.transfer(header, payload);
        if result.is_err() {
            self.stale = true;
        }
        result
    }

    fn set_limits(&mut self, limits: Limits) {
        self.config.limits = limits;
        let capacity = rx_capacity(limits.resp_max_size, self.pipe.max_packet_size());
        self.rx.resize(capacity, 0);
    }

    fn limits(&self) -> Limits {
        self.config.limits
    }

    fn reset(&mut self) -> Result<()> {
        debug!("resetting packet device");
        self.reset_pipe()
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Packet
    }
}
