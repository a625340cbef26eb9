use std::io::{self, ErrorKind, Read, Write};
use std::time::Duration;

use buslink_wire::{
    validate_payload_len, Limits, RequestHeader, Response, ResponseHeader, REQ_HEADER_SIZE,
    RESP_HEADER_SIZE,
};
use bytes::{BufMut, BytesMut};
use tracing::{debug, warn};

use crate::error::{Result, Stage, TransportError};
use crate::traits::{Transport, TransportConfig, TransportKind};

/// An ordered, unframed byte stream such as a UART.
///
/// Reads block until at least one byte arrives or the read timeout expires,
/// in which case they fail with `io::ErrorKind::TimedOut`.
pub trait StreamPort: Read + Write + Send {
    /// Set the timeout for each blocking read.
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// Discard any buffered but unread input.
    fn purge_input(&mut self) -> io::Result<()>;
}

impl<S: StreamPort + ?Sized> StreamPort for Box<S> {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        (**self).set_timeout(timeout)
    }

    fn purge_input(&mut self) -> io::Result<()> {
        (**self).purge_input()
    }
}

/// Byte-stream transport.
///
/// The response is read in two steps: the fixed header, then exactly the
/// payload length it announces. The timeout bounds silence between chunks,
/// so a slow but continuous response is never cut off.
///
/// Input is purged before every request, so a late response to an earlier
/// call that timed out is never taken for the current one. A timeout or an
/// announced length beyond the limit also purges right away.
pub struct StreamTransport<S> {
    port: S,
    config: TransportConfig,
    tx: BytesMut,
}

impl<S: StreamPort> StreamTransport<S> {
    pub fn new(port: S) -> Result<Self> {
        Self::with_config(port, TransportConfig::default())
    }

    /// Create a transport and apply the configured read timeout to the port.
    pub fn with_config(mut port: S, config: TransportConfig) -> Result<Self> {
        port.set_timeout(config.timeout)
            .map_err(|err| TransportError::from_io(Stage::Request, config.timeout, err))?;
        let tx = BytesMut::with_capacity(REQ_HEADER_SIZE + config.limits.req_max_size);
        Ok(Self { port, config, tx })
    }

    pub fn get_ref(&self) -> &S {
        &self.port
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.port
    }

    pub fn into_inner(self) -> S {
        self.port
    }

    fn purge(&mut self) {
        if let Err(err) = self.port.purge_input() {
            warn!(error = %err, "failed to purge stream input");
        }
    }

    fn read_full(&mut self, buf: &mut [u8], stage: Stage) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.port.read(&mut buf[filled..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    let err = TransportError::from_io(stage, self.config.timeout, err);
                    if err.is_timeout() {
                        debug!(%stage, filled, want = buf.len(), "stream went silent");
                        self.purge();
                    }
                    return Err(err);
                }
            }
        }
        Ok(())
    }
}

impl<S: StreamPort> Transport for StreamTransport<S> {
    fn exchange(&mut self, header: &RequestHeader, payload: &[u8]) -> Result<Response> {
        debug_assert_eq!(header.payload_len(), payload.len());
        let timeout = self.config.timeout;

        self.purge();
        self.tx.clear();
        self.tx.put_slice(&header.to_bytes());
        self.tx.put_slice(payload);
        self.port
            .write_all(&self.tx)
            .and_then(|()| self.port.flush())
            .map_err(|err| TransportError::from_io(Stage::Request, timeout, err))?;

        let mut head = [0u8; RESP_HEADER_SIZE];
        self.read_full(&mut head, Stage::ResponseHeader)?;
        let resp_header = ResponseHeader::from_bytes(&head)?;

        if let Err(err) =
            validate_payload_len(resp_header.payload_len(), self.config.limits.resp_max_size)
        {
            warn!(
                len = resp_header.payload_len(),
                max = self.config.limits.resp_max_size,
                "response length out of range, purging input"
            );
            self.purge();
            return Err(err.into());
        }

        let mut body = vec![0u8; resp_header.payload_len()];
        self.read_full(&mut body, Stage::ResponsePayload)?;

        debug!(
            periph_id = header.periph_id,
            periph_idx = header.periph_idx,
            periph_fn = header.periph_fn,
            req_len = self.tx.len(),
            resp_len = resp_header.message_len(),
            retcode = resp_header.retcode,
            "stream exchange complete"
        );
        Ok(Response {
            retcode: resp_header.retcode,
            payload: body.into(),
        })
    }

    fn set_limits(&mut self, limits: Limits) {
        self.config.limits = limits;
    }

    fn limits(&self) -> Limits {
        self.config.limits
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Stream
    }
}
