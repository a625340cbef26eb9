use std::time::Duration;

use buslink_wire::{Limits, RequestHeader, Response};

use crate::error::Result;

/// Default bound for each blocking step of an exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Configuration shared by the transports.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Timeout for each blocking step. On byte streams it bounds silence, not
    /// total elapsed time.
    pub timeout: Duration,
    /// Initial payload limits, replaced after negotiation.
    pub limits: Limits,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            limits: Limits::default(),
        }
    }
}

/// Framing discipline of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Packet,
    Stream,
}

impl TransportKind {
    pub fn name(self) -> &'static str {
        match self {
            TransportKind::Packet => "packet",
            TransportKind::Stream => "stream",
        }
    }
}

/// One half-duplex request/response exchange over a link.
///
/// Implementations never retry on their own. After an error the transport is
/// left ready for the next exchange.
pub trait Transport: Send {
    /// Send `header` + `payload` and wait for the matching response.
    ///
    /// `header.payload_len` must equal `payload.len()`.
    fn exchange(&mut self, header: &RequestHeader, payload: &[u8]) -> Result<Response>;

    /// Apply negotiated payload limits.
    fn set_limits(&mut self, limits: Limits);

    /// Current payload limits.
    fn limits(&self) -> Limits;

    /// Reset the physical device, if the link supports it.
    fn reset(&mut self) -> Result<()> {
        Ok(())
    }

    fn kind(&self) -> TransportKind;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn exchange(&mut self, header: &RequestHeader, payload: &[u8]) -> Result<Response> {
        (**self).exchange(header, payload)
    }

    fn set_limits(&mut self, limits: Limits) {
        (**self).set_limits(limits)
    }

    fn limits(&self) -> Limits {
        (**self).limits()
    }

    fn reset(&mut self) -> Result<()> {
        (**self).reset()
    }

    fn kind(&self) -> TransportKind {
        (**self).kind()
    }
}
