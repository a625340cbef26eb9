use std::time::Duration;

use buslink_wire::{DeviceError, WireError};

/// Errors raised by an interface while receiving or sending a message.
#[derive(Debug, thiserror::Error)]
pub enum InterfaceError {
    /// The interface could not be brought up.
    #[error("interface init failed: {0}")]
    Init(String),

    /// The link went silent in the middle of a message.
    #[error("timed out after {0:?} of silence")]
    Timeout(Duration),

    /// The received request was malformed.
    #[error("malformed request: {0}")]
    Envelope(#[from] WireError),

    /// A response exceeded the advertised maximum and was not sent.
    #[error("response of {size} bytes exceeds maximum {max}")]
    ResponseTooLarge { size: usize, max: usize },

    /// An I/O error occurred on the link.
    #[error("interface I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The other end of the link is gone.
    #[error("interface closed")]
    Closed,
}

impl InterfaceError {
    /// Whether the dispatch loop should keep serving after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, InterfaceError::Init(_) | InterfaceError::Closed)
    }
}

/// Errors that prevent the firmware from starting.
#[derive(Debug, thiserror::Error)]
pub enum BootError {
    /// A peripheral instance failed to initialise.
    #[error("failed to initialise {name}[{idx}]: {source}")]
    PeripheralInit {
        name: String,
        idx: u16,
        source: DeviceError,
    },

    /// Class 0 is reserved for the built-in metadata peripheral.
    #[error("peripheral class {0} is reserved")]
    ReservedClass(u16),
}

pub type Result<T> = std::result::Result<T, InterfaceError>;
