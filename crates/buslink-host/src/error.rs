use buslink_transport::TransportError;
use buslink_wire::{DeviceError, Limits};

/// Errors returned by [`Device`](crate::Device) operations.
///
/// Every failure of a call lands here. Callers probing for hardware (bus
/// scans and the like) may treat any variant as a negative result.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The link failed: open, I/O, timeout, short write or malformed envelope.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Request payload exceeds the negotiated limit. Nothing was sent.
    #[error("request payload of {size} bytes exceeds device limit of {max}")]
    RequestTooLarge { size: usize, max: usize },

    /// Response payload exceeds the negotiated limit.
    #[error("response payload of {size} bytes exceeds device limit of {max}")]
    ResponseTooLarge { size: usize, max: usize },

    /// The device answered with a nonzero status.
    #[error("device returned {0} (code {code})", code = .0.code())]
    Device(DeviceError),

    /// A metadata response did not have the expected shape.
    #[error("unexpected {function} response: {detail}")]
    UnexpectedResponse {
        function: &'static str,
        detail: String,
    },

    /// The device advertised limits below the protocol defaults.
    #[error(
        "device limits {req}/{resp} are below the protocol minimum",
        req = .0.req_max_size,
        resp = .0.resp_max_size
    )]
    Misconfigured(Limits),
}

impl Error {
    /// Raw status code when the device itself reported the failure.
    pub fn retcode(&self) -> Option<i16> {
        match self {
            Error::Device(err) => Some(err.code()),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Transport(err) if err.is_timeout())
    }
}

impl From<DeviceError> for Error {
    fn from(err: DeviceError) -> Self {
        Error::Device(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
