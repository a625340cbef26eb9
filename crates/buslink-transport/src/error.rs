use std::fmt;
use std::time::Duration;

use buslink_wire::WireError;

/// Which step of an exchange was in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Request,
    ZeroLengthPacket,
    Response,
    ResponseHeader,
    ResponsePayload,
    Reset,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Request => "request",
            Stage::ZeroLengthPacket => "zero-length packet",
            Stage::Response => "response",
            Stage::ResponseHeader => "response header",
            Stage::ResponsePayload => "response payload",
            Stage::Reset => "reset",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while moving one exchange across a link.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The link could not be opened or claimed.
    #[error("failed to open {target}: {reason}")]
    Open { target: String, reason: String },

    /// An I/O error occurred on the link.
    #[error("transport I/O error during {stage}: {source}")]
    Io {
        stage: Stage,
        source: std::io::Error,
    },

    /// No data arrived within the timeout.
    #[error("timed out during {stage} after {timeout:?}")]
    Timeout { stage: Stage, timeout: Duration },

    /// Fewer bytes were written than requested.
    #[error("short write ({written} of {expected} bytes)")]
    ShortWrite { written: usize, expected: usize },

    /// The received envelope was malformed.
    #[error("malformed envelope: {0}")]
    Envelope(#[from] WireError),

    /// The link was closed by the other side.
    #[error("link closed")]
    Closed,
}

impl TransportError {
    /// Classify an I/O error from the given stage.
    pub fn from_io(stage: Stage, timeout: Duration, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                TransportError::Timeout { stage, timeout }
            }
            std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::NotConnected
            | std::io::ErrorKind::UnexpectedEof => TransportError::Closed,
            _ => TransportError::Io { stage, source: err },
        }
    }

    /// Whether this error was a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
