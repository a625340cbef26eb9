/// Errors produced while encoding or decoding an envelope.
///
/// Every variant is fatal to the exchange that produced it. The bytes are
/// discarded; they are never retried as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// Fewer bytes than a full header were supplied.
    #[error("truncated header ({len} bytes, need {need})")]
    TruncatedHeader { len: usize, need: usize },

    /// The declared payload length exceeds the maximum for this buffer.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The number of bytes transferred does not match header + `payload_len`.
    #[error("length mismatch (received {actual} bytes, header declares {expected})")]
    LengthMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, WireError>;
