//! Response status codes.
//!
//! `retcode` travels as a signed 16-bit value. Zero is success; everything
//! else maps onto [`DeviceError`].

/// Raw `retcode` for a successful call.
pub const NO_ERR: i16 = 0;

/// A nonzero `retcode` reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum DeviceError {
    /// Unknown peripheral class, instance, or function.
    #[error("not supported")]
    NotSupported,

    /// Request payload length does not match what the handler expects.
    #[error("invalid argument format")]
    InvalidArgsFormat,

    /// Peripheral instance used before it was configured.
    #[error("peripheral uninitialized")]
    Uninitialized,

    /// The underlying hardware driver call failed.
    #[error("peripheral error")]
    Peripheral,

    /// Payload is well formed but a value inside it is out of range.
    #[error("invalid arguments")]
    InvalidArgs,

    /// Hardware could not complete the operation right now.
    #[error("busy")]
    Busy,

    /// A bounded wait for a hardware event expired.
    #[error("device timeout")]
    Timeout,

    /// A code this build does not know about.
    #[error("unknown device error {0}")]
    Unknown(i16),
}

impl DeviceError {
    /// Raw wire value.
    pub fn code(self) -> i16 {
        match self {
            DeviceError::NotSupported => 1,
            DeviceError::InvalidArgsFormat => 2,
            DeviceError::Uninitialized => 3,
            DeviceError::Peripheral => 4,
            DeviceError::InvalidArgs => 5,
            DeviceError::Busy => 6,
            DeviceError::Timeout => 7,
            DeviceError::Unknown(code) => code,
        }
    }

    /// Interpret a raw `retcode`. Returns `None` for [`NO_ERR`].
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            NO_ERR => None,
            1 => Some(DeviceError::NotSupported),
            2 => Some(DeviceError::InvalidArgsFormat),
            3 => Some(DeviceError::Uninitialized),
            4 => Some(DeviceError::Peripheral),
            5 => Some(DeviceError::InvalidArgs),
            6 => Some(DeviceError::Busy),
            7 => Some(DeviceError::Timeout),
            other => Some(DeviceError::Unknown(other)),
        }
    }
}

/// Convert a raw `retcode` into a result.
pub fn check(code: i16) -> Result<(), DeviceError> {
    match DeviceError::from_code(code) {
        None => Ok(()),
        Some(err) => Err(err),
    }
}
