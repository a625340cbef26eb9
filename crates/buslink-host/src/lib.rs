//! Host side of the buslink protocol.
//!
//! A [`Device`] owns one transport and serializes callers so at most one
//! request is in flight per link. Peripheral client code goes through
//! [`Device::call`]; the metadata class has typed helpers in [`metadata`].
//! [`discovery`] opens links and negotiates their payload limits.

pub mod device;
pub mod discovery;
pub mod error;
pub mod metadata;

pub use device::Device;
pub use discovery::{discover, negotiate, negotiate_with_reset};
pub use error::{Error, Result};

#[cfg(feature = "serial")]
pub use discovery::open_serial;
#[cfg(feature = "usb")]
pub use discovery::list_usb_devices;
