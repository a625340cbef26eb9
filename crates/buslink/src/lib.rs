//! Host and firmware sides of a fixed-format request/response protocol for
//! embedded peripherals, carried over USB bulk endpoints or a UART.
//!
//! # Crate Structure
//!
//! - [`wire`]: Envelope layout, size limits, status codes, class ids
//! - [`transport`]: Packet and byte-stream framing on the host side
//! - [`host`]: `Device` handle, metadata client, discovery and negotiation
//! - [`firmware`]: Peripheral registry, lock table, dispatch loop, interfaces
//! - [`sim`]: In-memory links joining a host transport to a firmware interface

/// Re-export wire types.
pub mod wire {
    pub use buslink_wire::*;
}

/// Re-export transport types.
pub mod transport {
    pub use buslink_transport::*;
}

/// Re-export host types.
pub mod host {
    pub use buslink_host::*;
}

/// Re-export firmware types.
pub mod firmware {
    pub use buslink_firmware::*;
}

pub mod sim;

pub use buslink_host::{Device, Error, Result};
