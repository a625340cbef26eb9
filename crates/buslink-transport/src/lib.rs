//! Host-side transports for the buslink protocol.
//!
//! Two framing disciplines turn a link into one-request/one-response exchanges:
//! - [`PacketTransport`] over a bulk pipe (USB), terminated by a short packet
//! - [`StreamTransport`] over an ordered byte stream (UART), with a silence
//!   timeout per read step and input purge on malformed lengths
//!
//! Hardware backends are feature-gated: `usb` (rusb) and `serial` (serialport).

pub mod descriptor;
pub mod error;
pub mod packet;
pub mod stream;
pub mod traits;

#[cfg(feature = "serial")]
pub mod serial;
#[cfg(feature = "usb")]
pub mod usb;

pub use descriptor::{BulkPair, Direction, EndpointSummary, InterfaceSummary, INTERFACE_STRING};
pub use error::{Result, Stage, TransportError};
pub use packet::{needs_zlp, BulkPipe, PacketTransport};
pub use stream::{StreamPort, StreamTransport};
pub use traits::{Transport, TransportConfig, TransportKind, DEFAULT_TIMEOUT};

#[cfg(feature = "serial")]
pub use serial::{SerialStream, DEFAULT_BAUD};
#[cfg(feature = "usb")]
pub use usb::UsbPipe;
