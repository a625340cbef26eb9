//! Device side of the buslink protocol.
//!
//! A [`Registry`] maps each peripheral-class id to a [`Peripheral`] with its
//! instance count, handler table and physical device identity. At boot the
//! registry is turned into a [`LockTable`] holding one lock per distinct
//! physical device, so two classes fronting the same controller never run
//! their handlers at the same time.
//!
//! [`Firmware::spawn`] runs one dispatch loop per [`Interface`]:
//! await request, validate, dispatch under the device lock, respond.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod interface;
pub mod locks;
pub mod metadata;
pub mod packet;
pub mod registry;
pub mod service;
pub mod stream;

pub use config::{FirmwareConfig, DEFAULT_BYTE_TIMEOUT, DEFAULT_SERIAL};
pub use dispatch::Dispatcher;
pub use error::{BootError, InterfaceError, Result};
pub use interface::Interface;
pub use locks::LockTable;
pub use packet::{PacketInterface, PacketPort};
pub use registry::{
    ClassPeripheral, DeviceIdentity, Handler, Peripheral, PeripheralBuilder, Registry,
    RegistryBuilder, Vacant,
};
pub use service::{serve, Firmware, MAX_IO_ERRORS};
pub use stream::{rx_queue, RxConsumer, RxProducer, StreamInterface};
