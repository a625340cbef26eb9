use std::time::Duration;

use buslink_wire::{Limits, MAX_REQ_PAYLOAD, REQ_HEADER_SIZE};

/// Serial string reported when none is configured.
pub const DEFAULT_SERIAL: &str = "buslink-sim";

/// Silence allowed between two bytes of one message on a byte stream.
pub const DEFAULT_BYTE_TIMEOUT: Duration = Duration::from_millis(10);

/// Firmware-wide settings.
#[derive(Debug, Clone)]
pub struct FirmwareConfig {
    /// Reported by the metadata `serial` function.
    pub serial: String,
    /// Per-byte silence timeout once a byte-stream message has started.
    pub byte_timeout: Duration,
    /// Capacity of each byte-stream RX queue.
    pub rx_queue_capacity: usize,
    /// Payload limits advertised to hosts and enforced by every interface.
    pub limits: Limits,
}

impl Default for FirmwareConfig {
    fn default() -> Self {
        Self {
            serial: DEFAULT_SERIAL.to_string(),
            byte_timeout: DEFAULT_BYTE_TIMEOUT,
            rx_queue_capacity: REQ_HEADER_SIZE + MAX_REQ_PAYLOAD,
            limits: Limits::default(),
        }
    }
}
