//! In-memory links between a host transport and a firmware interface.
//!
//! [`usb_link`] models a bulk endpoint pair that preserves packet boundaries.
//! [`serial_link`] models a UART: the host side writes into the firmware's
//! RX queue, the firmware writes chunks back to the host. Dropping the host
//! half closes the link and ends the firmware's interface thread.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use buslink_firmware::{
    rx_queue, BootError, FirmwareConfig, InterfaceError, PacketPort, PeripheralBuilder, Registry,
    RegistryBuilder, RxProducer, StreamInterface,
};
use buslink_transport::{BulkPipe, StreamPort, DEFAULT_TIMEOUT};
use buslink_wire::{DeviceError, PeriphId};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use tracing::trace;

/// Host end of a simulated USB link.
pub struct SimBulkPipe {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    max_packet_size: usize,
    resets: usize,
}

/// Device end of a simulated USB link.
pub struct SimPacketPort {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    max_packet_size: usize,
}

/// Create a simulated USB link with the given max packet size.
pub fn usb_link(max_packet_size: usize) -> (SimBulkPipe, SimPacketPort) {
    let (out_tx, out_rx) = channel::unbounded();
    let (in_tx, in_rx) = channel::unbounded();
    (
        SimBulkPipe {
            tx: out_tx,
            rx: in_rx,
            max_packet_size,
            resets: 0,
        },
        SimPacketPort {
            tx: in_tx,
            rx: out_rx,
            max_packet_size,
        },
    )
}

impl SimBulkPipe {
    /// Number of resets issued on this pipe.
    pub fn resets(&self) -> usize {
        self.resets
    }
}

fn disconnected() -> io::Error {
    io::Error::from(io::ErrorKind::BrokenPipe)
}

impl BulkPipe for SimBulkPipe {
    fn write_bulk(&mut self, data: &[u8], _timeout: Duration) -> io::Result<usize> {
        if data.is_empty() {
            self.tx.send(Vec::new()).map_err(|_| disconnected())?;
            return Ok(0);
        }
        for packet in data.chunks(self.max_packet_size) {
            self.tx.send(packet.to_vec()).map_err(|_| disconnected())?;
        }
        Ok(data.len())
    }

    fn read_bulk(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        let mut filled = 0;
        loop {
            let packet = self.rx.recv_timeout(timeout).map_err(|err| match err {
                RecvTimeoutError::Timeout => io::Error::from(io::ErrorKind::TimedOut),
                RecvTimeoutError::Disconnected => disconnected(),
            })?;
            let end = filled + packet.len();
            if end > buf.len() {
                return Err(io::Error::other("transfer overflow"));
            }
            buf[filled..end].copy_from_slice(&packet);
            filled = end;
            if packet.len() < self.max_packet_size || filled == buf.len() {
                return Ok(filled);
            }
        }
    }

    fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    fn reset(&mut self) -> io::Result<()> {
        self.resets += 1;
        let stale = self.rx.try_iter().count();
        trace!(stale, "simulated usb reset");
        Ok(())
    }
}

impl PacketPort for SimPacketPort {
    fn read_packet(&mut self, buf: &mut [u8]) -> buslink_firmware::Result<usize> {
        let packet = self.rx.recv().map_err(|_| InterfaceError::Closed)?;
        let Some(dst) = buf.get_mut(..packet.len()) else {
            return Err(InterfaceError::Io(io::Error::other("packet exceeds buffer")));
        };
        dst.copy_from_slice(&packet);
        Ok(packet.len())
    }

    fn write_packet(&mut self, data: &[u8]) -> buslink_firmware::Result<()> {
        self.tx
            .send(data.to_vec())
            .map_err(|_| InterfaceError::Closed)
    }

    fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }
}

/// Host end of a simulated UART.
pub struct SimSerialPort {
    producer: RxProducer,
    rx: Receiver<Vec<u8>>,
    pending: VecDeque<u8>,
    timeout: Duration,
}

/// Device-side TX of a simulated UART.
pub struct SimSerialTx {
    tx: Sender<Vec<u8>>,
}

/// Create a simulated UART sized by `config`.
pub fn serial_link(config: &FirmwareConfig) -> (SimSerialPort, StreamInterface<SimSerialTx>) {
    let (producer, consumer) = rx_queue(config.rx_queue_capacity);
    let (tx, rx) = channel::unbounded();
    let host = SimSerialPort {
        producer,
        rx,
        pending: VecDeque::new(),
        timeout: DEFAULT_TIMEOUT,
    };
    let device = StreamInterface::new("uart-sim", consumer, SimSerialTx { tx }, config);
    (host, device)
}

impl Read for SimSerialPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            match self.rx.recv_timeout(self.timeout) {
                Ok(chunk) => self.pending.extend(chunk),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(io::Error::from(io::ErrorKind::TimedOut))
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for SimSerialPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.producer.push(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl StreamPort for SimSerialPort {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.timeout = timeout;
        Ok(())
    }

    fn purge_input(&mut self) -> io::Result<()> {
        self.pending.clear();
        let _ = self.rx.try_iter().count();
        Ok(())
    }
}

impl Write for SimSerialTx {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx.send(buf.to_vec()).map_err(|_| disconnected())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// GPIO functions of the demo registry.
pub mod gpio {
    /// Request `[level]`, empty response.
    pub const WRITE: u16 = 0;
    /// Empty request, response `[level]`.
    pub const READ: u16 = 1;
}

/// Number of GPIO pins in the demo registry.
pub const DEMO_GPIO_PINS: u16 = 4;

/// Registry for simulated firmware: metadata plus a small GPIO bank.
pub fn demo_registry(config: &FirmwareConfig) -> RegistryBuilder {
    let pins: Arc<Vec<AtomicU8>> =
        Arc::new((0..DEMO_GPIO_PINS).map(|_| AtomicU8::new(0)).collect());
    let write_pins = Arc::clone(&pins);

    let gpio = PeripheralBuilder::new(PeriphId::Gpio.name(), DEMO_GPIO_PINS)
        .function(move |idx, req, _out| {
            let [level] = req else {
                return Err(DeviceError::InvalidArgsFormat);
            };
            if *level > 1 {
                return Err(DeviceError::InvalidArgs);
            }
            write_pins[usize::from(idx)].store(*level, Ordering::SeqCst);
            Ok(())
        })
        .function(move |idx, req, out| {
            if !req.is_empty() {
                return Err(DeviceError::InvalidArgsFormat);
            }
            out.push(pins[usize::from(idx)].load(Ordering::SeqCst));
            Ok(())
        })
        .build();

    RegistryBuilder::from_config(config).peripheral(PeriphId::Gpio, gpio)
}

/// Build the demo registry in one step.
pub fn demo(config: &FirmwareConfig) -> std::result::Result<Registry, BootError> {
    demo_registry(config).build()
}
