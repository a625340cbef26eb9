//! Byte-stream (UART) interface.
//!
//! Received bytes travel from the producer side (an RX interrupt or a reader
//! thread) to the dispatch thread through a bounded queue. When the queue is
//! full the whole queue is purged and the rest of the incoming chunk dropped,
//! so the consumer resynchronises on the next header instead of parsing
//! from the middle of a message.

use std::io::{self, ErrorKind, Read, Write};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use buslink_wire::{
    encode_response, validate_payload_len, Limits, Request, RequestHeader, Response,
    REQ_HEADER_SIZE,
};
use bytes::BytesMut;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{debug, error, warn};

use crate::config::FirmwareConfig;
use crate::error::{InterfaceError, Result};
use crate::interface::Interface;

const PUMP_CHUNK: usize = 64;

/// Create a bounded RX queue holding up to `capacity` bytes.
pub fn rx_queue(capacity: usize) -> (RxProducer, RxConsumer) {
    let (tx, rx) = channel::bounded(capacity);
    let producer = RxProducer {
        tx,
        drain: rx.clone(),
    };
    (producer, RxConsumer { rx })
}

/// Producer half of the RX queue.
///
/// Dropping it closes the queue; the consumer sees
/// [`InterfaceError::Closed`] once the remaining bytes are read.
pub struct RxProducer {
    tx: Sender<u8>,
    drain: Receiver<u8>,
}

impl RxProducer {
    /// Queue received bytes. Returns how many were accepted.
    ///
    /// On overflow the queue is purged and the remainder of `bytes` dropped.
    pub fn push(&self, bytes: &[u8]) -> usize {
        for (accepted, &byte) in bytes.iter().enumerate() {
            match self.tx.try_send(byte) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    let purged = self.purge();
                    warn!(
                        purged,
                        dropped = bytes.len() - accepted,
                        "rx queue overflow"
                    );
                    return accepted;
                }
                Err(TrySendError::Disconnected(_)) => return accepted,
            }
        }
        bytes.len()
    }

    /// Discard everything queued. Returns the number of bytes dropped.
    pub fn purge(&self) -> usize {
        self.drain.try_iter().count()
    }

    /// Feed the queue from `reader` on a dedicated thread.
    ///
    /// The thread ends, closing the queue, at end of input or on a hard read
    /// error. Read timeouts are ignored.
    pub fn pump<R>(self, mut reader: R) -> io::Result<JoinHandle<()>>
    where
        R: Read + Send + 'static,
    {
        thread::Builder::new()
            .name("buslink-rx".to_string())
            .spawn(move || {
                let mut chunk = [0u8; PUMP_CHUNK];
                loop {
                    match reader.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => {
                            self.push(&chunk[..n]);
                        }
                        Err(err)
                            if matches!(
                                err.kind(),
                                ErrorKind::Interrupted | ErrorKind::TimedOut | ErrorKind::WouldBlock
                            ) => {}
                        Err(err) => {
                            error!(error = %err, "rx reader failed");
                            break;
                        }
                    }
                }
                debug!("rx pump finished");
            })
    }
}

/// Consumer half of the RX queue, owned by the dispatch thread.
pub struct RxConsumer {
    rx: Receiver<u8>,
}

impl RxConsumer {
    /// Block until a byte arrives.
    pub fn recv(&self) -> Result<u8> {
        self.rx.recv().map_err(|_| InterfaceError::Closed)
    }

    /// Wait at most `timeout` for the next byte.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<u8> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => InterfaceError::Timeout(timeout),
            RecvTimeoutError::Disconnected => InterfaceError::Closed,
        })
    }

    /// Discard everything queued. Returns the number of bytes dropped.
    pub fn purge(&self) -> usize {
        self.rx.try_iter().count()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Firmware interface over a byte stream.
pub struct StreamInterface<W> {
    name: String,
    rx: RxConsumer,
    tx: W,
    byte_timeout: Duration,
    limits: Limits,
    out: BytesMut,
}

impl<W: Write + Send> StreamInterface<W> {
    pub fn new(name: impl Into<String>, rx: RxConsumer, tx: W, config: &FirmwareConfig) -> Self {
        Self {
            name: name.into(),
            rx,
            tx,
            byte_timeout: config.byte_timeout,
            limits: config.limits,
            out: BytesMut::new(),
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.tx
    }

    fn read_exact(&self, buf: &mut [u8]) -> Result<()> {
        for slot in buf {
            *slot = self.rx.recv_timeout(self.byte_timeout)?;
        }
        Ok(())
    }
}

impl<W: Write + Send> Interface for StreamInterface<W> {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_request(&mut self) -> Result<Request> {
        let mut head = [0u8; REQ_HEADER_SIZE];
        // Idle links wait forever for the first byte.
        head[0] = self.rx.recv()?;
        self.read_exact(&mut head[1..])?;

        let header = RequestHeader::from_bytes(&head)?;
        if let Err(err) = validate_payload_len(header.payload_len(), self.limits.req_max_size) {
            let purged = self.rx.purge();
            warn!(
                interface = %self.name,
                len = header.payload_len(),
                purged,
                "request length out of range, queue purged"
            );
            return Err(err.into());
        }

        let mut payload = vec![0u8; header.payload_len()];
        self.read_exact(&mut payload)?;

        Ok(Request {
            periph_id: header.periph_id,
            periph_idx: header.periph_idx,
            periph_fn: header.periph_fn,
            payload: payload.into(),
        })
    }

    fn send_response(&mut self, response: &Response) -> Result<()> {
        let size = response.payload.len();
        if size > self.limits.resp_max_size {
            return Err(InterfaceError::ResponseTooLarge {
                size,
                max: self.limits.resp_max_size,
            });
        }
        self.out.clear();
        encode_response(response, &mut self.out)?;
        self.tx.write_all(&self.out)?;
        self.tx.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Instant;

    use buslink_wire::{DeviceError, WireError};

    use super::*;

    fn interface(capacity: usize) -> (RxProducer, StreamInterface<Vec<u8>>) {
        let (producer, consumer) = rx_queue(capacity);
        let config = FirmwareConfig::default();
        (
            producer,
            StreamInterface::new("uart0", consumer, Vec::new(), &config),
        )
    }

    fn request_bytes(id: u16, idx: u16, func: u16, payload: &[u8]) -> Vec<u8> {
        let mut bytes = RequestHeader::new(id, idx, func, payload.len() as u16)
            .to_bytes()
            .to_vec();
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn overflow_purges_queue_and_drops_rest_of_chunk() {
        let (producer, consumer) = rx_queue(4);
        assert_eq!(producer.push(&[1, 2, 3]), 3);
        assert_eq!(producer.push(&[4, 5, 6, 7]), 1);
        assert!(consumer.is_empty());

        assert_eq!(producer.push(&[8]), 1);
        assert_eq!(consumer.recv().unwrap(), 8);
    }

    #[test]
    fn closed_queue_reports_closed() {
        let (producer, consumer) = rx_queue(4);
        producer.push(&[1]);
        drop(producer);
        assert_eq!(consumer.recv().unwrap(), 1);
        assert!(matches!(consumer.recv(), Err(InterfaceError::Closed)));
    }

    #[test]
    fn parses_request_split_across_pushes() {
        let (producer, mut iface) = interface(520);
        let bytes = request_bytes(0, 0, 2, b"AB");
        producer.push(&bytes[..3]);
        producer.push(&bytes[3..]);

        let req = iface.get_request().unwrap();
        assert_eq!(req, Request::new(0, 0, 2, &b"AB"[..]));
    }

    #[test]
    fn byte_timeout_bounds_gaps_not_the_whole_request() {
        let config = FirmwareConfig {
            byte_timeout: Duration::from_millis(40),
            ..FirmwareConfig::default()
        };
        let (producer, consumer) = rx_queue(config.rx_queue_capacity);
        let mut iface = StreamInterface::new("uart0", consumer, Vec::new(), &config);

        let bytes = request_bytes(5, 0, 1, b"slow");
        let started = Instant::now();
        let feeder = thread::spawn(move || {
            for byte in bytes {
                producer.push(&[byte]);
                thread::sleep(Duration::from_millis(10));
            }
        });

        let req = iface.get_request().unwrap();
        let elapsed = started.elapsed();
        feeder.join().unwrap();

        assert_eq!(req, Request::new(5, 0, 1, &b"slow"[..]));
        assert!(elapsed > config.byte_timeout, "{elapsed:?}");
    }

    #[test]
    fn oversized_length_purges_then_resyncs() {
        let (producer, mut iface) = interface(520);
        let mut junk = RequestHeader::new(0, 0, 2, 513).to_bytes().to_vec();
        junk.extend_from_slice(&[0xEE; 20]);
        producer.push(&junk);

        let err = iface.get_request().unwrap_err();
        assert!(matches!(
            err,
            InterfaceError::Envelope(WireError::PayloadTooLarge { size: 513, .. })
        ));
        assert!(iface.rx.is_empty());

        producer.push(&request_bytes(0, 0, 2, b"ok"));
        let req = iface.get_request().unwrap();
        assert_eq!(req.payload.as_ref(), b"ok");
    }

    #[test]
    fn silence_mid_header_times_out() {
        let (producer, mut iface) = interface(520);
        producer.push(&[0, 0, 0]);
        let err = iface.get_request().unwrap_err();
        assert!(matches!(err, InterfaceError::Timeout(_)));
    }

    #[test]
    fn response_is_encoded_onto_writer() {
        let (_producer, mut iface) = interface(520);
        iface.send_response(&Response::ok(&b"AB"[..])).unwrap();
        iface
            .send_response(&Response::error(DeviceError::NotSupported))
            .unwrap();
        assert_eq!(
            iface.get_ref(),
            &vec![0, 0, 2, 0, b'A', b'B', 1, 0, 0, 0]
        );
    }

    #[test]
    fn oversized_response_is_not_sent() {
        let (_producer, mut iface) = interface(520);
        let err = iface
            .send_response(&Response::ok(vec![0u8; 513]))
            .unwrap_err();
        assert!(matches!(err, InterfaceError::ResponseTooLarge { size: 513, .. }));
        assert!(iface.get_ref().is_empty());
    }

    #[test]
    fn pump_feeds_queue_until_eof() {
        let (producer, consumer) = rx_queue(64);
        let handle = producer
            .pump(io::Cursor::new(request_bytes(0, 0, 2, b"Z")))
            .unwrap();
        handle.join().unwrap();

        let mut got = Vec::new();
        while let Ok(byte) = consumer.recv() {
            got.push(byte);
        }
        assert_eq!(got, request_bytes(0, 0, 2, b"Z"));
    }
}
