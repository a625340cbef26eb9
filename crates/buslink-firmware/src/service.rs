use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::dispatch::Dispatcher;
use crate::error::{BootError, InterfaceError, Result};
use crate::interface::Interface;
use crate::registry::Registry;

/// Consecutive receive I/O errors after which the loop gives up.
pub const MAX_IO_ERRORS: u32 = 8;

/// Pause after each receive I/O error, scaled by how many came in a row.
const IO_BACKOFF: Duration = Duration::from_millis(10);

/// A booted firmware: registry initialised, lock table built.
pub struct Firmware {
    dispatcher: Arc<Dispatcher>,
}

impl Firmware {
    /// Initialise every peripheral instance and build the lock table.
    ///
    /// The first instance that fails to initialise aborts boot.
    pub fn boot(registry: Registry) -> std::result::Result<Self, BootError> {
        for (_, periph) in registry.iter() {
            for idx in 0..periph.instance_count() {
                periph
                    .init(idx)
                    .map_err(|source| BootError::PeripheralInit {
                        name: periph.name().to_string(),
                        idx,
                        source,
                    })?;
            }
        }

        let dispatcher = Dispatcher::new(Arc::new(registry));
        info!(
            classes = dispatcher.registry().len(),
            locks = dispatcher.locks().len(),
            "firmware booted"
        );
        Ok(Self {
            dispatcher: Arc::new(dispatcher),
        })
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Serve `interface` on a dedicated thread.
    ///
    /// The thread ends when the interface closes or fails to initialise.
    pub fn spawn<I>(&self, interface: I) -> io::Result<JoinHandle<Result<()>>>
    where
        I: Interface + 'static,
    {
        let dispatcher = Arc::clone(&self.dispatcher);
        thread::Builder::new()
            .name(format!("buslink-{}", interface.name()))
            .spawn(move || serve(&dispatcher, interface))
    }
}

/// Run the dispatch loop on the current thread.
pub fn serve<I: Interface>(dispatcher: &Dispatcher, mut interface: I) -> Result<()> {
    if let Err(err) = interface.init() {
        error!(interface = interface.name(), error = %err, "interface init failed");
        return Err(err);
    }
    debug!(interface = interface.name(), "serving");

    let mut io_errors = 0u32;
    loop {
        let request = match interface.get_request() {
            Ok(request) => {
                io_errors = 0;
                request
            }
            Err(InterfaceError::Closed) => break,
            Err(InterfaceError::Io(err)) => {
                io_errors += 1;
                if io_errors >= MAX_IO_ERRORS {
                    error!(
                        interface = interface.name(),
                        error = %err,
                        attempts = io_errors,
                        "receive keeps failing, stopping"
                    );
                    return Err(InterfaceError::Io(err));
                }
                warn!(
                    interface = interface.name(),
                    error = %err,
                    attempts = io_errors,
                    "receive failed"
                );
                thread::sleep(IO_BACKOFF * io_errors);
                continue;
            }
            Err(err) if err.is_recoverable() => {
                warn!(interface = interface.name(), error = %err, "dropping request");
                continue;
            }
            Err(err) => return Err(err),
        };

        let response = dispatcher.dispatch(&request);

        match interface.send_response(&response) {
            Ok(()) => {}
            Err(InterfaceError::Closed) => break,
            Err(err) if err.is_recoverable() => {
                error!(interface = interface.name(), error = %err, "response not sent");
            }
            Err(err) => return Err(err),
        }
    }

    info!(interface = interface.name(), "interface closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use buslink_wire::{DeviceError, PeriphId, Request, Response, WireError};

    use super::*;
    use crate::registry::PeripheralBuilder;

    /// Replays scripted receive results, records responses.
    struct Scripted {
        incoming: VecDeque<Result<Request>>,
        sent: Vec<Response>,
    }

    impl Interface for &mut Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn get_request(&mut self) -> Result<Request> {
            self.incoming.pop_front().unwrap_or(Err(InterfaceError::Closed))
        }

        fn send_response(&mut self, response: &Response) -> Result<()> {
            self.sent.push(response.clone());
            Ok(())
        }
    }

    fn firmware() -> Firmware {
        Firmware::boot(Registry::builder("sn").build().unwrap()).unwrap()
    }

    #[test]
    fn boot_aborts_on_init_failure() {
        let can = PeripheralBuilder::new("can", 2)
            .on_init(|idx| {
                if idx == 1 {
                    Err(DeviceError::Peripheral)
                } else {
                    Ok(())
                }
            })
            .build();
        let registry = Registry::builder("sn")
            .peripheral(PeriphId::Can, can)
            .build()
            .unwrap();

        let err = Firmware::boot(registry).err().unwrap();
        assert!(matches!(
            err,
            BootError::PeripheralInit { ref name, idx: 1, source: DeviceError::Peripheral }
                if name == "can"
        ));
    }

    #[test]
    fn loop_survives_bad_input_and_stops_on_close() {
        let fw = firmware();
        let mut script = Scripted {
            incoming: VecDeque::from([
                Err(InterfaceError::Timeout(Duration::from_millis(10))),
                Err(InterfaceError::Envelope(WireError::PayloadTooLarge {
                    size: 600,
                    max: 512,
                })),
                Ok(Request::new(0, 0, 2, &b"AB"[..])),
                Ok(Request::new(99, 0, 0, &b""[..])),
            ]),
            sent: Vec::new(),
        };

        serve(fw.dispatcher(), &mut script).unwrap();

        assert_eq!(script.sent.len(), 2);
        assert_eq!(script.sent[0], Response::ok(&b"AB"[..]));
        assert_eq!(script.sent[1], Response::error(DeviceError::NotSupported));
    }

    fn io_error() -> Result<Request> {
        Err(InterfaceError::Io(io::Error::other("framing error")))
    }

    #[test]
    fn isolated_io_errors_are_survived() {
        let fw = firmware();
        let mut incoming: VecDeque<_> = (0..MAX_IO_ERRORS - 1).map(|_| io_error()).collect();
        incoming.push_back(Ok(Request::new(0, 0, 2, &b"A"[..])));
        incoming.extend((0..MAX_IO_ERRORS - 1).map(|_| io_error()));
        incoming.push_back(Ok(Request::new(0, 0, 2, &b"B"[..])));
        let mut script = Scripted {
            incoming,
            sent: Vec::new(),
        };

        serve(fw.dispatcher(), &mut script).unwrap();

        assert_eq!(script.sent.len(), 2);
        assert_eq!(script.sent[1], Response::ok(&b"B"[..]));
    }

    #[test]
    fn persistent_io_errors_stop_the_loop() {
        let fw = firmware();
        let mut incoming: VecDeque<_> = (0..MAX_IO_ERRORS).map(|_| io_error()).collect();
        incoming.push_back(Ok(Request::new(0, 0, 2, &b"never"[..])));
        let mut script = Scripted {
            incoming,
            sent: Vec::new(),
        };

        let err = serve(fw.dispatcher(), &mut script).unwrap_err();
        assert!(matches!(err, InterfaceError::Io(_)));
        assert!(script.sent.is_empty());
        assert_eq!(script.incoming.len(), 1);
    }

    #[test]
    fn spawned_thread_ends_when_interface_closes() {
        struct Closed;

        impl Interface for Closed {
            fn name(&self) -> &str {
                "closed"
            }

            fn get_request(&mut self) -> Result<Request> {
                Err(InterfaceError::Closed)
            }

            fn send_response(&mut self, _response: &Response) -> Result<()> {
                Ok(())
            }
        }

        let handle = firmware().spawn(Closed).unwrap();
        assert_eq!(handle.thread().name(), Some("buslink-closed"));
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn init_failure_ends_the_loop() {
        struct Broken;

        impl Interface for Broken {
            fn name(&self) -> &str {
                "broken"
            }

            fn init(&mut self) -> Result<()> {
                Err(InterfaceError::Init("no clock".to_string()))
            }

            fn get_request(&mut self) -> Result<Request> {
                unreachable!("never initialised")
            }

            fn send_response(&mut self, _response: &Response) -> Result<()> {
                Ok(())
            }
        }

        let err = serve(firmware().dispatcher(), Broken).unwrap_err();
        assert!(matches!(err, InterfaceError::Init(_)));
    }
}
