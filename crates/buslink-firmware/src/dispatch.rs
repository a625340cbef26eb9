use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use buslink_wire::{DeviceError, Limits, Request, Response};
use tracing::{debug, error, trace};

use crate::locks::LockTable;
use crate::registry::Registry;

/// Validates requests and runs their handlers under the device lock.
///
/// Shared by every interface thread.
pub struct Dispatcher {
    registry: Arc<Registry>,
    locks: LockTable,
    limits: Limits,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        let locks = LockTable::build(&registry);
        let limits = registry.limits();
        Self {
            registry,
            locks,
            limits,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn locks(&self) -> &LockTable {
        &self.locks
    }

    /// Produce the response for one request.
    ///
    /// Unknown class, instance or function yields `NotSupported` without
    /// touching any handler. A failing handler yields its error with an
    /// empty payload.
    pub fn dispatch(&self, req: &Request) -> Response {
        let Some(periph) = self.registry.get(req.periph_id) else {
            debug!(periph_id = req.periph_id, "unknown peripheral class");
            return Response::error(DeviceError::NotSupported);
        };
        if req.periph_idx >= periph.instance_count() {
            debug!(
                periph = periph.name(),
                periph_idx = req.periph_idx,
                "instance out of range"
            );
            return Response::error(DeviceError::NotSupported);
        }
        let Some(handler) = periph.functions().get(usize::from(req.periph_fn)) else {
            debug!(
                periph = periph.name(),
                periph_fn = req.periph_fn,
                "unknown function"
            );
            return Response::error(DeviceError::NotSupported);
        };

        let mut out = Vec::new();
        let result = {
            let Some(_guard) = self.locks.lock(req.periph_id, req.periph_idx) else {
                return Response::error(DeviceError::NotSupported);
            };
            panic::catch_unwind(AssertUnwindSafe(|| {
                handler(req.periph_idx, &req.payload[..], &mut out)
            }))
        };

        match result {
            Ok(Ok(())) if out.len() > self.limits.resp_max_size => {
                error!(
                    periph = periph.name(),
                    periph_fn = req.periph_fn,
                    len = out.len(),
                    max = self.limits.resp_max_size,
                    "handler response exceeds maximum"
                );
                Response::error(DeviceError::Peripheral)
            }
            Ok(Ok(())) => {
                trace!(
                    periph = periph.name(),
                    periph_idx = req.periph_idx,
                    periph_fn = req.periph_fn,
                    len = out.len(),
                    "handled"
                );
                Response::ok(out)
            }
            Ok(Err(err)) => {
                debug!(
                    periph = periph.name(),
                    periph_idx = req.periph_idx,
                    periph_fn = req.periph_fn,
                    error = %err,
                    "handler failed"
                );
                Response::error(err)
            }
            Err(_) => {
                error!(
                    periph = periph.name(),
                    periph_idx = req.periph_idx,
                    periph_fn = req.periph_fn,
                    "handler panicked"
                );
                Response::error(DeviceError::Peripheral)
            }
        }
    }
}
