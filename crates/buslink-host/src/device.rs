use buslink_transport::{Transport, TransportKind};
use buslink_wire::{status, Limits, RequestHeader};
use bytes::Bytes;
use parking_lot::Mutex;
use tracing::trace;

use crate::error::{Error, Result};

/// Handle to one physical device over one transport.
///
/// The transport sits behind a mutex: concurrent callers block until the
/// current exchange finishes. Dropping the handle closes the link.
pub struct Device {
    link: Mutex<Box<dyn Transport>>,
}

impl Device {
    /// Wrap an opened transport. Limits start at the protocol defaults until
    /// negotiated.
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            link: Mutex::new(transport),
        }
    }

    /// Issue one request and return the response payload.
    ///
    /// Oversized requests fail locally without touching the link. A nonzero
    /// status becomes [`Error::Device`]. Nothing is retried.
    pub fn call(
        &self,
        periph_id: u16,
        periph_idx: u16,
        periph_fn: u16,
        payload: &[u8],
    ) -> Result<Bytes> {
        let mut link = self.link.lock();
        let limits = link.limits();

        let size = payload.len();
        if size > limits.req_max_size {
            return Err(Error::RequestTooLarge {
                size,
                max: limits.req_max_size,
            });
        }
        let payload_len = u16::try_from(size).map_err(|_| Error::RequestTooLarge {
            size,
            max: usize::from(u16::MAX),
        })?;

        let header = RequestHeader::new(periph_id, periph_idx, periph_fn, payload_len);
        let response = link.exchange(&header, payload)?;
        drop(link);

        if response.payload.len() > limits.resp_max_size {
            return Err(Error::ResponseTooLarge {
                size: response.payload.len(),
                max: limits.resp_max_size,
            });
        }
        trace!(
            periph_id,
            periph_idx,
            periph_fn,
            retcode = response.retcode,
            len = response.payload.len(),
            "call returned"
        );
        status::check(response.retcode)?;
        Ok(response.payload)
    }

    /// Currently applied payload limits.
    pub fn limits(&self) -> Limits {
        self.link.lock().limits()
    }

    pub(crate) fn set_limits(&self, limits: Limits) {
        self.link.lock().set_limits(limits);
    }

    /// Reset the physical device. No-op on links without a reset line.
    pub fn reset(&self) -> Result<()> {
        self.link.lock().reset()?;
        Ok(())
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.link.lock().kind()
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("transport", &self.transport_kind().name())
            .finish_non_exhaustive()
    }
}
