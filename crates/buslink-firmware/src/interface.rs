use buslink_wire::{Request, Response};

use crate::error::Result;

/// One physical link the firmware serves requests on.
///
/// `get_request` blocks until a complete request arrives. Recoverable errors
/// (timeouts, malformed requests) are logged by the dispatch loop, which then
/// waits for the next request. [`InterfaceError::Closed`](crate::InterfaceError::Closed)
/// ends the loop.
pub trait Interface: Send {
    fn name(&self) -> &str;

    /// Bring the link up. Failure is fatal for this interface.
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    fn get_request(&mut self) -> Result<Request>;

    fn send_response(&mut self, response: &Response) -> Result<()>;
}
