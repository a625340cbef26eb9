//! Wire envelope for the buslink peripheral protocol.
//!
//! Every exchange is one request followed by one response:
//! - Request: `periph_id`, `periph_idx`, `periph_fn`, `payload_len` (all `u16` LE)
//!   followed by at most [`MAX_REQ_PAYLOAD`] payload bytes
//! - Response: `retcode` (`i16` LE), `payload_len` (`u16` LE) followed by at most
//!   [`MAX_RESP_PAYLOAD`] payload bytes
//!
//! Payload bytes are opaque here. Both sides share these definitions so the
//! layouts cannot drift.

pub mod envelope;
pub mod error;
pub mod ids;
pub mod status;

pub use envelope::{
    decode_request, decode_response, encode_request, encode_response, validate_payload_len,
    Limits, Request, RequestHeader, Response, ResponseHeader, MAX_REQ_PAYLOAD, MAX_RESP_PAYLOAD,
    REQ_HEADER_SIZE, RESP_HEADER_SIZE,
};
pub use error::{Result, WireError};
pub use ids::{metadata, PeriphId, NUM_PERIPHERALS};
pub use status::{DeviceError, NO_ERR};
