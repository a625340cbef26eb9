use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, WireError};
use crate::status::{self, DeviceError, NO_ERR};

/// Request header: id (2) + idx (2) + fn (2) + length (2) = 8 bytes.
pub const REQ_HEADER_SIZE: usize = 8;

/// Response header: retcode (2) + length (2) = 4 bytes.
pub const RESP_HEADER_SIZE: usize = 4;

/// Protocol-defined maximum request payload.
pub const MAX_REQ_PAYLOAD: usize = 512;

/// Protocol-defined maximum response payload.
pub const MAX_RESP_PAYLOAD: usize = 512;

/// Request header in host-native representation.
///
/// Wire format:
/// ```text
/// ┌───────────┬────────────┬───────────┬─────────────┬──────────────────┐
/// │ periph_id │ periph_idx │ periph_fn │ payload_len │ Payload          │
/// │ (2B LE)   │ (2B LE)    │ (2B LE)   │ (2B LE)     │ (payload_len B)  │
/// └───────────┴────────────┴───────────┴─────────────┴──────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub periph_id: u16,
    pub periph_idx: u16,
    pub periph_fn: u16,
    pub payload_len: u16,
}

impl RequestHeader {
    pub fn new(periph_id: u16, periph_idx: u16, periph_fn: u16, payload_len: u16) -> Self {
        Self {
            periph_id,
            periph_idx,
            periph_fn,
            payload_len,
        }
    }

    /// Convert to wire order.
    pub fn to_bytes(&self) -> [u8; REQ_HEADER_SIZE] {
        let mut out = [0u8; REQ_HEADER_SIZE];
        out[0..2].copy_from_slice(&self.periph_id.to_le_bytes());
        out[2..4].copy_from_slice(&self.periph_idx.to_le_bytes());
        out[4..6].copy_from_slice(&self.periph_fn.to_le_bytes());
        out[6..8].copy_from_slice(&self.payload_len.to_le_bytes());
        out
    }

    /// Convert from wire order. Only the first [`REQ_HEADER_SIZE`] bytes are read.
    pub fn from_bytes(src: &[u8]) -> Result<Self> {
        if src.len() < REQ_HEADER_SIZE {
            return Err(WireError::TruncatedHeader {
                len: src.len(),
                need: REQ_HEADER_SIZE,
            });
        }
        Ok(Self {
            periph_id: u16::from_le_bytes([src[0], src[1]]),
            periph_idx: u16::from_le_bytes([src[2], src[3]]),
            periph_fn: u16::from_le_bytes([src[4], src[5]]),
            payload_len: u16::from_le_bytes([src[6], src[7]]),
        })
    }

    pub fn payload_len(&self) -> usize {
        usize::from(self.payload_len)
    }

    /// Header plus payload, in bytes.
    pub fn message_len(&self) -> usize {
        REQ_HEADER_SIZE + self.payload_len()
    }
}

/// Response header in host-native representation.
///
/// Wire format:
/// ```text
/// ┌───────────┬─────────────┬──────────────────┐
/// │ retcode   │ payload_len │ Payload          │
/// │ (2B LE)   │ (2B LE)     │ (payload_len B)  │
/// └───────────┴─────────────┴──────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub retcode: i16,
    pub payload_len: u16,
}

impl ResponseHeader {
    pub fn new(retcode: i16, payload_len: u16) -> Self {
        Self {
            retcode,
            payload_len,
        }
    }

    pub fn to_bytes(&self) -> [u8; RESP_HEADER_SIZE] {
        let mut out = [0u8; RESP_HEADER_SIZE];
        out[0..2].copy_from_slice(&self.retcode.to_le_bytes());
        out[2..4].copy_from_slice(&self.payload_len.to_le_bytes());
        out
    }

    pub fn from_bytes(src: &[u8]) -> Result<Self> {
        if src.len() < RESP_HEADER_SIZE {
            return Err(WireError::TruncatedHeader {
                len: src.len(),
                need: RESP_HEADER_SIZE,
            });
        }
        Ok(Self {
            retcode: i16::from_le_bytes([src[0], src[1]]),
            payload_len: u16::from_le_bytes([src[2], src[3]]),
        })
    }

    pub fn payload_len(&self) -> usize {
        usize::from(self.payload_len)
    }

    pub fn message_len(&self) -> usize {
        RESP_HEADER_SIZE + self.payload_len()
    }
}

/// Reject a decoded `payload_len` larger than the receiving buffer allows.
pub fn validate_payload_len(len: usize, max: usize) -> Result<()> {
    if len > max {
        return Err(WireError::PayloadTooLarge { size: len, max });
    }
    Ok(())
}

fn wire_len(len: usize) -> Result<u16> {
    u16::try_from(len).map_err(|_| WireError::PayloadTooLarge {
        size: len,
        max: usize::from(u16::MAX),
    })
}

/// A request addressed to one function of one peripheral instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub periph_id: u16,
    pub periph_idx: u16,
    pub periph_fn: u16,
    pub payload: Bytes,
}

impl Request {
    pub fn new(periph_id: u16, periph_idx: u16, periph_fn: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            periph_id,
            periph_idx,
            periph_fn,
            payload: payload.into(),
        }
    }

    /// Header describing this request.
    pub fn header(&self) -> Result<RequestHeader> {
        Ok(RequestHeader::new(
            self.periph_id,
            self.periph_idx,
            self.periph_fn,
            wire_len(self.payload.len())?,
        ))
    }

    /// Total wire size (header + payload).
    pub fn wire_size(&self) -> usize {
        REQ_HEADER_SIZE + self.payload.len()
    }
}

/// A response: raw status plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub retcode: i16,
    pub payload: Bytes,
}

impl Response {
    /// Successful response carrying `payload`.
    pub fn ok(payload: impl Into<Bytes>) -> Self {
        Self {
            retcode: NO_ERR,
            payload: payload.into(),
        }
    }

    /// Error response. Error responses never carry a payload.
    pub fn error(err: DeviceError) -> Self {
        Self {
            retcode: err.code(),
            payload: Bytes::new(),
        }
    }

    pub fn header(&self) -> Result<ResponseHeader> {
        Ok(ResponseHeader::new(
            self.retcode,
            wire_len(self.payload.len())?,
        ))
    }

    /// `Ok(())` when `retcode` is [`NO_ERR`].
    pub fn status(&self) -> std::result::Result<(), DeviceError> {
        status::check(self.retcode)
    }

    pub fn wire_size(&self) -> usize {
        RESP_HEADER_SIZE + self.payload.len()
    }
}

/// Encode a request into wire format.
pub fn encode_request(req: &Request, dst: &mut BytesMut) -> Result<()> {
    let header = req.header()?;
    dst.reserve(req.wire_size());
    dst.put_slice(&header.to_bytes());
    dst.put_slice(&req.payload);
    Ok(())
}

/// Decode one complete request message.
///
/// `src` must hold exactly one message: a header plus `payload_len` bytes.
pub fn decode_request(src: &[u8], max_payload: usize) -> Result<Request> {
    let header = RequestHeader::from_bytes(src)?;
    validate_payload_len(header.payload_len(), max_payload)?;
    if src.len() != header.message_len() {
        return Err(WireError::LengthMismatch {
            expected: header.message_len(),
            actual: src.len(),
        });
    }
    Ok(Request {
        periph_id: header.periph_id,
        periph_idx: header.periph_idx,
        periph_fn: header.periph_fn,
        payload: Bytes::copy_from_slice(&src[REQ_HEADER_SIZE..]),
    })
}

/// Encode a response into wire format.
pub fn encode_response(resp: &Response, dst: &mut BytesMut) -> Result<()> {
    let header = resp.header()?;
    dst.reserve(resp.wire_size());
    dst.put_i16_le(header.retcode);
    dst.put_u16_le(header.payload_len);
    dst.put_slice(&resp.payload);
    Ok(())
}

/// Decode one complete response message.
pub fn decode_response(src: &[u8], max_payload: usize) -> Result<Response> {
    let header = ResponseHeader::from_bytes(src)?;
    validate_payload_len(header.payload_len(), max_payload)?;
    if src.len() != header.message_len() {
        return Err(WireError::LengthMismatch {
            expected: header.message_len(),
            actual: src.len(),
        });
    }
    Ok(Response {
        retcode: header.retcode,
        payload: Bytes::copy_from_slice(&src[RESP_HEADER_SIZE..]),
    })
}

/// Per-device payload limits.
///
/// Devices may advertise larger limits than the protocol defaults, never smaller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub req_max_size: usize,
    pub resp_max_size: usize,
}

impl Limits {
    pub fn new(req_max_size: usize, resp_max_size: usize) -> Self {
        Self {
            req_max_size,
            resp_max_size,
        }
    }

    /// Whether both limits are at least the protocol defaults.
    pub fn meets_defaults(&self) -> bool {
        self.req_max_size >= MAX_REQ_PAYLOAD && self.resp_max_size >= MAX_RESP_PAYLOAD
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            req_max_size: MAX_REQ_PAYLOAD,
            resp_max_size: MAX_RESP_PAYLOAD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_header_is_little_endian() {
        let header = RequestHeader::new(0x0102, 0x0304, 0x0506, 0x0708);
        assert_eq!(
            header.to_bytes(),
            [0x02, 0x01, 0x04, 0x03, 0x06, 0x05, 0x08, 0x07]
        );
    }

    #[test]
    fn response_header_carries_negative_retcode() {
        let header = ResponseHeader::new(-2, 3);
        let bytes = header.to_bytes();
        assert_eq!(bytes, [0xFE, 0xFF, 0x03, 0x00]);
        assert_eq!(ResponseHeader::from_bytes(&bytes).unwrap(), header);
    }

    #[test]
    fn encode_request_layout() {
        let req = Request::new(0, 0, 2, vec![0x41, 0x42]);
        let mut buf = BytesMut::new();
        encode_request(&req, &mut buf).unwrap();

        assert_eq!(buf.len(), REQ_HEADER_SIZE + 2);
        assert_eq!(&buf[..], &[0, 0, 0, 0, 2, 0, 2, 0, 0x41, 0x42]);
        assert_eq!(decode_request(&buf, MAX_REQ_PAYLOAD).unwrap(), req);
    }

    #[test]
    fn decode_truncated_header() {
        let err = decode_request(&[0x00, 0x01, 0x02], MAX_REQ_PAYLOAD).unwrap_err();
        assert_eq!(err, WireError::TruncatedHeader { len: 3, need: 8 });

        let err = decode_response(&[0x00], MAX_RESP_PAYLOAD).unwrap_err();
        assert_eq!(err, WireError::TruncatedHeader { len: 1, need: 4 });
    }

    #[test]
    fn decode_rejects_oversized_length_before_reading_payload() {
        let header = RequestHeader::new(0, 0, 0, (MAX_REQ_PAYLOAD + 1) as u16);
        let err = decode_request(&header.to_bytes(), MAX_REQ_PAYLOAD).unwrap_err();
        assert!(matches!(err, WireError::PayloadTooLarge { size: 513, max: 512 }));
    }

    #[test]
    fn decode_rejects_short_and_long_messages() {
        let mut buf = BytesMut::new();
        encode_response(&Response::ok(vec![1, 2, 3]), &mut buf).unwrap();

        let err = decode_response(&buf[..buf.len() - 1], MAX_RESP_PAYLOAD).unwrap_err();
        assert_eq!(
            err,
            WireError::LengthMismatch {
                expected: 7,
                actual: 6
            }
        );

        buf.put_u8(0xEE);
        let err = decode_response(&buf, MAX_RESP_PAYLOAD).unwrap_err();
        assert!(matches!(err, WireError::LengthMismatch { expected: 7, actual: 8 }));
    }

    #[test]
    fn error_response_has_no_payload() {
        let resp = Response::error(DeviceError::Busy);
        assert_eq!(resp.retcode, 6);
        assert!(resp.payload.is_empty());
        assert_eq!(resp.status(), Err(DeviceError::Busy));
    }

    #[test]
    fn encode_rejects_payload_beyond_u16() {
        let req = Request::new(0, 0, 0, vec![0u8; usize::from(u16::MAX) + 1]);
        let mut buf = BytesMut::new();
        let err = encode_request(&req, &mut buf).unwrap_err();
        assert!(matches!(err, WireError::PayloadTooLarge { .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn default_limits_meet_defaults() {
        assert!(Limits::default().meets_defaults());
        assert!(Limits::new(1024, 512).meets_defaults());
        assert!(!Limits::new(511, 512).meets_defaults());
        assert!(!Limits::new(512, 64).meets_defaults());
    }
}
