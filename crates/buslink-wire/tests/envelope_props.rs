//! Property tests for the envelope: header round-trips and length validation.

use buslink_wire::{
    decode_request, decode_response, encode_request, encode_response, validate_payload_len,
    Request, RequestHeader, Response, ResponseHeader, WireError, MAX_REQ_PAYLOAD,
    MAX_RESP_PAYLOAD,
};
use bytes::BytesMut;
use proptest::prelude::*;

proptest! {
    /// Every in-range request survives encode/decode unchanged.
    #[test]
    fn request_round_trip(
        id in any::<u16>(),
        idx in any::<u16>(),
        func in any::<u16>(),
        payload in proptest::collection::vec(any::<u8>(), 0..=MAX_REQ_PAYLOAD),
    ) {
        let req = Request::new(id, idx, func, payload);
        let mut wire = BytesMut::new();
        encode_request(&req, &mut wire).unwrap();

        prop_assert_eq!(wire.len(), req.wire_size());
        let decoded = decode_request(&wire, MAX_REQ_PAYLOAD).unwrap();
        prop_assert_eq!(decoded, req);
    }

    #[test]
    fn response_round_trip(
        retcode in any::<i16>(),
        payload in proptest::collection::vec(any::<u8>(), 0..=MAX_RESP_PAYLOAD),
    ) {
        let resp = Response { retcode, payload: payload.into() };
        let mut wire = BytesMut::new();
        encode_response(&resp, &mut wire).unwrap();

        let decoded = decode_response(&wire, MAX_RESP_PAYLOAD).unwrap();
        prop_assert_eq!(decoded, resp);
    }

    #[test]
    fn header_round_trip(id in any::<u16>(), idx in any::<u16>(), func in any::<u16>(), len in 0u16..=512) {
        let header = RequestHeader::new(id, idx, func, len);
        prop_assert_eq!(RequestHeader::from_bytes(&header.to_bytes()).unwrap(), header);

        let resp = ResponseHeader::new(id as i16, len);
        prop_assert_eq!(ResponseHeader::from_bytes(&resp.to_bytes()).unwrap(), resp);
    }

    /// A declared length above the buffer maximum is always an error, never a truncation.
    #[test]
    fn oversized_length_always_rejected(len in (MAX_REQ_PAYLOAD as u16 + 1)..=u16::MAX, max in 0usize..=MAX_REQ_PAYLOAD) {
        let header = RequestHeader::new(0, 0, 0, len);
        let mut wire = header.to_bytes().to_vec();
        wire.resize(header.message_len(), 0);

        let err = decode_request(&wire, max).unwrap_err();
        prop_assert_eq!(err, WireError::PayloadTooLarge { size: usize::from(len), max });
        prop_assert!(validate_payload_len(usize::from(len), max).is_err());
    }
}
