//! Unit tests for the coredump frame codec.
//!
//! Covers header decoding, incomplete-input reporting, malformed tags,
//! payload limits, the zero-copy `Decoder` path and EOF classification.

use bytes::BytesMut;
use rstest::{fixture, rstest};

use super::*;

fn device() -> DeviceId { DeviceId::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]) }

fn version() -> FirmwareVersion { "v2.1.2".parse().expect("version fits") }

#[fixture]
fn codec() -> DumpFrameCodec { DumpFrameCodec::default() }

fn encode(codec: &DumpFrameCodec, frames: &[Frame]) -> BytesMut {
    let mut buf = BytesMut::new();
    for frame in frames {
        codec.encode_frame(frame, &mut buf).expect("encode frame");
    }
    buf
}

fn raw_header(kind: u8, length: u32) -> Vec<u8> {
    let mut header = vec![0u8; HEADER_LEN];
    header[..6].copy_from_slice(device().as_bytes());
    header[6..12].copy_from_slice(b"v2.1.2");
    header[26] = kind;
    header[28..32].copy_from_slice(&length.to_le_bytes());
    header
}

#[rstest]
fn encodes_documented_wire_layout(codec: DumpFrameCodec) {
    let buf = encode(&codec, &[Frame::transferring(device(), version(), &b"DEAD"[..])]);

    let mut expected = raw_header(1, 4);
    expected.extend_from_slice(b"DEAD");
    assert_eq!(&buf[..], expected.as_slice());
}

#[rstest]
fn start_frame_keeps_announced_size_without_payload(codec: DumpFrameCodec) {
    let buf = encode(&codec, &[Frame::start(device(), version(), 65_536)]);
    assert_eq!(buf.len(), HEADER_LEN);

    let Decoded::Complete { frame, consumed } = codec.decode_frame(&buf).expect("decode start")
    else {
        panic!("expected a complete start frame");
    };
    assert_eq!(consumed, HEADER_LEN);
    assert_eq!(frame.kind(), FrameKind::Start);
    assert_eq!(frame.header().length, 65_536);
    assert!(frame.payload().is_empty());
}

#[rstest]
#[case::empty(0)]
#[case::one_byte(1)]
#[case::almost_header(HEADER_LEN - 1)]
fn short_header_is_incomplete(codec: DumpFrameCodec, #[case] len: usize) {
    let buf = vec![0u8; len];
    assert_eq!(
        codec.decode_frame(&buf).expect("short input is not an error"),
        Decoded::Incomplete {
            have: len,
            need: HEADER_LEN
        }
    );
}

#[rstest]
fn partial_payload_is_incomplete_and_not_consumed(mut codec: DumpFrameCodec) {
    let mut wire = raw_header(1, 8);
    wire.extend_from_slice(b"DEAD");

    assert_eq!(
        codec.decode_frame(&wire).expect("partial payload is not an error"),
        Decoded::Incomplete {
            have: HEADER_LEN + 4,
            need: HEADER_LEN + 8
        }
    );

    let mut buf = BytesMut::from(wire.as_slice());
    assert!(
        Decoder::decode(&mut codec, &mut buf)
            .expect("partial payload is not an error")
            .is_none()
    );
    assert_eq!(buf.len(), HEADER_LEN + 4, "header must stay buffered");

    buf.extend_from_slice(b"BEEF");
    let frame = Decoder::decode(&mut codec, &mut buf)
        .expect("decode once complete")
        .expect("frame available");
    assert_eq!(frame.payload(), b"DEADBEEF");
    assert!(buf.is_empty());
}

#[rstest]
#[case::three(3)]
#[case::high(0x80)]
#[case::max(0xff)]
fn unknown_kind_is_a_framing_error(codec: DumpFrameCodec, #[case] kind: u8) {
    let err = codec
        .decode_frame(&raw_header(kind, 0))
        .expect_err("unknown tag must fail");
    assert!(matches!(
        err,
        CodecError::Framing(FramingError::UnknownFrameKind { kind: k }) if k == kind
    ));
}

#[test]
fn oversized_transfer_is_rejected_before_payload_arrives() {
    let codec = DumpFrameCodec::new(16);
    let err = codec
        .decode_frame(&raw_header(1, 17))
        .expect_err("oversized payload must fail");
    assert!(matches!(
        err,
        CodecError::Framing(FramingError::OversizedPayload { size: 17, max: 16 })
    ));
}

#[test]
fn start_length_is_not_subject_to_payload_limit() {
    let codec = DumpFrameCodec::new(16);
    let header = codec
        .decode_header(&raw_header(0, u32::MAX))
        .expect("start frames carry no payload")
        .expect("header complete");
    assert_eq!(header.payload_len(), 0);
}

#[rstest]
fn decoder_splits_coalesced_frames(mut codec: DumpFrameCodec) {
    let mut buf = encode(
        &codec,
        &[
            Frame::start(device(), version(), 8),
            Frame::transferring(device(), version(), &b"DEAD"[..]),
            Frame::transferring(device(), version(), &b"BEEF"[..]),
            Frame::end(device(), version()),
        ],
    );

    let mut kinds = Vec::new();
    let mut payload = Vec::new();
    while let Some(frame) = Decoder::decode(&mut codec, &mut buf).expect("decode frame") {
        kinds.push(frame.kind());
        payload.extend_from_slice(frame.payload());
    }

    assert_eq!(
        kinds,
        [
            FrameKind::Start,
            FrameKind::Transferring,
            FrameKind::Transferring,
            FrameKind::End
        ]
    );
    assert_eq!(payload, b"DEADBEEF");
    assert!(buf.is_empty());
}

#[rstest]
fn decode_eof_on_empty_buffer_is_clean(mut codec: DumpFrameCodec) {
    let mut buf = BytesMut::new();
    assert!(matches!(codec.decode_eof(&mut buf), Ok(None)));
}

#[rstest]
fn decode_eof_mid_header_reports_progress(mut codec: DumpFrameCodec) {
    let mut buf = BytesMut::from(&raw_header(1, 4)[..10]);
    let err = codec.decode_eof(&mut buf).expect_err("truncated header");
    assert!(matches!(
        err,
        CodecError::Eof(EofError::MidHeader {
            bytes_received: 10,
            header_size: HEADER_LEN
        })
    ));
}

#[rstest]
fn decode_eof_mid_payload_reports_progress(mut codec: DumpFrameCodec) {
    let mut wire = raw_header(1, 8);
    wire.extend_from_slice(b"DE");
    let mut buf = BytesMut::from(wire.as_slice());
    let err = codec.decode_eof(&mut buf).expect_err("truncated payload");
    assert!(matches!(
        err,
        CodecError::Eof(EofError::MidFrame {
            bytes_received: 2,
            expected: 8
        })
    ));
}

#[test]
fn encoder_rejects_payload_above_limit() {
    let codec = DumpFrameCodec::new(2);
    let mut buf = BytesMut::new();
    let err = codec
        .encode_frame(
            &Frame::transferring(device(), version(), &b"DEAD"[..]),
            &mut buf,
        )
        .expect_err("payload too large");
    assert!(matches!(
        err,
        CodecError::Framing(FramingError::OversizedPayload { size: 4, max: 2 })
    ));
    assert!(buf.is_empty());
}
