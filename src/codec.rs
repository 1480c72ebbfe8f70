//! Frame codec for the coredump wire format.
//!
//! [`DumpFrameCodec`] splits a raw byte stream into [`Frame`]s. Decoding is
//! stateless: each call inspects the front of the supplied buffer and either
//! reports how many more bytes are needed, yields one complete frame together
//! with the number of bytes it occupied, or fails with a [`CodecError`].
//!
//! A header whose payload has not fully arrived is never consumed, so callers
//! can retry from the same buffer position once more bytes are available.
//!
//! The codec also implements `tokio_util`'s [`Decoder`] and [`Encoder`] so it
//! can drive `FramedRead`/`FramedWrite` directly.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::{
    byte_order::{read_le_u32, write_le_u32},
    frame::{
        DEVICE_ID_LEN,
        DEVICE_ID_OFFSET,
        DeviceId,
        FirmwareVersion,
        Frame,
        FrameHeader,
        FrameKind,
        HEADER_LEN,
        KIND_OFFSET,
        LENGTH_OFFSET,
        VERSION_FIELD_LEN,
        VERSION_OFFSET,
    },
};

pub mod error;

pub use error::{CodecError, EofError, FramingError};

/// Default upper bound on a single transfer payload (16 MiB).
///
/// Devices send dumps in small chunks; a larger length field almost certainly
/// means the stream has lost frame alignment.
pub const DEFAULT_MAX_PAYLOAD_LEN: usize = 16 * 1024 * 1024;

/// Outcome of a single decode attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decoded {
    /// The buffer does not yet hold a complete frame.
    Incomplete {
        /// Bytes currently available.
        have: usize,
        /// Bytes required before the frame can be decoded.
        need: usize,
    },
    /// A complete frame sits at the front of the buffer.
    Complete {
        /// The decoded frame.
        frame: Frame,
        /// Bytes the frame occupies, header included.
        consumed: usize,
    },
}

/// Codec for fixed-header coredump frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DumpFrameCodec {
    max_payload_len: usize,
}

impl DumpFrameCodec {
    /// Construct a codec rejecting transfer payloads above `max_payload_len`.
    #[must_use]
    pub fn new(max_payload_len: usize) -> Self { Self { max_payload_len } }

    /// Return the maximum payload length accepted by this codec.
    #[must_use]
    pub fn max_payload_len(&self) -> usize { self.max_payload_len }

    /// Decode the fixed header at the front of `buf`.
    ///
    /// Returns `Ok(None)` while fewer than [`HEADER_LEN`] bytes are available.
    /// The payload is not inspected.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::UnknownFrameKind`] for an unrecognised tag and
    /// [`FramingError::OversizedPayload`] when a transfer frame announces more
    /// than [`max_payload_len`](Self::max_payload_len) bytes.
    pub fn decode_header(&self, buf: &[u8]) -> Result<Option<FrameHeader>, CodecError> {
        let Some(header) = buf.get(..HEADER_LEN) else {
            return Ok(None);
        };

        let mut device = [0u8; DEVICE_ID_LEN];
        device.copy_from_slice(&header[DEVICE_ID_OFFSET..VERSION_OFFSET]);
        let mut version = [0u8; VERSION_FIELD_LEN];
        version.copy_from_slice(&header[VERSION_OFFSET..KIND_OFFSET]);
        let raw_kind = header[KIND_OFFSET];
        let mut length = [0u8; 4];
        length.copy_from_slice(&header[LENGTH_OFFSET..HEADER_LEN]);

        let kind = FrameKind::try_from(raw_kind)
            .map_err(|_| FramingError::UnknownFrameKind { kind: raw_kind })?;
        let header = FrameHeader {
            device_id: DeviceId::new(device),
            firmware_version: FirmwareVersion::from_raw(version),
            kind,
            length: read_le_u32(length),
        };
        if header.payload_len() > self.max_payload_len {
            return Err(FramingError::OversizedPayload {
                size: header.payload_len(),
                max: self.max_payload_len,
            }
            .into());
        }
        Ok(Some(header))
    }

    /// Attempt to decode one frame from the front of `buf`.
    ///
    /// The payload is copied out of `buf`; use the [`Decoder`] implementation
    /// to split frames out of a [`BytesMut`] without copying.
    ///
    /// # Errors
    ///
    /// See [`decode_header`](Self::decode_header).
    ///
    /// # Examples
    ///
    /// ```
    /// use coredump_recv::codec::{Decoded, DumpFrameCodec};
    ///
    /// let codec = DumpFrameCodec::default();
    /// let decoded = codec.decode_frame(&[0u8; 10]).expect("short input is not an error");
    /// assert_eq!(decoded, Decoded::Incomplete { have: 10, need: 32 });
    /// ```
    pub fn decode_frame(&self, buf: &[u8]) -> Result<Decoded, CodecError> {
        let Some(header) = self.decode_header(buf)? else {
            return Ok(Decoded::Incomplete {
                have: buf.len(),
                need: HEADER_LEN,
            });
        };
        let consumed = header.frame_len();
        match buf.get(HEADER_LEN..consumed) {
            Some(payload) => Ok(Decoded::Complete {
                frame: Frame::new(header, Bytes::copy_from_slice(payload)),
                consumed,
            }),
            None => Ok(Decoded::Incomplete {
                have: buf.len(),
                need: consumed,
            }),
        }
    }

    /// Describe why `buf` cannot be decoded once the stream has ended.
    ///
    /// Returns `None` for an empty buffer, which marks a clean close at a frame
    /// boundary. Headers are not validated here.
    #[must_use]
    pub fn eof_error(&self, buf: &[u8]) -> Option<EofError> {
        if buf.is_empty() {
            return None;
        }
        match self.decode_header(buf) {
            Ok(Some(header)) => Some(EofError::MidFrame {
                bytes_received: buf.len().saturating_sub(HEADER_LEN),
                expected: header.payload_len(),
            }),
            _ => Some(EofError::MidHeader {
                bytes_received: buf.len().min(HEADER_LEN),
                header_size: HEADER_LEN,
            }),
        }
    }

    /// Append the wire representation of `frame` to `dst`.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::OversizedPayload`] if a transfer payload exceeds
    /// the configured maximum or cannot be described by a `u32` length.
    pub fn encode_frame(&self, frame: &Frame, dst: &mut BytesMut) -> Result<(), CodecError> {
        let header = frame.header();
        let payload: &[u8] = match header.kind {
            FrameKind::Transferring => frame.payload(),
            FrameKind::Start | FrameKind::End => &[],
        };
        let length = match header.kind {
            FrameKind::Transferring => u32::try_from(payload.len())
                .ok()
                .filter(|_| payload.len() <= self.max_payload_len)
                .ok_or(FramingError::OversizedPayload {
                    size: payload.len(),
                    max: self.max_payload_len,
                })?,
            FrameKind::Start | FrameKind::End => header.length,
        };

        dst.reserve(HEADER_LEN + payload.len());
        dst.put_slice(header.device_id.as_bytes());
        dst.put_slice(header.firmware_version.as_raw());
        dst.put_u8(header.kind.into());
        dst.put_u8(0);
        dst.put_slice(&write_le_u32(length));
        dst.put_slice(payload);
        Ok(())
    }
}

impl Default for DumpFrameCodec {
    fn default() -> Self { Self::new(DEFAULT_MAX_PAYLOAD_LEN) }
}

impl Decoder for DumpFrameCodec {
    type Item = Frame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(header) = self.decode_header(src)? else {
            return Ok(None);
        };
        let frame_len = header.frame_len();
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        let mut bytes = src.split_to(frame_len);
        bytes.advance(HEADER_LEN);
        Ok(Some(Frame::new(header, bytes.freeze())))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = Decoder::decode(self, src)? {
            return Ok(Some(frame));
        }
        match self.eof_error(src) {
            None => Ok(None),
            Some(err) => Err(err.into()),
        }
    }
}

impl Encoder<Frame> for DumpFrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.encode_frame(&item, dst)
    }
}

#[cfg(test)]
mod tests;
