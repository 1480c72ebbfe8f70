//! Coredump frame model.
//!
//! Every frame starts with a fixed 32-byte header:
//!
//! | Offset | Size | Field                                   |
//! |--------|------|-----------------------------------------|
//! | 0      | 6    | device identifier (raw MAC bytes)       |
//! | 6      | 20   | firmware version (text, NUL padded)     |
//! | 26     | 1    | frame kind (0 start, 1 transfer, 2 end) |
//! | 27     | 1    | padding                                 |
//! | 28     | 4    | payload length (`u32`, little-endian)   |
//!
//! Only [`FrameKind::Transferring`] frames carry payload bytes, which follow
//! the header directly with no delimiter.

mod device;
mod kind;
mod version;

use bytes::Bytes;
pub use device::{DeviceId, ParseDeviceIdError};
pub use kind::{FrameKind, UnknownFrameKind};
pub use version::{FirmwareVersion, VersionTooLong};

/// Size of the fixed frame header in bytes.
pub const HEADER_LEN: usize = 32;
/// Width of the device identifier field.
pub const DEVICE_ID_LEN: usize = 6;
/// Width of the firmware version field.
pub const VERSION_FIELD_LEN: usize = 20;
/// Number of version characters used when naming dump outputs.
pub const VERSION_NAME_LEN: usize = 6;

pub(crate) const DEVICE_ID_OFFSET: usize = 0;
pub(crate) const VERSION_OFFSET: usize = DEVICE_ID_OFFSET + DEVICE_ID_LEN;
pub(crate) const KIND_OFFSET: usize = VERSION_OFFSET + VERSION_FIELD_LEN;
pub(crate) const PAD_OFFSET: usize = KIND_OFFSET + 1;
pub(crate) const LENGTH_OFFSET: usize = PAD_OFFSET + 1;

/// Decoded fixed-size frame header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    /// Hardware identifier of the sending device.
    pub device_id: DeviceId,
    /// Firmware version reported by the device.
    pub firmware_version: FirmwareVersion,
    /// Frame tag.
    pub kind: FrameKind,
    /// Raw length field.
    ///
    /// For transfer frames this is the payload size. Start frames use it to
    /// announce the total dump size; end frames leave it unused.
    pub length: u32,
}

impl FrameHeader {
    /// Number of payload bytes that follow this header on the wire.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        match self.kind {
            FrameKind::Transferring => self.length as usize,
            FrameKind::Start | FrameKind::End => 0,
        }
    }

    /// Total encoded size of the frame, header included.
    #[must_use]
    pub fn frame_len(&self) -> usize { HEADER_LEN + self.payload_len() }
}

/// A complete protocol unit: header plus any payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    header: FrameHeader,
    payload: Bytes,
}

impl Frame {
    /// Assemble a frame from a decoded header and its payload.
    ///
    /// Callers are responsible for supplying `header.payload_len()` bytes.
    #[must_use]
    pub fn new(header: FrameHeader, payload: Bytes) -> Self { Self { header, payload } }

    /// Build a start frame announcing a dump of `total_len` bytes.
    #[must_use]
    pub fn start(device_id: DeviceId, firmware_version: FirmwareVersion, total_len: u32) -> Self {
        Self::new(
            FrameHeader {
                device_id,
                firmware_version,
                kind: FrameKind::Start,
                length: total_len,
            },
            Bytes::new(),
        )
    }

    /// Build a transfer frame carrying `payload`.
    ///
    /// Payloads longer than `u32::MAX` are rejected by the encoder, so the
    /// length field saturates here rather than wrapping.
    #[must_use]
    pub fn transferring(
        device_id: DeviceId,
        firmware_version: FirmwareVersion,
        payload: impl Into<Bytes>,
    ) -> Self {
        let payload = payload.into();
        let length = u32::try_from(payload.len()).unwrap_or(u32::MAX);
        Self::new(
            FrameHeader {
                device_id,
                firmware_version,
                kind: FrameKind::Transferring,
                length,
            },
            payload,
        )
    }

    /// Build an end-of-dump frame.
    #[must_use]
    pub fn end(device_id: DeviceId, firmware_version: FirmwareVersion) -> Self {
        Self::new(
            FrameHeader {
                device_id,
                firmware_version,
                kind: FrameKind::End,
                length: 0,
            },
            Bytes::new(),
        )
    }

    /// Borrow the frame header.
    #[must_use]
    pub fn header(&self) -> &FrameHeader { &self.header }

    /// Frame tag shortcut.
    #[must_use]
    pub fn kind(&self) -> FrameKind { self.header.kind }

    /// Borrow the payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] { &self.payload }

    /// Split the frame into header and payload.
    #[must_use]
    pub fn into_parts(self) -> (FrameHeader, Bytes) { (self.header, self.payload) }
}
