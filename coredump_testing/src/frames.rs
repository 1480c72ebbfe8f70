//! Builders for wire-format dump streams.

use bytes::BytesMut;
use coredump_recv::{
    codec::DumpFrameCodec,
    frame::{DeviceId, FirmwareVersion, Frame},
};

/// Device id used by most tests: `aa:bb:cc:dd:ee:ff`.
#[must_use]
pub fn sample_device() -> DeviceId { DeviceId::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]) }

/// Firmware version used by most tests: `v2.1.2`.
#[must_use]
pub fn sample_version() -> FirmwareVersion {
    FirmwareVersion::from_raw(*b"v2.1.2\0\0\0\0\0\0\0\0\0\0\0\0\0\0")
}

/// Encode `frames` back to back with the default codec.
///
/// # Panics
///
/// Panics if a frame exceeds the codec's payload limit.
#[must_use]
pub fn encode_frames(frames: &[Frame]) -> Vec<u8> {
    let codec = DumpFrameCodec::default();
    let mut buf = BytesMut::new();
    for frame in frames {
        codec
            .encode_frame(frame, &mut buf)
            .expect("test frame within payload limit");
    }
    buf.to_vec()
}

/// Assembles the frames of one dump.
///
/// By default the start frame announces the sum of all chunk lengths and the
/// dump ends with an end frame.
#[derive(Clone, Debug)]
pub struct DumpBuilder {
    device: DeviceId,
    version: FirmwareVersion,
    announced: Option<u32>,
    chunks: Vec<Vec<u8>>,
    end: bool,
}

impl Default for DumpBuilder {
    fn default() -> Self { Self::new(sample_device(), sample_version()) }
}

impl DumpBuilder {
    /// Start a dump for `device` running `version`.
    #[must_use]
    pub fn new(device: DeviceId, version: FirmwareVersion) -> Self {
        Self {
            device,
            version,
            announced: None,
            chunks: Vec::new(),
            end: true,
        }
    }

    /// Override the total size announced by the start frame.
    #[must_use]
    pub fn announce(mut self, len: u32) -> Self {
        self.announced = Some(len);
        self
    }

    /// Append one transfer frame carrying `payload`.
    #[must_use]
    pub fn chunk(mut self, payload: &[u8]) -> Self {
        self.chunks.push(payload.to_vec());
        self
    }

    /// Append `payload` split into transfer frames of at most `size` bytes.
    #[must_use]
    pub fn chunked(mut self, payload: &[u8], size: usize) -> Self {
        self.chunks
            .extend(payload.chunks(size.max(1)).map(<[u8]>::to_vec));
        self
    }

    /// Leave off the end frame, as a device that lost power would.
    #[must_use]
    pub fn without_end(mut self) -> Self {
        self.end = false;
        self
    }

    /// Concatenated payload of every transfer frame.
    #[must_use]
    pub fn payload(&self) -> Vec<u8> { self.chunks.concat() }

    /// Frames making up the dump.
    #[must_use]
    pub fn frames(&self) -> Vec<Frame> {
        let total = self.announced.unwrap_or_else(|| {
            u32::try_from(self.chunks.iter().map(Vec::len).sum::<usize>()).unwrap_or(u32::MAX)
        });
        let mut frames = vec![Frame::start(self.device, self.version, total)];
        frames.extend(
            self.chunks
                .iter()
                .map(|c| Frame::transferring(self.device, self.version, c.clone())),
        );
        if self.end {
            frames.push(Frame::end(self.device, self.version));
        }
        frames
    }

    /// Wire bytes of the dump.
    #[must_use]
    pub fn build(&self) -> Vec<u8> { encode_frames(&self.frames()) }
}
