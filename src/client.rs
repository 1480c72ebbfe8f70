//! Dump sender speaking the receiver's frame protocol.
//!
//! [`DumpSender`] replays a dump the way a device streams it: one start frame
//! announcing the total size, the payload split into transfer frames of at
//! most `chunk_size` bytes, then an end frame. It backs the `send`
//! subcommand and end-to-end tests.

use std::{io, time::Duration};

use bytes::Bytes;
use futures::SinkExt;
use thiserror::Error;
use tokio::{
    io::AsyncWrite,
    net::{TcpStream, ToSocketAddrs},
    time::timeout,
};
use tokio_util::codec::FramedWrite;
use tracing::Instrument;

use crate::{
    codec::{CodecError, DEFAULT_MAX_PAYLOAD_LEN, DumpFrameCodec},
    frame::{DeviceId, FirmwareVersion, Frame},
};

/// Payload bytes per transfer frame unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Errors emitted by [`DumpSender`].
#[derive(Debug, Error)]
pub enum SendError {
    /// Connecting to the receiver failed.
    #[error("failed to connect: {0}")]
    Connect(#[source] io::Error),
    /// The dump is too large for the start frame's 32-bit size field.
    #[error("dump of {len} bytes exceeds the 4 GiB protocol limit")]
    TooLarge {
        /// Size of the rejected dump.
        len: usize,
    },
    /// Encoding or writing a frame failed.
    #[error("transport error: {0}")]
    Transport(#[from] CodecError),
    /// The whole send did not finish within the configured timeout.
    #[error("send timed out after {0:?}")]
    Timeout(Duration),
}

/// What a completed send put on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SendReport {
    /// Frames written, including start and end.
    pub frames: usize,
    /// Payload bytes carried by transfer frames.
    pub payload_bytes: u64,
}

/// Streams dumps to a receiver on behalf of one device.
///
/// # Examples
///
/// ```
/// use coredump_recv::{client::DumpSender, frame::DeviceId};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), coredump_recv::client::SendError> {
/// let sender = DumpSender::new(
///     DeviceId::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]),
///     "v2.1.2".parse().expect("version fits"),
/// )
/// .chunk_size(4);
///
/// let mut wire = Vec::new();
/// let report = sender.send(&mut wire, b"DEADBEEF").await?;
/// assert_eq!(report.frames, 4);
/// assert_eq!(wire.len(), 4 * 32 + 8);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct DumpSender {
    device_id: DeviceId,
    firmware_version: FirmwareVersion,
    chunk_size: usize,
    timeout: Option<Duration>,
}

impl DumpSender {
    /// Create a sender identifying itself as `device_id` running
    /// `firmware_version`.
    #[must_use]
    pub fn new(device_id: DeviceId, firmware_version: FirmwareVersion) -> Self {
        Self {
            device_id,
            firmware_version,
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout: None,
        }
    }

    /// Set the maximum payload bytes per transfer frame.
    ///
    /// The value is clamped to `1..=DEFAULT_MAX_PAYLOAD_LEN` so a receiver
    /// with default limits accepts every frame.
    #[must_use]
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.clamp(1, DEFAULT_MAX_PAYLOAD_LEN);
        self
    }

    /// Bound the whole send operation by `limit`.
    ///
    /// Frames already written when the limit elapses stay sent.
    #[must_use]
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// Connect to `addr` and stream `dump` over a fresh connection.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Connect`] if the connection cannot be
    /// established, otherwise as for [`send`](Self::send).
    pub async fn send_to<A: ToSocketAddrs>(
        &self,
        addr: A,
        dump: &[u8],
    ) -> Result<SendReport, SendError> {
        let span = tracing::info_span!("send_dump", device = %self.device_id, bytes = dump.len());
        async {
            let stream = TcpStream::connect(addr).await.map_err(SendError::Connect)?;
            let peer_addr = stream.peer_addr().ok();
            let report = self.send(stream, dump).await?;
            tracing::info!(?peer_addr, frames = report.frames, "dump sent");
            Ok(report)
        }
        .instrument(span)
        .await
    }

    /// Stream `dump` into `writer` as start, transfer and end frames.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::TooLarge`] for dumps whose size does not fit the
    /// start frame, [`SendError::Transport`] if writing fails and
    /// [`SendError::Timeout`] when the configured timeout elapses.
    pub async fn send<W>(&self, writer: W, dump: &[u8]) -> Result<SendReport, SendError>
    where
        W: AsyncWrite + Unpin,
    {
        let total = u32::try_from(dump.len()).map_err(|_| SendError::TooLarge { len: dump.len() })?;
        match self.timeout {
            Some(limit) => timeout(limit, self.write_frames(writer, dump, total))
                .await
                .map_err(|_| SendError::Timeout(limit))?,
            None => self.write_frames(writer, dump, total).await,
        }
    }

    async fn write_frames<W>(
        &self,
        writer: W,
        dump: &[u8],
        total: u32,
    ) -> Result<SendReport, SendError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut framed = FramedWrite::new(writer, DumpFrameCodec::default());
        let mut frames = 0;

        framed
            .feed(Frame::start(self.device_id, self.firmware_version, total))
            .await?;
        frames += 1;
        for chunk in dump.chunks(self.chunk_size) {
            framed
                .feed(Frame::transferring(
                    self.device_id,
                    self.firmware_version,
                    Bytes::copy_from_slice(chunk),
                ))
                .await?;
            frames += 1;
        }
        framed
            .send(Frame::end(self.device_id, self.firmware_version))
            .await?;
        frames += 1;

        Ok(SendReport {
            frames,
            payload_bytes: dump.len() as u64,
        })
    }
}
