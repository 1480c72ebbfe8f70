//! Per-connection receive buffer.

use bytes::BytesMut;
use tokio::io::{self, AsyncRead, AsyncReadExt};
use tokio_util::codec::Decoder;

use crate::{
    codec::{CodecError, DumpFrameCodec, EofError},
    frame::Frame,
};

/// Bytes requested from the socket per read.
pub const READ_CHUNK: usize = 2048;

/// Growable buffer of bytes read from a connection but not yet consumed.
///
/// Bytes are only ever removed from the front, one whole frame at a time, so
/// an incomplete frame always stays buffered until it can be decoded.
#[derive(Debug, Default)]
pub struct ReceiveBuffer {
    bytes: BytesMut,
    consumed: u64,
}

impl ReceiveBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Buffered bytes not yet consumed.
    #[must_use]
    pub fn len(&self) -> usize { self.bytes.len() }

    /// Whether no unconsumed bytes remain.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.bytes.is_empty() }

    /// Total bytes consumed as whole frames or discarded since creation.
    #[must_use]
    pub fn consumed(&self) -> u64 { self.consumed }

    /// Borrow the unconsumed bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] { &self.bytes }

    /// Append bytes received out of band.
    pub fn extend(&mut self, data: &[u8]) { self.bytes.extend_from_slice(data); }

    /// Read up to [`READ_CHUNK`] more bytes from `reader`.
    ///
    /// Returns the number of bytes appended; zero means the peer closed the
    /// stream.
    ///
    /// # Errors
    ///
    /// Propagates any read error from `reader`.
    pub async fn fill_from<R>(&mut self, reader: &mut R) -> io::Result<usize>
    where
        R: AsyncRead + Unpin,
    {
        self.bytes.reserve(READ_CHUNK);
        reader.read_buf(&mut self.bytes).await
    }

    /// Split the next complete frame off the front of the buffer.
    ///
    /// Returns `Ok(None)` when more bytes are needed; the buffer is left
    /// untouched in that case.
    ///
    /// # Errors
    ///
    /// Returns the codec's framing error if the leading header is malformed.
    pub fn next_frame(&mut self, codec: DumpFrameCodec) -> Result<Option<Frame>, CodecError> {
        let mut codec = codec;
        let before = self.bytes.len();
        let frame = codec.decode(&mut self.bytes)?;
        self.consumed += (before - self.bytes.len()) as u64;
        Ok(frame)
    }

    /// Classify leftover bytes once the stream has ended.
    #[must_use]
    pub fn eof_error(&self, codec: DumpFrameCodec) -> Option<EofError> {
        codec.eof_error(&self.bytes)
    }

    /// Drop every unconsumed byte, returning how many were discarded.
    pub fn discard(&mut self) -> usize {
        let len = self.bytes.len();
        self.bytes.clear();
        self.consumed += len as u64;
        len
    }
}
