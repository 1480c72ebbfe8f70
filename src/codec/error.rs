//! Error types for the codec layer.
//!
//! The taxonomy separates wire-level framing failures from end-of-stream
//! conditions and transport I/O errors. None of these are recoverable within a
//! connection: the header format carries no resynchronisation marker, so once a
//! frame boundary is lost every following byte is suspect.
//!
//! Needing more input is not an error and never appears here; decoders report
//! it through [`Decoded::Incomplete`](super::Decoded::Incomplete) or `Ok(None)`.

use std::io;

use thiserror::Error;

/// Framing-level errors detected while reading a frame header.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// The kind byte does not name a known frame kind.
    #[error("unknown frame kind: {kind}")]
    UnknownFrameKind {
        /// Raw tag value found at the kind offset.
        kind: u8,
    },

    /// A transfer frame announces more payload than the receiver accepts.
    #[error("frame payload exceeds max length: {size} > {max}")]
    OversizedPayload {
        /// Payload length claimed by the header.
        size: usize,
        /// Maximum payload length accepted.
        max: usize,
    },
}

/// EOF received while a frame was only partially buffered.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum EofError {
    /// The peer closed the connection during the fixed header.
    #[error("premature EOF during header: {bytes_received} of {header_size} header bytes")]
    MidHeader {
        /// Header bytes received before EOF.
        bytes_received: usize,
        /// Fixed header size.
        header_size: usize,
    },

    /// The header arrived but the payload was cut short.
    #[error("premature EOF: {bytes_received} bytes of {expected} byte payload received")]
    MidFrame {
        /// Payload bytes received before EOF.
        bytes_received: usize,
        /// Payload length announced by the header.
        expected: usize,
    },
}

/// Top-level codec error taxonomy.
///
/// # Examples
///
/// ```
/// use coredump_recv::codec::{CodecError, FramingError};
///
/// let err = CodecError::Framing(FramingError::UnknownFrameKind { kind: 7 });
/// assert_eq!(err.error_type(), "framing");
/// assert_eq!(err.to_string(), "framing error: unknown frame kind: 7");
/// ```
#[derive(Debug, Error)]
pub enum CodecError {
    /// Framing layer error.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// Transport layer I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// End-of-stream in the middle of a frame.
    #[error("EOF: {0}")]
    Eof(#[from] EofError),
}

impl CodecError {
    /// Returns the error category as a string for logging and metrics.
    ///
    /// One of `"framing"`, `"io"` or `"eof"`.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Framing(_) => "framing",
            Self::Io(_) => "io",
            Self::Eof(_) => "eof",
        }
    }
}

impl From<CodecError> for io::Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => e,
            CodecError::Framing(e) => io::Error::new(io::ErrorKind::InvalidData, e),
            CodecError::Eof(e) => io::Error::new(io::ErrorKind::UnexpectedEof, e),
        }
    }
}
