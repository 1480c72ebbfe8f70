//! Errors that end a dump session.
//!
//! Every variant is fatal to the session that raised it and to nothing else.

use std::{io, time::Duration};

use thiserror::Error;

use super::SessionState;
use crate::{
    codec::CodecError,
    frame::{DeviceId, FrameKind},
};

/// Well-formed frame that is not acceptable in the current session state.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// The frame kind is not valid in the current state, such as a transfer
    /// before any start or a second start.
    #[error("{kind} frame not valid while {state}")]
    UnexpectedFrame {
        /// State the session was in.
        state: SessionState,
        /// Kind of the offending frame.
        kind: FrameKind,
    },

    /// A frame names a different device than the start frame did.
    #[error("frame from device {found} inside dump of device {expected}")]
    DeviceMismatch {
        /// Device announced by the start frame.
        expected: DeviceId,
        /// Device carried by the offending frame.
        found: DeviceId,
    },
}

/// Reasons a session terminates abnormally.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The byte stream could not be framed.
    #[error("malformed frame: {0}")]
    Codec(#[from] CodecError),

    /// A frame arrived that the state machine does not accept.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    /// Opening, writing or closing the output failed.
    #[error("sink I/O error: {0}")]
    Sink(#[source] io::Error),

    /// Reading from the connection failed.
    #[error("socket read error: {0}")]
    Read(#[source] io::Error),

    /// The peer closed the connection mid-dump, before an end frame.
    #[error("connection closed before end of dump after {bytes_written} bytes")]
    ConnectionClosed {
        /// Payload bytes stored before the connection closed.
        bytes_written: u64,
    },

    /// Nothing arrived on the connection within the idle timeout.
    #[error("no data received for {0:?}")]
    IdleTimeout(Duration),

    /// The receiver is shutting down.
    #[error("receiver shutting down")]
    Shutdown,
}

impl SessionError {
    /// Returns the error category as a string for logging and metrics.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Codec(e) => e.error_type(),
            Self::Protocol(_) => "protocol",
            Self::Sink(_) => "sink",
            Self::Read(_) => "read",
            Self::ConnectionClosed { .. } => "connection_closed",
            Self::IdleTimeout(_) => "idle_timeout",
            Self::Shutdown => "shutdown",
        }
    }
}
