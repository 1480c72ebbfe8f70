//! Session state tracked by the reassembler.

use std::fmt;

use crate::sink::DumpIdentity;

/// Externally visible session state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Waiting for the start frame; initial state.
    AwaitingStart,
    /// Start frame seen; payload chunks are accepted.
    Active,
    /// End frame processed and output closed; terminal.
    Closed,
    /// Session ended by an error; terminal.
    Aborted,
}

impl SessionState {
    /// Whether no further frames will be processed.
    #[must_use]
    pub const fn is_terminal(self) -> bool { matches!(self, Self::Closed | Self::Aborted) }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AwaitingStart => "awaiting start",
            Self::Active => "active",
            Self::Closed => "closed",
            Self::Aborted => "aborted",
        })
    }
}

/// Summary of a dump that reached its end frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DumpSummary {
    /// Identity captured from the start frame.
    pub identity: DumpIdentity,
    /// Location of the output, or `None` if no payload was ever received.
    pub output: Option<String>,
    /// Payload bytes written to the output.
    pub bytes_written: u64,
    /// Number of transfer frames received.
    pub chunks: u64,
    /// Total size announced by the start frame; zero when not announced.
    pub announced_len: u32,
}

impl DumpSummary {
    /// Whether the received size matches the size announced at start.
    ///
    /// Dumps that announced no size are considered complete.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.announced_len == 0 || u64::from(self.announced_len) == self.bytes_written
    }
}

/// How a session ended without error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The dump ran from start frame to end frame.
    Completed(DumpSummary),
    /// The peer disconnected cleanly before sending a start frame.
    ClosedBeforeStart,
    /// An earlier error already aborted the session.
    Aborted,
}

impl SessionOutcome {
    /// Summary of the completed dump, if any.
    #[must_use]
    pub fn summary(&self) -> Option<&DumpSummary> {
        match self {
            Self::Completed(summary) => Some(summary),
            Self::ClosedBeforeStart | Self::Aborted => None,
        }
    }
}

/// Dump in progress, owned by exactly one session.
pub(super) struct ActiveDump<H> {
    pub identity: DumpIdentity,
    pub announced_len: u32,
    pub output: Option<H>,
    pub output_name: Option<String>,
    pub bytes_written: u64,
    pub chunks: u64,
}

impl<H> ActiveDump<H> {
    pub fn new(identity: DumpIdentity, announced_len: u32) -> Self {
        Self {
            identity,
            announced_len,
            output: None,
            output_name: None,
            bytes_written: 0,
            chunks: 0,
        }
    }

    pub fn summary(&self) -> DumpSummary {
        DumpSummary {
            identity: self.identity.clone(),
            output: self.output_name.clone(),
            bytes_written: self.bytes_written,
            chunks: self.chunks,
            announced_len: self.announced_len,
        }
    }
}

pub(super) enum Phase<H> {
    AwaitingStart,
    Active(ActiveDump<H>),
    Closed(DumpSummary),
    Aborted,
}

impl<H> Phase<H> {
    pub fn state(&self) -> SessionState {
        match self {
            Phase::AwaitingStart => SessionState::AwaitingStart,
            Phase::Active(_) => SessionState::Active,
            Phase::Closed(_) => SessionState::Closed,
            Phase::Aborted => SessionState::Aborted,
        }
    }
}
