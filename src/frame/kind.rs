use std::fmt;

use thiserror::Error;

/// Tag identifying the role of a frame within a dump session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    /// Opens a dump session and announces the device identity.
    Start = 0,
    /// Carries a chunk of dump payload.
    Transferring = 1,
    /// Closes the dump session.
    End = 2,
}

impl FrameKind {
    /// Lowercase label used in logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            FrameKind::Start => "start",
            FrameKind::Transferring => "transferring",
            FrameKind::End => "end",
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Raw tag value that does not name a known [`FrameKind`].
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("unknown frame kind: {0}")]
pub struct UnknownFrameKind(pub u8);

impl TryFrom<u8> for FrameKind {
    type Error = UnknownFrameKind;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FrameKind::Start),
            1 => Ok(FrameKind::Transferring),
            2 => Ok(FrameKind::End),
            other => Err(UnknownFrameKind(other)),
        }
    }
}

impl From<FrameKind> for u8 {
    fn from(kind: FrameKind) -> Self { kind as u8 }
}
