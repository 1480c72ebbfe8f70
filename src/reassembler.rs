//! Stream reassembler turning a connection's bytes into dump writes.
//!
//! A [`Reassembler`] owns everything belonging to one session: the receive
//! buffer, the state machine and the output handle. Frames are decoded in
//! arrival order and payload bytes are appended to the [`Sink`] in the same
//! order. Every frame already buffered is processed before the next read, so
//! frames coalesced into a single read need no extra round trip.
//!
//! State transitions:
//!
//! ```text
//! AwaitingStart --start--> Active --transferring--> Active
//!                          Active --end----------> Closed
//! any error / unexpected frame ------------------> Aborted
//! ```
//!
//! On abort the output (if one was opened) is closed but never deleted, so
//! partial dumps remain available for inspection.

mod buffer;
mod error;
mod state;

use std::{net::SocketAddr, sync::Arc, time::Duration};

pub use buffer::{READ_CHUNK, ReceiveBuffer};
use chrono::{DateTime, Local};
pub use error::{ProtocolViolation, SessionError};
use log::{debug, info, warn};
use state::{ActiveDump, Phase};
pub use state::{DumpSummary, SessionOutcome, SessionState};
use tokio::{io::AsyncRead, select, time::timeout};
use tokio_util::sync::CancellationToken;

use crate::{
    codec::{DEFAULT_MAX_PAYLOAD_LEN, DumpFrameCodec},
    frame::{Frame, FrameHeader, FrameKind},
    metrics,
    sink::{DumpIdentity, Sink},
};

/// Per-connection dump session driver.
pub struct Reassembler<S: Sink> {
    sink: Arc<S>,
    codec: DumpFrameCodec,
    buffer: ReceiveBuffer,
    phase: Phase<S::Handle>,
    idle_timeout: Option<Duration>,
    peer_addr: Option<SocketAddr>,
    shutdown: CancellationToken,
}

impl<S: Sink> Reassembler<S> {
    /// Create a session in [`SessionState::AwaitingStart`] writing to `sink`.
    #[must_use]
    pub fn new(sink: Arc<S>) -> Self {
        Self {
            sink,
            codec: DumpFrameCodec::new(DEFAULT_MAX_PAYLOAD_LEN),
            buffer: ReceiveBuffer::new(),
            phase: Phase::AwaitingStart,
            idle_timeout: None,
            peer_addr: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Reject transfer frames larger than `len` bytes.
    #[must_use]
    pub fn max_payload_len(mut self, len: usize) -> Self {
        self.codec = DumpFrameCodec::new(len);
        self
    }

    /// Abort the session if a read waits longer than `idle`.
    ///
    /// `None` disables the timeout.
    #[must_use]
    pub fn idle_timeout(mut self, idle: Option<Duration>) -> Self {
        self.idle_timeout = idle;
        self
    }

    /// Record the remote address for diagnostics.
    #[must_use]
    pub fn peer_addr(mut self, addr: Option<SocketAddr>) -> Self {
        self.peer_addr = addr;
        self
    }

    /// Abort the session with [`SessionError::Shutdown`] once `token` is
    /// cancelled while [`run`](Self::run) waits for data.
    #[must_use]
    pub fn shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> SessionState { self.phase.state() }

    /// Unconsumed bytes held in the receive buffer.
    #[must_use]
    pub fn buffered(&self) -> usize { self.buffer.len() }

    /// Drive the session from `reader` until it ends.
    ///
    /// Returns once an end frame has been processed or the peer closed the
    /// connection before starting a dump. Bytes after the end frame are
    /// discarded.
    ///
    /// # Errors
    ///
    /// Returns a [`SessionError`] for malformed or unexpected frames, sink
    /// failures, read failures, idle timeouts, local shutdown and disconnects
    /// in the middle of a dump. The output is closed before the error is
    /// returned.
    pub async fn run<R>(mut self, mut reader: R) -> Result<SessionOutcome, SessionError>
    where
        R: AsyncRead + Unpin,
    {
        let result = self.drive(&mut reader).await;
        self.conclude(result).await
    }

    /// Feed bytes obtained outside [`run`](Self::run) and process every
    /// complete frame they finish.
    ///
    /// Bytes arriving after the end frame are discarded; bytes arriving after
    /// an abort are ignored.
    ///
    /// # Errors
    ///
    /// As for [`run`](Self::run); the session is aborted before the error is
    /// returned.
    pub async fn push_bytes(&mut self, bytes: &[u8]) -> Result<SessionState, SessionError> {
        match self.state() {
            SessionState::Closed => {
                self.discard_trailing(bytes.len());
                return Ok(SessionState::Closed);
            }
            SessionState::Aborted => {
                debug!(
                    "ignoring bytes after aborted session: bytes={}, peer_addr={:?}",
                    bytes.len(),
                    self.peer_addr
                );
                return Ok(SessionState::Aborted);
            }
            SessionState::AwaitingStart | SessionState::Active => {}
        }
        self.buffer.extend(bytes);
        match self.process_buffered().await {
            Ok(()) => {
                if self.state() == SessionState::Closed {
                    self.discard_trailing(0);
                }
                Ok(self.state())
            }
            Err(err) => {
                self.abort(&err).await;
                Err(err)
            }
        }
    }

    /// Finish a session fed through [`push_bytes`](Self::push_bytes), treating
    /// the input as closed.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ConnectionClosed`] if a dump is still active and
    /// an EOF error if a partial frame remains buffered.
    pub async fn finish(mut self) -> Result<SessionOutcome, SessionError> {
        let result = self.finish_eof();
        self.conclude(result).await
    }

    /// Apply one decoded frame to the state machine.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolViolation`]s for frames not valid in the current state
    /// and [`SessionError::Sink`] when storage fails. The caller is
    /// responsible for aborting the session afterwards.
    pub async fn handle_frame(&mut self, frame: Frame) -> Result<(), SessionError> {
        self.handle_frame_at(frame, Local::now()).await
    }

    /// Apply one decoded frame using an explicit clock reading for the
    /// session start time.
    ///
    /// # Errors
    ///
    /// See [`handle_frame`](Self::handle_frame).
    pub async fn handle_frame_at(
        &mut self,
        frame: Frame,
        now: DateTime<Local>,
    ) -> Result<(), SessionError> {
        let kind = frame.kind();
        let (header, payload) = frame.into_parts();
        let sink = &self.sink;

        let applied = match (&mut self.phase, kind) {
            (Phase::AwaitingStart, FrameKind::Start) => {
                let identity = DumpIdentity {
                    device_id: header.device_id,
                    firmware_version: header.firmware_version,
                    started_at: now,
                };
                info!(
                    "dump started: device={}, version={}, announced_len={}, peer_addr={:?}",
                    identity.device_id, identity.firmware_version, header.length, self.peer_addr
                );
                self.phase = Phase::Active(ActiveDump::new(identity, header.length));
                Ok(())
            }
            (Phase::Active(dump), FrameKind::Transferring) => {
                ensure_same_device(dump, &header)?;
                if dump.output.is_none() {
                    let handle = sink.open(&dump.identity).await.map_err(SessionError::Sink)?;
                    let name = sink.output_name(&handle);
                    debug!("dump output opened: device={}, output={name}", dump.identity.device_id);
                    dump.output_name = Some(name);
                    dump.output = Some(handle);
                }
                if let Some(handle) = dump.output.as_mut() {
                    sink.append(handle, &payload)
                        .await
                        .map_err(SessionError::Sink)?;
                }
                dump.bytes_written += payload.len() as u64;
                dump.chunks += 1;
                metrics::add_payload_bytes(payload.len());
                Ok(())
            }
            (Phase::Active(dump), FrameKind::End) => {
                ensure_same_device(dump, &header)?;
                if let Some(handle) = dump.output.take() {
                    sink.close(handle).await.map_err(SessionError::Sink)?;
                }
                let summary = dump.summary();
                if summary.is_complete() {
                    info!(
                        "dump complete: device={}, bytes={}, chunks={}, output={:?}",
                        summary.identity.device_id,
                        summary.bytes_written,
                        summary.chunks,
                        summary.output
                    );
                } else {
                    warn!(
                        "dump incomplete: device={}, announced_len={}, bytes={}, output={:?}",
                        summary.identity.device_id,
                        summary.announced_len,
                        summary.bytes_written,
                        summary.output
                    );
                }
                self.phase = Phase::Closed(summary);
                Ok(())
            }
            (phase, kind) => Err(ProtocolViolation::UnexpectedFrame {
                state: phase.state(),
                kind,
            }
            .into()),
        };
        if applied.is_ok() {
            metrics::inc_frames(kind);
        }
        applied
    }

    async fn drive<R>(&mut self, reader: &mut R) -> Result<SessionOutcome, SessionError>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            self.process_buffered().await?;
            if let Phase::Closed(summary) = &self.phase {
                let summary = summary.clone();
                self.discard_trailing(0);
                return Ok(SessionOutcome::Completed(summary));
            }

            let read = self.read_more(reader).await?;
            if read == 0 {
                return self.finish_eof();
            }
        }
    }

    #[expect(
        clippy::integer_division_remainder_used,
        reason = "tokio::select! expands to modulus internally"
    )]
    async fn read_more<R>(&mut self, reader: &mut R) -> Result<usize, SessionError>
    where
        R: AsyncRead + Unpin,
    {
        let idle_timeout = self.idle_timeout;
        let buffer = &mut self.buffer;
        let read = async move {
            let read = match idle_timeout {
                Some(idle) => timeout(idle, buffer.fill_from(reader))
                    .await
                    .map_err(|_| SessionError::IdleTimeout(idle))?,
                None => buffer.fill_from(reader).await,
            };
            read.map_err(SessionError::Read)
        };

        select! {
            biased;

            () = self.shutdown.cancelled() => Err(SessionError::Shutdown),
            res = read => res,
        }
    }

    /// Decode and apply every complete frame currently buffered.
    async fn process_buffered(&mut self) -> Result<(), SessionError> {
        while !self.state().is_terminal() {
            let Some(frame) = self.buffer.next_frame(self.codec)? else {
                break;
            };
            self.handle_frame(frame).await?;
        }
        Ok(())
    }

    fn finish_eof(&mut self) -> Result<SessionOutcome, SessionError> {
        match &self.phase {
            Phase::Aborted => return Ok(SessionOutcome::Aborted),
            Phase::Closed(summary) => {
                let summary = summary.clone();
                self.discard_trailing(0);
                return Ok(SessionOutcome::Completed(summary));
            }
            Phase::AwaitingStart | Phase::Active(_) => {}
        }
        if let Some(eof) = self.buffer.eof_error(self.codec) {
            return Err(SessionError::Codec(eof.into()));
        }
        match &self.phase {
            Phase::Active(dump) => Err(SessionError::ConnectionClosed {
                bytes_written: dump.bytes_written,
            }),
            Phase::AwaitingStart | Phase::Closed(_) | Phase::Aborted => {
                Ok(SessionOutcome::ClosedBeforeStart)
            }
        }
    }

    async fn conclude(
        &mut self,
        result: Result<SessionOutcome, SessionError>,
    ) -> Result<SessionOutcome, SessionError> {
        match result {
            Ok(outcome) => {
                match outcome {
                    SessionOutcome::Completed(_) => metrics::inc_sessions("completed"),
                    SessionOutcome::ClosedBeforeStart => metrics::inc_sessions("empty"),
                    SessionOutcome::Aborted => {}
                }
                Ok(outcome)
            }
            Err(err) => {
                self.abort(&err).await;
                Err(err)
            }
        }
    }

    /// Drop buffered bytes plus `unbuffered` bytes the caller never stored.
    fn discard_trailing(&mut self, unbuffered: usize) {
        let discarded = self.buffer.discard() + unbuffered;
        if discarded > 0 {
            warn!(
                "discarding bytes after end of dump: bytes={discarded}, peer_addr={:?}",
                self.peer_addr
            );
        }
    }

    /// Release the output and move to [`SessionState::Aborted`].
    async fn abort(&mut self, err: &SessionError) {
        let phase = std::mem::replace(&mut self.phase, Phase::Aborted);
        metrics::inc_errors(err.error_type());
        metrics::inc_sessions("aborted");
        match phase {
            Phase::Active(mut dump) => {
                if let Some(handle) = dump.output.take()
                    && let Err(close_err) = self.sink.close(handle).await
                {
                    warn!(
                        "failed to close partial dump: output={:?}, error={close_err}",
                        dump.output_name
                    );
                }
                warn!(
                    "dump session aborted: device={}, bytes={}, output={:?}, peer_addr={:?}, \
                     error={err}",
                    dump.identity.device_id,
                    dump.bytes_written,
                    dump.output_name,
                    self.peer_addr
                );
            }
            Phase::AwaitingStart | Phase::Closed(_) | Phase::Aborted => {
                warn!(
                    "dump session aborted: peer_addr={:?}, error={err}",
                    self.peer_addr
                );
            }
        }
    }
}

fn ensure_same_device<H>(dump: &ActiveDump<H>, header: &FrameHeader) -> Result<(), SessionError> {
    if header.device_id == dump.identity.device_id {
        Ok(())
    } else {
        Err(ProtocolViolation::DeviceMismatch {
            expected: dump.identity.device_id,
            found: header.device_id,
        }
        .into())
    }
}
