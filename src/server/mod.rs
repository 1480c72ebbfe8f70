//! Tokio-based TCP server receiving coredumps.
//!
//! `DumpServer` spawns worker tasks that accept TCP connections and hand each
//! one to its own [`Reassembler`](crate::reassembler::Reassembler) task. All
//! sessions share one [`Sink`] but nothing else; a failing session never
//! affects its neighbours or the accept loop.

use std::{sync::Arc, time::Duration};

use tokio::{net::TcpListener, sync::oneshot};

use crate::{codec::DEFAULT_MAX_PAYLOAD_LEN, sink::Sink};

/// Default port the receiver listens on.
pub const DEFAULT_PORT: u16 = 8766;

/// Default per-connection read-idle timeout.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Per-connection session limits applied by the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Abort a session whose socket stays silent this long; `None` disables.
    pub idle_timeout: Option<Duration>,
    /// Largest accepted transfer payload in bytes.
    pub max_payload_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
        }
    }
}

/// Tokio-based coredump receiver.
///
/// The server carries a typestate `St` indicating whether it is [`Unbound`]
/// (not yet bound to a TCP listener) or [`Bound`]. New servers start
/// `Unbound` and must call [`bind`](DumpServer::bind) or
/// [`bind_existing_listener`](DumpServer::bind_existing_listener) before
/// running. One accept task is spawned per worker; every accepted connection
/// gets its own session task.
pub struct DumpServer<S, St = Unbound>
where
    S: Sink,
    St: ServerState,
{
    pub(crate) sink: Arc<S>,
    pub(crate) workers: usize,
    pub(crate) session: SessionConfig,
    pub(crate) max_connections: Option<usize>,
    pub(crate) backoff_config: BackoffConfig,
    /// Channel used to notify when the server is ready.
    ///
    /// A `oneshot::Sender` can transmit only one readiness notification, so a
    /// new `ready_tx` must be provided each time the server is started.
    pub(crate) ready_tx: Option<oneshot::Sender<()>>,
    /// Typestate tracking whether the server has been bound to a listener.
    pub(crate) state: St,
}

/// Marker indicating the server has not yet bound a listener.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbound;

/// Marker indicating the server is bound to a TCP listener.
#[derive(Debug, Clone)]
pub struct Bound {
    pub(crate) listener: Arc<TcpListener>,
}

/// Trait implemented by [`Unbound`] and [`Bound`] to model binding typestate.
pub trait ServerState: sealed::Sealed {}

mod sealed {
    //! Prevent external implementations of [`ServerState`].

    pub trait Sealed {}
    impl Sealed for super::Unbound {}
    impl Sealed for super::Bound {}
}

impl ServerState for Unbound {}
impl ServerState for Bound {}

mod config;
mod connection;
pub mod error;
mod runtime;

pub use error::ServerError;
/// Re-exported configuration types for server backoff behavior.
pub use runtime::BackoffConfig;

#[cfg(test)]
pub(crate) mod test_util;
