//! Configuration and listener binding for [`DumpServer`].

use std::{
    net::{SocketAddr, TcpListener as StdTcpListener},
    sync::Arc,
    time::Duration,
};

use tokio::{net::TcpListener, sync::oneshot};

use super::{BackoffConfig, Bound, DumpServer, ServerError, ServerState, SessionConfig, Unbound};
use crate::sink::Sink;

#[cfg(test)]
mod tests;

impl<S: Sink> DumpServer<S, Unbound> {
    /// Create a new `DumpServer` storing dumps in `sink`.
    ///
    /// The worker count defaults to the number of available CPU cores (or 1 if
    /// this cannot be determined). The TCP listener is unset; call
    /// [`bind`](Self::bind) before running the server.
    ///
    /// # Examples
    ///
    /// ```
    /// use coredump_recv::{server::DumpServer, sink::MemorySink};
    ///
    /// let server = DumpServer::new(MemorySink::new());
    /// assert!(server.worker_count() >= 1);
    /// ```
    #[must_use]
    pub fn new(sink: S) -> Self { Self::with_shared_sink(Arc::new(sink)) }

    /// Create a server writing to a sink shared with other owners.
    #[must_use]
    pub fn with_shared_sink(sink: Arc<S>) -> Self {
        let workers = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        Self {
            sink,
            workers,
            session: SessionConfig::default(),
            max_connections: None,
            backoff_config: BackoffConfig::default(),
            ready_tx: None,
            state: Unbound,
        }
    }

    /// Return `None` as the server is not bound.
    #[must_use]
    pub const fn local_addr(&self) -> Option<SocketAddr> { None }

    /// Bind to a fresh address.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::net::{Ipv4Addr, SocketAddr};
    ///
    /// use coredump_recv::{server::DumpServer, sink::MemorySink};
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
    /// let server = DumpServer::new(MemorySink::new())
    ///     .bind(addr)
    ///     .expect("bind failed");
    /// assert!(server.local_addr().is_some());
    /// # }
    /// ```
    ///
    /// # Errors
    /// Returns a [`ServerError`] if binding or configuring the listener fails.
    pub fn bind(self, addr: SocketAddr) -> Result<DumpServer<S, Bound>, ServerError> {
        let std_listener = StdTcpListener::bind(addr).map_err(ServerError::Bind)?;
        self.bind_to_listener(std_listener)
    }

    /// Bind to an existing `StdTcpListener`.
    ///
    /// # Errors
    /// Returns a [`ServerError`] if configuring the listener fails.
    pub fn bind_existing_listener(
        self,
        std_listener: StdTcpListener,
    ) -> Result<DumpServer<S, Bound>, ServerError> {
        self.bind_to_listener(std_listener)
    }
}

impl<S: Sink> DumpServer<S, Bound> {
    /// Returns the bound address, or `None` if retrieving it fails.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> { self.state.listener.local_addr().ok() }
}

impl<S, St> DumpServer<S, St>
where
    S: Sink,
    St: ServerState,
{
    /// Set the number of accept tasks to spawn for the server.
    #[must_use]
    pub fn workers(mut self, count: usize) -> Self {
        self.workers = count.max(1);
        self
    }

    /// Abort sessions whose socket stays silent for `idle`.
    ///
    /// `None` disables the timeout. Defaults to 60 seconds.
    #[must_use]
    pub fn idle_timeout(mut self, idle: Option<Duration>) -> Self {
        self.session.idle_timeout = idle;
        self
    }

    /// Reject transfer frames with payloads larger than `len` bytes.
    #[must_use]
    pub fn max_payload_len(mut self, len: usize) -> Self {
        self.session.max_payload_len = len;
        self
    }

    /// Limit the number of sessions running at once.
    ///
    /// When the limit is reached the accept loop stops accepting until a
    /// session ends. `None`, the default, accepts without limit.
    #[must_use]
    pub fn max_connections(mut self, limit: Option<usize>) -> Self {
        self.max_connections = limit.map(|n| n.max(1));
        self
    }

    /// Configure exponential back-off for failing `accept()` calls.
    #[must_use]
    pub fn accept_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff_config = backoff.normalized();
        self
    }

    /// Configure a channel used to signal when the server is ready to accept
    /// connections.
    #[must_use]
    pub fn ready_signal(mut self, tx: oneshot::Sender<()>) -> Self {
        self.ready_tx = Some(tx);
        self
    }

    /// Returns the configured number of accept tasks.
    #[inline]
    #[must_use]
    pub const fn worker_count(&self) -> usize { self.workers }

    /// Returns the limits applied to every session.
    #[must_use]
    pub const fn session_config(&self) -> SessionConfig { self.session }

    /// Returns the configured concurrent session limit.
    #[must_use]
    pub const fn connection_limit(&self) -> Option<usize> { self.max_connections }

    /// Returns the configured accept back-off.
    #[must_use]
    pub const fn backoff(&self) -> BackoffConfig { self.backoff_config }

    /// Borrow the sink receiving dumps.
    #[must_use]
    pub fn sink(&self) -> &Arc<S> { &self.sink }

    fn bind_to_listener(
        self,
        std_listener: StdTcpListener,
    ) -> Result<DumpServer<S, Bound>, ServerError> {
        let DumpServer {
            sink,
            workers,
            session,
            max_connections,
            backoff_config,
            ready_tx,
            ..
        } = self;

        std_listener
            .set_nonblocking(true)
            .map_err(ServerError::Bind)?;
        let tokio_listener = TcpListener::from_std(std_listener).map_err(ServerError::Bind)?;

        Ok(DumpServer {
            sink,
            workers,
            session,
            max_connections,
            backoff_config,
            ready_tx,
            state: Bound {
                listener: Arc::new(tokio_listener),
            },
        })
    }
}
