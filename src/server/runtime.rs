//! Runtime control for [`DumpServer`].

mod accept;
mod backoff;
#[cfg(test)]
mod tests;

use std::sync::Arc;

#[cfg(test)]
pub(super) use accept::MockAcceptListener;
pub(super) use accept::{AcceptLoopOptions, accept_loop};
pub use backoff::BackoffConfig;
use futures::Future;
use log::{info, warn};
use tokio::{select, signal, sync::Semaphore};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::{Bound, DumpServer, ServerError};
use crate::sink::Sink;

impl<S: Sink> DumpServer<S, Bound> {
    /// Run the server until a shutdown signal is received.
    ///
    /// Spawns the configured number of accept tasks and awaits Ctrl+C for
    /// shutdown.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use coredump_recv::{server::DumpServer, sink::FsSink};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), coredump_recv::server::ServerError> {
    /// let server = DumpServer::new(FsSink::new("received_coredump_files"))
    ///     .bind(([0, 0, 0, 0], 8766).into())?;
    /// server.run().await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// Attempting to run a server without binding fails to compile:
    ///
    /// ```compile_fail
    /// use coredump_recv::{server::DumpServer, sink::MemorySink};
    ///
    /// async fn try_run() {
    ///     DumpServer::new(MemorySink::new())
    ///         .run()
    ///         .await
    ///         .expect("unbound servers do not expose run()");
    /// }
    /// ```
    ///
    /// # Errors
    ///
    /// Accept failures are retried with exponential back-off and do not
    /// surface as errors; session failures only end their own session.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(async {
            let _ = signal::ctrl_c().await;
        })
        .await
    }

    /// Run the server until the `shutdown` future resolves.
    ///
    /// After shutdown no new connections are accepted. Sessions still waiting
    /// for data are aborted with their partial output closed, and this returns
    /// once every session task has finished.
    ///
    /// # Examples
    ///
    /// ```
    /// use coredump_recv::{server::DumpServer, sink::MemorySink};
    /// use tokio::sync::oneshot;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), coredump_recv::server::ServerError> {
    /// let server = DumpServer::new(MemorySink::new()).bind(([127, 0, 0, 1], 0).into())?;
    ///
    /// let (tx, rx) = oneshot::channel::<()>();
    /// let handle = tokio::spawn(async move {
    ///     server
    ///         .run_with_shutdown(async {
    ///             let _ = rx.await;
    ///         })
    ///         .await
    /// });
    ///
    /// let _ = tx.send(());
    /// handle
    ///     .await
    ///     .expect("join server task")
    ///     .expect("server run failed");
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run).
    #[expect(
        clippy::integer_division_remainder_used,
        reason = "tokio::select! expands to modulus internally"
    )]
    pub async fn run_with_shutdown<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let DumpServer {
            sink,
            workers,
            session,
            max_connections,
            backoff_config,
            ready_tx,
            state: Bound { listener },
        } = self;
        let shutdown_token = CancellationToken::new();
        let tracker = TaskTracker::new();
        let limit = max_connections.map(|n| Arc::new(Semaphore::new(n)));

        if let Ok(addr) = listener.local_addr() {
            info!(
                "coredump receiver listening: addr={addr}, workers={workers}, \
                 max_connections={max_connections:?}"
            );
        }

        for _ in 0..workers {
            tracker.spawn(accept_loop(
                Arc::clone(&listener),
                Arc::clone(&sink),
                AcceptLoopOptions {
                    session,
                    limit: limit.clone(),
                    shutdown: shutdown_token.clone(),
                    tracker: tracker.clone(),
                    backoff: backoff_config,
                },
            ));
        }

        // Signal readiness after all workers have been spawned.
        if let Some(tx) = ready_tx
            && tx.send(()).is_err()
        {
            warn!("Failed to send readiness signal: receiver dropped");
        }

        select! {
            () = shutdown => shutdown_token.cancel(),
            () = tracker.wait() => {},
        }

        tracker.close();
        tracker.wait().await;
        info!("coredump receiver stopped");
        Ok(())
    }
}
