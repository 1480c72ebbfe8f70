//! Accept-loop utilities for server runtime.

use std::{io, net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use log::warn;
use tokio::{
    net::{TcpListener, TcpStream},
    select,
    sync::{OwnedSemaphorePermit, Semaphore},
    time::{Duration, sleep},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::backoff::BackoffConfig;
use crate::{
    server::{SessionConfig, connection::spawn_connection_task},
    sink::Sink,
};

/// Abstraction for sources of incoming connections consumed by the accept loop.
///
/// Implementations must be cancellation-safe: dropping a pending `accept()`
/// future must not leak resources.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub(in crate::server) trait AcceptListener: Send + Sync {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

#[async_trait]
impl AcceptListener for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> { TcpListener::local_addr(self) }
}

#[derive(Debug)]
pub(in crate::server) struct AcceptLoopOptions {
    pub session: SessionConfig,
    pub limit: Option<Arc<Semaphore>>,
    pub shutdown: CancellationToken,
    pub tracker: TaskTracker,
    pub backoff: BackoffConfig,
}

/// Accepts incoming connections and spawns one session task per connection.
///
/// Failures to accept trigger an exponential back-off governed by
/// `options.backoff`. When a connection limit is configured the loop waits
/// for a free slot before accepting. The loop terminates when
/// `options.shutdown` is cancelled, which also aborts the sessions it
/// spawned; they are tracked by `options.tracker` so shutdown can wait for
/// them.
pub(in crate::server) async fn accept_loop<S, L>(
    listener: Arc<L>,
    sink: Arc<S>,
    options: AcceptLoopOptions,
) where
    S: Sink,
    L: AcceptListener + 'static,
{
    let backoff = options.backoff.normalized();
    debug_assert!(
        backoff.initial_delay <= backoff.max_delay,
        "BackoffConfig invariant violated: initial_delay > max_delay"
    );
    let mut delay = backoff.initial_delay;
    while let Some(next_delay) = accept_iteration(&listener, &sink, &options, backoff, delay).await
    {
        delay = next_delay;
    }
}

#[expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! expands to modulus internally"
)]
async fn accept_iteration<S, L>(
    listener: &Arc<L>,
    sink: &Arc<S>,
    options: &AcceptLoopOptions,
    backoff: BackoffConfig,
    delay: Duration,
) -> Option<Duration>
where
    S: Sink,
    L: AcceptListener + 'static,
{
    let permit = acquire_slot(options).await?;

    select! {
        biased;

        () = options.shutdown.cancelled() => None,
        res = listener.accept() => Some(match res {
            Ok((stream, _)) => {
                spawn_connection_task(
                    stream,
                    Arc::clone(sink),
                    options.session,
                    permit,
                    options.shutdown.child_token(),
                    &options.tracker,
                );
                backoff.initial_delay
            }
            Err(e) => {
                let local_addr = listener.local_addr().ok();
                warn!("accept error: error={e:?}, local_addr={local_addr:?}");
                sleep(delay).await;
                backoff.next_delay(delay)
            }
        }),
    }
}

/// Wait for a session slot, or return `None` on shutdown.
///
/// Without a configured limit this yields `Some(None)` immediately.
#[expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! expands to modulus internally"
)]
#[expect(
    clippy::option_option,
    reason = "outer None means shutdown, inner None means no limit"
)]
async fn acquire_slot(options: &AcceptLoopOptions) -> Option<Option<OwnedSemaphorePermit>> {
    let Some(limit) = options.limit.as_ref() else {
        return Some(None);
    };
    select! {
        biased;

        () = options.shutdown.cancelled() => None,
        permit = Arc::clone(limit).acquire_owned() => permit.ok().map(Some),
    }
}
