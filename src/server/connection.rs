//! Connection handling for [`DumpServer`](super::DumpServer).

use std::{net::SocketAddr, sync::Arc};

use futures::FutureExt;
use log::{debug, error, info, warn};
use tokio::{net::TcpStream, sync::OwnedSemaphorePermit};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::SessionConfig;
use crate::{
    metrics,
    reassembler::{Reassembler, SessionOutcome},
    sink::Sink,
};

/// Spawn a task running one dump session, logging and discarding any panics.
///
/// `permit` is held until the session ends so a connection limit covers the
/// whole session. Cancelling `shutdown` aborts the session at its next read.
pub(super) fn spawn_connection_task<S: Sink>(
    stream: TcpStream,
    sink: Arc<S>,
    session: SessionConfig,
    permit: Option<OwnedSemaphorePermit>,
    shutdown: CancellationToken,
    tracker: &TaskTracker,
) {
    let peer_addr = match stream.peer_addr() {
        Ok(addr) => Some(addr),
        Err(e) => {
            warn!("Failed to retrieve peer address: error={e}");
            None
        }
    };
    tracker.spawn(async move {
        let _permit = permit;
        metrics::inc_connections();
        let fut =
            std::panic::AssertUnwindSafe(process_stream(stream, peer_addr, sink, session, shutdown))
                .catch_unwind();

        if let Err(panic) = fut.await {
            metrics::inc_connection_panics();
            let panic_msg = crate::panic::format_panic(panic);
            // Emit via both `log` and `tracing` for tests that capture either.
            error!("connection task panicked: panic={panic_msg}, peer_addr={peer_addr:?}");
            tracing::error!(panic = %panic_msg, ?peer_addr, "connection task panicked");
        }
        metrics::dec_connections();
    });
}

async fn process_stream<S: Sink>(
    stream: TcpStream,
    peer_addr: Option<SocketAddr>,
    sink: Arc<S>,
    session: SessionConfig,
    shutdown: CancellationToken,
) {
    debug!("connection accepted: peer_addr={peer_addr:?}");
    let result = Reassembler::new(sink)
        .max_payload_len(session.max_payload_len)
        .idle_timeout(session.idle_timeout)
        .peer_addr(peer_addr)
        .shutdown_token(shutdown)
        .run(stream)
        .await;

    match result {
        Ok(SessionOutcome::Completed(summary)) => info!(
            "connection finished: peer_addr={peer_addr:?}, device={}, bytes={}, output={:?}",
            summary.identity.device_id, summary.bytes_written, summary.output
        ),
        Ok(SessionOutcome::ClosedBeforeStart | SessionOutcome::Aborted) => {
            debug!("connection closed without dump: peer_addr={peer_addr:?}");
        }
        Err(e) => warn!(
            "connection failed: peer_addr={peer_addr:?}, error_type={}, error={e}",
            e.error_type()
        ),
    }
}
