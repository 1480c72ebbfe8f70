//! Run a receiver on an ephemeral port for integration tests.

use std::net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener};

use coredump_recv::{
    server::{Bound, DumpServer, ServerError},
    sink::Sink,
};
use tokio::{sync::oneshot, task::JoinHandle};

/// Shared result type for integration tests.
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Create a TCP listener bound to a free local port.
///
/// # Errors
///
/// Returns any IO error encountered while binding to an ephemeral localhost
/// port.
pub fn unused_listener() -> std::io::Result<StdTcpListener> {
    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);
    StdTcpListener::bind(addr)
}

/// A server running in the background until [`stop`](Self::stop) is called.
pub struct RunningServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<(), ServerError>>,
}

impl RunningServer {
    /// Bind `server` to a free local port, start it and wait until it is
    /// ready to accept.
    ///
    /// # Errors
    ///
    /// Fails if no port can be bound or the server stops before signalling
    /// readiness.
    pub async fn start<S: Sink>(server: DumpServer<S>) -> TestResult<Self> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let server: DumpServer<S, Bound> = server
            .ready_signal(ready_tx)
            .bind_existing_listener(unused_listener()?)?;
        let addr = server.local_addr().ok_or("server missing local addr")?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.run_with_shutdown(async {
            let _ = shutdown_rx.await;
        }));
        ready_rx.await?;
        Ok(Self {
            addr,
            shutdown: Some(shutdown_tx),
            handle,
        })
    }

    /// Address clients should connect to.
    #[must_use]
    pub fn addr(&self) -> SocketAddr { self.addr }

    /// Signal shutdown and wait for the server and its sessions to finish.
    ///
    /// # Errors
    ///
    /// Propagates a server error or a panic in the server task.
    pub async fn stop(mut self) -> TestResult {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        (&mut self.handle).await??;
        Ok(())
    }
}

/// Poll `condition` every 10 ms until it holds, failing after five seconds.
///
/// Sessions run on their own tasks, so a client finishing its writes does
/// not mean the server has accepted the connection yet.
///
/// # Errors
///
/// Returns an error if `condition` is still false after the deadline.
pub async fn eventually<F: FnMut() -> bool>(mut condition: F) -> TestResult {
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await
    .map_err(|_| "condition not met within 5s")?;
    Ok(())
}
