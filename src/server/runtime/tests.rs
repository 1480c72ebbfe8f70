//! Tests for server runtime behaviour.

use std::{
    io,
    sync::{Arc, Mutex},
};

use rstest::rstest;
use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
    sync::{Semaphore, oneshot},
    task::yield_now,
    time::{Duration, Instant, advance, timeout},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::{AcceptLoopOptions, BackoffConfig, DumpServer, MockAcceptListener, accept_loop};
use crate::{
    server::{
        SessionConfig,
        test_util::{bind_server, dump_bytes, free_listener, sink},
    },
    sink::MemorySink,
};

fn options(
    shutdown: &CancellationToken,
    tracker: &TaskTracker,
    backoff: BackoffConfig,
) -> AcceptLoopOptions {
    AcceptLoopOptions {
        session: SessionConfig::default(),
        limit: None,
        shutdown: shutdown.clone(),
        tracker: tracker.clone(),
        backoff,
    }
}

#[rstest]
#[tokio::test]
async fn run_with_immediate_shutdown(sink: MemorySink, free_listener: std::net::TcpListener) {
    let server = bind_server(sink, free_listener);
    let shutdown_future = async { tokio::time::sleep(Duration::from_millis(10)).await };
    let result = timeout(
        Duration::from_millis(1000),
        server.run_with_shutdown(shutdown_future),
    )
    .await;
    assert!(result.expect("server did not finish in time").is_ok());
}

#[rstest]
#[tokio::test]
async fn ready_signal_fires_after_workers_start(
    sink: MemorySink,
    free_listener: std::net::TcpListener,
) {
    let (ready_tx, ready_rx) = oneshot::channel();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = DumpServer::new(sink)
        .workers(3)
        .ready_signal(ready_tx)
        .bind_existing_listener(free_listener)
        .expect("Failed to bind");

    let handle = tokio::spawn(server.run_with_shutdown(async {
        let _ = stop_rx.await;
    }));

    timeout(Duration::from_secs(1), ready_rx)
        .await
        .expect("ready in time")
        .expect("ready sender kept");
    let _ = stop_tx.send(());
    handle
        .await
        .expect("server join error")
        .expect("server run failed");
}

#[rstest]
#[tokio::test]
async fn server_receives_dumps_from_several_clients(
    sink: MemorySink,
    free_listener: std::net::TcpListener,
) {
    let server = bind_server(sink.clone(), free_listener);
    let addr = server.local_addr().expect("bound address");
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.run_with_shutdown(async {
        let _ = stop_rx.await;
    }));

    for (device, payload) in [([1, 1, 1, 1, 1, 1], b"first"), ([2, 2, 2, 2, 2, 2], b"other")] {
        let mut client = TcpStream::connect(addr).await.expect("connect");
        client
            .write_all(&dump_bytes(device, payload))
            .await
            .expect("write dump");
    }

    // Shutdown waits for sessions already accepted, so wait for both.
    timeout(Duration::from_secs(5), async {
        while sink.names().len() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("both sessions accepted");
    let _ = stop_tx.send(());
    handle
        .await
        .expect("server join error")
        .expect("server run failed");

    let outputs = sink.outputs();
    assert_eq!(outputs.len(), 2);
    assert!(outputs[0].0.starts_with("010101010101_"));
    assert_eq!(outputs[0].1.as_slice(), b"first");
    assert!(outputs[1].0.starts_with("020202020202_"));
    assert_eq!(outputs[1].1.as_slice(), b"other");
}

#[rstest]
#[tokio::test]
async fn accept_loop_stops_on_shutdown(sink: MemorySink) {
    let token = CancellationToken::new();
    let tracker = TaskTracker::new();
    let listener = Arc::new(
        TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind test listener"),
    );

    tracker.spawn(accept_loop(
        listener,
        Arc::new(sink),
        options(&token, &tracker, BackoffConfig::default()),
    ));

    token.cancel();
    tracker.close();

    let result = timeout(Duration::from_millis(100), tracker.wait()).await;
    assert!(result.is_ok());
}

#[rstest]
#[tokio::test]
async fn accept_loop_waits_for_free_slot(sink: MemorySink) {
    let token = CancellationToken::new();
    let tracker = TaskTracker::new();
    let limit = Arc::new(Semaphore::new(1));
    let held = Arc::clone(&limit)
        .acquire_owned()
        .await
        .expect("semaphore open");
    let mut listener = MockAcceptListener::new();
    listener.expect_accept().never();

    let mut opts = options(&token, &tracker, BackoffConfig::default());
    opts.limit = Some(limit);
    tracker.spawn(accept_loop(Arc::new(listener), Arc::new(sink), opts));

    yield_now().await;
    token.cancel();
    tracker.close();
    timeout(Duration::from_millis(100), tracker.wait())
        .await
        .expect("loop stops while waiting for a slot");
    drop(held);
}

/// Creates a mock listener that fails every call, logging call times.
fn failing_listener(calls: &Arc<Mutex<Vec<Instant>>>, num_calls: usize) -> MockAcceptListener {
    let mut listener = MockAcceptListener::new();
    let call_log = Arc::clone(calls);
    listener
        .expect_accept()
        .returning(move || {
            let call_log = Arc::clone(&call_log);
            Box::pin(async move {
                call_log.lock().expect("lock").push(Instant::now());
                Err(io::Error::other("mock error"))
            })
        })
        .times(num_calls);
    listener
        .expect_local_addr()
        .returning(|| Ok("127.0.0.1:0".parse().expect("addr parse")))
        .times(num_calls);
    listener
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn accept_loop_backs_off_exponentially(sink: MemorySink) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let listener = Arc::new(failing_listener(&calls, 4));
    let token = CancellationToken::new();
    let tracker = TaskTracker::new();
    let backoff = BackoffConfig {
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
    };

    tracker.spawn(accept_loop(
        listener,
        Arc::new(sink),
        options(&token, &tracker, backoff),
    ));

    yield_now().await;
    assert_eq!(calls.lock().expect("lock").len(), 1);

    for ms in [5, 10, 20] {
        advance(Duration::from_millis(ms)).await;
        yield_now().await;
    }

    token.cancel();
    advance(Duration::from_millis(20)).await;
    yield_now().await;
    tracker.close();
    tracker.wait().await;

    let calls = calls.lock().expect("lock");
    assert_eq!(calls.len(), 4);
    let intervals: Vec<_> = calls.windows(2).map(|w| w[1] - w[0]).collect();
    assert_eq!(
        intervals,
        [5, 10, 20].map(Duration::from_millis).to_vec(),
        "delays double up to the cap"
    );
}

#[rstest]
#[tokio::test]
async fn shutdown_aborts_stalled_sessions(sink: MemorySink, free_listener: std::net::TcpListener) {
    let server = bind_server(sink.clone(), free_listener);
    let addr = server.local_addr().expect("bound address");
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.run_with_shutdown(async {
        let _ = stop_rx.await;
    }));

    // Start plus half of a transfer frame, then nothing: the default idle
    // timeout would keep this session alive for a minute.
    let wire = dump_bytes([3, 3, 3, 3, 3, 3], b"DEADBEEF");
    let mut client = TcpStream::connect(addr).await.expect("connect");
    client.write_all(&wire[..52]).await.expect("write partial dump");
    tokio::time::sleep(Duration::from_millis(50)).await;

    let _ = stop_tx.send(());
    timeout(Duration::from_secs(3), handle)
        .await
        .expect("shutdown does not wait for stalled peers")
        .expect("server join error")
        .expect("server run failed");
    assert!(sink.names().is_empty(), "no payload reached the sink");
    drop(client);
}
