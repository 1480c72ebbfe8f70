//! Tests for server configuration utilities.
//!
//! This module exercises the `DumpServer` builder, covering worker counts,
//! session limits, binding behaviour and method chaining.

use std::time::Duration;

use rstest::rstest;

use super::*;
use crate::{
    codec::DEFAULT_MAX_PAYLOAD_LEN,
    server::{
        DEFAULT_IDLE_TIMEOUT,
        test_util::{free_listener, listener_addr, sink},
    },
    sink::MemorySink,
};

fn expected_default_worker_count() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

#[rstest]
fn new_server_uses_defaults(sink: MemorySink) {
    let server = DumpServer::new(sink);
    assert_eq!(server.worker_count(), expected_default_worker_count());
    assert!(server.local_addr().is_none());
    assert_eq!(
        server.session_config(),
        SessionConfig {
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
        }
    );
    assert_eq!(server.connection_limit(), None);
    assert_eq!(server.backoff(), BackoffConfig::default());
}

#[rstest]
fn workers_are_clamped_to_one(sink: MemorySink) {
    let server = DumpServer::new(sink).workers(4);
    assert_eq!(server.worker_count(), 4);
    assert_eq!(server.workers(0).worker_count(), 1);
}

#[rstest]
fn session_limits_chain(sink: MemorySink) {
    let server = DumpServer::new(sink)
        .idle_timeout(None)
        .max_payload_len(4096)
        .max_connections(Some(0));
    assert_eq!(server.session_config().idle_timeout, None);
    assert_eq!(server.session_config().max_payload_len, 4096);
    assert_eq!(server.connection_limit(), Some(1));
}

#[rstest]
fn accept_backoff_is_normalized(sink: MemorySink) {
    let server = DumpServer::new(sink).accept_backoff(BackoffConfig {
        initial_delay: Duration::from_millis(50),
        max_delay: Duration::ZERO,
    });
    assert_eq!(server.backoff().initial_delay, Duration::from_millis(1));
    assert_eq!(server.backoff().max_delay, Duration::from_millis(50));
}

#[rstest]
#[tokio::test]
async fn bind_existing_listener_keeps_address(sink: MemorySink, free_listener: StdTcpListener) {
    let expected = listener_addr(&free_listener);
    let server = DumpServer::new(sink)
        .workers(2)
        .bind_existing_listener(free_listener)
        .expect("Failed to bind");
    assert_eq!(server.local_addr(), Some(expected));
    assert_eq!(server.worker_count(), 2, "builder state survives binding");
}

#[rstest]
#[tokio::test]
async fn bind_reports_address_in_use(sink: MemorySink, free_listener: StdTcpListener) {
    let taken = listener_addr(&free_listener);
    let err = DumpServer::new(sink)
        .bind(taken)
        .err()
        .expect("address already bound");
    assert!(matches!(err, ServerError::Bind(_)));
}

#[rstest]
fn shared_sink_is_not_copied() {
    let shared = Arc::new(MemorySink::new());
    let server = DumpServer::with_shared_sink(Arc::clone(&shared));
    assert!(Arc::ptr_eq(server.sink(), &shared));
}
