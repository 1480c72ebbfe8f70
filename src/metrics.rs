//! Metric helpers for `coredump_recv`.
//!
//! This module defines metric names and simple helper functions
//! wrapping the [`metrics`](https://docs.rs/metrics) crate. Without the
//! `metrics` feature every helper compiles to a no-op.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

use crate::frame::FrameKind;

/// Name of the gauge tracking active connections.
pub const CONNECTIONS_ACTIVE: &str = "coredump_connections_active";
/// Name of the counter tracking decoded frames, labelled by `kind`.
pub const FRAMES_PROCESSED: &str = "coredump_frames_processed_total";
/// Name of the counter tracking finished sessions, labelled by `outcome`.
pub const SESSIONS_TOTAL: &str = "coredump_sessions_total";
/// Name of the counter tracking error occurrences, labelled by `type`.
pub const ERRORS_TOTAL: &str = "coredump_errors_total";
/// Name of the counter tracking payload bytes handed to the sink.
pub const PAYLOAD_BYTES: &str = "coredump_payload_bytes_total";
/// Name of the counter tracking connection tasks that panicked.
pub const CONNECTION_PANICS: &str = "coredump_connection_panics_total";

/// Increment the active connections gauge.
pub fn inc_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement the active connections gauge.
pub fn dec_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a decoded frame of the given kind.
pub fn inc_frames(kind: FrameKind) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_PROCESSED, "kind" => kind.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = kind;
}

/// Record payload bytes written to a sink.
pub fn add_payload_bytes(len: usize) {
    #[cfg(feature = "metrics")]
    counter!(PAYLOAD_BYTES).increment(len as u64);
    #[cfg(not(feature = "metrics"))]
    let _ = len;
}

/// Record a finished session with the given outcome label.
pub fn inc_sessions(outcome: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(SESSIONS_TOTAL, "outcome" => outcome).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = outcome;
}

/// Record an error occurrence of the given category.
pub fn inc_errors(error_type: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(ERRORS_TOTAL, "type" => error_type).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = error_type;
}

/// Record a connection task that panicked.
pub fn inc_connection_panics() {
    #[cfg(feature = "metrics")]
    counter!(CONNECTION_PANICS).increment(1);
}
