//! Test utilities for `coredump_recv`.
//!
//! Builders for wire-format dumps, helpers that push a byte stream through a
//! [`Reassembler`](coredump_recv::reassembler::Reassembler) with arbitrary
//! chunking, a running-server harness and shared log and metric capture.
//!
//! ```rust
//! use coredump_recv::sink::MemorySink;
//! use coredump_testing::{DumpBuilder, drive_chunked};
//!
//! # async fn example() {
//! let wire = DumpBuilder::default().chunk(b"DEAD").chunk(b"BEEF").build();
//! let sink = MemorySink::new();
//! let outcome = drive_chunked(&sink, &wire, 5).await.unwrap();
//! assert!(outcome.summary().is_some());
//! # }
//! ```

pub mod drive;
pub mod frames;
pub mod harness;
pub mod logging;
pub mod metrics;

pub use drive::{drive_chunked, drive_split_at};
pub use frames::{DumpBuilder, encode_frames, sample_device, sample_version};
pub use harness::{RunningServer, TestResult, eventually, unused_listener};
pub use logging::{LoggerHandle, logger};
pub use metrics::{MetricsCapture, MetricsSnapshot, metrics_capture};
