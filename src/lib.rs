#![doc(html_root_url = "https://docs.rs/coredump_recv/latest")]
//! Public API for the `coredump_recv` library.
//!
//! Embedded devices stream crash dumps over a plain TCP connection as a
//! sequence of fixed-header frames: one start frame, any number of transfer
//! frames carrying payload, and an end frame. This crate decodes that stream,
//! reassembles the payload across arbitrary read boundaries and stores one
//! output per dump.
//!
//! - [`codec`] turns bytes into [`frame::Frame`]s and back.
//! - [`reassembler`] runs the per-connection session state machine.
//! - [`server`] accepts connections and runs one session per connection.
//! - [`sink`] stores dump payloads.
//! - [`client`] replays dumps to a receiver.

pub mod byte_order;
pub mod client;
pub mod codec;
pub mod frame;
pub mod metrics;
pub mod panic;
pub mod reassembler;
pub mod server;
pub mod sink;

pub use client::{DumpSender, SendError};
pub use codec::{CodecError, DumpFrameCodec};
pub use frame::{DeviceId, FirmwareVersion, Frame, FrameKind};
pub use metrics::{CONNECTIONS_ACTIVE, ERRORS_TOTAL, FRAMES_PROCESSED, SESSIONS_TOTAL};
pub use reassembler::{Reassembler, SessionError, SessionOutcome, SessionState};
pub use server::{DumpServer, ServerError};
pub use sink::{FsSink, MemorySink, Sink};
