//! Durable storage for reassembled dump payloads.
//!
//! A [`Sink`] hands out one writable handle per dump. The reassembler opens a
//! handle lazily on the first payload chunk, appends chunks strictly in arrival
//! order and closes the handle when the dump ends or the connection goes away.
//! Handles are owned by a single session; the sink itself may serve any number
//! of concurrent sessions.
//!
//! Output names derive from [`DumpIdentity`]. Backends must never reuse an
//! existing output: a second dump with the same identity receives a numeric
//! suffix instead of appending to the earlier one.

use std::io;

use async_trait::async_trait;
use chrono::{DateTime, Local};

use crate::frame::{DeviceId, FirmwareVersion};

pub mod fs;
pub mod memory;

pub use fs::{FsHandle, FsSink};
pub use memory::{MemoryHandle, MemorySink};

/// File extension used for dump outputs.
pub const DUMP_EXTENSION: &str = "dump";

/// Upper bound on collision suffixes tried before giving up.
pub(crate) const MAX_NAME_ATTEMPTS: usize = 1024;

/// Identity of a single dump, captured from its start frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DumpIdentity {
    /// Device that produced the dump.
    pub device_id: DeviceId,
    /// Firmware version reported at the start of the dump.
    pub firmware_version: FirmwareVersion,
    /// When the session received its start frame.
    pub started_at: DateTime<Local>,
}

impl DumpIdentity {
    /// Output name without extension or collision suffix.
    ///
    /// Formatted as `<device-hex>_<version>_<YYYY-MM-DD-HH-MM>`.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{Local, TimeZone};
    /// use coredump_recv::{frame::DeviceId, sink::DumpIdentity};
    ///
    /// let identity = DumpIdentity {
    ///     device_id: DeviceId::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]),
    ///     firmware_version: "v2.1.2".parse().expect("version fits"),
    ///     started_at: Local
    ///         .with_ymd_and_hms(2024, 3, 9, 14, 5, 59)
    ///         .single()
    ///         .expect("unambiguous local time"),
    /// };
    /// assert_eq!(identity.file_stem(), "aabbccddeeff_v2.1.2_2024-03-09-14-05");
    /// ```
    #[must_use]
    pub fn file_stem(&self) -> String {
        format!(
            "{}_{}_{}",
            self.device_id.to_hex(),
            self.firmware_version.short_name(),
            self.started_at.format("%Y-%m-%d-%H-%M")
        )
    }

    /// Output name for the `attempt`-th collision candidate.
    ///
    /// Attempt zero is the plain stem; later attempts append `-<n>`.
    #[must_use]
    pub fn candidate_name(&self, attempt: usize) -> String {
        match attempt {
            0 => format!("{}.{DUMP_EXTENSION}", self.file_stem()),
            n => format!("{}-{n}.{DUMP_EXTENSION}", self.file_stem()),
        }
    }
}

/// Storage backend for dump payloads.
///
/// Failures surface as [`io::Error`] and end only the session that hit them.
#[async_trait]
pub trait Sink: Send + Sync + 'static {
    /// Writable handle for one dump.
    type Handle: Send;

    /// Create a new, empty output for `identity`.
    async fn open(&self, identity: &DumpIdentity) -> io::Result<Self::Handle>;

    /// Append `bytes` to the output behind `handle`.
    ///
    /// Bytes from successive calls must land in call order.
    async fn append(&self, handle: &mut Self::Handle, bytes: &[u8]) -> io::Result<()>;

    /// Flush and release `handle`.
    async fn close(&self, handle: Self::Handle) -> io::Result<()>;

    /// Human readable location of the output, used in logs and summaries.
    fn output_name(&self, handle: &Self::Handle) -> String;
}

#[cfg(test)]
mod tests;
