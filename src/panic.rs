//! Readable panic payloads for session task diagnostics.

use std::{any::Any, fmt};

/// Panic payload that renders its message when displayed.
///
/// `String` and `&'static str` payloads (everything `panic!` produces) are
/// shown verbatim; other payloads fall back to `Debug`.
///
/// ```
/// use coredump_recv::panic::format_panic;
/// assert_eq!(format_panic(Box::new("boom")).to_string(), "boom");
/// assert!(format_panic(Box::new(5_u32)).to_string().contains("Any"));
/// ```
#[derive(Debug)]
#[must_use]
pub struct PanicMessage(Box<dyn Any + Send>);

impl PanicMessage {
    /// The panic message, if the payload is textual.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.0
            .downcast_ref::<String>()
            .map(String::as_str)
            .or_else(|| self.0.downcast_ref::<&'static str>().copied())
    }
}

impl fmt::Display for PanicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(msg) => f.write_str(msg),
            None => write!(f, "{:?}", self.0),
        }
    }
}

/// Wrap a payload caught from a panicking session task.
pub fn format_panic(panic: Box<dyn Any + Send>) -> PanicMessage { PanicMessage(panic) }

#[cfg(test)]
mod tests {
    use futures::FutureExt;

    use super::*;

    #[tokio::test]
    async fn formats_payload_caught_from_task() {
        let caught = std::panic::AssertUnwindSafe(async {
            panic!("sink {} exploded", 3);
        })
        .catch_unwind()
        .await
        .expect_err("future panics");

        let msg = format_panic(caught);
        assert_eq!(msg.as_str(), Some("sink 3 exploded"));
        assert_eq!(msg.to_string(), "sink 3 exploded");
    }

    #[test]
    fn non_text_payload_has_no_message() {
        assert_eq!(format_panic(Box::new(7_i64)).as_str(), None);
    }
}
