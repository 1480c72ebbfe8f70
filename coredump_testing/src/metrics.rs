//! Capture metrics emitted on the current thread.

use coredump_recv::metrics::{ERRORS_TOTAL, FRAMES_PROCESSED, SESSIONS_TOTAL};
use metrics::LocalRecorderGuard;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use rstest::fixture;

/// Records metrics emitted on the current thread while alive.
///
/// Pair with a current-thread runtime so every task of the code under test
/// reports to this recorder.
pub struct MetricsCapture {
    snapshotter: Snapshotter,
    _guard: LocalRecorderGuard<'static>,
}

impl MetricsCapture {
    /// Install a fresh debugging recorder for the current thread.
    #[must_use]
    pub fn install() -> Self {
        // Leaked so the guard can be stored next to the snapshotter.
        let recorder: &'static DebuggingRecorder = Box::leak(Box::new(DebuggingRecorder::new()));
        let snapshotter = recorder.snapshotter();
        let guard = metrics::set_default_local_recorder(recorder);
        Self {
            snapshotter,
            _guard: guard,
        }
    }

    /// Take the counters recorded so far.
    ///
    /// Reading a counter resets it to zero in the recorder, so take one
    /// snapshot per phase of a test and query that.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters = self
            .snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter_map(|(key, _, _, value)| match value {
                DebugValue::Counter(count) => {
                    let labels = key
                        .key()
                        .labels()
                        .map(|l| (l.key().to_owned(), l.value().to_owned()))
                        .collect();
                    Some(CounterSeries {
                        name: key.key().name().to_owned(),
                        labels,
                        count,
                    })
                }
                _ => None,
            })
            .collect();
        MetricsSnapshot { counters }
    }
}

struct CounterSeries {
    name: String,
    labels: Vec<(String, String)>,
    count: u64,
}

/// Counter values read from a [`MetricsCapture`] at one point in time.
pub struct MetricsSnapshot {
    counters: Vec<CounterSeries>,
}

impl MetricsSnapshot {
    /// Sum of counter `name` over series carrying the label `key=value`.
    ///
    /// Passing `None` sums every series of the counter.
    #[must_use]
    pub fn counter(&self, name: &str, label: Option<(&str, &str)>) -> u64 {
        self.counters
            .iter()
            .filter(|series| series.name == name)
            .filter(|series| {
                label.is_none_or(|(k, v)| series.labels.iter().any(|(lk, lv)| lk == k && lv == v))
            })
            .map(|series| series.count)
            .sum()
    }

    /// Number of decoded frames of kind `kind`.
    #[must_use]
    pub fn frames(&self, kind: &str) -> u64 { self.counter(FRAMES_PROCESSED, Some(("kind", kind))) }

    /// Number of sessions that ended with `outcome`.
    #[must_use]
    pub fn sessions(&self, outcome: &str) -> u64 {
        self.counter(SESSIONS_TOTAL, Some(("outcome", outcome)))
    }

    /// Number of errors of category `error_type`.
    #[must_use]
    pub fn errors(&self, error_type: &str) -> u64 {
        self.counter(ERRORS_TOTAL, Some(("type", error_type)))
    }
}

#[allow(
    unused_braces,
    reason = "rustc false positive for single line rstest fixtures"
)]
#[fixture]
pub fn metrics_capture() -> MetricsCapture { MetricsCapture::install() }
