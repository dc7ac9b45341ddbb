//! Timing hooks for the precheck and scan steps.

use std::fmt;
use std::time::Duration;

use crate::document::DocumentKey;

/// Logging target for scan timings.
const LOG_TARGET: &str = "conflict_tracker::timing";

/// Which step of the scan pipeline was timed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanPhase {
    /// The cheap `may_contain_conflict` precheck.
    Precheck,
    /// The full conflict scan.
    Scan,
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanPhase::Precheck => f.write_str("Check document"),
            ScanPhase::Scan => f.write_str("Find conflict regions"),
        }
    }
}

/// Receives elapsed durations of pipeline steps.
///
/// Observers must not influence results; they are called after each step finishes,
/// whether it succeeded or failed.
pub trait ScanObserver: Send + Sync {
    fn record(&self, key: Option<&DocumentKey>, phase: ScanPhase, elapsed: Duration);
}

/// Default observer that writes timings to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl ScanObserver for LogObserver {
    fn record(&self, key: Option<&DocumentKey>, phase: ScanPhase, elapsed: Duration) {
        log::info!(
            target: LOG_TARGET,
            "{} -> {} execution time: {:.3}ms",
            key.map(DocumentKey::as_str).unwrap_or("<untitled>"),
            phase,
            elapsed.as_secs_f64() * 1000.0
        );
    }
}
