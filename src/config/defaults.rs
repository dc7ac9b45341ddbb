//! Default configuration values for the conflict tracker.

use std::time::Duration;

/// Default debounce window in milliseconds.
///
/// Short enough for results to feel live while typing, long enough to
/// coalesce a burst of keystrokes into a single scan.
pub const DEFAULT_DEBOUNCE_MS: u64 = 150;

/// [`DEFAULT_DEBOUNCE_MS`] as a `Duration`.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(DEFAULT_DEBOUNCE_MS);
