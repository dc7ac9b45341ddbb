//! Debounced, per-document merge-conflict lookup.
//!
//! Editors ask "where are the conflict regions in this document?" on nearly every
//! keystroke. [`ConflictTracker`] coalesces those bursts so the underlying
//! [`ConflictScanner`] runs once per quiet period per document, and every caller
//! in the burst receives the same answer.

pub mod config;
pub mod delayer;
pub mod document;
pub mod error;
pub mod observer;
pub mod scanner;
pub mod tracker;

pub use config::TrackerSettings;
pub use delayer::Delayer;
pub use document::{DocumentKey, TextSnapshot, TrackedDocument};
pub use error::{ScanError, TrackerError, TrackerResult};
pub use observer::{LogObserver, ScanObserver, ScanPhase};
pub use scanner::{ConflictScanner, ScanResult};
pub use tracker::ConflictTracker;
