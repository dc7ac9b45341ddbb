//! Shared test helpers for tracker integration tests.
//!
//! Note: We use `helpers/mod.rs` instead of `helpers.rs` because Cargo
//! auto-discovers top-level `.rs` files in `tests/` as integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use conflict_tracker::{
    ConflictScanner, DocumentKey, ScanError, ScanObserver, ScanPhase, ScanResult, TextSnapshot,
    TrackedDocument,
};
use url::Url;

/// A conflict found by [`FakeScanner`]: the 0-based line of its `<<<<<<<` marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictMarker {
    pub start_line: usize,
}

/// Scanner that finds `<<<<<<<` lines and counts how often it is called.
#[derive(Default)]
pub struct FakeScanner {
    prechecks: AtomicUsize,
    scans: AtomicUsize,
    failure: Option<String>,
    scan_delay: Option<Duration>,
    panics: bool,
}

impl FakeScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every scan fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// The precheck panics instead of returning.
    pub fn panicking() -> Self {
        Self {
            panics: true,
            ..Self::default()
        }
    }

    /// Every scan takes `delay` of (tokio) time.
    pub fn slow(delay: Duration) -> Self {
        Self {
            scan_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn precheck_calls(&self) -> usize {
        self.prechecks.load(Ordering::SeqCst)
    }

    pub fn scan_calls(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }
}

impl ConflictScanner for FakeScanner {
    type Document = TextSnapshot;
    type Region = ConflictMarker;

    async fn may_contain_conflict(&self, document: &TextSnapshot) -> ScanResult<bool> {
        self.prechecks.fetch_add(1, Ordering::SeqCst);
        if self.panics {
            panic!("precheck blew up");
        }
        Ok(document.text().contains("<<<<<<<"))
    }

    async fn scan(&self, document: &TextSnapshot) -> ScanResult<Vec<ConflictMarker>> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.scan_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.failure {
            return Err(ScanError::new(message.clone()));
        }

        Ok(document
            .text()
            .lines()
            .enumerate()
            .filter(|(_, line)| line.starts_with("<<<<<<<"))
            .map(|(start_line, _)| ConflictMarker { start_line })
            .collect())
    }
}

/// Observer that keeps every recorded phase.
#[derive(Default)]
pub struct RecordingObserver {
    pub records: Mutex<Vec<(Option<String>, ScanPhase)>>,
}

impl ScanObserver for RecordingObserver {
    fn record(&self, key: Option<&DocumentKey>, phase: ScanPhase, _elapsed: Duration) {
        self.records
            .lock()
            .unwrap()
            .push((key.map(|k| k.as_str().to_string()), phase));
    }
}

pub const CONFLICTED: &str = "\
fn main() {
<<<<<<< HEAD
    println!(\"ours\");
=======
    println!(\"theirs\");
>>>>>>> feature
}
";

pub const CLEAN: &str = "fn main() {}\n";

pub fn file_uri(name: &str) -> Url {
    Url::parse(&format!("file:///{}", name)).unwrap()
}

pub fn doc(name: &str, text: &str) -> Arc<TextSnapshot> {
    Arc::new(TextSnapshot::new(file_uri(name), text))
}

pub fn untitled(text: &str) -> Arc<TextSnapshot> {
    Arc::new(TextSnapshot::untitled(text))
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
