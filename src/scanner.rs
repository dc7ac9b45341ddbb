//! The conflict-scanning collaborator.
//!
//! Parsing conflict markers is the host's business. The tracker only calls the
//! cheap precheck and, when it passes, the full scan.

use std::future::Future;

use crate::document::TrackedDocument;
use crate::error::ScanError;

/// Result type returned by [`ConflictScanner::scan`].
pub type ScanResult<T> = Result<T, ScanError>;

/// Finds merge-conflict regions in a document.
///
/// Both methods may be implemented with `async fn`; synchronous scanners simply
/// never await.
pub trait ConflictScanner: Send + Sync + 'static {
    /// Document type the scanner understands.
    type Document: TrackedDocument;

    /// One conflict region. Opaque to the tracker, which only transports lists of them.
    type Region: Clone + Send + 'static;

    /// Cheap textual test. `false` means the document cannot contain a conflict.
    fn may_contain_conflict(
        &self,
        document: &Self::Document,
    ) -> impl Future<Output = ScanResult<bool>> + Send;

    /// Full structural scan. Only called after the precheck returned `true`.
    fn scan(
        &self,
        document: &Self::Document,
    ) -> impl Future<Output = ScanResult<Vec<Self::Region>>> + Send;
}
