//! Progress-callback trait for per-row stamping events.
//!
//! Inject an [`Arc<dyn StampProgressCallback>`] via
//! [`crate::config::StampConfigBuilder::progress_callback`] to receive events
//! as the batch driver works through the table.
//!
//! # Example
//!
//! ```rust
//! use pdf_codestamp::{StampConfig, StampProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     inserted: AtomicUsize,
//! }
//!
//! impl StampProgressCallback for CountingCallback {
//!     fn on_row_inserted(&self, line: usize, page_name: &str, text: &str) {
//!         self.inserted.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("line {line}: page {page_name} ← {text}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { inserted: AtomicUsize::new(0) });
//!
//! let config = StampConfig::builder()
//!     .progress_callback(counter as Arc<dyn StampProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch driver as it processes each row.
///
/// Rows are processed in table order on a single thread, but the pass itself
/// may run on a blocking worker thread, hence `Send + Sync`. All methods have
/// default no-op implementations.
pub trait StampProgressCallback: Send + Sync {
    /// Called once the document is open, before the first row.
    ///
    /// # Arguments
    /// * `total_rows`: data rows that will be attempted (after grouping)
    fn on_batch_start(&self, total_rows: usize) {
        let _ = total_rows;
    }

    /// Called before a row is parsed.
    ///
    /// # Arguments
    /// * `index`: 1-indexed position of the row in the batch
    /// * `total_rows`: rows in the batch
    fn on_row_start(&self, index: usize, total_rows: usize) {
        let _ = (index, total_rows);
    }

    /// Called after an annotation has been placed.
    fn on_row_inserted(&self, line: usize, page_name: &str, text: &str) {
        let _ = (line, page_name, text);
    }

    /// Called when a row is skipped (bad page reference, missing field,
    /// page not found).
    fn on_row_skipped(&self, line: usize, reason: &str) {
        let _ = (line, reason);
    }

    /// Called when placement on a resolved page failed.
    fn on_row_failed(&self, line: usize, error: &str) {
        let _ = (line, error);
    }

    /// Called once after every row has been attempted, before export.
    fn on_batch_complete(&self, inserted: usize, skipped: usize, failed: usize) {
        let _ = (inserted, skipped, failed);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl StampProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::StampConfig`].
pub type ProgressCallback = Arc<dyn StampProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        total: AtomicUsize,
        starts: AtomicUsize,
        inserted: AtomicUsize,
        skipped: AtomicUsize,
        failed: AtomicUsize,
        completed_inserted: AtomicUsize,
    }

    impl StampProgressCallback for TrackingCallback {
        fn on_batch_start(&self, total_rows: usize) {
            self.total.store(total_rows, Ordering::SeqCst);
        }

        fn on_row_start(&self, _index: usize, _total_rows: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_row_inserted(&self, _line: usize, _page_name: &str, _text: &str) {
            self.inserted.fetch_add(1, Ordering::SeqCst);
        }

        fn on_row_skipped(&self, _line: usize, _reason: &str) {
            self.skipped.fetch_add(1, Ordering::SeqCst);
        }

        fn on_row_failed(&self, _line: usize, _error: &str) {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_complete(&self, inserted: usize, _skipped: usize, _failed: usize) {
            self.completed_inserted.store(inserted, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(5);
        cb.on_row_start(1, 5);
        cb.on_row_inserted(2, "3", "L.8.1");
        cb.on_row_skipped(3, "page 99 not found");
        cb.on_row_failed(4, "region rejected");
        cb.on_batch_complete(1, 1, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_batch_start(3);
        assert_eq!(tracker.total.load(Ordering::SeqCst), 3);

        tracker.on_row_start(1, 3);
        tracker.on_row_inserted(2, "3", "L.8.1");
        tracker.on_row_start(2, 3);
        tracker.on_row_skipped(3, "invalid page reference");
        tracker.on_row_start(3, 3);
        tracker.on_row_failed(4, "contents rejected");

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.inserted.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.skipped.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.failed.load(Ordering::SeqCst), 1);

        tracker.on_batch_complete(1, 1, 1);
        assert_eq!(tracker.completed_inserted.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(10);
        cb.on_row_start(1, 10);
        cb.on_batch_complete(0, 0, 0);
    }
}
