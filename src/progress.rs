//! Progress-callback trait for per-record reconciliation events.
//!
//! Inject an [`Arc<dyn SyncProgressCallback>`] via
//! [`crate::config::SyncConfigBuilder::progress_callback`] to receive
//! real-time events as the reconciliation loop settles each record.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a Tokio broadcast channel, a database record, or a
//! terminal progress bar — without the library knowing anything about how the
//! host application communicates. The trait is `Send + Sync` because record
//! pipelines complete concurrently.

use crate::sync::RecordOutcome;

/// Called by the reconciliation loop as it settles each record.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// `on_record_done` may be called concurrently from different tasks.
/// Implementations must protect shared mutable state with appropriate
/// synchronisation primitives (e.g. `Mutex`, `AtomicUsize`).
pub trait SyncProgressCallback: Send + Sync {
    /// Called once after the identifier query, before any record is checked.
    ///
    /// # Arguments
    /// * `total_records` — number of records returned by the query
    fn on_reconcile_start(&self, total_records: usize) {
        let _ = total_records;
    }

    /// Called when a record reaches a terminal state.
    ///
    /// # Arguments
    /// * `name`    — the record's image filename
    /// * `outcome` — the terminal state: existing, converted, or failed
    fn on_record_done(&self, name: &str, outcome: &RecordOutcome) {
        let _ = (name, outcome);
    }

    /// Called once after every record outcome has been collected.
    ///
    /// # Arguments
    /// * `total_records` — records attempted this run
    /// * `failed`        — records that ended in a failure outcome
    fn on_reconcile_complete(&self, total_records: usize, failed: usize) {
        let _ = (total_records, failed);
    }
}
