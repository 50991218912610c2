//! Error taxonomy for the reconciliation pass.
//!
//! Only two conditions are errors at the pass boundary: a refused
//! concurrent pass and a persistence failure while loading the live pool.
//! Everything else (feed outages, unmatched fixtures, rejected candidates,
//! stale bindings) is a recorded outcome on the `SyncReport` and never
//! aborts processing of the remaining fixtures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A pass is already running; overlapping passes are not safe.
    #[error("reconciliation pass already in progress")]
    SyncInProgress,

    /// The game store failed before any fixture was processed.
    #[error("persistence failure: {0}")]
    PersistenceFailure(#[from] anyhow::Error),
}
