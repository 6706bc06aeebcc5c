//! Bank to ledger synchronization
//!
//! This module holds the sync core: the `AccountDirectory` built from the ledger, the pure
//! `classify` step turning bank transactions into ledger records, the `SubmissionPipeline`
//! with its explicit outcome type, and the `SyncOrchestrator` driving a run.

/// Transaction classification
mod classifier;
/// IBAN to ledger account lookup
mod directory;
/// Sync run driver
mod orchestrator;
/// Ledger submission and outcomes
mod pipeline;
/// Run counters
mod report;

pub use classifier::classify;
pub use directory::AccountDirectory;
pub use orchestrator::{SyncError, SyncOrchestrator, SyncWindow};
pub use pipeline::{SubmissionOutcome, SubmissionPipeline};
pub use report::SyncReport;
