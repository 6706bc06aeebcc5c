//! Counters for one sync run.
//!
//! The orchestrator records every account and transaction it handles; the report decides the
//! process exit status and is logged as a one-line summary at the end of the run.

use crate::sync::SubmissionOutcome;

/// What happened during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Bank accounts with a matching ledger account.
    pub accounts_synced: usize,
    /// Bank accounts skipped because the ledger does not know them.
    pub accounts_skipped: usize,
    /// Bank accounts whose statement could not be fetched.
    pub accounts_failed: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub failed: usize,
}

impl SyncReport {
    pub fn record_outcome(&mut self, outcome: &SubmissionOutcome) {
        match outcome {
            SubmissionOutcome::Accepted(_) => self.accepted += 1,
            SubmissionOutcome::Rejected(_) => self.rejected += 1,
            SubmissionOutcome::Failed(_) => self.failed += 1,
        }
    }

    /// Total transactions submitted.
    pub fn submitted(&self) -> usize {
        self.accepted + self.rejected + self.failed
    }

    /// True when something went wrong that a rerun might fix.
    ///
    /// Rejections are expected on overlapping windows and do not count.
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.accounts_failed > 0
    }

    pub fn summary(&self) -> String {
        format!(
            "{} accounts synced ({} skipped, {} failed), {} transactions: {} accepted, {} rejected, {} failed",
            self.accounts_synced,
            self.accounts_skipped,
            self.accounts_failed,
            self.submitted(),
            self.accepted,
            self.rejected,
            self.failed
        )
    }
}
