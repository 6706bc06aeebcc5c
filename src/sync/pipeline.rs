//! Submission of classified records to the ledger.

use crate::ledger::{
    LedgerError, LedgerService, LedgerTransactionId, LedgerTransactionRecord,
    StoreTransactionRequest,
};
use std::fmt;

/// Result of submitting one record.
#[derive(Debug)]
pub enum SubmissionOutcome {
    /// Stored under the given id.
    Accepted(LedgerTransactionId),
    /// Declined by the ledger, usually because the record is a duplicate.
    Rejected(String),
    /// Any other error: transport, authentication, unexpected status.
    Failed(LedgerError),
}

impl fmt::Display for SubmissionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionOutcome::Accepted(id) => write!(f, "accepted as #{}", id),
            SubmissionOutcome::Rejected(reason) => write!(f, "rejected: {}", reason),
            SubmissionOutcome::Failed(cause) => write!(f, "failed: {}", cause),
        }
    }
}

/// Submits records one at a time with duplicate detection enabled. Nothing is retried.
pub struct SubmissionPipeline<'a> {
    ledger: &'a dyn LedgerService,
}

impl<'a> SubmissionPipeline<'a> {
    pub fn new(ledger: &'a dyn LedgerService) -> Self {
        Self { ledger }
    }

    pub async fn submit(&self, record: &LedgerTransactionRecord) -> SubmissionOutcome {
        let request = StoreTransactionRequest::deduplicated(record);
        match self.ledger.store_transaction(&request).await {
            Ok(id) => SubmissionOutcome::Accepted(id),
            Err(LedgerError::Rejected { details }) => SubmissionOutcome::Rejected(
                details
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| "no reason given".to_string()),
            ),
            Err(e) => SubmissionOutcome::Failed(e),
        }
    }
}
