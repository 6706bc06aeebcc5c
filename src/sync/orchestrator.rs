//! Sync run driver.
//!
//! This module defines the `SyncOrchestrator`, which coordinates one batch run between the bank
//! and the ledger:
//! - builds the `AccountDirectory` from the ledger (failure aborts before the bank is contacted),
//! - opens the bank dialog and lists the bank's accounts,
//! - for every bank account the ledger knows, fetches the transactions of the sync window and
//!   classifies and submits them in bank order,
//! - closes the bank dialog and returns a `SyncReport`.
//!
//! Per-transaction problems are logged and counted, never propagated.

use crate::bank::{BankAccount, BankError, BankSource};
use crate::ledger::{LedgerAccountId, LedgerError, LedgerService};
use crate::sync::{AccountDirectory, SubmissionOutcome, SubmissionPipeline, SyncReport, classify};

use chrono::{Days, NaiveDate};
use tracing::{error, info, warn};

/// Closed date range `[start, end]` to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl SyncWindow {
    /// The last `days` days up to and including `today`.
    pub fn trailing(days: u32, today: NaiveDate) -> Self {
        let start = today
            .checked_sub_days(Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end: today }
    }
}

/// Errors that abort a run
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The ledger account listing could not be retrieved.
    #[error("Setup error: {0}")]
    Setup(#[from] LedgerError),

    /// The bank dialog could not be opened or the bank accounts not listed.
    #[error("Bank error: {0}")]
    Bank(#[from] BankError),
}

/// Drives one sync run.
pub struct SyncOrchestrator<L: LedgerService, B: BankSource> {
    ledger: L,
    bank: B,
}

impl<L: LedgerService, B: BankSource> SyncOrchestrator<L, B> {
    pub fn new(ledger: L, bank: B) -> Self {
        Self { ledger, bank }
    }

    /// Run the sync for `window`.
    pub async fn run(&mut self, window: SyncWindow) -> Result<SyncReport, SyncError> {
        let directory = match AccountDirectory::load(&self.ledger).await {
            Ok(directory) => directory,
            Err(e) => {
                error!("Failed to load ledger accounts: {}", e);
                return Err(SyncError::Setup(e));
            }
        };
        info!("Loaded {} ledger accounts with IBAN", directory.len());

        self.bank.open().await?;
        let result = self.sync_accounts(&directory, window).await;
        if let Err(e) = self.bank.close().await {
            warn!("Failed to close bank dialog: {}", e);
        }

        let report = result?;
        info!("Sync finished: {}", report.summary());
        Ok(report)
    }

    async fn sync_accounts(
        &mut self,
        directory: &AccountDirectory,
        window: SyncWindow,
    ) -> Result<SyncReport, SyncError> {
        let accounts = self.bank.list_accounts().await?;
        let mut report = SyncReport::default();

        for account in &accounts {
            let Some(own_account) = directory.lookup(&account.iban) else {
                warn!("No ledger account with IBAN {}, skipping", account.iban);
                report.accounts_skipped += 1;
                continue;
            };

            info!(
                "Syncing {} into ledger account {} from {} to {}",
                account.iban, own_account, window.start, window.end
            );
            match self.sync_account(account, directory, own_account, window, &mut report).await {
                Ok(()) => report.accounts_synced += 1,
                Err(e) => {
                    error!("Failed to fetch transactions for {}: {}", account.iban, e);
                    report.accounts_failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Fetch, classify and submit the transactions of one account.
    ///
    /// Only the statement fetch can fail; submission outcomes go into `report`.
    async fn sync_account(
        &mut self,
        account: &BankAccount,
        directory: &AccountDirectory,
        own_account: &LedgerAccountId,
        window: SyncWindow,
        report: &mut SyncReport,
    ) -> Result<(), BankError> {
        let transactions = self
            .bank
            .list_transactions(account, window.start, window.end)
            .await?;
        info!("Fetched {} transactions for {}", transactions.len(), account.iban);

        let pipeline = SubmissionPipeline::new(&self.ledger);
        for transaction in &transactions {
            let record = classify(transaction, directory, own_account);
            let outcome = pipeline.submit(&record).await;
            match &outcome {
                SubmissionOutcome::Accepted(id) => {
                    info!("Stored {} as #{}", transaction.summary(), id)
                }
                SubmissionOutcome::Rejected(reason) => {
                    warn!("Ledger rejected {}: {}", transaction.summary(), reason)
                }
                SubmissionOutcome::Failed(e) => {
                    error!("Failed to store {}: {}", transaction.summary(), e)
                }
            }
            report.record_outcome(&outcome);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::{BankTransaction, Direction};
    use crate::ledger::{LedgerAccount, TransactionType};
    use crate::sync::pipeline::tests::FakeLedger;
    use rust_decimal::Decimal;
    use std::collections::HashMap;

    const CHECKING: &str = "DE02120300000000202051";
    const SAVINGS: &str = "DE02500105170137075030";
    const FOREIGN: &str = "DE89370400440532013000";

    /// Bank with canned accounts and statements that records every call.
    #[derive(Default)]
    struct FakeBank {
        accounts: Vec<BankAccount>,
        statements: HashMap<String, Vec<BankTransaction>>,
        failing_statements: Vec<String>,
        fail_open: bool,
        calls: Vec<String>,
    }

    #[async_trait::async_trait]
    impl BankSource for FakeBank {
        async fn open(&mut self) -> Result<(), BankError> {
            self.calls.push("open".to_string());
            if self.fail_open {
                return Err(BankError::BankMessage {
                    code: "9931".to_string(),
                    text: "PIN falsch".to_string(),
                });
            }
            Ok(())
        }

        async fn list_accounts(&mut self) -> Result<Vec<BankAccount>, BankError> {
            self.calls.push("list_accounts".to_string());
            Ok(self.accounts.clone())
        }

        async fn list_transactions(
            &mut self,
            account: &BankAccount,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<BankTransaction>, BankError> {
            self.calls
                .push(format!("list_transactions {} {} {}", account.iban, start, end));
            if self.failing_statements.contains(&account.iban) {
                return Err(BankError::ParseError("bad :61: line".to_string()));
            }
            Ok(self.statements.get(&account.iban).cloned().unwrap_or_default())
        }

        async fn close(&mut self) -> Result<(), BankError> {
            self.calls.push("close".to_string());
            Ok(())
        }
    }

    fn bank_account(iban: &str) -> BankAccount {
        BankAccount {
            iban: iban.to_string(),
            bic: None,
            account_number: iban[12..].to_string(),
            subaccount: None,
            bank_code: iban[4..12].to_string(),
        }
    }

    fn ledger_account(id: &str, iban: &str) -> LedgerAccount {
        LedgerAccount {
            id: LedgerAccountId::new(id),
            name: format!("Account {id}"),
            iban: Some(iban.to_string()),
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).expect("date")
    }

    fn transaction(cents: i64, counterparty: &str, iban: Option<&str>, purpose: &str) -> BankTransaction {
        let direction = if cents < 0 { Direction::Debit } else { Direction::Credit };
        let mut tx = BankTransaction::new(Decimal::new(cents, 2), "EUR", day(14), direction);
        tx.applicant_name = Some(counterparty.to_string());
        tx.applicant_iban = iban.map(str::to_string);
        tx.purpose = Some(purpose.to_string());
        tx
    }

    fn window() -> SyncWindow {
        SyncWindow::trailing(7, day(19))
    }

    fn ledger() -> FakeLedger {
        FakeLedger::with_accounts(vec![
            ledger_account("1", CHECKING),
            ledger_account("7", SAVINGS),
        ])
    }

    #[test]
    fn window_covers_trailing_days() {
        assert_eq!(
            window(),
            SyncWindow {
                start: day(12),
                end: day(19)
            }
        );
        assert_eq!(SyncWindow::trailing(1, day(1)).start, NaiveDate::from_ymd_opt(2026, 9, 30).expect("date"));
    }

    #[tokio::test]
    async fn ledger_outage_aborts_before_bank_contact() {
        let ledger = FakeLedger {
            fail_listing: true,
            ..FakeLedger::default()
        };
        let bank = FakeBank {
            accounts: vec![bank_account(CHECKING)],
            ..FakeBank::default()
        };
        let mut orchestrator = SyncOrchestrator::new(ledger, bank);

        let result = orchestrator.run(window()).await;
        assert!(matches!(result, Err(SyncError::Setup(_))));
        assert_eq!(orchestrator.ledger.attempts(), 0);
        assert!(orchestrator.bank.calls.is_empty());
    }

    #[tokio::test]
    async fn bank_open_failure_aborts_run() {
        let bank = FakeBank {
            fail_open: true,
            ..FakeBank::default()
        };
        let mut orchestrator = SyncOrchestrator::new(ledger(), bank);

        let result = orchestrator.run(window()).await;
        assert!(matches!(result, Err(SyncError::Bank(BankError::BankMessage { .. }))));
        assert_eq!(orchestrator.bank.calls, vec!["open"]);
        assert_eq!(orchestrator.ledger.attempts(), 0);
    }

    #[tokio::test]
    async fn skips_accounts_unknown_to_ledger() {
        let mut statements = HashMap::new();
        statements.insert(
            FOREIGN.to_string(),
            vec![transaction(-1000, "Shop", None, "Einkauf")],
        );
        statements.insert(
            CHECKING.to_string(),
            vec![transaction(-2000, "Landlord", None, "Miete")],
        );
        let bank = FakeBank {
            accounts: vec![bank_account(FOREIGN), bank_account(CHECKING)],
            statements,
            ..FakeBank::default()
        };
        let mut orchestrator = SyncOrchestrator::new(ledger(), bank);

        let report = orchestrator.run(window()).await.expect("run");
        assert_eq!(report.accounts_skipped, 1);
        assert_eq!(report.accounts_synced, 1);
        assert_eq!(report.accepted, 1);
        assert_eq!(
            orchestrator.bank.calls,
            vec![
                "open".to_string(),
                "list_accounts".to_string(),
                format!("list_transactions {} 2026-10-12 2026-10-19", CHECKING),
                "close".to_string(),
            ]
        );

        let stored = orchestrator.ledger.stored();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].destination_name.as_deref(), Some("Landlord"));
        assert_eq!(stored[0].source_id, Some(LedgerAccountId::new("1")));
    }

    #[tokio::test]
    async fn failures_do_not_stop_the_run() {
        let mut statements = HashMap::new();
        statements.insert(
            CHECKING.to_string(),
            vec![
                transaction(-2000, "Landlord", None, "Miete"),
                transaction(-500, "Broken", None, "Explodes"),
                transaction(-10000, "Me", Some(SAVINGS), "Sparen"),
            ],
        );
        statements.insert(
            SAVINGS.to_string(),
            vec![transaction(10000, "Me", Some(CHECKING), "Sparen")],
        );
        let bank = FakeBank {
            accounts: vec![bank_account(SAVINGS), bank_account(FOREIGN), bank_account(CHECKING)],
            statements,
            failing_statements: vec![SAVINGS.to_string()],
            ..FakeBank::default()
        };
        let ledger = FakeLedger {
            failing_descriptions: vec!["Explodes".to_string()],
            ..ledger()
        };
        let mut orchestrator = SyncOrchestrator::new(ledger, bank);

        let report = orchestrator.run(window()).await.expect("run");
        assert_eq!(report.accounts_failed, 1);
        assert_eq!(report.accounts_skipped, 1);
        assert_eq!(report.accounts_synced, 1);
        assert_eq!((report.accepted, report.rejected, report.failed), (2, 0, 1));
        assert!(report.has_failures());
        assert_eq!(orchestrator.bank.calls.last().map(String::as_str), Some("close"));

        let stored = orchestrator.ledger.stored();
        let descriptions: Vec<&str> = stored.iter().map(|s| s.description.as_str()).collect();
        assert_eq!(descriptions, vec!["Miete", "Sparen"]);
        assert_eq!(stored[1].transaction_type, TransactionType::Transfer);
        assert_eq!(stored[1].destination_id, Some(LedgerAccountId::new("7")));
    }

    #[tokio::test]
    async fn rerun_over_same_window_only_rejects() {
        let mut statements = HashMap::new();
        statements.insert(
            CHECKING.to_string(),
            vec![
                transaction(-2000, "Landlord", None, "Miete"),
                transaction(5000, "Employer", None, "Gehalt"),
            ],
        );
        let bank = FakeBank {
            accounts: vec![bank_account(CHECKING)],
            statements,
            ..FakeBank::default()
        };
        let mut orchestrator = SyncOrchestrator::new(ledger(), bank);

        let first = orchestrator.run(window()).await.expect("first run");
        assert_eq!(first.accepted, 2);

        let second = orchestrator.run(window()).await.expect("second run");
        assert_eq!((second.accepted, second.rejected), (0, 2));
        assert!(!second.has_failures());
        assert_eq!(orchestrator.ledger.stored().len(), 2);
    }
}
