//! Conversion of bank transactions into ledger records.
//!
//! A transaction becomes a transfer when its counterparty IBAN belongs to an account the
//! ledger knows, otherwise a deposit (credit) or withdrawal (debit) against a named
//! counterparty. The owning account is always referenced by id.

use crate::bank::{BankTransaction, Direction};
use crate::ledger::{Endpoint, LedgerAccountId, LedgerTransactionRecord, TransactionType};
use crate::sync::AccountDirectory;
use crate::utils::format_amount;

/// Classify `transaction`, booked on the ledger account `own_account`.
pub fn classify(
    transaction: &BankTransaction,
    directory: &AccountDirectory,
    own_account: &LedgerAccountId,
) -> LedgerTransactionRecord {
    let amount = format_amount(transaction.amount.abs(), &transaction.currency);
    let description = transaction
        .deviate_applicant()
        .or_else(|| transaction.purpose())
        .unwrap_or_default()
        .to_string();

    let own = Endpoint::Id(own_account.clone());
    let (counterparty, transaction_type) = match transaction
        .applicant_iban()
        .and_then(|iban| directory.lookup(iban))
    {
        Some(id) => (Endpoint::Id(id.clone()), TransactionType::Transfer),
        None => {
            let name = transaction
                .deviate_applicant()
                .or_else(|| transaction.applicant_name())
                .unwrap_or_default()
                .to_string();
            let kind = match transaction.direction {
                Direction::Credit => TransactionType::Deposit,
                Direction::Debit => TransactionType::Withdrawal,
            };
            (Endpoint::Name(name), kind)
        }
    };

    let (source, destination) = match transaction.direction {
        Direction::Credit => (counterparty, own),
        Direction::Debit => (own, counterparty),
    };

    LedgerTransactionRecord {
        amount,
        date: transaction.date,
        description,
        transaction_type,
        source,
        destination,
    }
}
