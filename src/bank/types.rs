//! Types for bank-side data: accounts, statement transactions and errors

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::utils::format_amount;

/// SEPA account reported by the bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankAccount {
    /// International account number, used as lookup key against the ledger.
    pub iban: String,
    pub bic: Option<String>,
    /// National account number.
    pub account_number: String,
    pub subaccount: Option<String>,
    /// Bank code (BLZ) of the account holding institution.
    pub bank_code: String,
}

/// Direction of a booked transaction from the account holder's view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Money arrived on the account
    Credit,
    /// Money left the account
    Debit,
}

/// Transaction as booked by the bank.
///
/// Immutable once fetched; the counterparty fields come from the structured purpose
/// field of the statement and may all be missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankTransaction {
    /// Signed amount: negative for debits.
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Value date.
    pub date: NaiveDate,
    /// Booking date, when the bank reports one.
    pub entry_date: Option<NaiveDate>,
    pub direction: Direction,
    /// Counterparty display name.
    pub applicant_name: Option<String>,
    /// Deviating ("on behalf of") counterparty name.
    pub deviate_applicant: Option<String>,
    /// Counterparty IBAN.
    pub applicant_iban: Option<String>,
    /// Counterparty BIC or bank code.
    pub applicant_bin: Option<String>,
    /// Free-text remittance information.
    pub purpose: Option<String>,
    /// Bank's booking text such as "GUTSCHRIFT" or "LASTSCHRIFT".
    pub posting_text: Option<String>,
    pub end_to_end_reference: Option<String>,
    /// Three digit business transaction code.
    pub transaction_code: Option<String>,
}

impl BankTransaction {
    /// Create a transaction with only the booking core set.
    pub fn new(amount: Decimal, currency: impl Into<String>, date: NaiveDate, direction: Direction) -> Self {
        Self {
            amount,
            currency: currency.into(),
            date,
            entry_date: None,
            direction,
            applicant_name: None,
            deviate_applicant: None,
            applicant_iban: None,
            applicant_bin: None,
            purpose: None,
            posting_text: None,
            end_to_end_reference: None,
            transaction_code: None,
        }
    }

    pub fn deviate_applicant(&self) -> Option<&str> {
        non_blank(&self.deviate_applicant)
    }

    pub fn applicant_name(&self) -> Option<&str> {
        non_blank(&self.applicant_name)
    }

    pub fn applicant_iban(&self) -> Option<&str> {
        non_blank(&self.applicant_iban)
    }

    pub fn purpose(&self) -> Option<&str> {
        non_blank(&self.purpose)
    }

    /// Counterparty as shown to people: the deviating applicant, else the applicant.
    pub fn counterparty_name(&self) -> Option<&str> {
        self.deviate_applicant().or_else(|| self.applicant_name())
    }

    /// One-line description for log output, e.g. `-20.00 EUR @ Landlord on 2026-10-12`.
    pub fn summary(&self) -> String {
        format!(
            "{} {} @ {} on {}",
            format_amount(self.amount, &self.currency),
            self.currency,
            self.counterparty_name().unwrap_or("unknown"),
            self.date
        )
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Error types for bank operations
#[derive(Debug, thiserror::Error)]
pub enum BankError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    #[error("Parse error: {0}")]
    ParseError(String),

    /// The bank answered with an error code (9xxx).
    #[error("Bank error {code}: {text}")]
    BankMessage { code: String, text: String },

    #[error("Dialog error: {0}")]
    DialogError(String),

    #[error("Challenge error: {0}")]
    ChallengeError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_prefers_deviating_applicant() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 12).expect("date");
        let mut tx = BankTransaction::new(Decimal::new(-2000, 2), "EUR", date, Direction::Debit);
        tx.applicant_name = Some("Property Mgmt GmbH".to_string());
        assert_eq!(tx.summary(), "-20.00 EUR @ Property Mgmt GmbH on 2026-10-12");

        tx.deviate_applicant = Some("Landlord".to_string());
        assert_eq!(tx.summary(), "-20.00 EUR @ Landlord on 2026-10-12");

        tx.deviate_applicant = Some("  ".to_string());
        assert_eq!(tx.counterparty_name(), Some("Property Mgmt GmbH"));
    }
}
