//! Types for the Firefly III REST API: asset accounts, transaction splits and errors

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier the ledger assigns to an account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerAccountId(pub String);

impl LedgerAccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LedgerAccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Asset account as listed by the ledger.
///
/// Only the id and the IBAN matter for matching; the name is carried for log output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerAccount {
    /// Identifier assigned by the ledger.
    pub id: LedgerAccountId,
    /// Display name of the account.
    pub name: String,
    /// IBAN of the account, if one was configured in the ledger.
    pub iban: Option<String>,
}

/// Kind of ledger transaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money arriving from an account unknown to the ledger
    Deposit,
    /// Money leaving to an account unknown to the ledger
    Withdrawal,
    /// Money moving between two accounts known to the ledger
    Transfer,
}

/// One side of a ledger transaction.
///
/// Known accounts are referenced by id, everything else by free-text name, so exactly
/// one of `*_id` / `*_name` ends up on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Id(LedgerAccountId),
    Name(String),
}

impl Endpoint {
    pub fn id(&self) -> Option<&LedgerAccountId> {
        match self {
            Endpoint::Id(id) => Some(id),
            Endpoint::Name(_) => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Endpoint::Id(_) => None,
            Endpoint::Name(name) => Some(name),
        }
    }

    fn split(&self) -> (Option<LedgerAccountId>, Option<String>) {
        match self {
            Endpoint::Id(id) => (Some(id.clone()), None),
            Endpoint::Name(name) => (None, Some(name.clone())),
        }
    }
}

/// Normalized ledger record produced from a bank transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTransactionRecord {
    /// Absolute amount as a decimal string in the currency's precision.
    pub amount: String,
    /// Value date of the bank transaction.
    pub date: NaiveDate,
    pub description: String,
    pub transaction_type: TransactionType,
    pub source: Endpoint,
    pub destination: Endpoint,
}

impl LedgerTransactionRecord {
    pub fn source_id(&self) -> Option<&LedgerAccountId> {
        self.source.id()
    }

    pub fn source_name(&self) -> Option<&str> {
        self.source.name()
    }

    pub fn destination_id(&self) -> Option<&LedgerAccountId> {
        self.destination.id()
    }

    pub fn destination_name(&self) -> Option<&str> {
        self.destination.name()
    }

    /// Flatten the record into the split shape the store endpoint expects.
    pub fn to_split(&self) -> TransactionSplit {
        let (source_id, source_name) = self.source.split();
        let (destination_id, destination_name) = self.destination.split();
        TransactionSplit {
            transaction_type: self.transaction_type,
            date: self.date,
            amount: self.amount.clone(),
            description: self.description.clone(),
            source_id,
            source_name,
            destination_id,
            destination_name,
        }
    }
}

/// A single split as sent to `POST /api/v1/transactions`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionSplit {
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub date: NaiveDate,
    pub amount: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<LedgerAccountId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_id: Option<LedgerAccountId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_name: Option<String>,
}

/// Request body for storing a transaction group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreTransactionRequest {
    /// Ask the ledger to refuse records whose content hash already exists.
    pub error_if_duplicate_hash: bool,
    pub transactions: Vec<TransactionSplit>,
}

impl StoreTransactionRequest {
    /// Single-split request with duplicate detection enabled.
    pub fn deduplicated(record: &LedgerTransactionRecord) -> Self {
        Self {
            error_if_duplicate_hash: true,
            transactions: vec![record.to_split()],
        }
    }
}

/// Identifier of a transaction group created by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerTransactionId(pub String);

impl fmt::Display for LedgerTransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `GET /api/v1/accounts` page.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AccountPage {
    pub data: Vec<AccountResource>,
    #[serde(default)]
    pub meta: Option<PageMeta>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AccountResource {
    pub id: String,
    pub attributes: AccountAttributes,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AccountAttributes {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub iban: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PageMeta {
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
}

impl From<AccountResource> for LedgerAccount {
    fn from(resource: AccountResource) -> Self {
        Self {
            id: LedgerAccountId(resource.id),
            name: resource.attributes.name,
            iban: resource.attributes.iban.filter(|iban| !iban.trim().is_empty()),
        }
    }
}

/// `POST /api/v1/transactions` success body.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StoredTransactionGroup {
    pub data: StoredTransactionData,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StoredTransactionData {
    pub id: String,
}

/// Error body returned with a 422 status.
///
/// Firefly reports validation problems as a map of field names to messages, while the
/// JSON:API flavour uses a list of `{ "detail": ... }` objects. Both are accepted.
#[derive(Debug, Clone, Deserialize, Default)]
pub(crate) struct ValidationErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Option<serde_json::Value>,
}

impl ValidationErrorBody {
    /// Error detail strings in the order the ledger reported them.
    pub fn details(&self) -> Vec<String> {
        let mut details = Vec::new();
        match &self.errors {
            Some(serde_json::Value::Array(items)) => {
                for item in items {
                    if let Some(detail) = item.get("detail").and_then(|d| d.as_str()) {
                        details.push(detail.to_string());
                    } else if let Some(text) = item.as_str() {
                        details.push(text.to_string());
                    }
                }
            }
            Some(serde_json::Value::Object(fields)) => {
                for messages in fields.values() {
                    match messages {
                        serde_json::Value::Array(list) => details.extend(
                            list.iter()
                                .filter_map(|m| m.as_str())
                                .map(str::to_string),
                        ),
                        serde_json::Value::String(text) => details.push(text.clone()),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
        if details.is_empty() {
            if let Some(message) = &self.message {
                details.push(message.clone());
            }
        }
        details
    }
}

/// Error types for ledger operations
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The ledger refused the record (duplicate hash or validation failure).
    #[error("Rejected by ledger: {}", .details.first().map(String::as_str).unwrap_or("no details"))]
    Rejected { details: Vec<String> },

    #[error("Unexpected HTTP status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid ledger URL: {0}")]
    UrlError(#[from] url::ParseError),
}
