//! Bank integration module
//!
//! This module provides the bank-side collaborator of the sync: the `BankSource` seam, the
//! account and transaction types it yields, the `ChallengeProvider` used for PIN and TAN
//! entry, and a FinTS 3.0 PIN/TAN implementation of the source.

/// PIN and TAN prompting
pub mod challenge;
/// FinTS 3.0 PIN/TAN client
pub mod fints;
/// The `BankSource` trait
mod source;
/// Account and transaction types
mod types;

pub use challenge::{ChallengeProvider, TanChallenge, TanMechanism, TerminalChallenge};
pub use fints::{FinTsClient, FinTsConfig};
pub use source::BankSource;
pub use types::*;
