//! Ledger integration module for Firefly III
//!
//! This module provides the client and types for talking to the personal ledger: listing the
//! asset accounts that bank accounts are matched against, and storing the converted
//! transactions with server-side duplicate detection.

/// REST client and the `LedgerService` seam
mod client;
/// Wire and domain types for ledger data
mod types;

pub use client::{FireflyClient, LedgerService};
pub use types::*;
