use super::types::{BankAccount, BankError, BankTransaction};
use chrono::NaiveDate;

/// Capability the sync needs from a bank.
///
/// `open` must succeed before any data call; it covers authentication and any strong
/// customer authentication challenge.
#[async_trait::async_trait]
pub trait BankSource: Send {
	/// Authenticate and open a data dialog.
	async fn open(&mut self) -> Result<(), BankError>;

	/// List the accounts visible to the user, in bank order.
	async fn list_accounts(&mut self) -> Result<Vec<BankAccount>, BankError>;

	/// List booked transactions for `account` in the closed range `[start, end]`, in bank order.
	async fn list_transactions(
		&mut self,
		account: &BankAccount,
		start: NaiveDate,
		end: NaiveDate,
	) -> Result<Vec<BankTransaction>, BankError>;

	/// End the dialog. Calling it on a closed source is a no-op.
	async fn close(&mut self) -> Result<(), BankError>;
}
