//! Lookup from IBAN to ledger account.
//!
//! The directory is built once per run from the ledger's asset account listing and is read-only
//! afterwards: the map is private and no method takes `&mut self`.

use crate::ledger::{LedgerAccount, LedgerAccountId, LedgerError, LedgerService};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tracing::{debug, warn};

/// Immutable IBAN → ledger account id map.
#[derive(Debug, Clone, Default)]
pub struct AccountDirectory {
    accounts: HashMap<String, LedgerAccountId>,
}

impl AccountDirectory {
    /// Build the directory from a ledger account listing.
    ///
    /// Accounts without an IBAN are left out. If two accounts share an IBAN, the first one in
    /// listing order is kept.
    pub fn build(ledger_accounts: &[LedgerAccount]) -> Self {
        let mut accounts = HashMap::with_capacity(ledger_accounts.len());

        for account in ledger_accounts {
            let Some(iban) = account.iban.as_deref().map(normalize).filter(|k| !k.is_empty()) else {
                debug!("Ledger account {} ({}) has no IBAN", account.id, account.name);
                continue;
            };
            match accounts.entry(iban) {
                Entry::Vacant(slot) => {
                    slot.insert(account.id.clone());
                }
                Entry::Occupied(existing) => warn!(
                    "Ledger accounts {} and {} share IBAN {}, using {}",
                    existing.get(),
                    account.id,
                    existing.key(),
                    existing.get()
                ),
            }
        }

        Self { accounts }
    }

    /// List the ledger's asset accounts and build the directory from them.
    pub async fn load(ledger: &dyn LedgerService) -> Result<Self, LedgerError> {
        let accounts = ledger.list_asset_accounts().await?;
        let directory = Self::build(&accounts);
        debug!(
            "Account directory holds {} of {} ledger accounts",
            directory.len(),
            accounts.len()
        );
        Ok(directory)
    }

    /// Ledger account id for `iban`, if the ledger knows the account.
    pub fn lookup(&self, iban: &str) -> Option<&LedgerAccountId> {
        self.accounts.get(&normalize(iban))
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

/// Strip whitespace and upper-case, so `de02 1203...` and `DE021203...` match.
fn normalize(iban: &str) -> String {
    iban.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}
