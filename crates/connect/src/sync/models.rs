//! Summary shapes returned by sync operations.

use serde::{Deserialize, Serialize};

/// Outcome of syncing one institution connection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConnectionSummary {
    pub accounts_synced: usize,
    /// Accounts whose transaction fetch or rebuild failed; siblings still
    /// completed.
    pub accounts_failed: usize,
    pub transactions_inserted: usize,
}

/// Outcome of a user-triggered refresh of one account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncAccountSummary {
    pub balance_refreshed: bool,
    pub transactions_inserted: usize,
}

impl From<SyncConnectionSummary> for SyncAccountSummary {
    fn from(summary: SyncConnectionSummary) -> Self {
        Self {
            balance_refreshed: summary.accounts_synced > 0,
            transactions_inserted: summary.transactions_inserted,
        }
    }
}

/// Outcome of refreshing a provider's institution catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstitutionSyncSummary {
    pub upserted: usize,
}
