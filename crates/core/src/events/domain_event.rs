//! Domain event types.

use serde::{Deserialize, Serialize};

/// Domain events emitted after successful mutations.
///
/// These events represent facts about domain data changes. The server's
/// queue worker translates them into follow-up work (initial sync after a
/// new connection, cache refresh after account changes).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A new institution connection was established via a provider callback.
    ConnectionEstablished {
        institution_connection_id: String,
        user_id: String,
        provider: String,
    },

    /// Accounts were created, updated, or deleted.
    AccountsChanged { account_ids: Vec<String> },

    /// Transactions were created, updated, or deleted.
    TransactionsChanged { account_ids: Vec<String> },
}

impl DomainEvent {
    pub fn connection_established(
        institution_connection_id: String,
        user_id: String,
        provider: String,
    ) -> Self {
        Self::ConnectionEstablished {
            institution_connection_id,
            user_id,
            provider,
        }
    }

    pub fn accounts_changed(account_ids: Vec<String>) -> Self {
        Self::AccountsChanged { account_ids }
    }

    pub fn transactions_changed(account_ids: Vec<String>) -> Self {
        Self::TransactionsChanged { account_ids }
    }
}
