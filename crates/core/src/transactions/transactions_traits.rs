//! Transaction repository and service traits.

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::transactions_model::{NewTransaction, Transaction, TransactionUpdate};
use crate::errors::Result;

/// Trait defining the contract for Transaction repository operations.
///
/// Manual-account balances are an additive rollup of transaction deltas, so
/// every mutating operation takes the account delta to apply and performs the
/// row write plus the balance adjustment in one database transaction.
#[async_trait]
pub trait TransactionRepositoryTrait: Send + Sync {
    fn get_by_id(&self, transaction_id: &str) -> Result<Transaction>;

    fn list_by_account(&self, account_id: &str) -> Result<Vec<Transaction>>;

    /// Provider transaction ids already stored for an account (non-null only).
    fn list_provider_transaction_ids(&self, account_id: &str) -> Result<Vec<String>>;

    /// Inserts a batch of provider-sourced rows without touching the account
    /// balance (synced balances come from the provider). Returns rows inserted.
    async fn insert_synced_batch(&self, transactions: Vec<NewTransaction>) -> Result<usize>;

    /// Creates a row and adjusts the owning account's value by `account_delta`.
    async fn create_with_rollup(
        &self,
        new_transaction: NewTransaction,
        account_delta: Decimal,
    ) -> Result<Transaction>;

    /// Applies a partial update and adjusts the account's value by `account_delta`.
    async fn update_with_rollup(
        &self,
        update: TransactionUpdate,
        account_delta: Decimal,
    ) -> Result<Transaction>;

    /// Deletes a row and adjusts the account's value by `account_delta`.
    async fn delete_with_rollup(
        &self,
        transaction_id: &str,
        account_delta: Decimal,
    ) -> Result<usize>;
}

/// Trait defining the contract for Transaction service operations.
#[async_trait]
pub trait TransactionServiceTrait: Send + Sync {
    async fn create_transaction(&self, new_transaction: NewTransaction) -> Result<Transaction>;

    async fn update_transaction(&self, update: TransactionUpdate) -> Result<Transaction>;

    async fn delete_transaction(&self, transaction_id: &str) -> Result<()>;

    fn list_transactions(&self, account_id: &str) -> Result<Vec<Transaction>>;
}
