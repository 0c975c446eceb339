//! Transaction service: locked-field enforcement and balance rollup.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::transactions_model::{NewTransaction, Transaction, TransactionUpdate};
use super::transactions_traits::{TransactionRepositoryTrait, TransactionServiceTrait};
use crate::accounts::AccountRepositoryTrait;
use crate::errors::Result;

/// Service for manual transaction CRUD.
///
/// Manual accounts keep their cached `value` as a rollup of transaction
/// deltas; synced accounts take their balance from the provider, so mutations
/// against them apply a zero delta.
pub struct TransactionService {
    transactions: Arc<dyn TransactionRepositoryTrait>,
    accounts: Arc<dyn AccountRepositoryTrait>,
}

impl TransactionService {
    pub fn new(
        transactions: Arc<dyn TransactionRepositoryTrait>,
        accounts: Arc<dyn AccountRepositoryTrait>,
    ) -> Self {
        Self {
            transactions,
            accounts,
        }
    }

    fn rollup_delta(&self, account_id: &str, delta: Decimal) -> Result<Decimal> {
        let account = self.accounts.get_by_id(account_id)?;
        if account.is_synced() {
            Ok(Decimal::ZERO)
        } else {
            Ok(delta)
        }
    }
}

#[async_trait]
impl TransactionServiceTrait for TransactionService {
    async fn create_transaction(&self, new_transaction: NewTransaction) -> Result<Transaction> {
        new_transaction.validate()?;
        let delta = self.rollup_delta(&new_transaction.account_id, new_transaction.amount)?;
        self.transactions
            .create_with_rollup(new_transaction, delta)
            .await
    }

    async fn update_transaction(&self, update: TransactionUpdate) -> Result<Transaction> {
        let existing = self.transactions.get_by_id(&update.id)?;
        existing
            .locked_attributes
            .ensure_unlocked(&update.touched_fields())?;

        let delta = match update.amount {
            Some(new_amount) => {
                self.rollup_delta(&existing.account_id, new_amount - existing.amount)?
            }
            None => Decimal::ZERO,
        };
        self.transactions.update_with_rollup(update, delta).await
    }

    async fn delete_transaction(&self, transaction_id: &str) -> Result<()> {
        let existing = self.transactions.get_by_id(transaction_id)?;
        let delta = self.rollup_delta(&existing.account_id, -existing.amount)?;
        self.transactions
            .delete_with_rollup(transaction_id, delta)
            .await?;
        Ok(())
    }

    fn list_transactions(&self, account_id: &str) -> Result<Vec<Transaction>> {
        self.transactions.list_by_account(account_id)
    }
}
