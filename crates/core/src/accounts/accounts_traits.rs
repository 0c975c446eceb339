//! Account repository and service traits.
//!
//! These traits define the contract for account operations without any
//! database-specific types, allowing for different storage implementations.

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::accounts_model::{Account, AccountUpdate, BrokerageParentUpdate, NewAccount};
use crate::errors::Result;

/// Trait defining the contract for Account repository operations.
#[async_trait]
pub trait AccountRepositoryTrait: Send + Sync {
    /// Creates a new account.
    async fn create(&self, new_account: NewAccount) -> Result<Account>;

    /// Applies a partial update. Lock enforcement happens in the service;
    /// the repository writes whatever it is given.
    async fn update(&self, update: AccountUpdate) -> Result<Account>;

    /// Deletes an account by its ID, returning the number of deleted rows.
    async fn delete(&self, account_id: &str) -> Result<usize>;

    /// Deletes a synced account by the provider's account id.
    async fn delete_by_provider_account_id(&self, provider_account_id: &str) -> Result<usize>;

    /// Retrieves an account by its ID.
    fn get_by_id(&self, account_id: &str) -> Result<Account>;

    /// Lists all accounts belonging to a user.
    fn list_by_user(&self, user_id: &str) -> Result<Vec<Account>>;

    /// Lists the synced accounts attached to an institution connection.
    fn list_by_institution_connection(
        &self,
        institution_connection_id: &str,
    ) -> Result<Vec<Account>>;

    /// Overwrites the provider-owned balance of a synced account.
    async fn update_synced_balance(
        &self,
        account_id: &str,
        value: Decimal,
        currency: &str,
    ) -> Result<()>;

    /// Rewrites a brokerage parent and its cash/position children atomically:
    /// update parent, delete all existing children for the same user, insert
    /// the replacement legs. Returns the updated parent.
    async fn replace_brokerage_children(
        &self,
        parent: BrokerageParentUpdate,
        children: Vec<NewAccount>,
    ) -> Result<Account>;
}

/// Trait defining the contract for Account service operations.
#[async_trait]
pub trait AccountServiceTrait: Send + Sync {
    /// Creates a new account with business validation.
    async fn create_account(&self, new_account: NewAccount) -> Result<Account>;

    /// Applies a user-initiated update, rejecting edits to locked fields.
    async fn update_account(&self, update: AccountUpdate) -> Result<Account>;

    /// Deletes an account.
    async fn delete_account(&self, account_id: &str) -> Result<()>;

    /// Retrieves an account by ID.
    fn get_account(&self, account_id: &str) -> Result<Account>;

    /// Lists all accounts belonging to a user.
    fn list_accounts(&self, user_id: &str) -> Result<Vec<Account>>;
}
