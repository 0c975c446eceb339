//! Account repository implementation.

use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use rust_decimal::Decimal;

use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::DieselErrorExt;
use crate::schema::accounts;
use crate::schema::accounts::dsl::*;

use super::model::AccountDB;
use ledgerlink_core::accounts::{
    Account, AccountClassification, AccountRepositoryTrait, AccountSubtype, AccountUpdate,
    BrokerageParentUpdate, NewAccount,
};
use ledgerlink_core::errors::Result;

/// Repository for managing account data in the database.
pub struct AccountRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl AccountRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl AccountRepositoryTrait for AccountRepository {
    async fn create(&self, new_account: NewAccount) -> Result<Account> {
        new_account.validate()?;
        self.writer
            .exec(move |conn| {
                let account_db: AccountDB = new_account.into();
                diesel::insert_into(accounts::table)
                    .values(&account_db)
                    .execute(conn)
                    .map_err(|e| e.into_core_error())?;
                Ok(account_db.into())
            })
            .await
    }

    async fn update(&self, update: AccountUpdate) -> Result<Account> {
        self.writer
            .exec(move |conn| {
                let mut account_db = accounts
                    .select(AccountDB::as_select())
                    .find(&update.id)
                    .first::<AccountDB>(conn)
                    .map_err(|e| e.into_core_error())?;

                if let Some(new_name) = update.name {
                    account_db.name = new_name;
                }
                if let Some(new_classification) = update.classification {
                    account_db.classification = new_classification.as_str().to_string();
                }
                if let Some(new_subtype) = update.subtype {
                    account_db.subtype = new_subtype.as_str().to_string();
                }
                if let Some(new_currency) = update.currency {
                    account_db.currency = new_currency;
                }
                if let Some(new_value) = update.value {
                    account_db.value = new_value.to_string();
                }
                if let Some(new_cost) = update.cost {
                    account_db.cost = Some(new_cost.to_string());
                }
                if let Some(new_ticker) = update.ticker {
                    account_db.ticker = Some(new_ticker);
                }
                account_db.updated_at = chrono::Utc::now().naive_utc();

                diesel::update(accounts.find(&account_db.id))
                    .set(&account_db)
                    .execute(conn)
                    .map_err(|e| e.into_core_error())?;

                Ok(account_db.into())
            })
            .await
    }

    async fn delete(&self, account_id: &str) -> Result<usize> {
        let id_owned = account_id.to_string();
        self.writer
            .exec(move |conn| {
                diesel::delete(accounts.find(id_owned))
                    .execute(conn)
                    .map_err(|e| e.into_core_error())
            })
            .await
    }

    async fn delete_by_provider_account_id(&self, provider_account: &str) -> Result<usize> {
        let provider_account_owned = provider_account.to_string();
        self.writer
            .exec(move |conn| {
                diesel::delete(
                    accounts.filter(provider_account_id.eq(provider_account_owned)),
                )
                .execute(conn)
                .map_err(|e| e.into_core_error())
            })
            .await
    }

    fn get_by_id(&self, account_id: &str) -> Result<Account> {
        let mut conn = get_connection(&self.pool)?;
        let account = accounts
            .select(AccountDB::as_select())
            .find(account_id)
            .first::<AccountDB>(&mut conn)
            .map_err(|e| e.into_core_error())?;
        Ok(account.into())
    }

    fn list_by_user(&self, user: &str) -> Result<Vec<Account>> {
        let mut conn = get_connection(&self.pool)?;
        let results = accounts
            .filter(user_id.eq(user))
            .select(AccountDB::as_select())
            .order(name.asc())
            .load::<AccountDB>(&mut conn)
            .map_err(|e| e.into_core_error())?;
        Ok(results.into_iter().map(Account::from).collect())
    }

    fn list_by_institution_connection(&self, connection: &str) -> Result<Vec<Account>> {
        let mut conn = get_connection(&self.pool)?;
        let results = accounts
            .filter(institution_connection_id.eq(connection))
            .select(AccountDB::as_select())
            .load::<AccountDB>(&mut conn)
            .map_err(|e| e.into_core_error())?;
        Ok(results.into_iter().map(Account::from).collect())
    }

    async fn update_synced_balance(
        &self,
        account_id: &str,
        new_value: Decimal,
        new_currency: &str,
    ) -> Result<()> {
        let id_owned = account_id.to_string();
        let value_owned = new_value.to_string();
        let currency_owned = new_currency.to_string();
        self.writer
            .exec(move |conn| {
                diesel::update(accounts.find(id_owned))
                    .set((
                        value.eq(value_owned),
                        currency.eq(currency_owned),
                        updated_at.eq(chrono::Utc::now().naive_utc()),
                    ))
                    .execute(conn)
                    .map_err(|e| e.into_core_error())?;
                Ok(())
            })
            .await
    }

    /// Parent update, child teardown, and child inserts run as one writer
    /// job, i.e. inside one immediate transaction.
    async fn replace_brokerage_children(
        &self,
        parent: BrokerageParentUpdate,
        children: Vec<NewAccount>,
    ) -> Result<Account> {
        self.writer
            .exec(move |conn| {
                let mut parent_db = accounts
                    .select(AccountDB::as_select())
                    .find(&parent.account_id)
                    .first::<AccountDB>(conn)
                    .map_err(|e| e.into_core_error())?;

                parent_db.classification =
                    AccountClassification::Asset.as_str().to_string();
                parent_db.subtype = AccountSubtype::Brokerage.as_str().to_string();
                parent_db.currency = parent.currency.clone();
                parent_db.value = parent.value.to_string();
                parent_db.cost = Some(parent.cost.to_string());
                parent_db.parent_id = None;
                parent_db.locked_attributes = Some(parent.locked_attributes.to_json());
                parent_db.updated_at = chrono::Utc::now().naive_utc();
                if let Some(new_name) = parent.name.clone() {
                    parent_db.name = new_name;
                }

                diesel::update(accounts.find(&parent_db.id))
                    .set(&parent_db)
                    .execute(conn)
                    .map_err(|e| e.into_core_error())?;

                diesel::delete(
                    accounts
                        .filter(parent_id.eq(&parent.account_id))
                        .filter(user_id.eq(&parent.user_id)),
                )
                .execute(conn)
                .map_err(|e| e.into_core_error())?;

                for child in children {
                    child.validate()?;
                    let child_db: AccountDB = child.into();
                    diesel::insert_into(accounts::table)
                        .values(&child_db)
                        .execute(conn)
                        .map_err(|e| e.into_core_error())?;
                }

                Ok(parent_db.into())
            })
            .await
    }
}
