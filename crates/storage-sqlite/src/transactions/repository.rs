//! Transaction repository implementation.
//!
//! Mutating operations that carry a balance delta apply the row write and
//! the owning account's rollup adjustment in the same writer job, so the
//! pair is atomic.

use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use rust_decimal::Decimal;

use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::DieselErrorExt;
use crate::schema::{accounts, transactions};
use crate::utils::parse_decimal_tolerant;

use super::model::TransactionDB;
use ledgerlink_core::errors::Result;
use ledgerlink_core::transactions::{
    NewTransaction, Transaction, TransactionRepositoryTrait, TransactionUpdate,
};

/// Repository for managing transaction data in the database.
pub struct TransactionRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl TransactionRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

/// Adjusts the cached account value by `delta` inside the caller's transaction.
fn apply_rollup(
    conn: &mut SqliteConnection,
    target_account_id: &str,
    delta: Decimal,
) -> Result<()> {
    if delta.is_zero() {
        return Ok(());
    }
    let current: String = accounts::table
        .find(target_account_id)
        .select(accounts::value)
        .first(conn)
        .map_err(|e| e.into_core_error())?;
    let next = parse_decimal_tolerant(&current, "accounts.value") + delta;
    diesel::update(accounts::table.find(target_account_id))
        .set((
            accounts::value.eq(next.to_string()),
            accounts::updated_at.eq(chrono::Utc::now().naive_utc()),
        ))
        .execute(conn)
        .map_err(|e| e.into_core_error())?;
    Ok(())
}

#[async_trait]
impl TransactionRepositoryTrait for TransactionRepository {
    fn get_by_id(&self, transaction_id: &str) -> Result<Transaction> {
        let mut conn = get_connection(&self.pool)?;
        let row = transactions::table
            .select(TransactionDB::as_select())
            .find(transaction_id)
            .first::<TransactionDB>(&mut conn)
            .map_err(|e| e.into_core_error())?;
        Ok(row.into())
    }

    fn list_by_account(&self, account: &str) -> Result<Vec<Transaction>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = transactions::table
            .filter(transactions::account_id.eq(account))
            .select(TransactionDB::as_select())
            .order(transactions::posted_at.desc())
            .load::<TransactionDB>(&mut conn)
            .map_err(|e| e.into_core_error())?;
        Ok(rows.into_iter().map(Transaction::from).collect())
    }

    fn list_provider_transaction_ids(&self, account: &str) -> Result<Vec<String>> {
        let mut conn = get_connection(&self.pool)?;
        let ids: Vec<Option<String>> = transactions::table
            .filter(transactions::account_id.eq(account))
            .filter(transactions::provider_transaction_id.is_not_null())
            .select(transactions::provider_transaction_id)
            .load(&mut conn)
            .map_err(|e| e.into_core_error())?;
        Ok(ids.into_iter().flatten().collect())
    }

    async fn insert_synced_batch(&self, new_transactions: Vec<NewTransaction>) -> Result<usize> {
        if new_transactions.is_empty() {
            return Ok(0);
        }
        self.writer
            .exec(move |conn| {
                let rows: Vec<TransactionDB> = new_transactions
                    .into_iter()
                    .map(TransactionDB::from)
                    .collect();
                diesel::insert_into(transactions::table)
                    .values(&rows)
                    .execute(conn)
                    .map_err(|e| e.into_core_error())
            })
            .await
    }

    async fn create_with_rollup(
        &self,
        new_transaction: NewTransaction,
        account_delta: Decimal,
    ) -> Result<Transaction> {
        new_transaction.validate()?;
        self.writer
            .exec(move |conn| {
                let row: TransactionDB = new_transaction.into();
                diesel::insert_into(transactions::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(|e| e.into_core_error())?;
                apply_rollup(conn, &row.account_id, account_delta)?;
                Ok(row.into())
            })
            .await
    }

    async fn update_with_rollup(
        &self,
        update: TransactionUpdate,
        account_delta: Decimal,
    ) -> Result<Transaction> {
        self.writer
            .exec(move |conn| {
                let mut row = transactions::table
                    .select(TransactionDB::as_select())
                    .find(&update.id)
                    .first::<TransactionDB>(conn)
                    .map_err(|e| e.into_core_error())?;

                if let Some(description) = update.description {
                    row.description = description;
                }
                if let Some(amount) = update.amount {
                    row.amount = amount.to_string();
                }
                if let Some(currency) = update.currency {
                    row.currency = currency;
                }
                if let Some(posted_at) = update.posted_at {
                    row.posted_at = posted_at;
                }
                row.updated_at = chrono::Utc::now().naive_utc();

                diesel::update(transactions::table.find(&row.id))
                    .set(&row)
                    .execute(conn)
                    .map_err(|e| e.into_core_error())?;
                apply_rollup(conn, &row.account_id, account_delta)?;
                Ok(row.into())
            })
            .await
    }

    async fn delete_with_rollup(
        &self,
        transaction_id: &str,
        account_delta: Decimal,
    ) -> Result<usize> {
        let id_owned = transaction_id.to_string();
        self.writer
            .exec(move |conn| {
                let row = transactions::table
                    .select(TransactionDB::as_select())
                    .find(&id_owned)
                    .first::<TransactionDB>(conn)
                    .map_err(|e| e.into_core_error())?;
                let deleted = diesel::delete(transactions::table.find(&id_owned))
                    .execute(conn)
                    .map_err(|e| e.into_core_error())?;
                apply_rollup(conn, &row.account_id, account_delta)?;
                Ok(deleted)
            })
            .await
    }
}
