//! Database model for transactions.

use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use ledgerlink_core::locked::LockedAttributes;
use ledgerlink_core::transactions::{NewTransaction, Transaction};

use crate::utils::parse_decimal_tolerant;

/// Database model for transactions.
#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    PartialEq,
    Serialize,
    Deserialize,
    Debug,
    Clone,
)]
#[diesel(table_name = crate::schema::transactions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TransactionDB {
    pub id: String,
    pub account_id: String,
    pub description: String,
    pub amount: String,
    pub currency: String,
    pub posted_at: NaiveDate,
    pub provider_transaction_id: Option<String>,
    pub locked_attributes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<TransactionDB> for Transaction {
    fn from(db: TransactionDB) -> Self {
        Self {
            id: db.id,
            account_id: db.account_id,
            description: db.description,
            amount: parse_decimal_tolerant(&db.amount, "transactions.amount"),
            currency: db.currency,
            posted_at: db.posted_at,
            provider_transaction_id: db.provider_transaction_id,
            locked_attributes: LockedAttributes::from_json(db.locked_attributes.as_deref()),
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl From<NewTransaction> for TransactionDB {
    fn from(domain: NewTransaction) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: domain
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            account_id: domain.account_id,
            description: domain.description,
            amount: domain.amount.to_string(),
            currency: domain.currency,
            posted_at: domain.posted_at,
            provider_transaction_id: domain.provider_transaction_id,
            locked_attributes: Some(domain.locked_attributes.to_json()),
            created_at: now,
            updated_at: now,
        }
    }
}
