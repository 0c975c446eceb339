//! Database model for accounts.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use ledgerlink_core::accounts::{
    Account, AccountClassification, AccountSubtype, NewAccount,
};
use ledgerlink_core::locked::LockedAttributes;

use crate::utils::{decimal_to_opt_string, parse_decimal_tolerant};

/// Database model for accounts.
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
#[diesel(table_name = crate::schema::accounts)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AccountDB {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub classification: String,
    pub subtype: String,
    pub currency: String,
    pub value: String,
    pub cost: Option<String>,
    pub ticker: Option<String>,
    pub parent_id: Option<String>,
    pub institution_connection_id: Option<String>,
    pub provider_account_id: Option<String>,
    pub locked_attributes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<AccountDB> for Account {
    fn from(db: AccountDB) -> Self {
        Self {
            id: db.id,
            user_id: db.user_id,
            name: db.name,
            classification: AccountClassification::from_str_lossy(&db.classification),
            subtype: AccountSubtype::from_str_lossy(&db.subtype),
            currency: db.currency,
            value: parse_decimal_tolerant(&db.value, "accounts.value"),
            cost: db
                .cost
                .as_deref()
                .map(|c| parse_decimal_tolerant(c, "accounts.cost")),
            ticker: db.ticker,
            parent_id: db.parent_id,
            institution_connection_id: db.institution_connection_id,
            provider_account_id: db.provider_account_id,
            locked_attributes: LockedAttributes::from_json(db.locked_attributes.as_deref()),
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl From<NewAccount> for AccountDB {
    fn from(domain: NewAccount) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: domain
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            user_id: domain.user_id,
            name: domain.name,
            classification: domain.classification.as_str().to_string(),
            subtype: domain.subtype.as_str().to_string(),
            currency: domain.currency,
            value: domain.value.to_string(),
            cost: decimal_to_opt_string(domain.cost),
            ticker: domain.ticker,
            parent_id: domain.parent_id,
            institution_connection_id: domain.institution_connection_id,
            provider_account_id: domain.provider_account_id,
            locked_attributes: Some(domain.locked_attributes.to_json()),
            created_at: now,
            updated_at: now,
        }
    }
}
