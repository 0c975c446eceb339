//! Transaction domain models.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, ValidationError};
use crate::locked::LockedAttributes;

/// Ledger entry tied to an account.
///
/// Amount sign convention: positive = credit to the account, negative =
/// debit, regardless of how the provider reported it. Provider-sourced rows
/// carry `provider_transaction_id` (unique per account by application logic).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub account_id: String,
    pub description: String,
    pub amount: Decimal,
    pub currency: String,
    pub posted_at: NaiveDate,
    pub provider_transaction_id: Option<String>,
    pub locked_attributes: LockedAttributes,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Input model for creating a transaction.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub account_id: String,
    pub description: String,
    pub amount: Decimal,
    pub currency: String,
    pub posted_at: NaiveDate,
    pub provider_transaction_id: Option<String>,
    #[serde(default)]
    pub locked_attributes: LockedAttributes,
}

impl NewTransaction {
    pub fn validate(&self) -> Result<()> {
        if self.account_id.trim().is_empty() {
            return Err(ValidationError::MissingField("accountId".to_string()).into());
        }
        if self.currency.trim().is_empty() {
            return Err(ValidationError::MissingField("currency".to_string()).into());
        }
        Ok(())
    }
}

/// User-initiated partial update of a transaction.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TransactionUpdate {
    pub id: String,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub posted_at: Option<NaiveDate>,
}

impl TransactionUpdate {
    /// Names of the fields this update touches, matching the lock-set naming.
    pub fn touched_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.description.is_some() {
            fields.push("description");
        }
        if self.amount.is_some() {
            fields.push("amount");
        }
        if self.currency.is_some() {
            fields.push("currency");
        }
        if self.posted_at.is_some() {
            fields.push("posted_at");
        }
        fields
    }
}
