//! Account domain models.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, ValidationError};
use crate::locked::LockedAttributes;

/// Whether an account adds to or subtracts from net worth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountClassification {
    #[default]
    Asset,
    Liability,
}

impl AccountClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Liability => "liability",
        }
    }

    pub fn from_str_lossy(value: &str) -> Self {
        match value {
            "liability" => Self::Liability,
            _ => Self::Asset,
        }
    }

    /// Liabilities are stored with a negative value regardless of input sign.
    pub fn normalize_value(&self, value: Decimal) -> Decimal {
        match self {
            Self::Asset => value,
            Self::Liability => -value.abs(),
        }
    }
}

/// Account subtype, as surfaced by the provider mapping tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountSubtype {
    #[default]
    Depository,
    #[serde(rename = "creditcard")]
    CreditCard,
    Loan,
    Brokerage,
    /// Cash leg of a decomposed brokerage account.
    Cash,
    /// Single-security leg of a decomposed brokerage account.
    Holding,
}

impl AccountSubtype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Depository => "depository",
            Self::CreditCard => "creditcard",
            Self::Loan => "loan",
            Self::Brokerage => "brokerage",
            Self::Cash => "cash",
            Self::Holding => "holding",
        }
    }

    pub fn from_str_lossy(value: &str) -> Self {
        match value {
            "creditcard" => Self::CreditCard,
            "loan" => Self::Loan,
            "brokerage" => Self::Brokerage,
            "cash" => Self::Cash,
            "holding" => Self::Holding,
            _ => Self::Depository,
        }
    }
}

/// Domain model representing a financial account.
///
/// Manual accounts have no `institution_connection_id`; synced accounts carry
/// both the connection id and the provider's own account id. Brokerage
/// decomposition uses `parent_id` to attach cash/position legs to a parent.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub classification: AccountClassification,
    pub subtype: AccountSubtype,
    pub currency: String,
    pub value: Decimal,
    pub cost: Option<Decimal>,
    pub ticker: Option<String>,
    pub parent_id: Option<String>,
    pub institution_connection_id: Option<String>,
    pub provider_account_id: Option<String>,
    pub locked_attributes: LockedAttributes,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Account {
    pub fn is_synced(&self) -> bool {
        self.institution_connection_id.is_some()
    }
}

/// Input model for creating a new account.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub name: String,
    pub classification: AccountClassification,
    pub subtype: AccountSubtype,
    pub currency: String,
    pub value: Decimal,
    pub cost: Option<Decimal>,
    pub ticker: Option<String>,
    pub parent_id: Option<String>,
    pub institution_connection_id: Option<String>,
    pub provider_account_id: Option<String>,
    #[serde(default)]
    pub locked_attributes: LockedAttributes,
}

impl NewAccount {
    /// Validates the new account data.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name".to_string()).into());
        }
        if self.currency.trim().is_empty() {
            return Err(ValidationError::MissingField("currency".to_string()).into());
        }
        if self.user_id.trim().is_empty() {
            return Err(ValidationError::MissingField("userId".to_string()).into());
        }
        Ok(())
    }
}

/// User-initiated partial update of an account.
///
/// Only `Some` fields are applied; the service rejects the update when any
/// touched field is present in the account's locked attribute set.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AccountUpdate {
    pub id: String,
    pub name: Option<String>,
    pub classification: Option<AccountClassification>,
    pub subtype: Option<AccountSubtype>,
    pub currency: Option<String>,
    pub value: Option<Decimal>,
    pub cost: Option<Decimal>,
    pub ticker: Option<String>,
}

impl AccountUpdate {
    /// Names of the fields this update touches, matching the lock-set naming.
    pub fn touched_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.name.is_some() {
            fields.push("name");
        }
        if self.classification.is_some() {
            fields.push("classification");
        }
        if self.subtype.is_some() {
            fields.push("subtype");
        }
        if self.currency.is_some() {
            fields.push("currency");
        }
        if self.value.is_some() {
            fields.push("value");
        }
        if self.cost.is_some() {
            fields.push("cost");
        }
        if self.ticker.is_some() {
            fields.push("ticker");
        }
        fields
    }
}

/// Atomic rewrite of a brokerage parent and its decomposed children.
///
/// Applied by the repository in a single transaction: the parent row is
/// updated in place, all existing children for the same user are removed,
/// and the fresh cash/position legs are inserted.
#[derive(Debug, Clone)]
pub struct BrokerageParentUpdate {
    pub account_id: String,
    pub user_id: String,
    pub name: Option<String>,
    pub value: Decimal,
    pub cost: Decimal,
    pub currency: String,
    pub locked_attributes: LockedAttributes,
}
