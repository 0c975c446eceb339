//! Normalized shapes shared by all provider implementations.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ledgerlink_core::accounts::{AccountClassification, AccountSubtype};
use ledgerlink_core::errors::Error;

use super::errors::ProviderError;

/// The four supported integrations, as a closed set so a new provider is a
/// compile-time-checked addition to every dispatch site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    EnableBanking,
    Teller,
    SaltEdge,
    SnapTrade,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::EnableBanking,
        ProviderKind::Teller,
        ProviderKind::SaltEdge,
        ProviderKind::SnapTrade,
    ];

    /// Stable slug used in route paths and the providers table.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::EnableBanking => "enablebanking",
            ProviderKind::Teller => "teller",
            ProviderKind::SaltEdge => "saltedge",
            ProviderKind::SnapTrade => "snaptrade",
        }
    }

    /// Human-facing name, used when seeding the providers table.
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::EnableBanking => "EnableBanking",
            ProviderKind::Teller => "Teller",
            ProviderKind::SaltEdge => "SaltEdge",
            ProviderKind::SnapTrade => "SnapTrade",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, Error> {
        match name.to_lowercase().as_str() {
            "enablebanking" => Ok(ProviderKind::EnableBanking),
            "teller" => Ok(ProviderKind::Teller),
            "saltedge" => Ok(ProviderKind::SaltEdge),
            "snaptrade" => Ok(ProviderKind::SnapTrade),
            other => Err(Error::Provider(format!("Unknown provider: {}", other))),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog entry from a provider's institution listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInstitution {
    pub provider_institution_id: String,
    pub name: String,
    pub logo_url: Option<String>,
    pub countries: Vec<String>,
    pub enabled: bool,
}

/// Provider-side identity established for a local user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredUser {
    pub user_id: String,
    /// Opaque provider secret; empty for providers without a registration
    /// step.
    pub user_secret: String,
}

/// How the client should present the provider's authorization URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectTransport {
    /// Full-page external redirect.
    Redirect,
    /// Embeddable widget URL.
    Popup,
}

/// Result of starting a connect or reconnect flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectAction {
    pub url: String,
    pub transport: ConnectTransport,
}

/// Parameters for starting a connect or reconnect flow.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub user_id: String,
    pub provider_institution_id: String,
    /// Provider-side user secret, when the provider has a registration step.
    pub user_secret: Option<String>,
    /// Existing provider connection id, set on reconnect flows.
    pub connection_id: Option<String>,
}

/// Everything needed to call a provider on behalf of one linked institution.
#[derive(Debug, Clone)]
pub struct ConnectionRef {
    pub user_id: String,
    /// Provider-side user secret or per-enrollment token; empty when the
    /// provider has neither.
    pub user_secret: String,
    /// The provider's own session/enrollment/authorization id.
    pub connection_id: String,
}

/// Provider identity plus the live sessions under it, for teardown.
#[derive(Debug, Clone)]
pub struct ProviderUserRef {
    pub user_id: String,
    pub user_secret: String,
    pub connection_ids: Vec<String>,
}

/// A provider account mapped into the normalized shape. Values keep the
/// provider's sign; classification-aware sign normalization happens at
/// persist time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderAccount {
    pub provider_account_id: String,
    pub name: String,
    pub classification: AccountClassification,
    pub subtype: AccountSubtype,
    pub currency: String,
    pub value: Decimal,
}

/// A provider transaction with the amount already normalized to
/// "positive = credit to the account".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderTransaction {
    pub provider_transaction_id: String,
    pub description: String,
    pub amount: Decimal,
    pub currency: String,
    pub posted_at: NaiveDate,
}

/// A provider-reported balance for one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalance {
    pub value: Decimal,
    pub currency: String,
}

/// Brokerage holdings for one aggregate account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountHoldings {
    pub total_value: Decimal,
    pub currency: String,
    pub positions: Vec<ProviderPosition>,
}

/// One open position inside a brokerage account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderPosition {
    pub raw_symbol: String,
    pub units: Decimal,
    pub price: Decimal,
    pub average_purchase_price: Decimal,
    /// Currency of the position's symbol, when the provider reports one.
    pub currency: Option<String>,
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
