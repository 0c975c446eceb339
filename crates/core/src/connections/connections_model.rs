//! Provider / institution / connection domain models.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Identity of a third-party data integration. Static reference data.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: String,
    pub name: String,
    pub logo_url: Option<String>,
}

/// A bank or brokerage offered by a provider.
///
/// `provider_institution_id` is provider-opaque. For EnableBanking it is a
/// reversible encoding of the ASPSP name, country, and maximum consent
/// duration (see `ledgerlink-connect::providers::AspspRef`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Institution {
    pub id: String,
    pub provider_id: String,
    pub provider_institution_id: String,
    pub name: String,
    pub logo_url: Option<String>,
    pub countries: Option<String>,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewInstitution {
    pub provider_id: String,
    pub provider_institution_id: String,
    pub name: String,
    pub logo_url: Option<String>,
    pub countries: Option<String>,
    pub enabled: bool,
}

/// One user's relationship with one provider.
///
/// `secret` is provider-opaque: a SaltEdge customer id, a SnapTrade user
/// secret, or empty for providers without a registration step. At most one
/// row per `(user_id, provider_id)` by application convention.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConnection {
    pub id: String,
    pub user_id: String,
    pub provider_id: String,
    pub secret: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewProviderConnection {
    pub user_id: String,
    pub provider_id: String,
    pub secret: String,
}

/// One authorized linkage between a provider connection and an institution.
///
/// `connection_id` is the provider's own connection/session/enrollment id
/// and is unique; `broken` marks a consent that needs re-authorization.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct InstitutionConnection {
    pub id: String,
    pub provider_connection_id: String,
    pub institution_id: String,
    pub connection_id: String,
    pub broken: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewInstitutionConnection {
    pub provider_connection_id: String,
    pub institution_id: String,
    pub connection_id: String,
}
