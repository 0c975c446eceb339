//! Reversible encoding of EnableBanking ASPSP parameters.
//!
//! EnableBanking has no stable institution id, so the stored
//! `provider_institution_id` doubles as a parameter cache: it encodes the
//! ASPSP name, country, and maximum consent duration needed to rebuild an
//! authorization request later.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::errors::ProviderError;
use super::models::ProviderResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AspspRef {
    pub aspsp_name: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_consent_seconds: Option<u64>,
}

impl AspspRef {
    pub fn encode(&self) -> String {
        // Serializing a struct of strings and an optional integer cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(encoded: &str) -> ProviderResult<Self> {
        let raw = URL_SAFE_NO_PAD.decode(encoded).map_err(|_| {
            ProviderError::InvalidResponse(format!("Malformed institution id: {}", encoded))
        })?;
        let decoded: AspspRef = serde_json::from_slice(&raw)?;
        if decoded.aspsp_name.is_empty() || decoded.country.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "Institution id is missing ASPSP name or country".to_string(),
            ));
        }
        Ok(decoded)
    }
}
