//! Tamper-proof state token carried through OAuth-style redirects.
//!
//! The wire format is `base64url(JSON).hex(HMAC-SHA256)`. Only a single
//! opaque string survives the external hop, so the token has to carry
//! everything needed to resume the flow and has to be verifiable without
//! any server-side session.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use ledgerlink_core::errors::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// State round-tripped through a provider redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectState {
    pub user_id: String,
    pub institution_id: String,
    /// Set on reconnect flows so the callback can find the existing row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
}

impl ConnectState {
    pub fn new(user_id: impl Into<String>, institution_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            institution_id: institution_id.into(),
            connection_id: None,
        }
    }

    pub fn with_connection_id(mut self, connection_id: impl Into<String>) -> Self {
        self.connection_id = Some(connection_id.into());
        self
    }
}

/// Signs a state value into its wire form.
pub fn sign_state(state: &ConnectState, secret: &str) -> Result<String> {
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(state)?);
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Unexpected(format!("Invalid HMAC secret length: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());
    Ok(format!("{payload}.{signature}"))
}

/// Verifies a signed state token, returning `None` for anything that is not
/// a well-formed, correctly signed token with both required fields present.
/// Malformed input is never an error: a tampered redirect should look exactly
/// like a missing one.
pub fn verify_state(token: &str, secret: &str) -> Option<ConnectState> {
    let (payload, signature_hex) = token.rsplit_once('.')?;
    if signature_hex.len() != 64 {
        return None;
    }
    let signature = hex::decode(signature_hex).ok()?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload.as_bytes());
    // Constant-time comparison.
    mac.verify_slice(&signature).ok()?;

    let raw = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let state: ConnectState = serde_json::from_slice(&raw).ok()?;
    if state.user_id.is_empty() || state.institution_id.is_empty() {
        return None;
    }
    Some(state)
}
