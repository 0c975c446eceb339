//! Webhook ingestion endpoints. JSON in, JSON ack out.
//!
//! Teller notifications are authenticated with an HMAC over the raw body and
//! handled inline. SnapTrade and SaltEdge payloads are converted into queue
//! events; the worker applies them so a slow provider call never holds the
//! webhook response open.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::info;

use ledgerlink_core::events::{SaltEdgeStage, SaltEdgeWebhook, SnapTradeWebhook, WebhookEvent};

use crate::state::AppState;

use super::error::ApiError;

type HmacSha256 = Hmac<Sha256>;

pub(crate) fn teller_signature_matches(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());
    signature.as_bytes() == expected.as_bytes()
}

#[derive(Deserialize)]
struct TellerWebhook {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    payload: TellerWebhookPayload,
}

#[derive(Deserialize, Default)]
struct TellerWebhookPayload {
    #[serde(default)]
    enrollment_id: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

pub async fn teller_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let Some(config) = state.connect.teller.as_ref() else {
        return Err(ApiError::Unauthorized("Invalid signature"));
    };
    let signature = headers
        .get("teller-signature")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if !teller_signature_matches(&config.signing_secret, &body, signature) {
        return Err(ApiError::Unauthorized("Invalid signature"));
    }

    let webhook: TellerWebhook = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Malformed webhook body: {}", e)))?;

    match webhook.event_type.as_str() {
        "enrollment.disconnected" => {
            let enrollment_id = webhook
                .payload
                .enrollment_id
                .ok_or_else(|| ApiError::BadRequest("Missing enrollment_id".to_string()))?;
            info!(
                "Teller enrollment {} disconnected ({})",
                enrollment_id,
                webhook.payload.reason.as_deref().unwrap_or("no reason")
            );
            state
                .institution_connections
                .set_broken(&enrollment_id, true)
                .await?;
        }
        "webhook.test" => info!("Teller webhook test received"),
        other => info!("Ignoring Teller webhook type {}", other),
    }

    Ok(Json(json!({ "received": true })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapTradePayload {
    #[serde(default)]
    webhook_secret: Option<String>,
    #[serde(flatten)]
    event: SnapTradeWebhook,
}

pub async fn snaptrade_webhook(
    State(state): State<AppState>,
    Json(payload): Json<SnapTradePayload>,
) -> Result<Json<Value>, ApiError> {
    let Some(expected) = state.snaptrade_webhook_secret.as_deref() else {
        return Err(ApiError::Unauthorized("Webhook secret not configured"));
    };
    if payload.webhook_secret.as_deref() != Some(expected) {
        return Err(ApiError::Unauthorized("Invalid webhook secret"));
    }

    state
        .queue
        .enqueue_webhook(WebhookEvent::Snaptrade(payload.event));
    Ok(Json(json!({ "received": true })))
}

#[derive(Deserialize)]
pub struct SaltEdgePayload {
    data: SaltEdgeData,
}

#[derive(Deserialize)]
struct SaltEdgeData {
    customer_id: String,
    #[serde(default)]
    connection_id: Option<String>,
}

fn enqueue_saltedge(
    state: &AppState,
    stage: SaltEdgeStage,
    payload: SaltEdgePayload,
) -> Json<Value> {
    state.queue.enqueue_webhook(WebhookEvent::Saltedge(SaltEdgeWebhook {
        stage,
        customer_id: payload.data.customer_id,
        connection_id: payload.data.connection_id,
    }));
    Json(json!({ "received": true }))
}

pub async fn saltedge_success(
    State(state): State<AppState>,
    Json(payload): Json<SaltEdgePayload>,
) -> Json<Value> {
    enqueue_saltedge(&state, SaltEdgeStage::Success, payload)
}

pub async fn saltedge_failure(
    State(state): State<AppState>,
    Json(payload): Json<SaltEdgePayload>,
) -> Json<Value> {
    enqueue_saltedge(&state, SaltEdgeStage::Failure, payload)
}

pub async fn saltedge_destroy(
    State(state): State<AppState>,
    Json(payload): Json<SaltEdgePayload>,
) -> Json<Value> {
    enqueue_saltedge(&state, SaltEdgeStage::Destroy, payload)
}

pub async fn saltedge_notify(
    State(state): State<AppState>,
    Json(payload): Json<SaltEdgePayload>,
) -> Json<Value> {
    enqueue_saltedge(&state, SaltEdgeStage::Notify, payload)
}
