//! Queue-carried webhook events.
//!
//! Tagged union keyed by `source`. These events ride an at-least-once
//! delivery channel, so consumers must be idempotent.

use serde::{Deserialize, Serialize};

/// Asynchronous event received from a provider or internal cleanup trigger.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "source", rename_all = "kebab-case")]
pub enum WebhookEvent {
    Snaptrade(SnapTradeWebhook),
    Saltedge(SaltEdgeWebhook),
    ProviderUserCleanup { user_id: String },
    UserFilesCleanup { user_id: String },
}

/// SnapTrade push notification payload (the fields the processor uses).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SnapTradeWebhook {
    pub event_type: String,
    pub user_id: String,
    #[serde(default)]
    pub brokerage_id: Option<String>,
    #[serde(default)]
    pub brokerage_authorization_id: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
}

/// SaltEdge service callback, keyed by which callback URL received it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SaltEdgeWebhook {
    pub stage: SaltEdgeStage,
    pub customer_id: String,
    #[serde(default)]
    pub connection_id: Option<String>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SaltEdgeStage {
    Success,
    Failure,
    Destroy,
    Notify,
}
