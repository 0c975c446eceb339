//! SaltEdge client and provider implementation.
//!
//! Auth is the `App-id`/`Secret` header pair. The customer id created at
//! registration is the connection secret; list endpoints are cursor
//! paginated via `next_id`.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::SaltEdgeConfig;

use super::errors::ProviderError;
use super::mapping::map_salt_edge_nature;
use super::models::{
    AccountBalance, ConnectAction, ConnectRequest, ConnectTransport, ConnectionRef,
    ProviderAccount, ProviderInstitution, ProviderKind, ProviderResult, ProviderTransaction,
    ProviderUserRef, RegisteredUser,
};
use super::traits::ProviderClient;

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Deserialize)]
struct Meta {
    next_id: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct ApiError {
    class: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct ApiProvider {
    code: String,
    name: String,
    logo_url: Option<String>,
    country_code: Option<String>,
    disabled: Option<bool>,
}

#[derive(Deserialize)]
struct ApiCustomer {
    id: String,
    identifier: Option<String>,
}

#[derive(Deserialize)]
struct ApiConnectSession {
    connect_url: String,
}

#[derive(Deserialize)]
struct ApiAccount {
    id: String,
    name: String,
    nature: String,
    balance: Decimal,
    currency_code: String,
}

#[derive(Deserialize)]
struct ApiTransaction {
    id: String,
    description: String,
    amount: Decimal,
    currency_code: String,
    made_on: chrono::NaiveDate,
}

pub struct SaltEdgeClient {
    client: reqwest::Client,
    base_url: String,
    app_id: String,
    secret: String,
    return_url: String,
}

impl SaltEdgeClient {
    pub fn new(config: &SaltEdgeConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            app_id: config.app_id.clone(),
            secret: config.secret.clone(),
            return_url: config.return_url.clone(),
        }
    }

    async fn request<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> ProviderResult<T> {
        let response = builder
            .header("App-id", &self.app_id)
            .header("Secret", &self.secret)
            .header("Accept", "application/json")
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            if let Ok(envelope) = serde_json::from_str::<ApiErrorEnvelope>(&body) {
                if let Some(error) = envelope.error {
                    let class = error.class.unwrap_or_default();
                    let message = error.message.unwrap_or_else(|| format!("HTTP {}", status));
                    return Err(ProviderError::Api(format!("{}: {}", class, message)));
                }
            }
            return Err(ProviderError::Api(format!(
                "SaltEdge returned HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }
        serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidResponse(format!("{}: {}", e, body)))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ProviderResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("[SaltEdge] GET {}", url);
        self.request(self.client.get(&url)).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ProviderResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("[SaltEdge] POST {}", url);
        self.request(self.client.post(&url).json(body)).await
    }

    /// Walks a cursor-paginated collection to completion.
    async fn get_all_pages<T: DeserializeOwned>(&self, path: &str) -> ProviderResult<Vec<T>> {
        let mut items = Vec::new();
        let mut next_id: Option<String> = None;
        loop {
            let separator = if path.contains('?') { '&' } else { '?' };
            let page_path = match &next_id {
                Some(id) => format!("{}{}from_id={}", path, separator, id),
                None => path.to_string(),
            };
            let envelope: Envelope<Vec<T>> = self.get(&page_path).await?;
            items.extend(envelope.data);
            match envelope.meta.and_then(|m| m.next_id) {
                Some(id) => next_id = Some(id),
                None => break,
            }
        }
        Ok(items)
    }

    /// Looks up an existing customer by identifier, for the duplicate-
    /// registration success path.
    async fn find_customer(&self, identifier: &str) -> ProviderResult<Option<ApiCustomer>> {
        let customers: Vec<ApiCustomer> = self.get_all_pages("/customers").await?;
        Ok(customers
            .into_iter()
            .find(|c| c.identifier.as_deref() == Some(identifier)))
    }
}

#[async_trait]
impl ProviderClient for SaltEdgeClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::SaltEdge
    }

    async fn institutions(&self) -> ProviderResult<Vec<ProviderInstitution>> {
        let providers: Vec<ApiProvider> = self.get_all_pages("/providers").await?;
        Ok(providers
            .into_iter()
            .map(|p| ProviderInstitution {
                provider_institution_id: p.code,
                name: p.name,
                logo_url: p.logo_url,
                countries: p.country_code.map(|c| vec![c]).unwrap_or_default(),
                enabled: !p.disabled.unwrap_or(false),
            })
            .collect())
    }

    async fn register_user(&self, user_id: &str) -> ProviderResult<RegisteredUser> {
        let body = serde_json::json!({ "data": { "identifier": user_id } });
        let result: ProviderResult<Envelope<ApiCustomer>> =
            self.post("/customers", &body).await;
        match result {
            Ok(envelope) => Ok(RegisteredUser {
                user_id: user_id.to_string(),
                user_secret: envelope.data.id,
            }),
            // Re-registering an existing identity is a success path.
            Err(ProviderError::Api(message)) if message.contains("DuplicatedCustomer") => {
                let customer = self.find_customer(user_id).await?.ok_or_else(|| {
                    ProviderError::Api(format!(
                        "SaltEdge reports customer {} exists but it was not found",
                        user_id
                    ))
                })?;
                Ok(RegisteredUser {
                    user_id: user_id.to_string(),
                    user_secret: customer.id,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn deregister_user(&self, user: &ProviderUserRef) -> ProviderResult<()> {
        for connection_id in &user.connection_ids {
            let url = format!("{}/connections/{}", self.base_url, connection_id);
            let result: ProviderResult<serde_json::Value> =
                self.request(self.client.delete(&url)).await;
            if let Err(e) = result {
                warn!("Failed to delete SaltEdge connection {}: {}", connection_id, e);
            }
        }
        if !user.user_secret.is_empty() {
            let url = format!("{}/customers/{}", self.base_url, user.user_secret);
            let result: ProviderResult<serde_json::Value> =
                self.request(self.client.delete(&url)).await;
            if let Err(e) = result {
                warn!("Failed to delete SaltEdge customer {}: {}", user.user_secret, e);
            }
        }
        Ok(())
    }

    async fn connect(&self, request: &ConnectRequest) -> ProviderResult<ConnectAction> {
        let customer_id = request.user_secret.as_deref().unwrap_or_default();
        if customer_id.is_empty() {
            return Err(ProviderError::Api(
                "SaltEdge connect requires a registered customer".to_string(),
            ));
        }
        let body = serde_json::json!({
            "data": {
                "customer_id": customer_id,
                "provider_code": request.provider_institution_id,
                "consent": { "scopes": ["accounts", "transactions"] },
                "attempt": { "return_to": self.return_url },
            }
        });
        let path = if request.connection_id.is_some() {
            "/connect_sessions/reconnect"
        } else {
            "/connect_sessions/create"
        };
        let body = match &request.connection_id {
            Some(connection_id) => {
                let mut reconnect = body;
                reconnect["data"]["connection_id"] =
                    serde_json::Value::String(connection_id.clone());
                reconnect
            }
            None => body,
        };
        let envelope: Envelope<ApiConnectSession> = self.post(path, &body).await?;
        Ok(ConnectAction {
            url: envelope.data.connect_url,
            transport: ConnectTransport::Redirect,
        })
    }

    async fn refresh_connection(&self, conn: &ConnectionRef) -> ProviderResult<()> {
        let body = serde_json::json!({
            "data": { "attempt": { "fetch_scopes": ["accounts", "transactions"] } }
        });
        let url = format!("{}/connections/{}/refresh", self.base_url, conn.connection_id);
        debug!("[SaltEdge] PUT {}", url);
        let _: serde_json::Value = self.request(self.client.put(&url).json(&body)).await?;
        Ok(())
    }

    async fn accounts(&self, conn: &ConnectionRef) -> ProviderResult<Vec<ProviderAccount>> {
        let accounts: Vec<ApiAccount> = self
            .get_all_pages(&format!("/accounts?connection_id={}", conn.connection_id))
            .await?;
        Ok(accounts
            .into_iter()
            .map(|account| {
                let (classification, subtype) = map_salt_edge_nature(&account.nature);
                ProviderAccount {
                    provider_account_id: account.id,
                    name: account.name,
                    classification,
                    subtype,
                    currency: account.currency_code,
                    value: account.balance,
                }
            })
            .collect())
    }

    async fn transactions(
        &self,
        conn: &ConnectionRef,
        provider_account_id: &str,
    ) -> ProviderResult<Vec<ProviderTransaction>> {
        let transactions: Vec<ApiTransaction> = self
            .get_all_pages(&format!(
                "/transactions?connection_id={}&account_id={}",
                conn.connection_id, provider_account_id
            ))
            .await?;
        Ok(transactions
            .into_iter()
            .map(|tx| ProviderTransaction {
                provider_transaction_id: tx.id,
                description: tx.description,
                amount: tx.amount,
                currency: tx.currency_code,
                posted_at: tx.made_on,
            })
            .collect())
    }

    async fn account_balance(
        &self,
        conn: &ConnectionRef,
        provider_account_id: &str,
    ) -> ProviderResult<Option<AccountBalance>> {
        let accounts = self.accounts(conn).await?;
        Ok(accounts
            .into_iter()
            .find(|a| a.provider_account_id == provider_account_id)
            .map(|a| AccountBalance {
                value: a.value,
                currency: a.currency,
            }))
    }
}
