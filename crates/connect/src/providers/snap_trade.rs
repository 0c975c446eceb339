//! SnapTrade client and provider implementation.
//!
//! Every call is signed: the `Signature` header carries
//! base64(HMAC-SHA256(JSON{content, path, query}, consumer_secret)).
//! SnapTrade surfaces one aggregate account per brokerage authorization;
//! its positions come from the holdings endpoint.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use log::{debug, warn};
use reqwest::Method;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;

use crate::config::SnapTradeConfig;

use super::errors::ProviderError;
use super::models::{
    AccountHoldings, ConnectAction, ConnectRequest, ConnectTransport, ConnectionRef,
    ProviderAccount, ProviderInstitution, ProviderKind, ProviderPosition, ProviderResult,
    ProviderTransaction, ProviderUserRef, RegisteredUser,
};
use super::traits::ProviderClient;
use ledgerlink_core::accounts::{AccountClassification, AccountSubtype};

type HmacSha256 = Hmac<Sha256>;

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Deserialize)]
struct ApiRegisteredUser {
    #[serde(rename = "userId")]
    user_id: String,
    #[serde(rename = "userSecret")]
    user_secret: String,
}

#[derive(Deserialize)]
struct ApiBrokerage {
    slug: String,
    name: String,
    aws_s3_logo_url: Option<String>,
    enabled: Option<bool>,
}

#[derive(Deserialize)]
struct ApiLogin {
    #[serde(rename = "redirectURI")]
    redirect_uri: String,
}

#[derive(Deserialize)]
struct ApiAccount {
    id: String,
    name: Option<String>,
    balance: Option<ApiBalance>,
    brokerage_authorization: Option<String>,
}

#[derive(Deserialize)]
struct ApiBalance {
    total: Option<ApiMoney>,
}

#[derive(Deserialize)]
struct ApiMoney {
    amount: Option<Decimal>,
    currency: Option<String>,
}

#[derive(Deserialize)]
struct ApiHoldings {
    account: Option<ApiAccount>,
    #[serde(default)]
    positions: Vec<ApiPosition>,
    total_value: Option<ApiTotalValue>,
}

#[derive(Deserialize)]
struct ApiTotalValue {
    value: Option<Decimal>,
    currency: Option<String>,
}

#[derive(Deserialize)]
struct ApiPosition {
    symbol: Option<ApiSymbolWrapper>,
    units: Option<Decimal>,
    price: Option<Decimal>,
    average_purchase_price: Option<Decimal>,
}

#[derive(Deserialize)]
struct ApiSymbolWrapper {
    symbol: Option<ApiSymbol>,
}

#[derive(Deserialize)]
struct ApiSymbol {
    raw_symbol: Option<String>,
    currency: Option<ApiCurrency>,
}

#[derive(Deserialize)]
struct ApiCurrency {
    code: Option<String>,
}

#[derive(Deserialize)]
struct ApiActivity {
    id: Option<String>,
    description: Option<String>,
    amount: Option<Decimal>,
    currency: Option<ApiCurrency>,
    trade_date: Option<chrono::NaiveDate>,
}

pub struct SnapTradeClient {
    client: reqwest::Client,
    base_url: String,
    /// Path portion of `base_url`, included in the signature content.
    path_prefix: String,
    client_id: String,
    consumer_secret: String,
    redirect_url: String,
}

impl SnapTradeClient {
    pub fn new(config: &SnapTradeConfig) -> Self {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let path_prefix = base_url
            .splitn(4, '/')
            .nth(3)
            .map(|p| format!("/{}", p))
            .unwrap_or_default();
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
            base_url,
            path_prefix,
            client_id: config.client_id.clone(),
            consumer_secret: config.consumer_secret.clone(),
            redirect_url: config.redirect_url.clone(),
        }
    }

    fn signature(
        &self,
        path: &str,
        query: &serde_json::Map<String, serde_json::Value>,
        content: &Option<serde_json::Value>,
    ) -> ProviderResult<String> {
        let sig_object = serde_json::json!({
            "content": content,
            "path": format!("{}{}", self.path_prefix, path),
            "query": query,
        });
        let sig_content = serde_json::to_string(&sig_object)?;
        let mut mac = HmacSha256::new_from_slice(self.consumer_secret.as_bytes())
            .map_err(|e| ProviderError::Api(format!("Invalid consumer secret: {}", e)))?;
        mac.update(sig_content.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    async fn signed_request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        extra_query: &[(&str, &str)],
        content: Option<serde_json::Value>,
    ) -> ProviderResult<T> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| ProviderError::Api(format!("Timestamp error: {}", e)))?
            .as_secs()
            .to_string();

        // serde_json maps are key-ordered, keeping the signature input
        // deterministic.
        let mut query = serde_json::Map::new();
        query.insert("clientId".to_string(), self.client_id.clone().into());
        query.insert("timestamp".to_string(), timestamp.into());
        for (key, value) in extra_query {
            query.insert((*key).to_string(), (*value).to_string().into());
        }

        let signature = self.signature(path, &query, &content)?;
        let query_pairs: Vec<(String, String)> = query
            .iter()
            .map(|(k, v)| (k.clone(), v.as_str().unwrap_or_default().to_string()))
            .collect();

        let url = format!("{}{}", self.base_url, path);
        debug!("[SnapTrade] {} {}", method, url);
        let mut builder = self
            .client
            .request(method, &url)
            .query(&query_pairs)
            .header("Signature", signature);
        if let Some(body) = &content {
            builder = builder.json(body);
        }
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Api(format!(
                "SnapTrade returned HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }
        serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidResponse(format!("{}: {}", e, body)))
    }
}

fn money_amount(money: &Option<ApiMoney>) -> Decimal {
    money
        .as_ref()
        .and_then(|m| m.amount)
        .unwrap_or(Decimal::ZERO)
}

fn money_currency(money: &Option<ApiMoney>) -> Option<String> {
    money.as_ref().and_then(|m| m.currency.clone())
}

#[async_trait]
impl ProviderClient for SnapTradeClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::SnapTrade
    }

    async fn institutions(&self) -> ProviderResult<Vec<ProviderInstitution>> {
        let brokerages: Vec<ApiBrokerage> = self
            .signed_request(Method::GET, "/brokerages", &[], None)
            .await?;
        Ok(brokerages
            .into_iter()
            .map(|b| ProviderInstitution {
                provider_institution_id: b.slug,
                name: b.name,
                logo_url: b.aws_s3_logo_url,
                countries: Vec::new(),
                enabled: b.enabled.unwrap_or(true),
            })
            .collect())
    }

    async fn register_user(&self, user_id: &str) -> ProviderResult<RegisteredUser> {
        let content = serde_json::json!({ "userId": user_id });
        let registered: ApiRegisteredUser = self
            .signed_request(Method::POST, "/snapTrade/registerUser", &[], Some(content))
            .await?;
        Ok(RegisteredUser {
            user_id: registered.user_id,
            user_secret: registered.user_secret,
        })
    }

    async fn deregister_user(&self, user: &ProviderUserRef) -> ProviderResult<()> {
        let result: ProviderResult<serde_json::Value> = self
            .signed_request(
                Method::DELETE,
                "/snapTrade/deleteUser",
                &[("userId", &user.user_id)],
                None,
            )
            .await;
        if let Err(e) = result {
            warn!("Failed to delete SnapTrade user {}: {}", user.user_id, e);
        }
        Ok(())
    }

    async fn connect(&self, request: &ConnectRequest) -> ProviderResult<ConnectAction> {
        let user_secret = request.user_secret.as_deref().unwrap_or_default();
        if user_secret.is_empty() {
            return Err(ProviderError::Api(
                "SnapTrade connect requires a registered user".to_string(),
            ));
        }
        let mut content = serde_json::json!({
            "broker": request.provider_institution_id,
            "immediateRedirect": true,
            "customRedirect": self.redirect_url,
        });
        if let Some(connection_id) = &request.connection_id {
            content["reconnect"] = serde_json::Value::String(connection_id.clone());
        }
        let login: ApiLogin = self
            .signed_request(
                Method::POST,
                "/snapTrade/login",
                &[("userId", &request.user_id), ("userSecret", user_secret)],
                Some(content),
            )
            .await?;
        Ok(ConnectAction {
            url: login.redirect_uri,
            transport: ConnectTransport::Popup,
        })
    }

    async fn refresh_connection(&self, conn: &ConnectionRef) -> ProviderResult<()> {
        let _: serde_json::Value = self
            .signed_request(
                Method::POST,
                &format!("/authorizations/{}/refresh", conn.connection_id),
                &[("userId", &conn.user_id), ("userSecret", &conn.user_secret)],
                None,
            )
            .await?;
        Ok(())
    }

    async fn accounts(&self, conn: &ConnectionRef) -> ProviderResult<Vec<ProviderAccount>> {
        let accounts: Vec<ApiAccount> = self
            .signed_request(
                Method::GET,
                "/accounts",
                &[("userId", &conn.user_id), ("userSecret", &conn.user_secret)],
                None,
            )
            .await?;
        Ok(accounts
            .into_iter()
            .filter(|a| {
                a.brokerage_authorization.as_deref() == Some(conn.connection_id.as_str())
            })
            .map(|account| {
                let total = account.balance.as_ref().and_then(|b| b.total.as_ref());
                ProviderAccount {
                    provider_account_id: account.id,
                    name: account.name.unwrap_or_else(|| "Brokerage".to_string()),
                    classification: AccountClassification::Asset,
                    subtype: AccountSubtype::Brokerage,
                    currency: total
                        .and_then(|m| m.currency.clone())
                        .unwrap_or_else(|| "USD".to_string()),
                    value: total.and_then(|m| m.amount).unwrap_or(Decimal::ZERO),
                }
            })
            .collect())
    }

    async fn transactions(
        &self,
        conn: &ConnectionRef,
        provider_account_id: &str,
    ) -> ProviderResult<Vec<ProviderTransaction>> {
        let activities: Vec<ApiActivity> = self
            .signed_request(
                Method::GET,
                "/activities",
                &[
                    ("userId", &conn.user_id),
                    ("userSecret", &conn.user_secret),
                    ("accounts", provider_account_id),
                ],
                None,
            )
            .await?;
        Ok(activities
            .into_iter()
            .filter_map(|activity| {
                let id = activity.id?;
                let posted_at = activity.trade_date?;
                let amount = activity.amount?;
                Some(ProviderTransaction {
                    provider_transaction_id: id,
                    description: activity.description.unwrap_or_default(),
                    amount,
                    currency: activity
                        .currency
                        .and_then(|c| c.code)
                        .unwrap_or_else(|| "USD".to_string()),
                    posted_at,
                })
            })
            .collect())
    }

    async fn holdings(
        &self,
        conn: &ConnectionRef,
        provider_account_id: &str,
    ) -> ProviderResult<AccountHoldings> {
        let holdings: ApiHoldings = self
            .signed_request(
                Method::GET,
                &format!("/accounts/{}/holdings", provider_account_id),
                &[("userId", &conn.user_id), ("userSecret", &conn.user_secret)],
                None,
            )
            .await?;

        let account_total = holdings
            .account
            .as_ref()
            .and_then(|a| a.balance.as_ref())
            .map(|b| (money_amount(&b.total), money_currency(&b.total)));

        let (total_value, currency) = match &holdings.total_value {
            Some(total) => (
                total.value.unwrap_or(Decimal::ZERO),
                total.currency.clone(),
            ),
            None => account_total.unwrap_or((Decimal::ZERO, None)),
        };

        let positions = holdings
            .positions
            .into_iter()
            .filter_map(|position| {
                let symbol = position.symbol.and_then(|w| w.symbol);
                let raw_symbol = symbol.as_ref().and_then(|s| s.raw_symbol.clone())?;
                Some(ProviderPosition {
                    raw_symbol,
                    units: position.units.unwrap_or(Decimal::ZERO),
                    price: position.price.unwrap_or(Decimal::ZERO),
                    average_purchase_price: position
                        .average_purchase_price
                        .unwrap_or(Decimal::ZERO),
                    currency: symbol
                        .as_ref()
                        .and_then(|s| s.currency.as_ref())
                        .and_then(|c| c.code.clone()),
                })
            })
            .collect();

        Ok(AccountHoldings {
            total_value,
            currency: currency.unwrap_or_else(|| "USD".to_string()),
            positions,
        })
    }
}
