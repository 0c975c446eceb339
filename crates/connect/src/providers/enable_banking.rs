//! EnableBanking client and provider implementation.
//!
//! Auth is an RS256 JWT signed with the application's RSA private key. The
//! provider has no registration step; the session id from the auth callback
//! is the connection id.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use log::{debug, warn};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::EnableBankingConfig;
use crate::state::{sign_state, ConnectState};

use super::aspsp::AspspRef;
use super::errors::ProviderError;
use super::mapping::map_enable_banking_type;
use super::models::{
    AccountBalance, ConnectAction, ConnectRequest, ConnectTransport, ConnectionRef,
    ProviderAccount, ProviderInstitution, ProviderKind, ProviderResult, ProviderTransaction,
    ProviderUserRef, RegisteredUser,
};
use super::traits::ProviderClient;

const REQUEST_TIMEOUT_SECS: u64 = 30;
/// JWT lifetime. EnableBanking caps tokens at 24h; one hour is plenty for a
/// single sync pass.
const TOKEN_TTL_SECS: i64 = 3600;
/// Consent duration requested when the ASPSP does not advertise a maximum.
const DEFAULT_CONSENT_SECS: u64 = 90 * 24 * 3600;

#[derive(Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct AspspsResponse {
    #[serde(default)]
    aspsps: Vec<ApiAspsp>,
}

#[derive(Deserialize)]
struct ApiAspsp {
    name: String,
    country: String,
    logo: Option<String>,
    maximum_consent_validity: Option<u64>,
}

#[derive(Deserialize)]
struct AuthResponse {
    url: String,
}

#[derive(Deserialize)]
struct SessionResponse {
    #[serde(default)]
    accounts: Vec<String>,
}

#[derive(Deserialize)]
struct SessionCreated {
    session_id: String,
}

#[derive(Deserialize)]
struct AccountDetails {
    name: Option<String>,
    product: Option<String>,
    cash_account_type: Option<String>,
    currency: Option<String>,
}

#[derive(Deserialize)]
struct BalancesResponse {
    #[serde(default)]
    balances: Vec<ApiBalance>,
}

#[derive(Deserialize)]
struct ApiBalance {
    balance_amount: ApiAmount,
}

#[derive(Deserialize)]
struct ApiAmount {
    amount: String,
    currency: String,
}

#[derive(Deserialize)]
struct TransactionsResponse {
    #[serde(default)]
    transactions: Vec<ApiTransaction>,
}

#[derive(Deserialize)]
struct ApiTransaction {
    entry_reference: Option<String>,
    transaction_amount: ApiAmount,
    credit_debit_indicator: String,
    booking_date: Option<chrono::NaiveDate>,
    value_date: Option<chrono::NaiveDate>,
    #[serde(default)]
    remittance_information: Vec<String>,
}

pub struct EnableBankingClient {
    client: reqwest::Client,
    base_url: String,
    app_id: String,
    encoding_key: EncodingKey,
    redirect_url: String,
    state_secret: String,
}

impl EnableBankingClient {
    pub fn new(config: &EnableBankingConfig, state_secret: &str) -> ProviderResult<Self> {
        let encoding_key =
            EncodingKey::from_rsa_pem(config.private_key_pem.as_bytes()).map_err(|e| {
                ProviderError::Api(format!("Invalid EnableBanking private key: {}", e))
            })?;
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            app_id: config.app_id.clone(),
            encoding_key,
            redirect_url: config.redirect_url.clone(),
            state_secret: state_secret.to_string(),
        })
    }

    fn bearer_token(&self) -> ProviderResult<String> {
        let now = Utc::now().timestamp();
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.app_id.clone());
        let claims = JwtClaims {
            iss: "enablebanking.com",
            aud: "api.enablebanking.com",
            iat: now,
            exp: now + TOKEN_TTL_SECS,
        };
        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| ProviderError::Api(format!("Failed to sign EnableBanking JWT: {}", e)))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ProviderResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("[EnableBanking] GET {}", url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.bearer_token()?)
            .send()
            .await?;
        parse_response(response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ProviderResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("[EnableBanking] POST {}", url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.bearer_token()?)
            .json(body)
            .send()
            .await?;
        parse_response(response).await
    }

    async fn delete(&self, path: &str) -> ProviderResult<()> {
        let url = format!("{}{}", self.base_url, path);
        debug!("[EnableBanking] DELETE {}", url);
        let response = self
            .client
            .delete(&url)
            .bearer_auth(self.bearer_token()?)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Api(format!(
                "EnableBanking returned HTTP {}",
                status
            )));
        }
        Ok(())
    }

    /// Exchanges the authorization code from the redirect callback for a
    /// session. The returned session id is the durable connection id.
    pub async fn authorize_session(&self, code: &str) -> ProviderResult<String> {
        let created: SessionCreated = self
            .post("/sessions", &serde_json::json!({ "code": code }))
            .await?;
        Ok(created.session_id)
    }

    fn parse_amount(raw: &str) -> ProviderResult<Decimal> {
        Decimal::from_str(raw).map_err(|_| {
            ProviderError::InvalidResponse(format!("Unparseable amount: {}", raw))
        })
    }
}

async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> ProviderResult<T> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ProviderError::Api(format!(
            "EnableBanking returned HTTP {}: {}",
            status,
            body.chars().take(200).collect::<String>()
        )));
    }
    serde_json::from_str(&body)
        .map_err(|e| ProviderError::InvalidResponse(format!("{}: {}", e, body)))
}

#[async_trait]
impl ProviderClient for EnableBankingClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::EnableBanking
    }

    async fn institutions(&self) -> ProviderResult<Vec<ProviderInstitution>> {
        let response: AspspsResponse = self.get("/aspsps").await?;
        Ok(response
            .aspsps
            .into_iter()
            .map(|aspsp| {
                let reference = AspspRef {
                    aspsp_name: aspsp.name.clone(),
                    country: aspsp.country.clone(),
                    max_consent_seconds: aspsp.maximum_consent_validity,
                };
                ProviderInstitution {
                    provider_institution_id: reference.encode(),
                    name: aspsp.name,
                    logo_url: aspsp.logo,
                    countries: vec![aspsp.country],
                    enabled: true,
                }
            })
            .collect())
    }

    async fn register_user(&self, user_id: &str) -> ProviderResult<RegisteredUser> {
        // No provider-side registration step.
        Ok(RegisteredUser {
            user_id: user_id.to_string(),
            user_secret: String::new(),
        })
    }

    async fn deregister_user(&self, user: &ProviderUserRef) -> ProviderResult<()> {
        for connection_id in &user.connection_ids {
            if let Err(e) = self.delete(&format!("/sessions/{}", connection_id)).await {
                warn!(
                    "Failed to delete EnableBanking session {}: {}",
                    connection_id, e
                );
            }
        }
        Ok(())
    }

    async fn connect(&self, request: &ConnectRequest) -> ProviderResult<ConnectAction> {
        let aspsp = AspspRef::decode(&request.provider_institution_id)?;
        let consent_secs = aspsp.max_consent_seconds.unwrap_or(DEFAULT_CONSENT_SECS);
        let valid_until = Utc::now() + chrono::Duration::seconds(consent_secs as i64);

        let mut state = ConnectState::new(&request.user_id, &request.provider_institution_id);
        if let Some(connection_id) = &request.connection_id {
            state = state.with_connection_id(connection_id);
        }
        let signed = sign_state(&state, &self.state_secret)
            .map_err(|e| ProviderError::Api(e.to_string()))?;

        let body = serde_json::json!({
            "access": { "valid_until": valid_until.to_rfc3339() },
            "aspsp": { "name": aspsp.aspsp_name, "country": aspsp.country },
            "state": signed,
            "redirect_url": self.redirect_url,
            "psu_type": "personal",
        });
        let response: AuthResponse = self.post("/auth", &body).await?;
        Ok(ConnectAction {
            url: response.url,
            transport: ConnectTransport::Redirect,
        })
    }

    async fn refresh_connection(&self, _conn: &ConnectionRef) -> ProviderResult<()> {
        // Data is fetched fresh on demand; nothing to refresh server-side.
        Ok(())
    }

    async fn accounts(&self, conn: &ConnectionRef) -> ProviderResult<Vec<ProviderAccount>> {
        let session: SessionResponse = self
            .get(&format!("/sessions/{}", conn.connection_id))
            .await?;

        let mut accounts = Vec::with_capacity(session.accounts.len());
        for account_uid in session.accounts {
            let details: AccountDetails = self
                .get(&format!("/accounts/{}/details", account_uid))
                .await?;
            let balances: BalancesResponse = self
                .get(&format!("/accounts/{}/balances", account_uid))
                .await?;

            let (value, currency) = match balances.balances.first() {
                Some(balance) => (
                    Self::parse_amount(&balance.balance_amount.amount)?,
                    balance.balance_amount.currency.clone(),
                ),
                None => (
                    Decimal::ZERO,
                    details.currency.clone().unwrap_or_default(),
                ),
            };
            let (classification, subtype) =
                map_enable_banking_type(details.cash_account_type.as_deref());

            accounts.push(ProviderAccount {
                provider_account_id: account_uid,
                name: details
                    .name
                    .or(details.product)
                    .unwrap_or_else(|| "Account".to_string()),
                classification,
                subtype,
                currency,
                value,
            });
        }
        Ok(accounts)
    }

    async fn transactions(
        &self,
        _conn: &ConnectionRef,
        provider_account_id: &str,
    ) -> ProviderResult<Vec<ProviderTransaction>> {
        let response: TransactionsResponse = self
            .get(&format!("/accounts/{}/transactions", provider_account_id))
            .await?;

        let mut transactions = Vec::new();
        for tx in response.transactions {
            let Some(reference) = tx.entry_reference else {
                // Pending entries carry no stable reference and cannot be
                // deduplicated; skip them.
                continue;
            };
            let Some(posted_at) = tx.booking_date.or(tx.value_date) else {
                continue;
            };
            let mut amount = Self::parse_amount(&tx.transaction_amount.amount)?.abs();
            if tx.credit_debit_indicator == "DBIT" {
                amount = -amount;
            }
            transactions.push(ProviderTransaction {
                provider_transaction_id: reference,
                description: tx.remittance_information.join(" "),
                amount,
                currency: tx.transaction_amount.currency,
                posted_at,
            });
        }
        Ok(transactions)
    }

    async fn account_balance(
        &self,
        _conn: &ConnectionRef,
        provider_account_id: &str,
    ) -> ProviderResult<Option<AccountBalance>> {
        let balances: BalancesResponse = self
            .get(&format!("/accounts/{}/balances", provider_account_id))
            .await?;
        match balances.balances.first() {
            Some(balance) => Ok(Some(AccountBalance {
                value: Self::parse_amount(&balance.balance_amount.amount)?,
                currency: balance.balance_amount.currency.clone(),
            })),
            None => Ok(None),
        }
    }
}
