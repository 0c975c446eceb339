//! Teller client and provider implementation.
//!
//! Teller has no registration step; the per-enrollment access token is
//! stored as the connection secret and used as the Basic auth username on
//! every call. The connect flow opens the Teller Connect widget with a
//! signed state token.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::TellerConfig;
use crate::state::{sign_state, ConnectState};

use super::errors::ProviderError;
use super::mapping::map_teller_type;
use super::models::{
    AccountBalance, ConnectAction, ConnectRequest, ConnectTransport, ConnectionRef,
    ProviderAccount, ProviderInstitution, ProviderKind, ProviderResult, ProviderTransaction,
    ProviderUserRef, RegisteredUser,
};
use super::traits::ProviderClient;

const REQUEST_TIMEOUT_SECS: u64 = 30;
const CONNECT_WIDGET_URL: &str = "https://connect.teller.io";

#[derive(Deserialize)]
struct ApiInstitution {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct ApiAccount {
    id: String,
    name: String,
    #[serde(rename = "type")]
    account_type: String,
    currency: String,
}

#[derive(Deserialize)]
struct ApiBalances {
    ledger: Option<String>,
    available: Option<String>,
}

#[derive(Deserialize)]
struct ApiTransaction {
    id: String,
    description: String,
    amount: String,
    date: chrono::NaiveDate,
    status: Option<String>,
}

pub struct TellerClient {
    client: reqwest::Client,
    base_url: String,
    application_id: String,
    environment: String,
    state_secret: String,
}

impl TellerClient {
    pub fn new(config: &TellerConfig, state_secret: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            application_id: config.application_id.clone(),
            environment: config.environment.clone(),
            state_secret: state_secret.to_string(),
        }
    }

    /// Basic auth with the enrollment access token as username.
    async fn get<T: DeserializeOwned>(&self, path: &str, access_token: &str) -> ProviderResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("[Teller] GET {}", url);
        let response = self
            .client
            .get(&url)
            .basic_auth(access_token, Some(""))
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Api(format!(
                "Teller returned HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }
        serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidResponse(format!("{}: {}", e, body)))
    }

    fn parse_amount(raw: &str) -> ProviderResult<Decimal> {
        Decimal::from_str(raw).map_err(|_| {
            ProviderError::InvalidResponse(format!("Unparseable amount: {}", raw))
        })
    }
}

#[async_trait]
impl ProviderClient for TellerClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Teller
    }

    async fn institutions(&self) -> ProviderResult<Vec<ProviderInstitution>> {
        let url = format!("{}/institutions", self.base_url);
        debug!("[Teller] GET {}", url);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Api(format!(
                "Teller returned HTTP {}",
                status
            )));
        }
        let institutions: Vec<ApiInstitution> = serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        Ok(institutions
            .into_iter()
            .map(|inst| ProviderInstitution {
                provider_institution_id: inst.id,
                name: inst.name,
                logo_url: None,
                countries: vec!["US".to_string()],
                enabled: true,
            })
            .collect())
    }

    async fn register_user(&self, user_id: &str) -> ProviderResult<RegisteredUser> {
        // No provider-side registration step; identity is per enrollment.
        Ok(RegisteredUser {
            user_id: user_id.to_string(),
            user_secret: String::new(),
        })
    }

    async fn deregister_user(&self, _user: &ProviderUserRef) -> ProviderResult<()> {
        // Teller enrollments are revoked from the institution side; there is
        // no server API to tear them down.
        Ok(())
    }

    async fn connect(&self, request: &ConnectRequest) -> ProviderResult<ConnectAction> {
        let mut state = ConnectState::new(&request.user_id, &request.provider_institution_id);
        if let Some(connection_id) = &request.connection_id {
            state = state.with_connection_id(connection_id);
        }
        let signed = sign_state(&state, &self.state_secret)
            .map_err(|e| ProviderError::Api(e.to_string()))?;

        let url = format!(
            "{}/?applicationId={}&environment={}&institution={}&state={}",
            CONNECT_WIDGET_URL,
            self.application_id,
            self.environment,
            request.provider_institution_id,
            signed
        );
        Ok(ConnectAction {
            url,
            transport: ConnectTransport::Popup,
        })
    }

    async fn refresh_connection(&self, _conn: &ConnectionRef) -> ProviderResult<()> {
        // Data is fetched fresh on demand.
        Ok(())
    }

    async fn accounts(&self, conn: &ConnectionRef) -> ProviderResult<Vec<ProviderAccount>> {
        let api_accounts: Vec<ApiAccount> = self.get("/accounts", &conn.user_secret).await?;
        let mut accounts = Vec::with_capacity(api_accounts.len());
        for account in api_accounts {
            let balances: ApiBalances = self
                .get(
                    &format!("/accounts/{}/balances", account.id),
                    &conn.user_secret,
                )
                .await?;
            let raw = balances.ledger.or(balances.available).unwrap_or_default();
            let value = if raw.is_empty() {
                Decimal::ZERO
            } else {
                Self::parse_amount(&raw)?
            };
            let (classification, subtype) = map_teller_type(&account.account_type);
            accounts.push(ProviderAccount {
                provider_account_id: account.id,
                name: account.name,
                classification,
                subtype,
                currency: account.currency,
                value,
            });
        }
        Ok(accounts)
    }

    async fn transactions(
        &self,
        conn: &ConnectionRef,
        provider_account_id: &str,
    ) -> ProviderResult<Vec<ProviderTransaction>> {
        let api_transactions: Vec<ApiTransaction> = self
            .get(
                &format!("/accounts/{}/transactions", provider_account_id),
                &conn.user_secret,
            )
            .await?;

        let mut transactions = Vec::new();
        for tx in api_transactions {
            // Pending transactions get a new id once posted; only posted
            // entries are safe to deduplicate on.
            if tx.status.as_deref() == Some("pending") {
                continue;
            }
            transactions.push(ProviderTransaction {
                provider_transaction_id: tx.id,
                description: tx.description,
                amount: Self::parse_amount(&tx.amount)?,
                currency: "USD".to_string(),
                posted_at: tx.date,
            });
        }
        Ok(transactions)
    }

    async fn account_balance(
        &self,
        conn: &ConnectionRef,
        provider_account_id: &str,
    ) -> ProviderResult<Option<AccountBalance>> {
        let balances: ApiBalances = self
            .get(
                &format!("/accounts/{}/balances", provider_account_id),
                &conn.user_secret,
            )
            .await?;
        match balances.ledger.or(balances.available) {
            Some(raw) => Ok(Some(AccountBalance {
                value: Self::parse_amount(&raw)?,
                currency: "USD".to_string(),
            })),
            None => Ok(None),
        }
    }
}
