//! Environment-backed configuration for the connect layer.
//!
//! Each provider section is present only when all of its variables are set;
//! an absent section surfaces later as a "not configured" provider error,
//! never a crash.

use std::env;

use ledgerlink_core::errors::{Error, Result};

use crate::providers::{
    BankProvider, EnableBankingClient, ProviderError, ProviderFactory, ProviderKind,
    ProviderResult, SaltEdgeClient, SnapTradeClient, TellerClient,
};

#[derive(Debug, Clone)]
pub struct EnableBankingConfig {
    /// Application id, used as the JWT `kid`.
    pub app_id: String,
    /// RSA private key in PEM form.
    pub private_key_pem: String,
    pub redirect_url: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct TellerConfig {
    pub application_id: String,
    /// `sandbox` or `production`.
    pub environment: String,
    /// Shared secret for webhook signature verification.
    pub signing_secret: String,
    pub redirect_url: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct SaltEdgeConfig {
    pub app_id: String,
    pub secret: String,
    pub return_url: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct SnapTradeConfig {
    pub client_id: String,
    pub consumer_secret: String,
    pub redirect_url: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// Server-wide secret for HMAC state signing.
    pub state_secret: String,
    pub enable_banking: Option<EnableBankingConfig>,
    pub teller: Option<TellerConfig>,
    pub salt_edge: Option<SaltEdgeConfig>,
    pub snap_trade: Option<SnapTradeConfig>,
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

impl ConnectConfig {
    pub fn from_env() -> Result<Self> {
        let state_secret = optional("CONNECT_STATE_SECRET")
            .ok_or_else(|| Error::MissingConfigKey("CONNECT_STATE_SECRET".to_string()))?;

        let enable_banking = match (
            optional("ENABLEBANKING_APP_ID"),
            optional("ENABLEBANKING_PRIVATE_KEY"),
            optional("ENABLEBANKING_REDIRECT_URL"),
        ) {
            (Some(app_id), Some(private_key_pem), Some(redirect_url)) => {
                Some(EnableBankingConfig {
                    app_id,
                    private_key_pem,
                    redirect_url,
                    base_url: optional("ENABLEBANKING_BASE_URL")
                        .unwrap_or_else(|| "https://api.enablebanking.com".to_string()),
                })
            }
            _ => None,
        };

        let teller = match (
            optional("TELLER_APPLICATION_ID"),
            optional("TELLER_SIGNING_SECRET"),
            optional("TELLER_REDIRECT_URL"),
        ) {
            (Some(application_id), Some(signing_secret), Some(redirect_url)) => {
                Some(TellerConfig {
                    application_id,
                    environment: optional("TELLER_ENVIRONMENT")
                        .unwrap_or_else(|| "sandbox".to_string()),
                    signing_secret,
                    redirect_url,
                    base_url: optional("TELLER_BASE_URL")
                        .unwrap_or_else(|| "https://api.teller.io".to_string()),
                })
            }
            _ => None,
        };

        let salt_edge = match (
            optional("SALTEDGE_APP_ID"),
            optional("SALTEDGE_SECRET"),
            optional("SALTEDGE_RETURN_URL"),
        ) {
            (Some(app_id), Some(secret), Some(return_url)) => Some(SaltEdgeConfig {
                app_id,
                secret,
                return_url,
                base_url: optional("SALTEDGE_BASE_URL")
                    .unwrap_or_else(|| "https://www.saltedge.com/api/v6".to_string()),
            }),
            _ => None,
        };

        let snap_trade = match (
            optional("SNAPTRADE_CLIENT_ID"),
            optional("SNAPTRADE_CONSUMER_SECRET"),
            optional("SNAPTRADE_REDIRECT_URL"),
        ) {
            (Some(client_id), Some(consumer_secret), Some(redirect_url)) => {
                Some(SnapTradeConfig {
                    client_id,
                    consumer_secret,
                    redirect_url,
                    base_url: optional("SNAPTRADE_BASE_URL")
                        .unwrap_or_else(|| "https://api.snaptrade.com/api/v1".to_string()),
                })
            }
            _ => None,
        };

        Ok(Self {
            state_secret,
            enable_banking,
            teller,
            salt_edge,
            snap_trade,
        })
    }
}

impl ProviderFactory for ConnectConfig {
    fn client(&self, kind: ProviderKind) -> ProviderResult<BankProvider> {
        match kind {
            ProviderKind::EnableBanking => {
                let config = self
                    .enable_banking
                    .as_ref()
                    .ok_or(ProviderError::NotConfigured("EnableBanking"))?;
                Ok(BankProvider::EnableBanking(EnableBankingClient::new(
                    config,
                    &self.state_secret,
                )?))
            }
            ProviderKind::Teller => {
                let config = self
                    .teller
                    .as_ref()
                    .ok_or(ProviderError::NotConfigured("Teller"))?;
                Ok(BankProvider::Teller(TellerClient::new(
                    config,
                    &self.state_secret,
                )))
            }
            ProviderKind::SaltEdge => {
                let config = self
                    .salt_edge
                    .as_ref()
                    .ok_or(ProviderError::NotConfigured("SaltEdge"))?;
                Ok(BankProvider::SaltEdge(SaltEdgeClient::new(config)))
            }
            ProviderKind::SnapTrade => {
                let config = self
                    .snap_trade
                    .as_ref()
                    .ok_or(ProviderError::NotConfigured("SnapTrade"))?;
                Ok(BankProvider::SnapTrade(SnapTradeClient::new(config)))
            }
        }
    }
}
