//! LedgerLink Connect - provider integrations and sync.
//!
//! This crate normalizes four incompatible bank/brokerage APIs behind one
//! contract, drives the connect/reconnect/refresh lifecycle of a linked
//! institution, and reconciles provider-reported accounts, balances,
//! transactions, and holdings into local rows.

pub mod config;
pub mod providers;
pub mod state;
pub mod sync;
pub mod webhooks;

pub use config::{
    ConnectConfig, EnableBankingConfig, SaltEdgeConfig, SnapTradeConfig, TellerConfig,
};
pub use providers::{
    AspspRef, BankProvider, ConnectAction, ConnectRequest, ConnectTransport, ConnectionRef,
    ProviderClient, ProviderError, ProviderFactory, ProviderKind,
};
pub use state::{sign_state, verify_state, ConnectState};
pub use sync::{seed_providers, SyncService};
pub use webhooks::WebhookProcessor;
