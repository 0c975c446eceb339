//! Provider integrations: one normalized contract, four implementations.

pub mod aspsp;
pub mod bank_provider;
pub mod enable_banking;
pub mod errors;
pub mod mapping;
pub mod models;
pub mod salt_edge;
pub mod snap_trade;
pub mod teller;
pub mod traits;

pub use aspsp::AspspRef;
pub use bank_provider::BankProvider;
pub use enable_banking::EnableBankingClient;
pub use errors::ProviderError;
pub use models::{
    AccountBalance, AccountHoldings, ConnectAction, ConnectRequest, ConnectTransport,
    ConnectionRef, ProviderAccount, ProviderInstitution, ProviderKind, ProviderPosition,
    ProviderResult, ProviderTransaction, ProviderUserRef, RegisteredUser,
};
pub use salt_edge::SaltEdgeClient;
pub use snap_trade::SnapTradeClient;
pub use teller::TellerClient;
pub use traits::{ProviderClient, ProviderFactory};
