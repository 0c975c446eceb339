//! The polymorphic contract every provider implements.

use async_trait::async_trait;

use super::errors::ProviderError;
use super::models::{
    AccountBalance, AccountHoldings, ConnectAction, ConnectRequest, ConnectionRef,
    ProviderAccount, ProviderInstitution, ProviderKind, ProviderResult, ProviderTransaction,
    ProviderUserRef, RegisteredUser,
};

/// One capability set across all four integrations.
///
/// Methods return `ProviderResult` rather than panicking or leaking raw
/// transport errors; callers must handle the error arm before trusting data.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// List connectable institutions from the provider's catalog.
    async fn institutions(&self) -> ProviderResult<Vec<ProviderInstitution>>;

    /// Establish a provider-side identity for a local user. Idempotent by
    /// contract: re-registering an existing identity must succeed.
    async fn register_user(&self, user_id: &str) -> ProviderResult<RegisteredUser>;

    /// Remove the provider-side identity and best-effort tear down live
    /// sessions under it. Individual session failures are logged, never
    /// surfaced.
    async fn deregister_user(&self, user: &ProviderUserRef) -> ProviderResult<()>;

    /// Begin linking one institution.
    async fn connect(&self, request: &ConnectRequest) -> ProviderResult<ConnectAction>;

    /// Re-authorize an existing, possibly broken, connection. Providers
    /// without a distinct reconnect flow degrade to `connect`.
    async fn reconnect(&self, request: &ConnectRequest) -> ProviderResult<ConnectAction> {
        self.connect(request).await
    }

    /// Ask the provider to refresh cached data server-side. A no-op success
    /// for providers that fetch fresh data on demand.
    async fn refresh_connection(&self, conn: &ConnectionRef) -> ProviderResult<()>;

    /// Fetch provider accounts mapped into the normalized shape.
    async fn accounts(&self, conn: &ConnectionRef) -> ProviderResult<Vec<ProviderAccount>>;

    /// Fetch provider transactions for one account, sign-normalized.
    async fn transactions(
        &self,
        conn: &ConnectionRef,
        provider_account_id: &str,
    ) -> ProviderResult<Vec<ProviderTransaction>>;

    /// Re-fetch the current balance for one account, where the provider has
    /// that granularity.
    async fn account_balance(
        &self,
        _conn: &ConnectionRef,
        _provider_account_id: &str,
    ) -> ProviderResult<Option<AccountBalance>> {
        Ok(None)
    }

    /// Brokerage holdings for one aggregate account. Only meaningful for
    /// brokerage providers.
    async fn holdings(
        &self,
        _conn: &ConnectionRef,
        _provider_account_id: &str,
    ) -> ProviderResult<AccountHoldings> {
        Err(ProviderError::Unsupported(
            "This provider does not report holdings",
        ))
    }
}

/// Builds a live client for a provider, or reports it unconfigured.
pub trait ProviderFactory: Send + Sync {
    fn client(&self, kind: ProviderKind) -> ProviderResult<super::BankProvider>;
}
