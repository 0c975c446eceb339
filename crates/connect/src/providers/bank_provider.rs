//! Closed provider set with exhaustive dispatch.
//!
//! Adding a fifth provider means adding a variant here, which turns every
//! dispatch site into a compile error until it handles the new case.

use async_trait::async_trait;

use super::enable_banking::EnableBankingClient;
use super::models::{
    AccountBalance, AccountHoldings, ConnectAction, ConnectRequest, ConnectionRef,
    ProviderAccount, ProviderInstitution, ProviderKind, ProviderResult, ProviderTransaction,
    ProviderUserRef, RegisteredUser,
};
use super::salt_edge::SaltEdgeClient;
use super::snap_trade::SnapTradeClient;
use super::teller::TellerClient;
use super::traits::ProviderClient;

pub enum BankProvider {
    EnableBanking(EnableBankingClient),
    Teller(TellerClient),
    SaltEdge(SaltEdgeClient),
    SnapTrade(SnapTradeClient),
}

impl BankProvider {
    fn inner(&self) -> &dyn ProviderClient {
        match self {
            BankProvider::EnableBanking(client) => client,
            BankProvider::Teller(client) => client,
            BankProvider::SaltEdge(client) => client,
            BankProvider::SnapTrade(client) => client,
        }
    }
}

#[async_trait]
impl ProviderClient for BankProvider {
    fn kind(&self) -> ProviderKind {
        self.inner().kind()
    }

    async fn institutions(&self) -> ProviderResult<Vec<ProviderInstitution>> {
        self.inner().institutions().await
    }

    async fn register_user(&self, user_id: &str) -> ProviderResult<RegisteredUser> {
        self.inner().register_user(user_id).await
    }

    async fn deregister_user(&self, user: &ProviderUserRef) -> ProviderResult<()> {
        self.inner().deregister_user(user).await
    }

    async fn connect(&self, request: &ConnectRequest) -> ProviderResult<ConnectAction> {
        self.inner().connect(request).await
    }

    async fn reconnect(&self, request: &ConnectRequest) -> ProviderResult<ConnectAction> {
        self.inner().reconnect(request).await
    }

    async fn refresh_connection(&self, conn: &ConnectionRef) -> ProviderResult<()> {
        self.inner().refresh_connection(conn).await
    }

    async fn accounts(&self, conn: &ConnectionRef) -> ProviderResult<Vec<ProviderAccount>> {
        self.inner().accounts(conn).await
    }

    async fn transactions(
        &self,
        conn: &ConnectionRef,
        provider_account_id: &str,
    ) -> ProviderResult<Vec<ProviderTransaction>> {
        self.inner().transactions(conn, provider_account_id).await
    }

    async fn account_balance(
        &self,
        conn: &ConnectionRef,
        provider_account_id: &str,
    ) -> ProviderResult<Option<AccountBalance>> {
        self.inner().account_balance(conn, provider_account_id).await
    }

    async fn holdings(
        &self,
        conn: &ConnectionRef,
        provider_account_id: &str,
    ) -> ProviderResult<AccountHoldings> {
        self.inner().holdings(conn, provider_account_id).await
    }
}
