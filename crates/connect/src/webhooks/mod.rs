//! Webhook event processor.
//!
//! Consumes the at-least-once queue of tagged `WebhookEvent`s and applies
//! incremental connection state changes. An `Err` from `process` means the
//! message should be redelivered; handled-but-uninteresting events return
//! `Ok` so they are acked.

use std::sync::Arc;

use log::{info, warn};

use ledgerlink_core::accounts::AccountRepositoryTrait;
use ledgerlink_core::connections::{
    InstitutionConnectionRepositoryTrait, InstitutionRepositoryTrait, NewInstitutionConnection,
    ProviderConnectionRepositoryTrait, ProviderRepositoryTrait,
};
use ledgerlink_core::errors::{Error, Result};
use ledgerlink_core::events::{
    DomainEvent, DomainEventSink, SaltEdgeStage, SaltEdgeWebhook, SnapTradeWebhook, WebhookEvent,
};

use crate::providers::{ProviderClient, ProviderFactory, ProviderKind, ProviderUserRef};

pub struct WebhookProcessor {
    providers: Arc<dyn ProviderRepositoryTrait>,
    institutions: Arc<dyn InstitutionRepositoryTrait>,
    provider_connections: Arc<dyn ProviderConnectionRepositoryTrait>,
    institution_connections: Arc<dyn InstitutionConnectionRepositoryTrait>,
    accounts: Arc<dyn AccountRepositoryTrait>,
    factory: Arc<dyn ProviderFactory>,
    events: Arc<dyn DomainEventSink>,
}

impl WebhookProcessor {
    pub fn new(
        providers: Arc<dyn ProviderRepositoryTrait>,
        institutions: Arc<dyn InstitutionRepositoryTrait>,
        provider_connections: Arc<dyn ProviderConnectionRepositoryTrait>,
        institution_connections: Arc<dyn InstitutionConnectionRepositoryTrait>,
        accounts: Arc<dyn AccountRepositoryTrait>,
        factory: Arc<dyn ProviderFactory>,
        events: Arc<dyn DomainEventSink>,
    ) -> Self {
        Self {
            providers,
            institutions,
            provider_connections,
            institution_connections,
            accounts,
            factory,
            events,
        }
    }

    pub async fn process(&self, event: WebhookEvent) -> Result<()> {
        match event {
            WebhookEvent::Snaptrade(webhook) => self.process_snaptrade(webhook).await,
            WebhookEvent::Saltedge(webhook) => self.process_saltedge(webhook).await,
            WebhookEvent::ProviderUserCleanup { user_id } => {
                self.cleanup_provider_user(&user_id).await
            }
            WebhookEvent::UserFilesCleanup { user_id } => {
                // File storage is owned by another subsystem; nothing to do
                // here beyond acknowledging.
                info!("Acknowledged user-files-cleanup for user {}", user_id);
                Ok(())
            }
        }
    }

    async fn process_snaptrade(&self, webhook: SnapTradeWebhook) -> Result<()> {
        match webhook.event_type.as_str() {
            "CONNECTION_ADDED" => self.snaptrade_connection_added(&webhook).await,
            "CONNECTION_DELETED" => {
                let authorization_id = require(
                    webhook.brokerage_authorization_id.as_deref(),
                    "brokerageAuthorizationId",
                )?;
                self.institution_connections
                    .delete_by_connection_id(authorization_id)
                    .await?;
                Ok(())
            }
            "CONNECTION_BROKEN" => {
                let authorization_id = require(
                    webhook.brokerage_authorization_id.as_deref(),
                    "brokerageAuthorizationId",
                )?;
                self.institution_connections
                    .set_broken(authorization_id, true)
                    .await?;
                Ok(())
            }
            "CONNECTION_FIXED" => {
                let authorization_id = require(
                    webhook.brokerage_authorization_id.as_deref(),
                    "brokerageAuthorizationId",
                )?;
                self.institution_connections
                    .set_broken(authorization_id, false)
                    .await?;
                Ok(())
            }
            "ACCOUNT_REMOVED" => {
                let account_id = require(webhook.account_id.as_deref(), "accountId")?;
                self.accounts
                    .delete_by_provider_account_id(account_id)
                    .await?;
                Ok(())
            }
            other => {
                info!("Ignoring SnapTrade webhook event type {}", other);
                Ok(())
            }
        }
    }

    async fn snaptrade_connection_added(&self, webhook: &SnapTradeWebhook) -> Result<()> {
        let brokerage_id = require(webhook.brokerage_id.as_deref(), "brokerageId")?;
        let authorization_id = require(
            webhook.brokerage_authorization_id.as_deref(),
            "brokerageAuthorizationId",
        )?;

        let provider = self
            .providers
            .find_by_name(ProviderKind::SnapTrade.display_name())?
            .ok_or_else(|| Error::Provider("SnapTrade provider is not seeded".to_string()))?;
        let institution = self
            .institutions
            .find_by_provider_institution_id(&provider.id, brokerage_id)?
            .ok_or_else(|| {
                Error::Provider(format!("Unknown SnapTrade brokerage {}", brokerage_id))
            })?;
        let provider_connection = self
            .provider_connections
            .find_by_user_and_provider(&webhook.user_id, &provider.id)?
            .ok_or_else(|| {
                Error::Provider(format!(
                    "No SnapTrade registration for user {}",
                    webhook.user_id
                ))
            })?;

        let inserted = self
            .institution_connections
            .insert_idempotent(NewInstitutionConnection {
                provider_connection_id: provider_connection.id,
                institution_id: institution.id,
                connection_id: authorization_id.to_string(),
            })
            .await?;
        // Redelivered webhooks find the row already present; that is a
        // success, and no second event goes out.
        if let Some(connection) = inserted {
            self.events.emit(DomainEvent::connection_established(
                connection.id,
                webhook.user_id.clone(),
                ProviderKind::SnapTrade.as_str().to_string(),
            ));
        }
        Ok(())
    }

    async fn process_saltedge(&self, webhook: SaltEdgeWebhook) -> Result<()> {
        let Some(connection_id) = webhook.connection_id.as_deref() else {
            info!(
                "SaltEdge {:?} callback without connection id for customer {}",
                webhook.stage, webhook.customer_id
            );
            return Ok(());
        };
        match webhook.stage {
            SaltEdgeStage::Success => {
                self.institution_connections
                    .set_broken(connection_id, false)
                    .await?;
            }
            SaltEdgeStage::Failure => {
                self.institution_connections
                    .set_broken(connection_id, true)
                    .await?;
            }
            SaltEdgeStage::Destroy => {
                self.institution_connections
                    .delete_by_connection_id(connection_id)
                    .await?;
            }
            SaltEdgeStage::Notify => {
                info!(
                    "SaltEdge notify for connection {} (customer {})",
                    connection_id, webhook.customer_id
                );
            }
        }
        Ok(())
    }

    /// Tears down every provider-side identity for a user. Each provider's
    /// failure is logged and the loop continues; local rows are removed
    /// regardless.
    async fn cleanup_provider_user(&self, user_id: &str) -> Result<()> {
        for connection in self.provider_connections.list_by_user(user_id)? {
            let provider = self.providers.list()?;
            let provider_name = provider
                .iter()
                .find(|p| p.id == connection.provider_id)
                .map(|p| p.name.clone())
                .unwrap_or_default();

            let institution_connections = self
                .institution_connections
                .list_by_provider_connection(&connection.id)?;
            let connection_ids: Vec<String> = institution_connections
                .iter()
                .map(|ic| ic.connection_id.clone())
                .collect();

            match ProviderKind::from_name(&provider_name)
                .and_then(|kind| self.factory.client(kind).map_err(Error::from))
            {
                Ok(client) => {
                    let user_ref = ProviderUserRef {
                        user_id: user_id.to_string(),
                        user_secret: connection.secret.clone(),
                        connection_ids,
                    };
                    if let Err(e) = client.deregister_user(&user_ref).await {
                        warn!(
                            "Deregistration with {} failed for user {}: {}",
                            provider_name, user_id, e
                        );
                    }
                }
                Err(e) => {
                    warn!(
                        "Skipping provider-side teardown for {}: {}",
                        provider_name, e
                    );
                }
            }

            for institution_connection in institution_connections {
                self.institution_connections
                    .delete(&institution_connection.id)
                    .await?;
            }
            self.provider_connections.delete(&connection.id).await?;
        }
        Ok(())
    }
}

fn require<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str> {
    value.filter(|v| !v.is_empty()).ok_or_else(|| {
        ledgerlink_core::errors::ValidationError::MissingField(field.to_string()).into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use ledgerlink_core::accounts::{
        Account, AccountUpdate, BrokerageParentUpdate, NewAccount,
    };
    use ledgerlink_core::connections::{
        Institution, InstitutionConnection, NewInstitution, NewProviderConnection, Provider,
        ProviderConnection,
    };
    use ledgerlink_core::errors::DatabaseError;
    use ledgerlink_core::events::MockDomainEventSink;
    use rust_decimal::Decimal;

    use crate::providers::{BankProvider, ProviderError, ProviderResult};

    #[derive(Default)]
    struct FakeInstitutionConnectionRepo {
        rows: Mutex<Vec<InstitutionConnection>>,
    }

    impl FakeInstitutionConnectionRepo {
        fn all(&self) -> Vec<InstitutionConnection> {
            self.rows.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl InstitutionConnectionRepositoryTrait for FakeInstitutionConnectionRepo {
        async fn insert_idempotent(
            &self,
            new_connection: NewInstitutionConnection,
        ) -> Result<Option<InstitutionConnection>> {
            let mut rows = self.rows.lock().unwrap();
            if rows
                .iter()
                .any(|r| r.connection_id == new_connection.connection_id)
            {
                return Ok(None);
            }
            let row = InstitutionConnection {
                id: uuid::Uuid::new_v4().to_string(),
                provider_connection_id: new_connection.provider_connection_id,
                institution_id: new_connection.institution_id,
                connection_id: new_connection.connection_id,
                broken: false,
                created_at: chrono::Utc::now().naive_utc(),
            };
            rows.push(row.clone());
            Ok(Some(row))
        }

        fn get_by_id(&self, id: &str) -> Result<InstitutionConnection> {
            self.all()
                .into_iter()
                .find(|r| r.id == id)
                .ok_or_else(|| DatabaseError::NotFound(id.to_string()).into())
        }

        fn find_by_connection_id(
            &self,
            connection_id: &str,
        ) -> Result<Option<InstitutionConnection>> {
            Ok(self
                .all()
                .into_iter()
                .find(|r| r.connection_id == connection_id))
        }

        fn list_by_provider_connection(
            &self,
            provider_connection_id: &str,
        ) -> Result<Vec<InstitutionConnection>> {
            Ok(self
                .all()
                .into_iter()
                .filter(|r| r.provider_connection_id == provider_connection_id)
                .collect())
        }

        async fn set_broken(&self, connection_id: &str, broken: bool) -> Result<usize> {
            let mut rows = self.rows.lock().unwrap();
            let mut affected = 0;
            for row in rows.iter_mut() {
                if row.connection_id == connection_id {
                    row.broken = broken;
                    affected += 1;
                }
            }
            Ok(affected)
        }

        async fn delete_by_connection_id(&self, connection_id: &str) -> Result<usize> {
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|r| r.connection_id != connection_id);
            Ok(before - rows.len())
        }

        async fn delete(&self, id: &str) -> Result<usize> {
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|r| r.id != id);
            Ok(before - rows.len())
        }
    }

    #[derive(Default)]
    struct FakeProviderRepo {
        rows: Mutex<Vec<Provider>>,
    }

    #[async_trait]
    impl ProviderRepositoryTrait for FakeProviderRepo {
        async fn upsert(&self, name: &str, logo_url: Option<&str>) -> Result<Provider> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(existing) = rows.iter().find(|p| p.name == name) {
                return Ok(existing.clone());
            }
            let row = Provider {
                id: uuid::Uuid::new_v4().to_string(),
                name: name.to_string(),
                logo_url: logo_url.map(str::to_string),
            };
            rows.push(row.clone());
            Ok(row)
        }

        fn find_by_name(&self, name: &str) -> Result<Option<Provider>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|p| p.name == name)
                .cloned())
        }

        fn list(&self) -> Result<Vec<Provider>> {
            Ok(self.rows.lock().unwrap().clone())
        }
    }

    #[derive(Default)]
    struct FakeInstitutionRepo {
        rows: Mutex<Vec<Institution>>,
    }

    #[async_trait]
    impl InstitutionRepositoryTrait for FakeInstitutionRepo {
        async fn upsert(&self, institution: NewInstitution) -> Result<Institution> {
            let row = Institution {
                id: uuid::Uuid::new_v4().to_string(),
                provider_id: institution.provider_id,
                provider_institution_id: institution.provider_institution_id,
                name: institution.name,
                logo_url: institution.logo_url,
                countries: institution.countries,
                enabled: institution.enabled,
            };
            self.rows.lock().unwrap().push(row.clone());
            Ok(row)
        }

        fn get_by_id(&self, institution_id: &str) -> Result<Institution> {
            self.rows
                .lock()
                .unwrap()
                .iter()
                .find(|i| i.id == institution_id)
                .cloned()
                .ok_or_else(|| DatabaseError::NotFound(institution_id.to_string()).into())
        }

        fn find_by_provider_institution_id(
            &self,
            provider_id: &str,
            provider_institution_id: &str,
        ) -> Result<Option<Institution>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|i| {
                    i.provider_id == provider_id
                        && i.provider_institution_id == provider_institution_id
                })
                .cloned())
        }

        fn list_enabled(&self) -> Result<Vec<Institution>> {
            Ok(self.rows.lock().unwrap().clone())
        }
    }

    #[derive(Default)]
    struct FakeProviderConnectionRepo {
        rows: Mutex<Vec<ProviderConnection>>,
    }

    #[async_trait]
    impl ProviderConnectionRepositoryTrait for FakeProviderConnectionRepo {
        async fn create(
            &self,
            new_connection: NewProviderConnection,
        ) -> Result<ProviderConnection> {
            let row = ProviderConnection {
                id: uuid::Uuid::new_v4().to_string(),
                user_id: new_connection.user_id,
                provider_id: new_connection.provider_id,
                secret: new_connection.secret,
                created_at: chrono::Utc::now().naive_utc(),
            };
            self.rows.lock().unwrap().push(row.clone());
            Ok(row)
        }

        fn find_by_user_and_provider(
            &self,
            user_id: &str,
            provider_id: &str,
        ) -> Result<Option<ProviderConnection>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|c| c.user_id == user_id && c.provider_id == provider_id)
                .cloned())
        }

        fn get_by_id(&self, id: &str) -> Result<ProviderConnection> {
            self.rows
                .lock()
                .unwrap()
                .iter()
                .find(|c| c.id == id)
                .cloned()
                .ok_or_else(|| DatabaseError::NotFound(id.to_string()).into())
        }

        fn list_by_user(&self, user_id: &str) -> Result<Vec<ProviderConnection>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.user_id == user_id)
                .cloned()
                .collect())
        }

        async fn delete(&self, id: &str) -> Result<usize> {
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|c| c.id != id);
            Ok(before - rows.len())
        }
    }

    #[derive(Default)]
    struct FakeAccountRepo {
        rows: Mutex<Vec<Account>>,
    }

    #[async_trait]
    impl AccountRepositoryTrait for FakeAccountRepo {
        async fn create(&self, new_account: NewAccount) -> Result<Account> {
            let now = chrono::Utc::now().naive_utc();
            let account = Account {
                id: new_account
                    .id
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                user_id: new_account.user_id,
                name: new_account.name,
                classification: new_account.classification,
                subtype: new_account.subtype,
                currency: new_account.currency,
                value: new_account.value,
                cost: new_account.cost,
                ticker: new_account.ticker,
                parent_id: new_account.parent_id,
                institution_connection_id: new_account.institution_connection_id,
                provider_account_id: new_account.provider_account_id,
                locked_attributes: new_account.locked_attributes,
                created_at: now,
                updated_at: now,
            };
            self.rows.lock().unwrap().push(account.clone());
            Ok(account)
        }

        async fn update(&self, update: AccountUpdate) -> Result<Account> {
            Err(DatabaseError::NotFound(update.id).into())
        }

        async fn delete(&self, account_id: &str) -> Result<usize> {
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|a| a.id != account_id);
            Ok(before - rows.len())
        }

        async fn delete_by_provider_account_id(
            &self,
            provider_account_id: &str,
        ) -> Result<usize> {
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|a| a.provider_account_id.as_deref() != Some(provider_account_id));
            Ok(before - rows.len())
        }

        fn get_by_id(&self, account_id: &str) -> Result<Account> {
            self.rows
                .lock()
                .unwrap()
                .iter()
                .find(|a| a.id == account_id)
                .cloned()
                .ok_or_else(|| DatabaseError::NotFound(account_id.to_string()).into())
        }

        fn list_by_user(&self, user_id: &str) -> Result<Vec<Account>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|a| a.user_id == user_id)
                .cloned()
                .collect())
        }

        fn list_by_institution_connection(
            &self,
            institution_connection_id: &str,
        ) -> Result<Vec<Account>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|a| {
                    a.institution_connection_id.as_deref() == Some(institution_connection_id)
                })
                .cloned()
                .collect())
        }

        async fn update_synced_balance(
            &self,
            account_id: &str,
            _value: Decimal,
            _currency: &str,
        ) -> Result<()> {
            let _ = account_id;
            Ok(())
        }

        async fn replace_brokerage_children(
            &self,
            parent: BrokerageParentUpdate,
            _children: Vec<NewAccount>,
        ) -> Result<Account> {
            self.get_by_id(&parent.account_id)
        }
    }

    struct UnconfiguredFactory;

    impl ProviderFactory for UnconfiguredFactory {
        fn client(&self, kind: ProviderKind) -> ProviderResult<BankProvider> {
            Err(ProviderError::NotConfigured(kind.display_name()))
        }
    }

    struct Fixture {
        processor: WebhookProcessor,
        providers: Arc<FakeProviderRepo>,
        institutions: Arc<FakeInstitutionRepo>,
        provider_connections: Arc<FakeProviderConnectionRepo>,
        institution_connections: Arc<FakeInstitutionConnectionRepo>,
        accounts: Arc<FakeAccountRepo>,
        events: Arc<MockDomainEventSink>,
    }

    fn fixture() -> Fixture {
        let providers = Arc::new(FakeProviderRepo::default());
        let institutions = Arc::new(FakeInstitutionRepo::default());
        let provider_connections = Arc::new(FakeProviderConnectionRepo::default());
        let institution_connections = Arc::new(FakeInstitutionConnectionRepo::default());
        let accounts = Arc::new(FakeAccountRepo::default());
        let events = Arc::new(MockDomainEventSink::new());
        let processor = WebhookProcessor::new(
            providers.clone(),
            institutions.clone(),
            provider_connections.clone(),
            institution_connections.clone(),
            accounts.clone(),
            Arc::new(UnconfiguredFactory),
            events.clone(),
        );
        Fixture {
            processor,
            providers,
            institutions,
            provider_connections,
            institution_connections,
            accounts,
            events,
        }
    }

    fn snaptrade_event(event_type: &str, authorization_id: &str) -> WebhookEvent {
        WebhookEvent::Snaptrade(SnapTradeWebhook {
            event_type: event_type.to_string(),
            user_id: "user-1".to_string(),
            brokerage_authorization_id: Some(authorization_id.to_string()),
            ..Default::default()
        })
    }

    async fn seed_connection(f: &Fixture, connection_id: &str) {
        f.institution_connections
            .insert_idempotent(NewInstitutionConnection {
                provider_connection_id: "pc-1".to_string(),
                institution_id: "inst-1".to_string(),
                connection_id: connection_id.to_string(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_connection_broken_then_fixed_toggles_flag() {
        let f = fixture();
        seed_connection(&f, "auth-123").await;

        f.processor
            .process(snaptrade_event("CONNECTION_BROKEN", "auth-123"))
            .await
            .unwrap();
        assert!(f.institution_connections.all()[0].broken);

        f.processor
            .process(snaptrade_event("CONNECTION_FIXED", "auth-123"))
            .await
            .unwrap();
        assert!(!f.institution_connections.all()[0].broken);
    }

    #[tokio::test]
    async fn test_connection_deleted_removes_row() {
        let f = fixture();
        seed_connection(&f, "auth-123").await;

        f.processor
            .process(snaptrade_event("CONNECTION_DELETED", "auth-123"))
            .await
            .unwrap();
        assert!(f.institution_connections.all().is_empty());
    }

    #[tokio::test]
    async fn test_connection_added_is_idempotent_and_emits_once() {
        let f = fixture();
        let provider = f.providers.upsert("SnapTrade", None).await.unwrap();
        let institution = f
            .institutions
            .upsert(NewInstitution {
                provider_id: provider.id.clone(),
                provider_institution_id: "robinhood".to_string(),
                name: "Robinhood".to_string(),
                logo_url: None,
                countries: None,
                enabled: true,
            })
            .await
            .unwrap();
        f.provider_connections
            .create(NewProviderConnection {
                user_id: "user-1".to_string(),
                provider_id: provider.id.clone(),
                secret: "st-secret".to_string(),
            })
            .await
            .unwrap();

        let event = WebhookEvent::Snaptrade(SnapTradeWebhook {
            event_type: "CONNECTION_ADDED".to_string(),
            user_id: "user-1".to_string(),
            brokerage_id: Some("robinhood".to_string()),
            brokerage_authorization_id: Some("auth-9".to_string()),
            account_id: None,
        });

        f.processor.process(event.clone()).await.unwrap();
        f.processor.process(event).await.unwrap();

        let rows = f.institution_connections.all();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].institution_id, institution.id);
        assert_eq!(f.events.len(), 1, "redelivery does not re-emit");
    }

    #[tokio::test]
    async fn test_account_removed_deletes_by_provider_account_id() {
        let f = fixture();
        f.accounts
            .create(NewAccount {
                id: Some("local-1".to_string()),
                user_id: "user-1".to_string(),
                name: "Synced".to_string(),
                currency: "USD".to_string(),
                provider_account_id: Some("pa-1".to_string()),
                institution_connection_id: Some("ic-1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let event = WebhookEvent::Snaptrade(SnapTradeWebhook {
            event_type: "ACCOUNT_REMOVED".to_string(),
            user_id: "user-1".to_string(),
            account_id: Some("pa-1".to_string()),
            ..Default::default()
        });
        f.processor.process(event).await.unwrap();
        assert!(f.accounts.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_saltedge_destroy_removes_connection() {
        let f = fixture();
        seed_connection(&f, "se-conn-1").await;

        let event = WebhookEvent::Saltedge(SaltEdgeWebhook {
            stage: SaltEdgeStage::Destroy,
            customer_id: "cust-1".to_string(),
            connection_id: Some("se-conn-1".to_string()),
        });
        f.processor.process(event).await.unwrap();
        assert!(f.institution_connections.all().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_event_type_is_acked() {
        let f = fixture();
        let result = f
            .processor
            .process(snaptrade_event("NEW_FEATURE_EVENT", "auth-1"))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_provider_user_cleanup_removes_local_rows() {
        let f = fixture();
        let provider = f.providers.upsert("SnapTrade", None).await.unwrap();
        let pc = f
            .provider_connections
            .create(NewProviderConnection {
                user_id: "user-1".to_string(),
                provider_id: provider.id,
                secret: "st-secret".to_string(),
            })
            .await
            .unwrap();
        f.institution_connections
            .insert_idempotent(NewInstitutionConnection {
                provider_connection_id: pc.id,
                institution_id: "inst-1".to_string(),
                connection_id: "auth-1".to_string(),
            })
            .await
            .unwrap();

        // Provider-side teardown is unconfigured here and must not block
        // local cleanup.
        f.processor
            .process(WebhookEvent::ProviderUserCleanup {
                user_id: "user-1".to_string(),
            })
            .await
            .unwrap();

        assert!(f.institution_connections.all().is_empty());
        assert!(f.provider_connections.rows.lock().unwrap().is_empty());
    }
}
