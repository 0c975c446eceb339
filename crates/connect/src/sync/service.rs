//! Sync orchestration: reconciling provider-reported state into local rows.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{debug, warn};
use rust_decimal::Decimal;

use ledgerlink_core::accounts::{
    Account, AccountClassification, AccountRepositoryTrait, AccountSubtype,
    BrokerageParentUpdate, NewAccount,
};
use ledgerlink_core::connections::{
    InstitutionConnection, InstitutionRepositoryTrait, NewInstitution, ProviderConnection,
    ProviderRepositoryTrait,
};
use ledgerlink_core::constants::{
    normalize_currency, BROKERAGE_CASH_ACCOUNT_NAME, SYNCED_ACCOUNT_LOCKS,
    SYNCED_TRANSACTION_LOCKS,
};
use ledgerlink_core::errors::{Error, Result, ValidationError};
use ledgerlink_core::events::{DomainEvent, DomainEventSink};
use ledgerlink_core::locked::LockedAttributes;
use ledgerlink_core::transactions::{NewTransaction, TransactionRepositoryTrait};

use crate::providers::{
    ConnectionRef, ProviderAccount, ProviderClient, ProviderKind,
};

use super::models::{InstitutionSyncSummary, SyncAccountSummary, SyncConnectionSummary};

/// Drives reconciliation for one connection or one account.
///
/// Accounts are processed sequentially in provider-returned order; a
/// transaction-fetch failure for one account is logged and counted without
/// aborting its siblings.
pub struct SyncService {
    accounts: Arc<dyn AccountRepositoryTrait>,
    transactions: Arc<dyn TransactionRepositoryTrait>,
    institutions: Arc<dyn InstitutionRepositoryTrait>,
    events: Arc<dyn DomainEventSink>,
}

fn connection_ref(
    connection: &InstitutionConnection,
    provider_connection: &ProviderConnection,
) -> ConnectionRef {
    ConnectionRef {
        user_id: provider_connection.user_id.clone(),
        user_secret: provider_connection.secret.clone(),
        connection_id: connection.connection_id.clone(),
    }
}

impl SyncService {
    pub fn new(
        accounts: Arc<dyn AccountRepositoryTrait>,
        transactions: Arc<dyn TransactionRepositoryTrait>,
        institutions: Arc<dyn InstitutionRepositoryTrait>,
        events: Arc<dyn DomainEventSink>,
    ) -> Self {
        Self {
            accounts,
            transactions,
            institutions,
            events,
        }
    }

    /// Syncs every account under one institution connection.
    pub async fn sync_connection(
        &self,
        provider: &dyn ProviderClient,
        connection: &InstitutionConnection,
        provider_connection: &ProviderConnection,
    ) -> Result<SyncConnectionSummary> {
        if provider.kind() == ProviderKind::SnapTrade {
            return self
                .sync_snaptrade_connection(provider, connection, provider_connection)
                .await;
        }
        let conn_ref = connection_ref(connection, provider_connection);
        let provider_accounts = provider.accounts(&conn_ref).await?;
        let existing = self.existing_by_provider_account_id(&connection.id)?;

        let mut summary = SyncConnectionSummary::default();
        let mut touched_ids = Vec::new();
        let mut tx_account_ids = Vec::new();

        for provider_account in provider_accounts {
            let local = match existing.get(&provider_account.provider_account_id) {
                Some(account) => {
                    let value = provider_account
                        .classification
                        .normalize_value(provider_account.value);
                    let currency = normalize_currency(&provider_account.currency);
                    self.accounts
                        .update_synced_balance(&account.id, value, &currency)
                        .await?;
                    account.clone()
                }
                None => {
                    self.accounts
                        .create(new_synced_account(
                            &provider_account,
                            &provider_connection.user_id,
                            &connection.id,
                        ))
                        .await?
                }
            };
            summary.accounts_synced += 1;
            touched_ids.push(local.id.clone());

            match self
                .append_unseen_transactions(
                    provider,
                    &conn_ref,
                    &provider_account.provider_account_id,
                    &local.id,
                )
                .await
            {
                Ok(inserted) => {
                    summary.transactions_inserted += inserted;
                    if inserted > 0 {
                        tx_account_ids.push(local.id.clone());
                    }
                }
                Err(e) => {
                    warn!(
                        "Transaction sync failed for account {} on connection {}: {}",
                        local.id, connection.connection_id, e
                    );
                    summary.accounts_failed += 1;
                }
            }
        }

        if !touched_ids.is_empty() {
            self.events.emit(DomainEvent::accounts_changed(touched_ids));
        }
        if !tx_account_ids.is_empty() {
            self.events
                .emit(DomainEvent::transactions_changed(tx_account_ids));
        }
        Ok(summary)
    }

    /// User-triggered refresh of a single synced account.
    pub async fn sync_account(
        &self,
        provider: &dyn ProviderClient,
        account: &Account,
        connection: &InstitutionConnection,
        provider_connection: &ProviderConnection,
    ) -> Result<SyncAccountSummary> {
        let provider_account_id = account.provider_account_id.as_deref().ok_or_else(|| {
            Error::from(ValidationError::InvalidInput(
                "Account is not provider-synced".to_string(),
            ))
        })?;
        let conn_ref = connection_ref(connection, provider_connection);

        let mut summary = SyncAccountSummary::default();
        match provider.kind() {
            ProviderKind::EnableBanking => {
                if let Some(balance) = provider
                    .account_balance(&conn_ref, provider_account_id)
                    .await?
                {
                    self.overwrite_balance(account, balance.value, &balance.currency)
                        .await?;
                    summary.balance_refreshed = true;
                }
            }
            ProviderKind::Teller => {
                // The balance endpoint is not available for every account;
                // a failed read is not an error here.
                match provider.account_balance(&conn_ref, provider_account_id).await {
                    Ok(Some(balance)) => {
                        self.overwrite_balance(account, balance.value, &balance.currency)
                            .await?;
                        summary.balance_refreshed = true;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        debug!(
                            "Skipping balance refresh for account {}: {}",
                            account.id, e
                        );
                    }
                }
            }
            ProviderKind::SaltEdge => {
                // Balances are refreshed server-side and arrive with the
                // connection-level sync.
            }
            ProviderKind::SnapTrade => {
                // No single-account granularity; rebuild the whole connection.
                let connection_summary = self
                    .sync_snaptrade_connection(provider, connection, provider_connection)
                    .await?;
                return Ok(connection_summary.into());
            }
        }

        let inserted = self
            .append_unseen_transactions(provider, &conn_ref, provider_account_id, &account.id)
            .await?;
        summary.transactions_inserted = inserted;
        if inserted > 0 {
            self.events
                .emit(DomainEvent::transactions_changed(vec![account.id.clone()]));
        }
        Ok(summary)
    }

    /// Rebuilds the decomposed cash/position legs of every brokerage account
    /// under one SnapTrade connection.
    pub async fn sync_snaptrade_connection(
        &self,
        provider: &dyn ProviderClient,
        connection: &InstitutionConnection,
        provider_connection: &ProviderConnection,
    ) -> Result<SyncConnectionSummary> {
        let conn_ref = connection_ref(connection, provider_connection);
        let provider_accounts = provider.accounts(&conn_ref).await?;
        let existing = self.existing_by_provider_account_id(&connection.id)?;

        let mut summary = SyncConnectionSummary::default();
        let mut touched_ids = Vec::new();

        for provider_account in provider_accounts {
            let parent = existing
                .get(&provider_account.provider_account_id)
                .cloned();
            match self
                .rebuild_brokerage_account(
                    provider,
                    &conn_ref,
                    &provider_account,
                    parent,
                    connection,
                    &provider_connection.user_id,
                )
                .await
            {
                Ok(parent_id) => {
                    summary.accounts_synced += 1;
                    touched_ids.push(parent_id);
                }
                Err(e) => {
                    warn!(
                        "Holdings sync failed for account {} on connection {}: {}",
                        provider_account.provider_account_id, connection.connection_id, e
                    );
                    summary.accounts_failed += 1;
                }
            }
        }

        if !touched_ids.is_empty() {
            self.events.emit(DomainEvent::accounts_changed(touched_ids));
        }
        Ok(summary)
    }

    /// Refreshes the stored institution catalog for one provider.
    pub async fn sync_institutions(
        &self,
        provider: &dyn ProviderClient,
        provider_id: &str,
    ) -> Result<InstitutionSyncSummary> {
        let catalog = provider.institutions().await?;
        let mut summary = InstitutionSyncSummary::default();
        for institution in catalog {
            self.institutions
                .upsert(NewInstitution {
                    provider_id: provider_id.to_string(),
                    provider_institution_id: institution.provider_institution_id,
                    name: institution.name,
                    logo_url: institution.logo_url,
                    countries: if institution.countries.is_empty() {
                        None
                    } else {
                        Some(institution.countries.join(","))
                    },
                    enabled: institution.enabled,
                })
                .await?;
            summary.upserted += 1;
        }
        Ok(summary)
    }

    fn existing_by_provider_account_id(
        &self,
        institution_connection_id: &str,
    ) -> Result<HashMap<String, Account>> {
        let existing = self
            .accounts
            .list_by_institution_connection(institution_connection_id)?;
        Ok(existing
            .into_iter()
            .filter_map(|account| {
                account
                    .provider_account_id
                    .clone()
                    .map(|provider_id| (provider_id, account))
            })
            .collect())
    }

    async fn overwrite_balance(
        &self,
        account: &Account,
        value: Decimal,
        currency: &str,
    ) -> Result<()> {
        let value = account.classification.normalize_value(value);
        self.accounts
            .update_synced_balance(&account.id, value, &normalize_currency(currency))
            .await
    }

    /// Fetches provider transactions and inserts only the unseen ones, keyed
    /// on `provider_transaction_id`.
    async fn append_unseen_transactions(
        &self,
        provider: &dyn ProviderClient,
        conn_ref: &ConnectionRef,
        provider_account_id: &str,
        local_account_id: &str,
    ) -> Result<usize> {
        let provider_transactions = provider
            .transactions(conn_ref, provider_account_id)
            .await?;
        let known: HashSet<String> = self
            .transactions
            .list_provider_transaction_ids(local_account_id)?
            .into_iter()
            .collect();

        let fresh: Vec<NewTransaction> = provider_transactions
            .into_iter()
            .filter(|tx| !known.contains(&tx.provider_transaction_id))
            .map(|tx| NewTransaction {
                id: None,
                account_id: local_account_id.to_string(),
                description: tx.description,
                amount: tx.amount,
                currency: normalize_currency(&tx.currency),
                posted_at: tx.posted_at,
                provider_transaction_id: Some(tx.provider_transaction_id),
                locked_attributes: LockedAttributes::from_fields(SYNCED_TRANSACTION_LOCKS),
            })
            .collect();
        self.transactions.insert_synced_batch(fresh).await
    }

    /// One SnapTrade aggregate account: update the parent in place, tear down
    /// its legs, reinsert a cash leg and one leg per position, then set the
    /// parent's value from the freshly written children.
    async fn rebuild_brokerage_account(
        &self,
        provider: &dyn ProviderClient,
        conn_ref: &ConnectionRef,
        provider_account: &ProviderAccount,
        parent: Option<Account>,
        connection: &InstitutionConnection,
        user_id: &str,
    ) -> Result<String> {
        let holdings = provider
            .holdings(conn_ref, &provider_account.provider_account_id)
            .await?;
        let total_currency = normalize_currency(&holdings.currency);

        let positions_value: Decimal = holdings
            .positions
            .iter()
            .map(|p| p.price * p.units)
            .sum();
        let total_cost: Decimal = if holdings.positions.is_empty() {
            holdings.total_value
        } else {
            holdings
                .positions
                .iter()
                .map(|p| p.average_purchase_price * p.units)
                .sum()
        };
        let cash_value = holdings.total_value - positions_value;

        let parent = match parent {
            Some(account) => account,
            None => {
                self.accounts
                    .create(new_synced_account(
                        provider_account,
                        user_id,
                        &connection.id,
                    ))
                    .await?
            }
        };

        let mut children = Vec::with_capacity(holdings.positions.len() + 1);
        children.push(NewAccount {
            id: None,
            user_id: user_id.to_string(),
            name: BROKERAGE_CASH_ACCOUNT_NAME.to_string(),
            classification: AccountClassification::Asset,
            subtype: AccountSubtype::Cash,
            currency: total_currency.clone(),
            value: cash_value,
            cost: None,
            ticker: None,
            parent_id: Some(parent.id.clone()),
            institution_connection_id: Some(connection.id.clone()),
            provider_account_id: None,
            locked_attributes: LockedAttributes::from_fields(SYNCED_ACCOUNT_LOCKS),
        });
        for position in &holdings.positions {
            children.push(NewAccount {
                id: None,
                user_id: user_id.to_string(),
                name: position.raw_symbol.clone(),
                classification: AccountClassification::Asset,
                subtype: AccountSubtype::Holding,
                currency: position
                    .currency
                    .as_deref()
                    .map(normalize_currency)
                    .unwrap_or_else(|| total_currency.clone()),
                value: position.price * position.units,
                cost: Some(position.average_purchase_price * position.units),
                ticker: Some(position.raw_symbol.clone()),
                parent_id: Some(parent.id.clone()),
                institution_connection_id: Some(connection.id.clone()),
                provider_account_id: None,
                locked_attributes: LockedAttributes::from_fields(SYNCED_ACCOUNT_LOCKS),
            });
        }

        // Recomputed from the children being written, so the parent equals
        // their sum even when the provider's own total disagrees.
        let parent_value = cash_value + positions_value;
        let updated = self
            .accounts
            .replace_brokerage_children(
                BrokerageParentUpdate {
                    account_id: parent.id.clone(),
                    user_id: user_id.to_string(),
                    name: Some(provider_account.name.clone()),
                    value: parent_value,
                    cost: total_cost,
                    currency: total_currency,
                    locked_attributes: LockedAttributes::from_fields(SYNCED_ACCOUNT_LOCKS),
                },
                children,
            )
            .await?;
        Ok(updated.id)
    }
}

fn new_synced_account(
    provider_account: &ProviderAccount,
    user_id: &str,
    institution_connection_id: &str,
) -> NewAccount {
    NewAccount {
        id: None,
        user_id: user_id.to_string(),
        name: provider_account.name.clone(),
        classification: provider_account.classification,
        subtype: provider_account.subtype,
        currency: normalize_currency(&provider_account.currency),
        value: provider_account
            .classification
            .normalize_value(provider_account.value),
        cost: None,
        ticker: None,
        parent_id: None,
        institution_connection_id: Some(institution_connection_id.to_string()),
        provider_account_id: Some(provider_account.provider_account_id.clone()),
        locked_attributes: LockedAttributes::from_fields(SYNCED_ACCOUNT_LOCKS),
    }
}

/// Seeds the providers table with the closed provider set.
pub async fn seed_providers(repository: &dyn ProviderRepositoryTrait) -> Result<()> {
    for kind in ProviderKind::ALL {
        repository.upsert(kind.display_name(), None).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    use ledgerlink_core::accounts::AccountUpdate;
    use ledgerlink_core::connections::Institution;
    use ledgerlink_core::errors::DatabaseError;
    use ledgerlink_core::events::MockDomainEventSink;
    use ledgerlink_core::transactions::{Transaction, TransactionUpdate};

    use crate::providers::{
        AccountBalance, AccountHoldings, ConnectAction, ConnectRequest, ProviderError,
        ProviderInstitution, ProviderPosition, ProviderResult, ProviderTransaction,
        ProviderUserRef, RegisteredUser,
    };

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[derive(Default)]
    struct FakeAccountRepo {
        rows: Mutex<Vec<Account>>,
    }

    impl FakeAccountRepo {
        fn all(&self) -> Vec<Account> {
            self.rows.lock().unwrap().clone()
        }

        fn find(&self, id: &str) -> Option<Account> {
            self.all().into_iter().find(|a| a.id == id)
        }
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
            let mut rows = self.rows.lock().unwrap();
            let account = rows
                .iter_mut()
                .find(|a| a.id == update.id)
                .ok_or_else(|| DatabaseError::NotFound(update.id.clone()))?;
            if let Some(name) = update.name {
                account.name = name;
            }
            if let Some(value) = update.value {
                account.value = value;
            }
            Ok(account.clone())
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
            self.find(account_id)
                .ok_or_else(|| DatabaseError::NotFound(account_id.to_string()).into())
        }

        fn list_by_user(&self, user_id: &str) -> Result<Vec<Account>> {
            Ok(self
                .all()
                .into_iter()
                .filter(|a| a.user_id == user_id)
                .collect())
        }

        fn list_by_institution_connection(
            &self,
            institution_connection_id: &str,
        ) -> Result<Vec<Account>> {
            Ok(self
                .all()
                .into_iter()
                .filter(|a| {
                    a.institution_connection_id.as_deref() == Some(institution_connection_id)
                })
                .collect())
        }

        async fn update_synced_balance(
            &self,
            account_id: &str,
            value: Decimal,
            currency: &str,
        ) -> Result<()> {
            let mut rows = self.rows.lock().unwrap();
            let account = rows
                .iter_mut()
                .find(|a| a.id == account_id)
                .ok_or_else(|| DatabaseError::NotFound(account_id.to_string()))?;
            account.value = value;
            account.currency = currency.to_string();
            Ok(())
        }

        async fn replace_brokerage_children(
            &self,
            parent: BrokerageParentUpdate,
            children: Vec<NewAccount>,
        ) -> Result<Account> {
            {
                let mut rows = self.rows.lock().unwrap();
                let row = rows
                    .iter_mut()
                    .find(|a| a.id == parent.account_id)
                    .ok_or_else(|| DatabaseError::NotFound(parent.account_id.clone()))?;
                if let Some(name) = parent.name {
                    row.name = name;
                }
                row.value = parent.value;
                row.cost = Some(parent.cost);
                row.currency = parent.currency;
                row.parent_id = None;
                row.locked_attributes = parent.locked_attributes;

                rows.retain(|a| {
                    !(a.parent_id.as_deref() == Some(parent.account_id.as_str())
                        && a.user_id == parent.user_id)
                });
            }
            for child in children {
                self.create(child).await?;
            }
            self.get_by_id(&parent.account_id)
        }
    }

    #[derive(Default)]
    struct FakeTransactionRepo {
        rows: Mutex<Vec<Transaction>>,
    }

    impl FakeTransactionRepo {
        fn all(&self) -> Vec<Transaction> {
            self.rows.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TransactionRepositoryTrait for FakeTransactionRepo {
        fn get_by_id(&self, transaction_id: &str) -> Result<Transaction> {
            self.all()
                .into_iter()
                .find(|t| t.id == transaction_id)
                .ok_or_else(|| DatabaseError::NotFound(transaction_id.to_string()).into())
        }

        fn list_by_account(&self, account_id: &str) -> Result<Vec<Transaction>> {
            Ok(self
                .all()
                .into_iter()
                .filter(|t| t.account_id == account_id)
                .collect())
        }

        fn list_provider_transaction_ids(&self, account_id: &str) -> Result<Vec<String>> {
            Ok(self
                .all()
                .into_iter()
                .filter(|t| t.account_id == account_id)
                .filter_map(|t| t.provider_transaction_id)
                .collect())
        }

        async fn insert_synced_batch(
            &self,
            new_transactions: Vec<NewTransaction>,
        ) -> Result<usize> {
            let now = chrono::Utc::now().naive_utc();
            let mut rows = self.rows.lock().unwrap();
            let count = new_transactions.len();
            for tx in new_transactions {
                rows.push(Transaction {
                    id: tx
                        .id
                        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                    account_id: tx.account_id,
                    description: tx.description,
                    amount: tx.amount,
                    currency: tx.currency,
                    posted_at: tx.posted_at,
                    provider_transaction_id: tx.provider_transaction_id,
                    locked_attributes: tx.locked_attributes,
                    created_at: now,
                    updated_at: now,
                });
            }
            Ok(count)
        }

        async fn create_with_rollup(
            &self,
            new_transaction: NewTransaction,
            _account_delta: Decimal,
        ) -> Result<Transaction> {
            let inserted = self.insert_synced_batch(vec![new_transaction]).await?;
            assert_eq!(inserted, 1);
            Ok(self.all().last().cloned().unwrap())
        }

        async fn update_with_rollup(
            &self,
            update: TransactionUpdate,
            _account_delta: Decimal,
        ) -> Result<Transaction> {
            Err(DatabaseError::NotFound(update.id).into())
        }

        async fn delete_with_rollup(
            &self,
            transaction_id: &str,
            _account_delta: Decimal,
        ) -> Result<usize> {
            Err(DatabaseError::NotFound(transaction_id.to_string()).into())
        }
    }

    #[derive(Default)]
    struct FakeInstitutionRepo {
        rows: Mutex<Vec<Institution>>,
    }

    #[async_trait]
    impl InstitutionRepositoryTrait for FakeInstitutionRepo {
        async fn upsert(&self, institution: NewInstitution) -> Result<Institution> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(existing) = rows.iter_mut().find(|i| {
                i.provider_id == institution.provider_id
                    && i.provider_institution_id == institution.provider_institution_id
            }) {
                existing.name = institution.name;
                existing.enabled = institution.enabled;
                return Ok(existing.clone());
            }
            let row = Institution {
                id: uuid::Uuid::new_v4().to_string(),
                provider_id: institution.provider_id,
                provider_institution_id: institution.provider_institution_id,
                name: institution.name,
                logo_url: institution.logo_url,
                countries: institution.countries,
                enabled: institution.enabled,
            };
            rows.push(row.clone());
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
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|i| i.enabled)
                .cloned()
                .collect())
        }
    }

    struct FakeProvider {
        kind: ProviderKind,
        accounts: Vec<ProviderAccount>,
        transactions: HashMap<String, Vec<ProviderTransaction>>,
        failing_accounts: HashSet<String>,
        holdings: HashMap<String, AccountHoldings>,
    }

    impl FakeProvider {
        fn new(kind: ProviderKind) -> Self {
            Self {
                kind,
                accounts: Vec::new(),
                transactions: HashMap::new(),
                failing_accounts: HashSet::new(),
                holdings: HashMap::new(),
            }
        }
    }

    #[async_trait]
    impl ProviderClient for FakeProvider {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        async fn institutions(&self) -> ProviderResult<Vec<ProviderInstitution>> {
            Ok(vec![
                ProviderInstitution {
                    provider_institution_id: "inst-a".to_string(),
                    name: "Bank A".to_string(),
                    logo_url: None,
                    countries: vec!["FI".to_string()],
                    enabled: true,
                },
                ProviderInstitution {
                    provider_institution_id: "inst-b".to_string(),
                    name: "Bank B".to_string(),
                    logo_url: None,
                    countries: vec![],
                    enabled: false,
                },
            ])
        }

        async fn register_user(&self, user_id: &str) -> ProviderResult<RegisteredUser> {
            Ok(RegisteredUser {
                user_id: user_id.to_string(),
                user_secret: String::new(),
            })
        }

        async fn deregister_user(&self, _user: &ProviderUserRef) -> ProviderResult<()> {
            Ok(())
        }

        async fn connect(&self, _request: &ConnectRequest) -> ProviderResult<ConnectAction> {
            Err(ProviderError::Unsupported("not exercised"))
        }

        async fn refresh_connection(&self, _conn: &ConnectionRef) -> ProviderResult<()> {
            Ok(())
        }

        async fn accounts(&self, _conn: &ConnectionRef) -> ProviderResult<Vec<ProviderAccount>> {
            Ok(self.accounts.clone())
        }

        async fn transactions(
            &self,
            _conn: &ConnectionRef,
            provider_account_id: &str,
        ) -> ProviderResult<Vec<ProviderTransaction>> {
            if self.failing_accounts.contains(provider_account_id) {
                return Err(ProviderError::Api("upstream timeout".to_string()));
            }
            Ok(self
                .transactions
                .get(provider_account_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn account_balance(
            &self,
            _conn: &ConnectionRef,
            provider_account_id: &str,
        ) -> ProviderResult<Option<AccountBalance>> {
            Ok(self
                .accounts
                .iter()
                .find(|a| a.provider_account_id == provider_account_id)
                .map(|a| AccountBalance {
                    value: a.value,
                    currency: a.currency.clone(),
                }))
        }

        async fn holdings(
            &self,
            _conn: &ConnectionRef,
            provider_account_id: &str,
        ) -> ProviderResult<AccountHoldings> {
            self.holdings
                .get(provider_account_id)
                .cloned()
                .ok_or_else(|| ProviderError::Api("no holdings".to_string()))
        }
    }

    struct Fixture {
        service: SyncService,
        accounts: Arc<FakeAccountRepo>,
        transactions: Arc<FakeTransactionRepo>,
        institutions: Arc<FakeInstitutionRepo>,
        events: Arc<MockDomainEventSink>,
    }

    fn fixture() -> Fixture {
        let accounts = Arc::new(FakeAccountRepo::default());
        let transactions = Arc::new(FakeTransactionRepo::default());
        let institutions = Arc::new(FakeInstitutionRepo::default());
        let events = Arc::new(MockDomainEventSink::new());
        let service = SyncService::new(
            accounts.clone(),
            transactions.clone(),
            institutions.clone(),
            events.clone(),
        );
        Fixture {
            service,
            accounts,
            transactions,
            institutions,
            events,
        }
    }

    fn institution_connection() -> InstitutionConnection {
        InstitutionConnection {
            id: "ic-1".to_string(),
            provider_connection_id: "pc-1".to_string(),
            institution_id: "inst-1".to_string(),
            connection_id: "conn-1".to_string(),
            broken: false,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    fn provider_connection() -> ProviderConnection {
        ProviderConnection {
            id: "pc-1".to_string(),
            user_id: "user-1".to_string(),
            provider_id: "prov-1".to_string(),
            secret: "secret".to_string(),
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    fn bank_account(id: &str, currency: &str, value: &str) -> ProviderAccount {
        ProviderAccount {
            provider_account_id: id.to_string(),
            name: format!("Account {id}"),
            classification: AccountClassification::Asset,
            subtype: AccountSubtype::Depository,
            currency: currency.to_string(),
            value: dec(value),
        }
    }

    fn bank_tx(id: &str, amount: &str) -> ProviderTransaction {
        ProviderTransaction {
            provider_transaction_id: id.to_string(),
            description: format!("tx {id}"),
            amount: dec(amount),
            currency: "EUR".to_string(),
            posted_at: date("2024-03-01"),
        }
    }

    #[tokio::test]
    async fn test_pull_sync_creates_locked_accounts_and_normalizes_currency() {
        let f = fixture();
        let mut provider = FakeProvider::new(ProviderKind::SaltEdge);
        provider.accounts = vec![bank_account("acc-1", "RUR", "150.50")];

        let summary = f
            .service
            .sync_connection(&provider, &institution_connection(), &provider_connection())
            .await
            .unwrap();

        assert_eq!(summary.accounts_synced, 1);
        assert_eq!(summary.accounts_failed, 0);
        let stored = f.accounts.all();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].currency, "RUB");
        assert_eq!(stored[0].value, dec("150.50"));
        assert_eq!(stored[0].provider_account_id.as_deref(), Some("acc-1"));
        assert!(stored[0].locked_attributes.is_locked("value"));
        assert!(stored[0].locked_attributes.is_locked("currency"));
        assert_eq!(f.events.len(), 1);
    }

    #[tokio::test]
    async fn test_pull_sync_updates_balance_without_touching_name() {
        let f = fixture();
        f.accounts
            .create(NewAccount {
                id: Some("local-1".to_string()),
                user_id: "user-1".to_string(),
                name: "My renamed account".to_string(),
                classification: AccountClassification::Asset,
                subtype: AccountSubtype::Depository,
                currency: "EUR".to_string(),
                value: dec("10"),
                cost: None,
                ticker: None,
                parent_id: None,
                institution_connection_id: Some("ic-1".to_string()),
                provider_account_id: Some("acc-1".to_string()),
                locked_attributes: LockedAttributes::from_fields(SYNCED_ACCOUNT_LOCKS),
            })
            .await
            .unwrap();

        let mut provider = FakeProvider::new(ProviderKind::SaltEdge);
        provider.accounts = vec![bank_account("acc-1", "EUR", "42")];

        f.service
            .sync_connection(&provider, &institution_connection(), &provider_connection())
            .await
            .unwrap();

        let stored = f.accounts.all();
        assert_eq!(stored.len(), 1, "no duplicate row for a known account");
        assert_eq!(stored[0].value, dec("42"));
        assert_eq!(stored[0].name, "My renamed account");
    }

    #[tokio::test]
    async fn test_liability_balance_stored_negative() {
        let f = fixture();
        let mut provider = FakeProvider::new(ProviderKind::SaltEdge);
        provider.accounts = vec![ProviderAccount {
            provider_account_id: "cc-1".to_string(),
            name: "Credit card".to_string(),
            classification: AccountClassification::Liability,
            subtype: AccountSubtype::CreditCard,
            currency: "EUR".to_string(),
            value: dec("250"),
        }];

        f.service
            .sync_connection(&provider, &institution_connection(), &provider_connection())
            .await
            .unwrap();

        assert_eq!(f.accounts.all()[0].value, dec("-250"));
    }

    #[tokio::test]
    async fn test_transaction_dedup_inserts_only_unseen() {
        let f = fixture();
        let local = f
            .accounts
            .create(NewAccount {
                id: Some("local-1".to_string()),
                user_id: "user-1".to_string(),
                name: "Checking".to_string(),
                classification: AccountClassification::Asset,
                subtype: AccountSubtype::Depository,
                currency: "EUR".to_string(),
                value: dec("0"),
                cost: None,
                ticker: None,
                parent_id: None,
                institution_connection_id: Some("ic-1".to_string()),
                provider_account_id: Some("acc-1".to_string()),
                locked_attributes: LockedAttributes::default(),
            })
            .await
            .unwrap();
        // One of the three provider transactions is already known locally.
        f.transactions
            .insert_synced_batch(vec![NewTransaction {
                id: None,
                account_id: local.id.clone(),
                description: "existing row".to_string(),
                amount: dec("-5"),
                currency: "EUR".to_string(),
                posted_at: date("2024-02-28"),
                provider_transaction_id: Some("t-1".to_string()),
                locked_attributes: LockedAttributes::default(),
            }])
            .await
            .unwrap();

        let mut provider = FakeProvider::new(ProviderKind::SaltEdge);
        provider.accounts = vec![bank_account("acc-1", "EUR", "100")];
        provider.transactions.insert(
            "acc-1".to_string(),
            vec![bank_tx("t-1", "-5"), bank_tx("t-2", "20"), bank_tx("t-3", "-7.50")],
        );

        let summary = f
            .service
            .sync_connection(&provider, &institution_connection(), &provider_connection())
            .await
            .unwrap();

        assert_eq!(summary.transactions_inserted, 2);
        let rows = f.transactions.all();
        assert_eq!(rows.len(), 3);
        let existing = rows
            .iter()
            .find(|t| t.provider_transaction_id.as_deref() == Some("t-1"))
            .unwrap();
        assert_eq!(existing.description, "existing row", "known row untouched");
        let fresh = rows
            .iter()
            .find(|t| t.provider_transaction_id.as_deref() == Some("t-2"))
            .unwrap();
        assert!(fresh.locked_attributes.is_locked("amount"));
    }

    #[tokio::test]
    async fn test_partial_failure_isolation_across_sibling_accounts() {
        let f = fixture();
        let mut provider = FakeProvider::new(ProviderKind::SaltEdge);
        provider.accounts = vec![
            bank_account("acc-a", "EUR", "1"),
            bank_account("acc-b", "EUR", "2"),
            bank_account("acc-c", "EUR", "3"),
        ];
        for id in ["acc-a", "acc-b", "acc-c"] {
            provider
                .transactions
                .insert(id.to_string(), vec![bank_tx(&format!("{id}-t1"), "10")]);
        }
        provider.failing_accounts.insert("acc-b".to_string());

        let summary = f
            .service
            .sync_connection(&provider, &institution_connection(), &provider_connection())
            .await
            .unwrap();

        assert_eq!(summary.accounts_synced, 3);
        assert_eq!(summary.accounts_failed, 1);
        assert_eq!(summary.transactions_inserted, 2);
        let inserted_for: Vec<Option<String>> = f
            .transactions
            .all()
            .into_iter()
            .map(|t| t.provider_transaction_id)
            .collect();
        assert!(inserted_for.contains(&Some("acc-a-t1".to_string())));
        assert!(inserted_for.contains(&Some("acc-c-t1".to_string())));
        assert!(!inserted_for.contains(&Some("acc-b-t1".to_string())));
    }

    fn snaptrade_holdings() -> AccountHoldings {
        AccountHoldings {
            total_value: dec("1000"),
            currency: "USD".to_string(),
            positions: vec![
                ProviderPosition {
                    raw_symbol: "AAPL".to_string(),
                    units: dec("5"),
                    price: dec("10"),
                    average_purchase_price: dec("8"),
                    currency: Some("usd".to_string()),
                },
                ProviderPosition {
                    raw_symbol: "MSFT".to_string(),
                    units: dec("2"),
                    price: dec("20"),
                    average_purchase_price: dec("15"),
                    currency: None,
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_snaptrade_parent_equals_sum_of_children() {
        let f = fixture();
        let mut provider = FakeProvider::new(ProviderKind::SnapTrade);
        provider.accounts = vec![ProviderAccount {
            provider_account_id: "st-acc".to_string(),
            name: "Robinhood Individual".to_string(),
            classification: AccountClassification::Asset,
            subtype: AccountSubtype::Brokerage,
            currency: "USD".to_string(),
            value: dec("1000"),
        }];
        provider
            .holdings
            .insert("st-acc".to_string(), snaptrade_holdings());

        let summary = f
            .service
            .sync_connection(&provider, &institution_connection(), &provider_connection())
            .await
            .unwrap();
        assert_eq!(summary.accounts_synced, 1);

        let stored = f.accounts.all();
        let parent = stored
            .iter()
            .find(|a| a.provider_account_id.as_deref() == Some("st-acc"))
            .unwrap();
        let children: Vec<&Account> = stored
            .iter()
            .filter(|a| a.parent_id.as_deref() == Some(parent.id.as_str()))
            .collect();

        assert_eq!(children.len(), 3, "cash leg plus one leg per position");
        let children_sum: Decimal = children.iter().map(|c| c.value).sum();
        assert_eq!(parent.value, children_sum);
        assert_eq!(parent.value, dec("1000"));
        assert_eq!(parent.cost, Some(dec("70")));

        let cash = children
            .iter()
            .find(|c| c.subtype == AccountSubtype::Cash)
            .unwrap();
        assert_eq!(cash.name, "Cash");
        assert_eq!(cash.value, dec("910"));

        let apple = children
            .iter()
            .find(|c| c.ticker.as_deref() == Some("AAPL"))
            .unwrap();
        assert_eq!(apple.value, dec("50"));
        assert_eq!(apple.cost, Some(dec("40")));
        assert_eq!(apple.currency, "USD");
    }

    #[tokio::test]
    async fn test_snaptrade_resync_regenerates_children_without_duplicates() {
        let f = fixture();
        let mut provider = FakeProvider::new(ProviderKind::SnapTrade);
        provider.accounts = vec![ProviderAccount {
            provider_account_id: "st-acc".to_string(),
            name: "Brokerage".to_string(),
            classification: AccountClassification::Asset,
            subtype: AccountSubtype::Brokerage,
            currency: "USD".to_string(),
            value: dec("1000"),
        }];
        provider
            .holdings
            .insert("st-acc".to_string(), snaptrade_holdings());

        let connection = institution_connection();
        let pc = provider_connection();
        f.service
            .sync_connection(&provider, &connection, &pc)
            .await
            .unwrap();
        f.service
            .sync_connection(&provider, &connection, &pc)
            .await
            .unwrap();

        // One parent plus three legs, not accumulated across syncs.
        assert_eq!(f.accounts.all().len(), 4);
    }

    #[tokio::test]
    async fn test_sync_institutions_upserts_catalog() {
        let f = fixture();
        let provider = FakeProvider::new(ProviderKind::SaltEdge);

        let summary = f
            .service
            .sync_institutions(&provider, "prov-1")
            .await
            .unwrap();
        assert_eq!(summary.upserted, 2);

        // Re-running updates in place instead of duplicating.
        f.service
            .sync_institutions(&provider, "prov-1")
            .await
            .unwrap();
        assert_eq!(f.institutions.rows.lock().unwrap().len(), 2);
        assert_eq!(f.institutions.list_enabled().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sync_account_refreshes_balance_for_enable_banking() {
        let f = fixture();
        let local = f
            .accounts
            .create(NewAccount {
                id: Some("local-1".to_string()),
                user_id: "user-1".to_string(),
                name: "Checking".to_string(),
                classification: AccountClassification::Asset,
                subtype: AccountSubtype::Depository,
                currency: "EUR".to_string(),
                value: dec("10"),
                cost: None,
                ticker: None,
                parent_id: None,
                institution_connection_id: Some("ic-1".to_string()),
                provider_account_id: Some("acc-1".to_string()),
                locked_attributes: LockedAttributes::default(),
            })
            .await
            .unwrap();

        let mut provider = FakeProvider::new(ProviderKind::EnableBanking);
        provider.accounts = vec![bank_account("acc-1", "EUR", "99.99")];

        let summary = f
            .service
            .sync_account(&provider, &local, &institution_connection(), &provider_connection())
            .await
            .unwrap();

        assert!(summary.balance_refreshed);
        assert_eq!(f.accounts.find("local-1").unwrap().value, dec("99.99"));
    }
}
