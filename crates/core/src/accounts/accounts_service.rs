//! Account service: business validation on top of the repository.

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use super::accounts_model::{Account, AccountUpdate, NewAccount};
use super::accounts_traits::{AccountRepositoryTrait, AccountServiceTrait};
use crate::errors::Result;

/// Service for managing accounts.
pub struct AccountService {
    repository: Arc<dyn AccountRepositoryTrait>,
}

impl AccountService {
    pub fn new(repository: Arc<dyn AccountRepositoryTrait>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl AccountServiceTrait for AccountService {
    async fn create_account(&self, mut new_account: NewAccount) -> Result<Account> {
        new_account.validate()?;
        new_account.value = new_account.classification.normalize_value(new_account.value);
        debug!(
            "Creating account '{}' ({}/{})",
            new_account.name,
            new_account.classification.as_str(),
            new_account.subtype.as_str()
        );
        self.repository.create(new_account).await
    }

    async fn update_account(&self, mut update: AccountUpdate) -> Result<Account> {
        let existing = self.repository.get_by_id(&update.id)?;
        existing
            .locked_attributes
            .ensure_unlocked(&update.touched_fields())?;

        // Liability values are stored negative; re-normalize whenever the
        // update touches the value or flips the classification.
        let classification = update.classification.unwrap_or(existing.classification);
        if let Some(value) = update.value {
            update.value = Some(classification.normalize_value(value));
        } else if update.classification.is_some() {
            update.value = Some(classification.normalize_value(existing.value));
        }

        self.repository.update(update).await
    }

    async fn delete_account(&self, account_id: &str) -> Result<()> {
        self.repository.delete(account_id).await?;
        Ok(())
    }

    fn get_account(&self, account_id: &str) -> Result<Account> {
        self.repository.get_by_id(account_id)
    }

    fn list_accounts(&self, user_id: &str) -> Result<Vec<Account>> {
        self.repository.list_by_user(user_id)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use rust_decimal::Decimal;

    use super::*;
    use crate::accounts::accounts_model::{
        AccountClassification, AccountSubtype, BrokerageParentUpdate,
    };
    use crate::errors::Error;
    use crate::locked::LockedAttributes;

    #[derive(Default)]
    struct InMemoryAccountRepository {
        accounts: Mutex<HashMap<String, Account>>,
    }

    impl InMemoryAccountRepository {
        fn insert(&self, account: Account) {
            self.accounts
                .lock()
                .unwrap()
                .insert(account.id.clone(), account);
        }
    }

    #[async_trait]
    impl AccountRepositoryTrait for InMemoryAccountRepository {
        async fn create(&self, new_account: NewAccount) -> Result<Account> {
            let id = new_account
                .id
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let account = Account {
                id: id.clone(),
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
                created_at: chrono::Utc::now().naive_utc(),
                updated_at: chrono::Utc::now().naive_utc(),
            };
            self.insert(account.clone());
            Ok(account)
        }

        async fn update(&self, update: AccountUpdate) -> Result<Account> {
            let mut accounts = self.accounts.lock().unwrap();
            let account = accounts.get_mut(&update.id).ok_or_else(|| {
                Error::Database(crate::errors::DatabaseError::NotFound(update.id.clone()))
            })?;
            if let Some(name) = update.name {
                account.name = name;
            }
            if let Some(classification) = update.classification {
                account.classification = classification;
            }
            if let Some(subtype) = update.subtype {
                account.subtype = subtype;
            }
            if let Some(currency) = update.currency {
                account.currency = currency;
            }
            if let Some(value) = update.value {
                account.value = value;
            }
            if let Some(cost) = update.cost {
                account.cost = Some(cost);
            }
            if let Some(ticker) = update.ticker {
                account.ticker = Some(ticker);
            }
            Ok(account.clone())
        }

        async fn delete(&self, account_id: &str) -> Result<usize> {
            Ok(self
                .accounts
                .lock()
                .unwrap()
                .remove(account_id)
                .map(|_| 1)
                .unwrap_or(0))
        }

        async fn delete_by_provider_account_id(
            &self,
            provider_account_id: &str,
        ) -> Result<usize> {
            let mut accounts = self.accounts.lock().unwrap();
            let before = accounts.len();
            accounts
                .retain(|_, a| a.provider_account_id.as_deref() != Some(provider_account_id));
            Ok(before - accounts.len())
        }

        fn get_by_id(&self, account_id: &str) -> Result<Account> {
            self.accounts
                .lock()
                .unwrap()
                .get(account_id)
                .cloned()
                .ok_or_else(|| {
                    Error::Database(crate::errors::DatabaseError::NotFound(
                        account_id.to_string(),
                    ))
                })
        }

        fn list_by_user(&self, user_id: &str) -> Result<Vec<Account>> {
            Ok(self
                .accounts
                .lock()
                .unwrap()
                .values()
                .filter(|a| a.user_id == user_id)
                .cloned()
                .collect())
        }

        fn list_by_institution_connection(
            &self,
            institution_connection_id: &str,
        ) -> Result<Vec<Account>> {
            Ok(self
                .accounts
                .lock()
                .unwrap()
                .values()
                .filter(|a| {
                    a.institution_connection_id.as_deref() == Some(institution_connection_id)
                })
                .cloned()
                .collect())
        }

        async fn update_synced_balance(
            &self,
            account_id: &str,
            value: Decimal,
            currency: &str,
        ) -> Result<()> {
            let mut accounts = self.accounts.lock().unwrap();
            if let Some(account) = accounts.get_mut(account_id) {
                account.value = value;
                account.currency = currency.to_string();
            }
            Ok(())
        }

        async fn replace_brokerage_children(
            &self,
            parent: BrokerageParentUpdate,
            children: Vec<NewAccount>,
        ) -> Result<Account> {
            {
                let mut accounts = self.accounts.lock().unwrap();
                accounts.retain(|_, a| {
                    !(a.parent_id.as_deref() == Some(parent.account_id.as_str())
                        && a.user_id == parent.user_id)
                });
                let row = accounts.get_mut(&parent.account_id).ok_or_else(|| {
                    Error::Database(crate::errors::DatabaseError::NotFound(
                        parent.account_id.clone(),
                    ))
                })?;
                row.value = parent.value;
                row.cost = Some(parent.cost);
                row.currency = parent.currency.clone();
                row.classification = AccountClassification::Asset;
                row.subtype = AccountSubtype::Brokerage;
                row.parent_id = None;
                row.locked_attributes = parent.locked_attributes.clone();
                if let Some(name) = parent.name.clone() {
                    row.name = name;
                }
            }
            for child in children {
                self.create(child).await?;
            }
            self.get_by_id(&parent.account_id)
        }
    }

    fn manual_account(value: Decimal) -> NewAccount {
        NewAccount {
            user_id: "user-1".to_string(),
            name: "Checking".to_string(),
            classification: AccountClassification::Asset,
            subtype: AccountSubtype::Depository,
            currency: "EUR".to_string(),
            value,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_liability_value_stored_negative() {
        let repo = Arc::new(InMemoryAccountRepository::default());
        let service = AccountService::new(repo);

        let mut new_account = manual_account(Decimal::new(2500, 0));
        new_account.classification = AccountClassification::Liability;
        new_account.subtype = AccountSubtype::CreditCard;

        let account = service.create_account(new_account).await.unwrap();
        assert_eq!(account.value, Decimal::new(-2500, 0));
    }

    #[tokio::test]
    async fn test_liability_sign_on_update() {
        let repo = Arc::new(InMemoryAccountRepository::default());
        let service = AccountService::new(repo);

        let mut new_account = manual_account(Decimal::new(100, 0));
        new_account.classification = AccountClassification::Liability;
        let account = service.create_account(new_account).await.unwrap();

        let updated = service
            .update_account(AccountUpdate {
                id: account.id.clone(),
                value: Some(Decimal::new(300, 0)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.value, Decimal::new(-300, 0));
    }

    #[tokio::test]
    async fn test_locked_fields_rejected_with_names() {
        let repo = Arc::new(InMemoryAccountRepository::default());
        let service = AccountService::new(repo.clone());

        let mut new_account = manual_account(Decimal::new(10, 0));
        new_account.locked_attributes =
            LockedAttributes::from_fields(&["value", "currency"]);
        let account = service.create_account(new_account).await.unwrap();

        let err = service
            .update_account(AccountUpdate {
                id: account.id.clone(),
                value: Some(Decimal::ONE),
                currency: Some("USD".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        match err {
            Error::LockedAttributes(fields) => {
                assert_eq!(fields, vec!["currency".to_string(), "value".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }

        // No mutation happened.
        let unchanged = service.get_account(&account.id).unwrap();
        assert_eq!(unchanged.value, Decimal::new(10, 0));
        assert_eq!(unchanged.currency, "EUR");

        // Unlocked fields remain updatable.
        let renamed = service
            .update_account(AccountUpdate {
                id: account.id,
                name: Some("Renamed".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(renamed.name, "Renamed");
    }
}
