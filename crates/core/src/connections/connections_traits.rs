//! Repository traits for providers, institutions, and connections.

use async_trait::async_trait;

use super::connections_model::{
    Institution, InstitutionConnection, NewInstitution, NewInstitutionConnection,
    NewProviderConnection, Provider, ProviderConnection,
};
use crate::errors::Result;

#[async_trait]
pub trait ProviderRepositoryTrait: Send + Sync {
    /// Upserts a provider by name. Used by the seed path.
    async fn upsert(&self, name: &str, logo_url: Option<&str>) -> Result<Provider>;

    fn find_by_name(&self, name: &str) -> Result<Option<Provider>>;

    fn list(&self) -> Result<Vec<Provider>>;
}

#[async_trait]
pub trait InstitutionRepositoryTrait: Send + Sync {
    /// Upserts keyed on `(provider_id, provider_institution_id)`.
    async fn upsert(&self, institution: NewInstitution) -> Result<Institution>;

    fn get_by_id(&self, institution_id: &str) -> Result<Institution>;

    fn find_by_provider_institution_id(
        &self,
        provider_id: &str,
        provider_institution_id: &str,
    ) -> Result<Option<Institution>>;

    fn list_enabled(&self) -> Result<Vec<Institution>>;
}

#[async_trait]
pub trait ProviderConnectionRepositoryTrait: Send + Sync {
    async fn create(&self, new_connection: NewProviderConnection) -> Result<ProviderConnection>;

    fn find_by_user_and_provider(
        &self,
        user_id: &str,
        provider_id: &str,
    ) -> Result<Option<ProviderConnection>>;

    fn get_by_id(&self, id: &str) -> Result<ProviderConnection>;

    fn list_by_user(&self, user_id: &str) -> Result<Vec<ProviderConnection>>;

    async fn delete(&self, id: &str) -> Result<usize>;
}

#[async_trait]
pub trait InstitutionConnectionRepositoryTrait: Send + Sync {
    /// Inserts with "do nothing on conflict" keyed on the provider's
    /// `connection_id`. Returns `None` when the row already existed, which
    /// callers treat as "already connected" (a success path).
    async fn insert_idempotent(
        &self,
        new_connection: NewInstitutionConnection,
    ) -> Result<Option<InstitutionConnection>>;

    fn get_by_id(&self, id: &str) -> Result<InstitutionConnection>;

    fn find_by_connection_id(&self, connection_id: &str)
        -> Result<Option<InstitutionConnection>>;

    fn list_by_provider_connection(
        &self,
        provider_connection_id: &str,
    ) -> Result<Vec<InstitutionConnection>>;

    /// Flags or clears the broken state, returning affected rows.
    async fn set_broken(&self, connection_id: &str, broken: bool) -> Result<usize>;

    async fn delete_by_connection_id(&self, connection_id: &str) -> Result<usize>;

    async fn delete(&self, id: &str) -> Result<usize>;
}
