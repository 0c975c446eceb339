//! Database models for providers, institutions, and connections.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use ledgerlink_core::connections::{
    Institution, InstitutionConnection, NewInstitution, NewInstitutionConnection,
    NewProviderConnection, Provider, ProviderConnection,
};

#[derive(
    Queryable, Identifiable, Insertable, AsChangeset, Selectable, Serialize, Deserialize, Debug, Clone,
)]
#[diesel(table_name = crate::schema::providers)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ProviderDB {
    pub id: String,
    pub name: String,
    pub logo_url: Option<String>,
}

impl From<ProviderDB> for Provider {
    fn from(db: ProviderDB) -> Self {
        Self {
            id: db.id,
            name: db.name,
            logo_url: db.logo_url,
        }
    }
}

#[derive(
    Queryable, Identifiable, Insertable, AsChangeset, Selectable, Serialize, Deserialize, Debug, Clone,
)]
#[diesel(table_name = crate::schema::institutions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct InstitutionDB {
    pub id: String,
    pub provider_id: String,
    pub provider_institution_id: String,
    pub name: String,
    pub logo_url: Option<String>,
    pub countries: Option<String>,
    pub enabled: bool,
}

impl From<InstitutionDB> for Institution {
    fn from(db: InstitutionDB) -> Self {
        Self {
            id: db.id,
            provider_id: db.provider_id,
            provider_institution_id: db.provider_institution_id,
            name: db.name,
            logo_url: db.logo_url,
            countries: db.countries,
            enabled: db.enabled,
        }
    }
}

impl From<NewInstitution> for InstitutionDB {
    fn from(domain: NewInstitution) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            provider_id: domain.provider_id,
            provider_institution_id: domain.provider_institution_id,
            name: domain.name,
            logo_url: domain.logo_url,
            countries: domain.countries,
            enabled: domain.enabled,
        }
    }
}

#[derive(
    Queryable, Identifiable, Insertable, AsChangeset, Selectable, Serialize, Deserialize, Debug, Clone,
)]
#[diesel(table_name = crate::schema::provider_connections)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ProviderConnectionDB {
    pub id: String,
    pub user_id: String,
    pub provider_id: String,
    pub secret: String,
    pub created_at: NaiveDateTime,
}

impl From<ProviderConnectionDB> for ProviderConnection {
    fn from(db: ProviderConnectionDB) -> Self {
        Self {
            id: db.id,
            user_id: db.user_id,
            provider_id: db.provider_id,
            secret: db.secret,
            created_at: db.created_at,
        }
    }
}

impl From<NewProviderConnection> for ProviderConnectionDB {
    fn from(domain: NewProviderConnection) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: domain.user_id,
            provider_id: domain.provider_id,
            secret: domain.secret,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}

#[derive(
    Queryable, Identifiable, Insertable, AsChangeset, Selectable, Serialize, Deserialize, Debug, Clone,
)]
#[diesel(table_name = crate::schema::institution_connections)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct InstitutionConnectionDB {
    pub id: String,
    pub provider_connection_id: String,
    pub institution_id: String,
    pub connection_id: String,
    pub broken: bool,
    pub created_at: NaiveDateTime,
}

impl From<InstitutionConnectionDB> for InstitutionConnection {
    fn from(db: InstitutionConnectionDB) -> Self {
        Self {
            id: db.id,
            provider_connection_id: db.provider_connection_id,
            institution_id: db.institution_id,
            connection_id: db.connection_id,
            broken: db.broken,
            created_at: db.created_at,
        }
    }
}

impl From<NewInstitutionConnection> for InstitutionConnectionDB {
    fn from(domain: NewInstitutionConnection) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            provider_connection_id: domain.provider_connection_id,
            institution_id: domain.institution_id,
            connection_id: domain.connection_id,
            broken: false,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}
