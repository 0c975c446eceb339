//! Repositories for providers, institutions, and connections.

use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;

use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::DieselErrorExt;
use crate::schema::{institution_connections, institutions, provider_connections, providers};

use super::model::{
    InstitutionConnectionDB, InstitutionDB, ProviderConnectionDB, ProviderDB,
};
use ledgerlink_core::connections::{
    Institution, InstitutionConnection, InstitutionConnectionRepositoryTrait,
    InstitutionRepositoryTrait, NewInstitution, NewInstitutionConnection, NewProviderConnection,
    Provider, ProviderConnection, ProviderConnectionRepositoryTrait, ProviderRepositoryTrait,
};
use ledgerlink_core::errors::Result;

pub struct ProviderRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl ProviderRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl ProviderRepositoryTrait for ProviderRepository {
    async fn upsert(&self, name: &str, logo_url: Option<&str>) -> Result<Provider> {
        let name_owned = name.to_string();
        let logo_owned = logo_url.map(str::to_string);
        self.writer
            .exec(move |conn| {
                let existing = providers::table
                    .filter(providers::name.eq(&name_owned))
                    .select(ProviderDB::as_select())
                    .first::<ProviderDB>(conn)
                    .optional()
                    .map_err(|e| e.into_core_error())?;

                let row = match existing {
                    Some(mut row) => {
                        row.logo_url = logo_owned;
                        diesel::update(providers::table.find(&row.id))
                            .set(&row)
                            .execute(conn)
                            .map_err(|e| e.into_core_error())?;
                        row
                    }
                    None => {
                        let row = ProviderDB {
                            id: uuid::Uuid::new_v4().to_string(),
                            name: name_owned,
                            logo_url: logo_owned,
                        };
                        diesel::insert_into(providers::table)
                            .values(&row)
                            .execute(conn)
                            .map_err(|e| e.into_core_error())?;
                        row
                    }
                };
                Ok(row.into())
            })
            .await
    }

    fn find_by_name(&self, name: &str) -> Result<Option<Provider>> {
        let mut conn = get_connection(&self.pool)?;
        let row = providers::table
            .filter(providers::name.eq(name))
            .select(ProviderDB::as_select())
            .first::<ProviderDB>(&mut conn)
            .optional()
            .map_err(|e| e.into_core_error())?;
        Ok(row.map(Provider::from))
    }

    fn list(&self) -> Result<Vec<Provider>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = providers::table
            .select(ProviderDB::as_select())
            .order(providers::name.asc())
            .load::<ProviderDB>(&mut conn)
            .map_err(|e| e.into_core_error())?;
        Ok(rows.into_iter().map(Provider::from).collect())
    }
}

pub struct InstitutionRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl InstitutionRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl InstitutionRepositoryTrait for InstitutionRepository {
    async fn upsert(&self, institution: NewInstitution) -> Result<Institution> {
        self.writer
            .exec(move |conn| {
                let existing = institutions::table
                    .filter(institutions::provider_id.eq(&institution.provider_id))
                    .filter(
                        institutions::provider_institution_id
                            .eq(&institution.provider_institution_id),
                    )
                    .select(InstitutionDB::as_select())
                    .first::<InstitutionDB>(conn)
                    .optional()
                    .map_err(|e| e.into_core_error())?;

                let row = match existing {
                    Some(mut row) => {
                        row.name = institution.name;
                        row.logo_url = institution.logo_url;
                        row.countries = institution.countries;
                        row.enabled = institution.enabled;
                        diesel::update(institutions::table.find(&row.id))
                            .set(&row)
                            .execute(conn)
                            .map_err(|e| e.into_core_error())?;
                        row
                    }
                    None => {
                        let row: InstitutionDB = institution.into();
                        diesel::insert_into(institutions::table)
                            .values(&row)
                            .execute(conn)
                            .map_err(|e| e.into_core_error())?;
                        row
                    }
                };
                Ok(row.into())
            })
            .await
    }

    fn get_by_id(&self, institution_id: &str) -> Result<Institution> {
        let mut conn = get_connection(&self.pool)?;
        let row = institutions::table
            .select(InstitutionDB::as_select())
            .find(institution_id)
            .first::<InstitutionDB>(&mut conn)
            .map_err(|e| e.into_core_error())?;
        Ok(row.into())
    }

    fn find_by_provider_institution_id(
        &self,
        provider_id: &str,
        provider_institution_id: &str,
    ) -> Result<Option<Institution>> {
        let mut conn = get_connection(&self.pool)?;
        let row = institutions::table
            .filter(institutions::provider_id.eq(provider_id))
            .filter(institutions::provider_institution_id.eq(provider_institution_id))
            .select(InstitutionDB::as_select())
            .first::<InstitutionDB>(&mut conn)
            .optional()
            .map_err(|e| e.into_core_error())?;
        Ok(row.map(Institution::from))
    }

    fn list_enabled(&self) -> Result<Vec<Institution>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = institutions::table
            .filter(institutions::enabled.eq(true))
            .select(InstitutionDB::as_select())
            .order(institutions::name.asc())
            .load::<InstitutionDB>(&mut conn)
            .map_err(|e| e.into_core_error())?;
        Ok(rows.into_iter().map(Institution::from).collect())
    }
}

pub struct ProviderConnectionRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl ProviderConnectionRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl ProviderConnectionRepositoryTrait for ProviderConnectionRepository {
    async fn create(&self, new_connection: NewProviderConnection) -> Result<ProviderConnection> {
        self.writer
            .exec(move |conn| {
                let row: ProviderConnectionDB = new_connection.into();
                diesel::insert_into(provider_connections::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(|e| e.into_core_error())?;
                Ok(row.into())
            })
            .await
    }

    fn find_by_user_and_provider(
        &self,
        user_id: &str,
        provider_id: &str,
    ) -> Result<Option<ProviderConnection>> {
        let mut conn = get_connection(&self.pool)?;
        let row = provider_connections::table
            .filter(provider_connections::user_id.eq(user_id))
            .filter(provider_connections::provider_id.eq(provider_id))
            .select(ProviderConnectionDB::as_select())
            .first::<ProviderConnectionDB>(&mut conn)
            .optional()
            .map_err(|e| e.into_core_error())?;
        Ok(row.map(ProviderConnection::from))
    }

    fn get_by_id(&self, id: &str) -> Result<ProviderConnection> {
        let mut conn = get_connection(&self.pool)?;
        let row = provider_connections::table
            .select(ProviderConnectionDB::as_select())
            .find(id)
            .first::<ProviderConnectionDB>(&mut conn)
            .map_err(|e| e.into_core_error())?;
        Ok(row.into())
    }

    fn list_by_user(&self, user_id: &str) -> Result<Vec<ProviderConnection>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = provider_connections::table
            .filter(provider_connections::user_id.eq(user_id))
            .select(ProviderConnectionDB::as_select())
            .load::<ProviderConnectionDB>(&mut conn)
            .map_err(|e| e.into_core_error())?;
        Ok(rows.into_iter().map(ProviderConnection::from).collect())
    }

    async fn delete(&self, id: &str) -> Result<usize> {
        let id_owned = id.to_string();
        self.writer
            .exec(move |conn| {
                diesel::delete(provider_connections::table.find(&id_owned))
                    .execute(conn)
                    .map_err(|e| e.into_core_error())
            })
            .await
    }
}

pub struct InstitutionConnectionRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl InstitutionConnectionRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl InstitutionConnectionRepositoryTrait for InstitutionConnectionRepository {
    async fn insert_idempotent(
        &self,
        new_connection: NewInstitutionConnection,
    ) -> Result<Option<InstitutionConnection>> {
        self.writer
            .exec(move |conn| {
                let row: InstitutionConnectionDB = new_connection.into();
                // connection_id carries a UNIQUE constraint; a replayed
                // callback inserts zero rows and is treated as already linked.
                let inserted = diesel::insert_into(institution_connections::table)
                    .values(&row)
                    .on_conflict(institution_connections::connection_id)
                    .do_nothing()
                    .execute(conn)
                    .map_err(|e| e.into_core_error())?;
                if inserted == 0 {
                    Ok(None)
                } else {
                    Ok(Some(row.into()))
                }
            })
            .await
    }

    fn get_by_id(&self, id: &str) -> Result<InstitutionConnection> {
        let mut conn = get_connection(&self.pool)?;
        let row = institution_connections::table
            .select(InstitutionConnectionDB::as_select())
            .find(id)
            .first::<InstitutionConnectionDB>(&mut conn)
            .map_err(|e| e.into_core_error())?;
        Ok(row.into())
    }

    fn find_by_connection_id(
        &self,
        connection_id: &str,
    ) -> Result<Option<InstitutionConnection>> {
        let mut conn = get_connection(&self.pool)?;
        let row = institution_connections::table
            .filter(institution_connections::connection_id.eq(connection_id))
            .select(InstitutionConnectionDB::as_select())
            .first::<InstitutionConnectionDB>(&mut conn)
            .optional()
            .map_err(|e| e.into_core_error())?;
        Ok(row.map(InstitutionConnection::from))
    }

    fn list_by_provider_connection(
        &self,
        provider_connection_id: &str,
    ) -> Result<Vec<InstitutionConnection>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = institution_connections::table
            .filter(
                institution_connections::provider_connection_id.eq(provider_connection_id),
            )
            .select(InstitutionConnectionDB::as_select())
            .load::<InstitutionConnectionDB>(&mut conn)
            .map_err(|e| e.into_core_error())?;
        Ok(rows.into_iter().map(InstitutionConnection::from).collect())
    }

    async fn set_broken(&self, connection_id: &str, broken: bool) -> Result<usize> {
        let id_owned = connection_id.to_string();
        self.writer
            .exec(move |conn| {
                diesel::update(
                    institution_connections::table
                        .filter(institution_connections::connection_id.eq(&id_owned)),
                )
                .set(institution_connections::broken.eq(broken))
                .execute(conn)
                .map_err(|e| e.into_core_error())
            })
            .await
    }

    async fn delete_by_connection_id(&self, connection_id: &str) -> Result<usize> {
        let id_owned = connection_id.to_string();
        self.writer
            .exec(move |conn| {
                diesel::delete(
                    institution_connections::table
                        .filter(institution_connections::connection_id.eq(&id_owned)),
                )
                .execute(conn)
                .map_err(|e| e.into_core_error())
            })
            .await
    }

    async fn delete(&self, id: &str) -> Result<usize> {
        let id_owned = id.to_string();
        self.writer
            .exec(move |conn| {
                diesel::delete(institution_connections::table.find(&id_owned))
                    .execute(conn)
                    .map_err(|e| e.into_core_error())
            })
            .await
    }
}
