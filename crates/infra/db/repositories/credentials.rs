use anyhow::Result;
use async_trait::async_trait;
use diesel::{OptionalExtension, RunQueryDsl, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{collections, integrations, provider_credentials, sites},
    },
};
use domain::{
    repositories::credentials::CredentialRepository,
    value_objects::enums::credential_providers::CredentialProvider,
};

pub struct CredentialPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl CredentialPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl CredentialRepository for CredentialPostgres {
    async fn get_decrypted_credential(
        &self,
        collection_id: Uuid,
        provider: CredentialProvider,
    ) -> Result<Option<String>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let token = match provider {
            CredentialProvider::Webflow => collections::table
                .inner_join(sites::table.on(collections::site_id.eq(sites::id)))
                .inner_join(integrations::table.on(sites::integration_id.eq(integrations::id)))
                .filter(collections::id.eq(collection_id))
                .filter(integrations::provider.eq(provider.as_str()))
                .select(integrations::access_token)
                .first::<String>(&mut conn)
                .optional()?,
            CredentialProvider::OpenAi => provider_credentials::table
                .filter(provider_credentials::collection_id.eq(collection_id))
                .filter(provider_credentials::provider.eq(provider.as_str()))
                .order(provider_credentials::created_at.desc())
                .select(provider_credentials::token)
                .first::<String>(&mut conn)
                .optional()?,
        };

        Ok(token)
    }
}
