use anyhow::Result;
use async_trait::async_trait;
use diesel::{OptionalExtension, RunQueryDsl, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{collections, sites},
    },
};
use domain::{
    entities::collections::CollectionViewEntity,
    repositories::collections::CollectionRepository,
};

pub struct CollectionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl CollectionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl CollectionRepository for CollectionPostgres {
    async fn find_collection_view(
        &self,
        collection_id: Uuid,
    ) -> Result<Option<CollectionViewEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = collections::table
            .inner_join(sites::table.on(collections::site_id.eq(sites::id)))
            .filter(collections::id.eq(collection_id))
            .select((
                collections::id,
                collections::user_id,
                collections::name,
                collections::external_collection_id,
                sites::external_site_id,
                sites::integration_id,
                collections::url_base,
            ))
            .first::<(Uuid, Uuid, String, String, String, Uuid, Option<String>)>(&mut conn)
            .optional()?;

        Ok(row.map(
            |(
                id,
                user_id,
                name,
                external_collection_id,
                external_site_id,
                integration_id,
                url_base,
            )| CollectionViewEntity {
                id,
                user_id,
                name,
                external_collection_id,
                external_site_id,
                integration_id,
                url_base,
            },
        ))
    }
}
