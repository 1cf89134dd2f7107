use anyhow::Result;
use async_trait::async_trait;
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{publication_items, publications},
    },
};
use domain::{
    entities::publications::{
        InsertPublicationEntity, InsertPublicationItemEntity, PublicationCompletionEntity,
        PublicationEntity, PublicationItemCompletionEntity, PublicationItemEntity,
    },
    repositories::publications::PublicationRepository,
};

pub struct PublicationPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PublicationPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PublicationRepository for PublicationPostgres {
    async fn create_publication(&self, publication: InsertPublicationEntity) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let publication_id = insert_into(publications::table)
            .values(&publication)
            .returning(publications::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(publication_id)
    }

    async fn complete_publication(
        &self,
        publication_id: Uuid,
        completion: PublicationCompletionEntity,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(publications::table)
            .filter(publications::id.eq(publication_id))
            .set(&completion)
            .execute(&mut conn)?;

        Ok(())
    }

    async fn create_item(&self, item: InsertPublicationItemEntity) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let item_id = insert_into(publication_items::table)
            .values(&item)
            .returning(publication_items::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(item_id)
    }

    async fn complete_item(
        &self,
        publication_item_id: Uuid,
        completion: PublicationItemCompletionEntity,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(publication_items::table)
            .filter(publication_items::id.eq(publication_item_id))
            .set(&completion)
            .execute(&mut conn)?;

        Ok(())
    }

    async fn find_publication(&self, publication_id: Uuid) -> Result<Option<PublicationEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = publications::table
            .filter(publications::id.eq(publication_id))
            .select(PublicationEntity::as_select())
            .first::<PublicationEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn list_items(&self, publication_id: Uuid) -> Result<Vec<PublicationItemEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = publication_items::table
            .filter(publication_items::publication_id.eq(publication_id))
            .select(PublicationItemEntity::as_select())
            .order(publication_items::created_at.asc())
            .load::<PublicationItemEntity>(&mut conn)?;

        Ok(results)
    }

    async fn list_by_collection(
        &self,
        collection_id: Uuid,
        limit: i64,
    ) -> Result<Vec<PublicationEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = publications::table
            .filter(publications::collection_id.eq(collection_id))
            .select(PublicationEntity::as_select())
            .order(publications::started_at.desc())
            .limit(limit)
            .load::<PublicationEntity>(&mut conn)?;

        Ok(results)
    }
}
