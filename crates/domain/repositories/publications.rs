use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::publications::{
    InsertPublicationEntity, InsertPublicationItemEntity, PublicationCompletionEntity,
    PublicationEntity, PublicationItemCompletionEntity, PublicationItemEntity,
};

#[async_trait]
#[automock]
pub trait PublicationRepository {
    async fn create_publication(&self, publication: InsertPublicationEntity) -> Result<Uuid>;

    async fn complete_publication(
        &self,
        publication_id: Uuid,
        completion: PublicationCompletionEntity,
    ) -> Result<()>;

    async fn create_item(&self, item: InsertPublicationItemEntity) -> Result<Uuid>;

    async fn complete_item(
        &self,
        publication_item_id: Uuid,
        completion: PublicationItemCompletionEntity,
    ) -> Result<()>;

    async fn find_publication(&self, publication_id: Uuid) -> Result<Option<PublicationEntity>>;

    async fn list_items(&self, publication_id: Uuid) -> Result<Vec<PublicationItemEntity>>;

    async fn list_by_collection(
        &self,
        collection_id: Uuid,
        limit: i64,
    ) -> Result<Vec<PublicationEntity>>;
}
