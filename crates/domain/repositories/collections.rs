use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::collections::CollectionViewEntity;

#[async_trait]
#[automock]
pub trait CollectionRepository {
    async fn find_collection_view(&self, collection_id: Uuid)
    -> Result<Option<CollectionViewEntity>>;
}
