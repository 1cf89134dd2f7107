use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use serde_json::{Map, Value};

use crate::domain::value_objects::{assets::UploadedAsset, generation::ContentItem};

#[async_trait]
#[automock]
pub trait ContentStoreClient {
    async fn list_items(&self, token: &str, collection_id: &str) -> Result<Vec<ContentItem>>;

    /// Writes the fields to the live item and returns the item as stored.
    async fn update_item(
        &self,
        token: &str,
        collection_id: &str,
        item_id: &str,
        field_data: Map<String, Value>,
    ) -> Result<ContentItem>;

    async fn upload_asset(
        &self,
        token: &str,
        site_id: &str,
        file_name: String,
        bytes: Vec<u8>,
        content_type: String,
    ) -> Result<UploadedAsset>;
}
