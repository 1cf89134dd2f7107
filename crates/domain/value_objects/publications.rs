use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::entities::publications::{PublicationEntity, PublicationItemEntity};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationItemDto {
    pub id: Uuid,
    pub item_id: String,
    pub slug: Option<String>,
    pub published_url: Option<String>,
    pub fields_total: i32,
    pub fields_succeeded: i32,
    pub fields_failed: i32,
    pub status: String,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<PublicationItemEntity> for PublicationItemDto {
    fn from(value: PublicationItemEntity) -> Self {
        Self {
            id: value.id,
            item_id: value.item_id,
            slug: value.slug,
            published_url: value.published_url,
            fields_total: value.fields_total,
            fields_succeeded: value.fields_succeeded,
            fields_failed: value.fields_failed,
            status: value.status,
            error_message: value.error_message,
            created_at: value.created_at,
            completed_at: value.completed_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationDto {
    pub id: Uuid,
    pub collection_id: Uuid,
    pub total_items: i32,
    pub total_fields: i32,
    pub status: String,
    pub items_succeeded: i32,
    pub items_failed: i32,
    pub fields_succeeded: i32,
    pub fields_failed: i32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<PublicationEntity> for PublicationDto {
    fn from(value: PublicationEntity) -> Self {
        Self {
            id: value.id,
            collection_id: value.collection_id,
            total_items: value.total_items,
            total_fields: value.total_fields,
            status: value.status,
            items_succeeded: value.items_succeeded,
            items_failed: value.items_failed,
            fields_succeeded: value.fields_succeeded,
            fields_failed: value.fields_failed,
            started_at: value.started_at,
            completed_at: value.completed_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationDetailDto {
    #[serde(flatten)]
    pub publication: PublicationDto,
    pub items: Vec<PublicationItemDto>,
}
