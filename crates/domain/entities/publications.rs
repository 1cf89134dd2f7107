use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::{publication_items, publications};

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = publications)]
pub struct PublicationEntity {
    pub id: Uuid,
    pub collection_id: Uuid,
    pub user_id: Uuid,
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

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = publications)]
pub struct InsertPublicationEntity {
    pub collection_id: Uuid,
    pub user_id: Uuid,
    pub total_items: i32,
    pub total_fields: i32,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, AsChangeset)]
#[diesel(table_name = publications)]
pub struct PublicationCompletionEntity {
    pub status: String,
    pub items_succeeded: i32,
    pub items_failed: i32,
    pub fields_succeeded: i32,
    pub fields_failed: i32,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = publication_items)]
pub struct PublicationItemEntity {
    pub id: Uuid,
    pub publication_id: Uuid,
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

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = publication_items)]
pub struct InsertPublicationItemEntity {
    pub publication_id: Uuid,
    pub item_id: String,
    pub fields_total: i32,
    pub fields_succeeded: i32,
    pub fields_failed: i32,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, AsChangeset)]
#[diesel(table_name = publication_items, treat_none_as_null = true)]
pub struct PublicationItemCompletionEntity {
    pub slug: Option<String>,
    pub published_url: Option<String>,
    pub fields_succeeded: i32,
    pub fields_failed: i32,
    pub status: String,
    pub error_message: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}
