use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::generation_logs;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = generation_logs)]
pub struct GenerationLogEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub collection_id: Uuid,
    pub item_id: String,
    pub payment_id: Option<Uuid>,
    pub status: String,
    pub is_free_tier: bool,
    pub cost_cents: i32,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = generation_logs)]
pub struct InsertGenerationLogEntity {
    pub user_id: Uuid,
    pub collection_id: Uuid,
    pub item_id: String,
    pub payment_id: Option<Uuid>,
    pub status: String,
    pub is_free_tier: bool,
    pub cost_cents: i32,
}

/// Final state of one generation log after a paid run.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationLogSettlement {
    pub item_id: String,
    pub status: String,
    pub error: Option<String>,
}
