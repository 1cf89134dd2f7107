use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::payments;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = payments)]
pub struct PaymentEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider_payment_intent_id: String,
    pub provider_checkout_session_id: Option<String>,
    pub amount_cents: i32,
    pub collection_id: Uuid,
    pub item_ids: Vec<String>,
    pub item_count: i32,
    pub status: String,
    pub generation_logs_count: i32,
    pub generation_started: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = payments)]
pub struct InsertPaymentEntity {
    pub user_id: Uuid,
    pub provider_payment_intent_id: String,
    pub provider_checkout_session_id: Option<String>,
    pub amount_cents: i32,
    pub collection_id: Uuid,
    pub item_ids: Vec<String>,
    pub item_count: i32,
    pub status: String,
    pub generation_logs_count: i32,
    pub generation_started: bool,
}
