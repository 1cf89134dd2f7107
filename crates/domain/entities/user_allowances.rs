use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::user_allowances;

#[derive(Debug, Clone, PartialEq, Eq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = user_allowances, primary_key(user_id))]
pub struct UserAllowanceEntity {
    pub user_id: Uuid,
    pub free_generations_used: i32,
    pub generation_limit: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = user_allowances)]
pub struct InsertUserAllowanceEntity {
    pub user_id: Uuid,
    pub free_generations_used: i32,
    pub generation_limit: i32,
}
