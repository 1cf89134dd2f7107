use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{
    OptionalExtension, RunQueryDsl, dsl::sql, insert_into, prelude::*, sql_types::Integer,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::user_allowances},
};
use domain::{
    entities::user_allowances::{InsertUserAllowanceEntity, UserAllowanceEntity},
    repositories::user_allowances::UserAllowanceRepository,
    value_objects::billing::capped_usage,
};

pub struct UserAllowancePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl UserAllowancePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UserAllowanceRepository for UserAllowancePostgres {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<UserAllowanceEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = user_allowances::table
            .filter(user_allowances::user_id.eq(user_id))
            .select(UserAllowanceEntity::as_select())
            .first::<UserAllowanceEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn increment_usage(
        &self,
        user_id: Uuid,
        count: i32,
        default_limit: i32,
    ) -> Result<UserAllowanceEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let count = count.max(0);
        let insert_entity = first_allowance_row(user_id, count, default_limit);

        // Single statement so concurrent increments cannot overshoot the limit.
        let result = insert_into(user_allowances::table)
            .values(&insert_entity)
            .on_conflict(user_allowances::user_id)
            .do_update()
            .set((
                user_allowances::free_generations_used.eq(sql::<Integer>(
                    "LEAST(user_allowances.free_generations_used + ",
                )
                .bind::<Integer, _>(count)
                .sql(", user_allowances.generation_limit)")),
                user_allowances::updated_at.eq(Utc::now()),
            ))
            .returning(UserAllowanceEntity::as_returning())
            .get_result::<UserAllowanceEntity>(&mut conn)?;

        Ok(result)
    }
}

/// Row written when the user has no allowance yet.
fn first_allowance_row(user_id: Uuid, count: i32, default_limit: i32) -> InsertUserAllowanceEntity {
    InsertUserAllowanceEntity {
        user_id,
        free_generations_used: capped_usage(0, count, default_limit),
        generation_limit: default_limit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_row_is_capped_at_the_default_limit() {
        let user_id = Uuid::new_v4();

        let row = first_allowance_row(user_id, 3, 10);
        assert_eq!(row.user_id, user_id);
        assert_eq!(row.free_generations_used, 3);
        assert_eq!(row.generation_limit, 10);

        assert_eq!(first_allowance_row(user_id, 25, 10).free_generations_used, 10);
        assert_eq!(first_allowance_row(user_id, 0, 10).free_generations_used, 0);
    }
}
