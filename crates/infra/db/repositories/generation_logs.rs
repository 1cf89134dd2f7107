use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::generation_logs},
};
use domain::{
    entities::generation_logs::{GenerationLogSettlement, InsertGenerationLogEntity},
    repositories::generation_logs::GenerationLogRepository,
    value_objects::enums::generation_statuses::GenerationStatus,
};

pub struct GenerationLogPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl GenerationLogPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl GenerationLogRepository for GenerationLogPostgres {
    async fn insert_pending_logs(&self, logs: Vec<InsertGenerationLogEntity>) -> Result<usize> {
        if logs.is_empty() {
            return Ok(0);
        }

        let mut conn = Arc::clone(&self.db_pool).get()?;

        let inserted = insert_into(generation_logs::table)
            .values(&logs)
            .execute(&mut conn)?;

        Ok(inserted)
    }

    async fn settle_logs(
        &self,
        payment_id: Uuid,
        settlements: Vec<GenerationLogSettlement>,
    ) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        let settled = conn.transaction::<usize, diesel::result::Error, _>(|tx| {
            let mut settled = 0;
            for settlement in &settlements {
                settled += update(generation_logs::table)
                    .filter(generation_logs::payment_id.eq(payment_id))
                    .filter(generation_logs::item_id.eq(&settlement.item_id))
                    .filter(generation_logs::status.eq(GenerationStatus::Pending.to_string()))
                    .set((
                        generation_logs::status.eq(&settlement.status),
                        generation_logs::error.eq(&settlement.error),
                        generation_logs::updated_at.eq(now),
                    ))
                    .execute(tx)?;
            }
            Ok(settled)
        })?;

        Ok(settled)
    }
}
