use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::generation_logs::{
    GenerationLogSettlement, InsertGenerationLogEntity,
};

#[async_trait]
#[automock]
pub trait GenerationLogRepository {
    async fn insert_pending_logs(&self, logs: Vec<InsertGenerationLogEntity>) -> Result<usize>;

    /// Moves the pending logs of a payment to their final status, matched by item id.
    async fn settle_logs(
        &self,
        payment_id: Uuid,
        settlements: Vec<GenerationLogSettlement>,
    ) -> Result<usize>;
}
