use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::payments::{InsertPaymentEntity, PaymentEntity},
    value_objects::enums::payment_statuses::PaymentStatus,
};

#[async_trait]
#[automock]
pub trait PaymentRepository {
    async fn find_by_payment_intent_id(
        &self,
        provider_payment_intent_id: &str,
    ) -> Result<Option<PaymentEntity>>;

    /// `None` when a payment with the same intent id already exists.
    async fn insert_if_absent(&self, payment: InsertPaymentEntity) -> Result<Option<Uuid>>;

    async fn find_by_id(&self, payment_id: Uuid) -> Result<Option<PaymentEntity>>;

    /// Flips `generation_started` to true. `false` when it was already claimed.
    async fn claim_generation(&self, payment_id: Uuid) -> Result<bool>;

    async fn update_status(&self, payment_id: Uuid, status: PaymentStatus) -> Result<()>;
}
