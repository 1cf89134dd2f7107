use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::user_allowances::UserAllowanceEntity;

#[async_trait]
#[automock]
pub trait UserAllowanceRepository {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<UserAllowanceEntity>>;

    /// Adds `count` to the used counter, capped at the row's limit, creating the row
    /// with `default_limit` when it does not exist yet. Returns the stored row.
    async fn increment_usage(
        &self,
        user_id: Uuid,
        count: i32,
        default_limit: i32,
    ) -> Result<UserAllowanceEntity>;
}
