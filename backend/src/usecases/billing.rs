use std::sync::Arc;

use axum::http::StatusCode;
use regenflow_core::domain::{
    repositories::{
        collections::CollectionRepository, credentials::CredentialRepository,
        user_allowances::UserAllowanceRepository,
    },
    value_objects::billing::{
        AllowanceStatus, PreflightRequest, PreflightResponse, split_billing,
    },
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::usecases::{
    collection_access::{CollectionAccessError, load_owned_collection},
    credentials::{CredentialError, resolve_generation_credential},
};

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("collection not found")]
    CollectionNotFound,
    #[error("collection belongs to another user")]
    Forbidden,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl BillingError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BillingError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            BillingError::CollectionNotFound => StatusCode::NOT_FOUND,
            BillingError::Forbidden => StatusCode::FORBIDDEN,
            BillingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CollectionAccessError> for BillingError {
    fn from(err: CollectionAccessError) -> Self {
        match err {
            CollectionAccessError::NotFound => BillingError::CollectionNotFound,
            CollectionAccessError::Forbidden => BillingError::Forbidden,
            CollectionAccessError::Internal(err) => BillingError::Internal(err),
        }
    }
}

impl From<CredentialError> for BillingError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Internal(err) => BillingError::Internal(err),
            other => BillingError::Internal(anyhow::anyhow!(other.to_string())),
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, BillingError>;

pub struct BillingUseCase<A, C, Cr>
where
    A: UserAllowanceRepository + Send + Sync + 'static,
    C: CollectionRepository + Send + Sync + 'static,
    Cr: CredentialRepository + Send + Sync + 'static,
{
    allowance_repo: Arc<A>,
    collection_repo: Arc<C>,
    credential_repo: Arc<Cr>,
    unit_price_cents: i64,
    free_generation_limit: i32,
}

impl<A, C, Cr> BillingUseCase<A, C, Cr>
where
    A: UserAllowanceRepository + Send + Sync + 'static,
    C: CollectionRepository + Send + Sync + 'static,
    Cr: CredentialRepository + Send + Sync + 'static,
{
    pub fn new(
        allowance_repo: Arc<A>,
        collection_repo: Arc<C>,
        credential_repo: Arc<Cr>,
        unit_price_cents: i64,
        free_generation_limit: i32,
    ) -> Self {
        Self {
            allowance_repo,
            collection_repo,
            credential_repo,
            unit_price_cents,
            free_generation_limit,
        }
    }

    pub async fn read_allowance(&self, user_id: Uuid) -> UseCaseResult<AllowanceStatus> {
        let entity = self
            .allowance_repo
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "billing: failed to read allowance");
                BillingError::Internal(err)
            })?;

        Ok(AllowanceStatus::from_entity(
            entity.as_ref(),
            self.free_generation_limit,
        ))
    }

    pub async fn preflight(
        &self,
        user_id: Uuid,
        request: PreflightRequest,
    ) -> UseCaseResult<PreflightResponse> {
        info!(
            %user_id,
            collection_id = %request.collection_id,
            item_count = request.item_count,
            "billing: preflight requested"
        );

        if request.item_count <= 0 {
            let err = BillingError::InvalidRequest("itemCount must be at least 1".to_string());
            warn!(
                %user_id,
                item_count = request.item_count,
                status = err.status_code().as_u16(),
                "billing: invalid preflight item count"
            );
            return Err(err);
        }

        load_owned_collection(self.collection_repo.as_ref(), user_id, request.collection_id)
            .await?;

        let credential =
            resolve_generation_credential(self.credential_repo.as_ref(), request.collection_id)
                .await?;
        let allowance = self.read_allowance(user_id).await?;

        if credential.is_owned() {
            info!(%user_id, "billing: own api key, no payment required");
            return Ok(PreflightResponse::own_api_key(allowance.remaining));
        }

        let split = split_billing(
            request.item_count,
            allowance.remaining.into(),
            self.unit_price_cents,
        );
        info!(
            %user_id,
            free_items = split.free_items,
            paid_items = split.paid_items,
            total_cents = split.total_cents,
            "billing: preflight computed"
        );

        Ok(PreflightResponse::from_split(split, allowance.remaining))
    }
}
