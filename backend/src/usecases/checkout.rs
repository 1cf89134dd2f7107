use std::sync::Arc;

use axum::http::StatusCode;
use regenflow_core::{
    domain::{
        repositories::{
            collections::CollectionRepository,
            payment_provider_customers::PaymentProviderCustomerRepository,
        },
        value_objects::checkout_metadata::{
            CheckoutMetadata, CheckoutSessionDto, CreateCheckoutRequest, METADATA_KEY_LIMIT,
        },
    },
    payments::stripe_client::CheckoutSessionParams,
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::usecases::{
    collection_access::{CollectionAccessError, load_owned_collection},
    stripe_gateway::StripeGateway,
};

pub const STRIPE_PROVIDER: &str = "stripe";

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("collection not found")]
    CollectionNotFound,
    #[error("collection belongs to another user")]
    Forbidden,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CheckoutError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CheckoutError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CheckoutError::CollectionNotFound => StatusCode::NOT_FOUND,
            CheckoutError::Forbidden => StatusCode::FORBIDDEN,
            CheckoutError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CollectionAccessError> for CheckoutError {
    fn from(err: CollectionAccessError) -> Self {
        match err {
            CollectionAccessError::NotFound => CheckoutError::CollectionNotFound,
            CollectionAccessError::Forbidden => CheckoutError::Forbidden,
            CollectionAccessError::Internal(err) => CheckoutError::Internal(err),
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, CheckoutError>;

pub struct CheckoutUseCase<C, Cust, Stripe>
where
    C: CollectionRepository + Send + Sync + 'static,
    Cust: PaymentProviderCustomerRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    collection_repo: Arc<C>,
    customer_repo: Arc<Cust>,
    stripe_client: Arc<Stripe>,
    unit_price_cents: i64,
}

impl<C, Cust, Stripe> CheckoutUseCase<C, Cust, Stripe>
where
    C: CollectionRepository + Send + Sync + 'static,
    Cust: PaymentProviderCustomerRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    pub fn new(
        collection_repo: Arc<C>,
        customer_repo: Arc<Cust>,
        stripe_client: Arc<Stripe>,
        unit_price_cents: i64,
    ) -> Self {
        Self {
            collection_repo,
            customer_repo,
            stripe_client,
            unit_price_cents,
        }
    }

    pub async fn create_checkout_session(
        &self,
        user_id: Uuid,
        user_email: Option<String>,
        request: CreateCheckoutRequest,
    ) -> UseCaseResult<CheckoutSessionDto> {
        info!(
            %user_id,
            collection_id = %request.collection_id,
            item_count = request.item_count,
            "checkout: create checkout session requested"
        );

        if request.item_count < 1 {
            let err = CheckoutError::InvalidRequest("itemCount must be at least 1".to_string());
            warn!(%user_id, status = err.status_code().as_u16(), "checkout: empty selection");
            return Err(err);
        }

        if request.item_ids.len() != request.item_count as usize {
            let err = CheckoutError::InvalidRequest(format!(
                "itemIds has {} entries but itemCount is {}",
                request.item_ids.len(),
                request.item_count
            ));
            warn!(
                %user_id,
                item_ids = request.item_ids.len(),
                item_count = request.item_count,
                status = err.status_code().as_u16(),
                "checkout: item count mismatch"
            );
            return Err(err);
        }

        let collection =
            load_owned_collection(self.collection_repo.as_ref(), user_id, request.collection_id)
                .await?;

        let metadata = CheckoutMetadata {
            user_id,
            collection_id: collection.id,
            external_collection_id: collection.external_collection_id.clone(),
            item_count: request.item_count,
            item_ids: request.item_ids,
        }
        .to_metadata()?;

        if metadata.len() > METADATA_KEY_LIMIT {
            let err = CheckoutError::InvalidRequest(format!(
                "selection of {} items is too large for a single checkout",
                request.item_count
            ));
            warn!(
                %user_id,
                item_count = request.item_count,
                metadata_keys = metadata.len(),
                status = err.status_code().as_u16(),
                "checkout: selection exceeds stripe metadata limit"
            );
            return Err(err);
        }

        let customer_id = match self
            .customer_repo
            .find_customer_ref(user_id, STRIPE_PROVIDER)
            .await
        {
            Ok(customer_id) => customer_id,
            Err(err) => {
                warn!(
                    %user_id,
                    db_error = ?err,
                    "checkout: failed to load stripe customer, falling back to email"
                );
                None
            }
        };

        let params = CheckoutSessionParams {
            product_name: format!("AI generation: {}", collection.name),
            unit_amount_cents: self.unit_price_cents,
            quantity: request.item_count.into(),
            customer_email: if customer_id.is_none() { user_email } else { None },
            customer_id,
            metadata,
        };

        let session = self
            .stripe_client
            .create_checkout_session(params)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    collection_id = %collection.id,
                    error = ?err,
                    "checkout: failed to create stripe checkout session"
                );
                CheckoutError::Internal(err)
            })?;

        info!(
            %user_id,
            session_id = %session.id,
            "checkout: checkout session created"
        );

        Ok(CheckoutSessionDto {
            session_id: session.id,
            redirect_url: session.url,
        })
    }
}
