use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};
use regenflow_core::{
    domain::repositories::{
        generation_logs::GenerationLogRepository,
        payment_provider_customers::PaymentProviderCustomerRepository,
        payments::PaymentRepository,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            generation_logs::GenerationLogPostgres,
            payment_provider_customers::PaymentProviderCustomerPostgres, payments::PaymentPostgres,
        },
    },
    payments::stripe_client::StripeClient,
};
use serde_json::json;
use tracing::{info, warn};

use crate::{
    axum_http::error_responses::AppError,
    usecases::{
        stripe_gateway::StripeGateway,
        stripe_webhook::{StripeWebhookUseCase, WebhookOutcome},
    },
};

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

pub fn routes(db_pool: Arc<PgPoolSquad>, stripe_client: Arc<StripeClient>) -> Router {
    let payment_repository = PaymentPostgres::new(Arc::clone(&db_pool));
    let generation_log_repository = GenerationLogPostgres::new(Arc::clone(&db_pool));
    let customer_repository = PaymentProviderCustomerPostgres::new(Arc::clone(&db_pool));

    let usecase = StripeWebhookUseCase::new(
        Arc::new(payment_repository),
        Arc::new(generation_log_repository),
        Arc::new(customer_repository),
        stripe_client,
    );

    Router::new()
        .route(
            "/stripe",
            post(
                stripe_webhook::<
                    PaymentPostgres,
                    GenerationLogPostgres,
                    PaymentProviderCustomerPostgres,
                    StripeClient,
                >,
            ),
        )
        .with_state(Arc::new(usecase))
}

/// Unauthenticated: trust comes from the Stripe signature over the raw body.
pub async fn stripe_webhook<Pay, Logs, Cust, Stripe>(
    State(usecase): State<Arc<StripeWebhookUseCase<Pay, Logs, Cust, Stripe>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError>
where
    Pay: PaymentRepository + Send + Sync + 'static,
    Logs: GenerationLogRepository + Send + Sync + 'static,
    Cust: PaymentProviderCustomerRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    let Some(signature) = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        warn!("stripe webhook: missing Stripe-Signature header");
        return Err(AppError::BadRequest(
            "Missing Stripe-Signature header".to_string(),
        ));
    };

    match usecase.handle_event(&body, signature).await? {
        WebhookOutcome::Recorded {
            payment_id,
            logs_seeded,
        } => info!(%payment_id, logs_seeded, "stripe webhook: event handled"),
        WebhookOutcome::AlreadyProcessed => info!("stripe webhook: duplicate delivery acknowledged"),
        WebhookOutcome::Ignored { .. } => {}
    }

    Ok((StatusCode::OK, Json(json!({ "received": true }))))
}
