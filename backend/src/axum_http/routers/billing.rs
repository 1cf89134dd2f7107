use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use regenflow_core::{
    domain::{
        repositories::{
            collections::CollectionRepository, credentials::CredentialRepository,
            payment_provider_customers::PaymentProviderCustomerRepository,
            user_allowances::UserAllowanceRepository,
        },
        value_objects::{billing::PreflightRequest, checkout_metadata::CreateCheckoutRequest},
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            collections::CollectionPostgres, credentials::CredentialPostgres,
            payment_provider_customers::PaymentProviderCustomerPostgres,
            user_allowances::UserAllowancePostgres,
        },
    },
    payments::stripe_client::StripeClient,
};

use crate::{
    auth::AuthUser,
    axum_http::error_responses::AppError,
    config::config_model::Billing,
    usecases::{billing::BillingUseCase, checkout::CheckoutUseCase, stripe_gateway::StripeGateway},
};

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    stripe_client: Arc<StripeClient>,
    billing: Billing,
) -> Router {
    let allowance_repository = UserAllowancePostgres::new(Arc::clone(&db_pool));
    let collection_repository = Arc::new(CollectionPostgres::new(Arc::clone(&db_pool)));
    let credential_repository = CredentialPostgres::new(Arc::clone(&db_pool));
    let customer_repository = PaymentProviderCustomerPostgres::new(Arc::clone(&db_pool));

    let billing_usecase = BillingUseCase::new(
        Arc::new(allowance_repository),
        Arc::clone(&collection_repository),
        Arc::new(credential_repository),
        billing.unit_price_cents,
        billing.free_generation_limit,
    );
    let checkout_usecase = CheckoutUseCase::new(
        collection_repository,
        Arc::new(customer_repository),
        stripe_client,
        billing.unit_price_cents,
    );

    let checkout_routes = Router::new()
        .route(
            "/checkout",
            post(
                create_checkout_session::<
                    CollectionPostgres,
                    PaymentProviderCustomerPostgres,
                    StripeClient,
                >,
            ),
        )
        .with_state(Arc::new(checkout_usecase));

    Router::new()
        .route(
            "/allowance",
            get(read_allowance::<UserAllowancePostgres, CollectionPostgres, CredentialPostgres>),
        )
        .route(
            "/preflight",
            post(preflight::<UserAllowancePostgres, CollectionPostgres, CredentialPostgres>),
        )
        .with_state(Arc::new(billing_usecase))
        .merge(checkout_routes)
}

pub async fn read_allowance<A, C, Cr>(
    State(usecase): State<Arc<BillingUseCase<A, C, Cr>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> Result<impl IntoResponse, AppError>
where
    A: UserAllowanceRepository + Send + Sync + 'static,
    C: CollectionRepository + Send + Sync + 'static,
    Cr: CredentialRepository + Send + Sync + 'static,
{
    let allowance = usecase.read_allowance(user_id).await?;
    Ok((StatusCode::OK, Json(allowance)))
}

pub async fn preflight<A, C, Cr>(
    State(usecase): State<Arc<BillingUseCase<A, C, Cr>>>,
    AuthUser { user_id, .. }: AuthUser,
    Json(request): Json<PreflightRequest>,
) -> Result<impl IntoResponse, AppError>
where
    A: UserAllowanceRepository + Send + Sync + 'static,
    C: CollectionRepository + Send + Sync + 'static,
    Cr: CredentialRepository + Send + Sync + 'static,
{
    let response = usecase.preflight(user_id, request).await?;
    Ok((StatusCode::OK, Json(response)))
}

pub async fn create_checkout_session<C, Cust, Stripe>(
    State(usecase): State<Arc<CheckoutUseCase<C, Cust, Stripe>>>,
    AuthUser { user_id, email, .. }: AuthUser,
    Json(request): Json<CreateCheckoutRequest>,
) -> Result<impl IntoResponse, AppError>
where
    C: CollectionRepository + Send + Sync + 'static,
    Cust: PaymentProviderCustomerRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    let session = usecase
        .create_checkout_session(user_id, email, request)
        .await?;
    Ok((StatusCode::OK, Json(session)))
}
