use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post};
use regenflow_core::{
    domain::{
        repositories::{
            collections::CollectionRepository, content_generator::ContentGenerator,
            content_store::ContentStoreClient, credentials::CredentialRepository,
            generation_logs::GenerationLogRepository, payments::PaymentRepository,
            user_allowances::UserAllowanceRepository,
        },
        value_objects::generation::GenerateRequest,
    },
    infra::{
        ai::openai::OpenAiClient,
        db::{
            postgres::postgres_connection::PgPoolSquad,
            repositories::{
                collections::CollectionPostgres, credentials::CredentialPostgres,
                generation_logs::GenerationLogPostgres, payments::PaymentPostgres,
                user_allowances::UserAllowancePostgres,
            },
        },
        storages::webflow::WebflowClient,
    },
};

use crate::{
    auth::AuthUser, axum_http::error_responses::AppError, usecases::generation::GenerationUseCase,
};

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    content_store: Arc<WebflowClient>,
    generator: Arc<OpenAiClient>,
    platform_api_key: String,
    free_generation_limit: i32,
) -> Router {
    let usecase = GenerationUseCase::new(
        Arc::new(UserAllowancePostgres::new(Arc::clone(&db_pool))),
        Arc::new(CollectionPostgres::new(Arc::clone(&db_pool))),
        Arc::new(CredentialPostgres::new(Arc::clone(&db_pool))),
        Arc::new(PaymentPostgres::new(Arc::clone(&db_pool))),
        Arc::new(GenerationLogPostgres::new(Arc::clone(&db_pool))),
        content_store,
        generator,
        platform_api_key,
        free_generation_limit,
    );

    Router::new()
        .route(
            "/",
            post(
                generate::<
                    UserAllowancePostgres,
                    CollectionPostgres,
                    CredentialPostgres,
                    PaymentPostgres,
                    GenerationLogPostgres,
                    WebflowClient,
                    OpenAiClient,
                >,
            ),
        )
        .with_state(Arc::new(usecase))
}

pub async fn generate<A, C, Cr, Pay, Logs, Store, Gen>(
    State(usecase): State<Arc<GenerationUseCase<A, C, Cr, Pay, Logs, Store, Gen>>>,
    AuthUser { user_id, .. }: AuthUser,
    Json(request): Json<GenerateRequest>,
) -> Result<impl IntoResponse, AppError>
where
    A: UserAllowanceRepository + Send + Sync + 'static,
    C: CollectionRepository + Send + Sync + 'static,
    Cr: CredentialRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    Logs: GenerationLogRepository + Send + Sync + 'static,
    Store: ContentStoreClient + Send + Sync + 'static,
    Gen: ContentGenerator + Send + Sync + 'static,
{
    let outcome = usecase.generate_detached(user_id, request).await?;
    Ok((StatusCode::OK, Json(outcome)))
}
