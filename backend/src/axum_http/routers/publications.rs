use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::StreamExt;
use regenflow_core::{
    domain::{
        repositories::{
            collections::CollectionRepository, content_store::ContentStoreClient,
            credentials::CredentialRepository, publications::PublicationRepository,
        },
        value_objects::{publish_events::PublishEvent, staged_fields::PublishRequest},
    },
    infra::{
        db::{
            postgres::postgres_connection::PgPoolSquad,
            repositories::{
                collections::CollectionPostgres, credentials::CredentialPostgres,
                publications::PublicationPostgres,
            },
        },
        storages::webflow::WebflowClient,
    },
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::{
    auth::AuthUser, axum_http::error_responses::AppError, usecases::publish::PublishUseCase,
};

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";
const PROGRESS_BUFFER: usize = 32;

type PostgresPublishUseCase =
    PublishUseCase<CollectionPostgres, CredentialPostgres, PublicationPostgres, WebflowClient>;

pub fn routes(db_pool: Arc<PgPoolSquad>, content_store: Arc<WebflowClient>) -> Router {
    let usecase: PostgresPublishUseCase = PublishUseCase::new(
        Arc::new(CollectionPostgres::new(Arc::clone(&db_pool))),
        Arc::new(CredentialPostgres::new(Arc::clone(&db_pool))),
        Arc::new(PublicationPostgres::new(Arc::clone(&db_pool))),
        content_store,
    );

    Router::new()
        .route(
            "/publications",
            post(
                publish::<CollectionPostgres, CredentialPostgres, PublicationPostgres, WebflowClient>,
            ),
        )
        .route(
            "/publications/:publication_id",
            get(get_publication::<
                CollectionPostgres,
                CredentialPostgres,
                PublicationPostgres,
                WebflowClient,
            >),
        )
        .route(
            "/collections/:collection_id/publications",
            get(list_publications::<
                CollectionPostgres,
                CredentialPostgres,
                PublicationPostgres,
                WebflowClient,
            >),
        )
        .with_state(Arc::new(usecase))
}

/// Validation errors come back as plain JSON errors. Once the job starts, progress is
/// streamed as NDJSON and the job keeps running if the client goes away.
pub async fn publish<C, Cr, Pub, Store>(
    State(usecase): State<Arc<PublishUseCase<C, Cr, Pub, Store>>>,
    AuthUser { user_id, .. }: AuthUser,
    Json(request): Json<PublishRequest>,
) -> Result<Response, AppError>
where
    C: CollectionRepository + Send + Sync + 'static,
    Cr: CredentialRepository + Send + Sync + 'static,
    Pub: PublicationRepository + Send + Sync + 'static,
    Store: ContentStoreClient + Send + Sync + 'static,
{
    let job = usecase.prepare(user_id, request).await?;

    let (tx, rx) = mpsc::channel::<PublishEvent>(PROGRESS_BUFFER);
    let runner = Arc::clone(&usecase);
    tokio::spawn(async move {
        runner.run(job, tx).await;
    });

    let stream = ReceiverStream::new(rx).map(|event| event.to_ndjson_line());

    Ok((
        StatusCode::OK,
        [(CONTENT_TYPE, NDJSON_CONTENT_TYPE)],
        Body::from_stream(stream),
    )
        .into_response())
}

pub async fn get_publication<C, Cr, Pub, Store>(
    State(usecase): State<Arc<PublishUseCase<C, Cr, Pub, Store>>>,
    AuthUser { user_id, .. }: AuthUser,
    Path(publication_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError>
where
    C: CollectionRepository + Send + Sync + 'static,
    Cr: CredentialRepository + Send + Sync + 'static,
    Pub: PublicationRepository + Send + Sync + 'static,
    Store: ContentStoreClient + Send + Sync + 'static,
{
    let detail = usecase.get_publication(user_id, publication_id).await?;
    Ok((StatusCode::OK, Json(detail)))
}

pub async fn list_publications<C, Cr, Pub, Store>(
    State(usecase): State<Arc<PublishUseCase<C, Cr, Pub, Store>>>,
    AuthUser { user_id, .. }: AuthUser,
    Path(collection_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError>
where
    C: CollectionRepository + Send + Sync + 'static,
    Cr: CredentialRepository + Send + Sync + 'static,
    Pub: PublicationRepository + Send + Sync + 'static,
    Store: ContentStoreClient + Send + Sync + 'static,
{
    let publications = usecase.list_publications(user_id, collection_id).await?;
    Ok((StatusCode::OK, Json(publications)))
}
