use std::sync::Arc;

use anyhow::{Context, Result as AnyResult};
use axum::http::StatusCode;
use chrono::Utc;
use regenflow_core::domain::{
    entities::{
        collections::CollectionViewEntity,
        publications::{
            InsertPublicationEntity, InsertPublicationItemEntity, PublicationCompletionEntity,
            PublicationItemCompletionEntity,
        },
    },
    repositories::{
        collections::CollectionRepository, content_store::ContentStoreClient,
        credentials::CredentialRepository, publications::PublicationRepository,
    },
    value_objects::{
        enums::{
            field_kinds::FieldKind,
            publication_statuses::{PublicationItemStatus, PublicationStatus},
        },
        publications::{PublicationDetailDto, PublicationDto},
        publish_events::{PublishEvent, PublishedLink},
        staged_fields::{ImagePayload, PublishRequest, StagedChanges, StagedItem},
    },
};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::usecases::{
    collection_access::{CollectionAccessError, load_owned_collection},
    credentials::{CredentialError, resolve_content_store_token},
};

pub const NO_FIELDS_READY: &str = "No fields ready to publish";
pub const PUBLICATION_LIST_LIMIT: i64 = 20;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("collection not found")]
    CollectionNotFound,
    #[error("access denied")]
    Forbidden,
    #[error("publication not found")]
    PublicationNotFound,
    #[error("{0}")]
    Credential(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PublishError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PublishError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            PublishError::CollectionNotFound | PublishError::PublicationNotFound => {
                StatusCode::NOT_FOUND
            }
            PublishError::Forbidden => StatusCode::FORBIDDEN,
            PublishError::Credential(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PublishError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CollectionAccessError> for PublishError {
    fn from(err: CollectionAccessError) -> Self {
        match err {
            CollectionAccessError::NotFound => PublishError::CollectionNotFound,
            CollectionAccessError::Forbidden => PublishError::Forbidden,
            CollectionAccessError::Internal(err) => PublishError::Internal(err),
        }
    }
}

impl From<CredentialError> for PublishError {
    fn from(err: CredentialError) -> Self {
        match err {
            missing @ CredentialError::Missing(_) => PublishError::Credential(missing.to_string()),
            CredentialError::Internal(err) => PublishError::Internal(err),
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, PublishError>;

/// A validated publish request, ready to run once the progress stream is open.
#[derive(Debug, Clone)]
pub struct PublishJob {
    pub user_id: Uuid,
    pub collection: CollectionViewEntity,
    pub token: String,
    pub changes: StagedChanges,
}

struct ItemReport {
    status: PublicationItemStatus,
    published_url: Option<String>,
    fields_succeeded: i32,
    fields_failed: i32,
}

/// Forwards events to the caller. A dropped receiver is logged once and the job keeps going.
struct ProgressSender {
    tx: mpsc::Sender<PublishEvent>,
    publication_id: Option<Uuid>,
    disconnected: bool,
}

impl ProgressSender {
    fn new(tx: mpsc::Sender<PublishEvent>) -> Self {
        Self {
            tx,
            publication_id: None,
            disconnected: false,
        }
    }

    async fn send(&mut self, event: PublishEvent) {
        if self.disconnected {
            return;
        }
        if self.tx.send(event).await.is_err() {
            self.disconnected = true;
            warn!(
                publication_id = ?self.publication_id,
                "publish: progress receiver dropped, continuing without stream"
            );
        }
    }
}

pub struct PublishUseCase<C, Cr, Pub, Store>
where
    C: CollectionRepository + Send + Sync + 'static,
    Cr: CredentialRepository + Send + Sync + 'static,
    Pub: PublicationRepository + Send + Sync + 'static,
    Store: ContentStoreClient + Send + Sync + 'static,
{
    collection_repo: Arc<C>,
    credential_repo: Arc<Cr>,
    publication_repo: Arc<Pub>,
    content_store: Arc<Store>,
}

impl<C, Cr, Pub, Store> PublishUseCase<C, Cr, Pub, Store>
where
    C: CollectionRepository + Send + Sync + 'static,
    Cr: CredentialRepository + Send + Sync + 'static,
    Pub: PublicationRepository + Send + Sync + 'static,
    Store: ContentStoreClient + Send + Sync + 'static,
{
    pub fn new(
        collection_repo: Arc<C>,
        credential_repo: Arc<Cr>,
        publication_repo: Arc<Pub>,
        content_store: Arc<Store>,
    ) -> Self {
        Self {
            collection_repo,
            credential_repo,
            publication_repo,
            content_store,
        }
    }

    pub async fn prepare(
        &self,
        user_id: Uuid,
        request: PublishRequest,
    ) -> UseCaseResult<PublishJob> {
        info!(
            %user_id,
            collection_id = %request.collection_id,
            items = request.changes.total_items(),
            fields = request.changes.total_fields(),
            "publish: publish requested"
        );

        if request.changes.is_empty() {
            let err = PublishError::InvalidRequest("changes must not be empty".to_string());
            warn!(%user_id, status = err.status_code().as_u16(), "publish: empty changes");
            return Err(err);
        }

        let collection =
            load_owned_collection(self.collection_repo.as_ref(), user_id, request.collection_id)
                .await?;
        let token =
            resolve_content_store_token(self.credential_repo.as_ref(), collection.id).await?;

        Ok(PublishJob {
            user_id,
            collection,
            token,
            changes: request.changes,
        })
    }

    /// Runs the job to completion, streaming progress into `tx`.
    pub async fn run(&self, job: PublishJob, tx: mpsc::Sender<PublishEvent>) {
        let mut progress = ProgressSender::new(tx);
        if let Err(err) = self.execute(&job, &mut progress).await {
            error!(
                user_id = %job.user_id,
                collection_id = %job.collection.id,
                publication_id = ?progress.publication_id,
                error = ?err,
                "publish: job aborted"
            );
            progress
                .send(PublishEvent::Error {
                    message: "Publish job aborted before completion".to_string(),
                })
                .await;
        }
    }

    async fn execute(&self, job: &PublishJob, progress: &mut ProgressSender) -> AnyResult<()> {
        let total_items = job.changes.total_items();
        let total_fields = job.changes.total_fields();

        let publication_id = self
            .publication_repo
            .create_publication(InsertPublicationEntity {
                collection_id: job.collection.id,
                user_id: job.user_id,
                total_items,
                total_fields,
                status: PublicationStatus::Processing.to_string(),
            })
            .await
            .context("create publication")?;
        progress.publication_id = Some(publication_id);

        info!(%publication_id, total_items, total_fields, "publish: publication started");
        progress
            .send(PublishEvent::Started {
                publication_id,
                total_items,
                total_fields,
            })
            .await;

        let mut items_succeeded = 0;
        let mut items_failed = 0;
        let mut fields_succeeded = 0;
        let mut fields_failed = 0;
        let mut links = Vec::with_capacity(job.changes.items.len());

        for item in &job.changes.items {
            let (report, fields_applied, error) =
                self.publish_item(job, publication_id, item).await?;

            match report.status {
                PublicationItemStatus::Succeeded => items_succeeded += 1,
                _ => items_failed += 1,
            }
            fields_succeeded += report.fields_succeeded;
            fields_failed += report.fields_failed;

            links.push(PublishedLink {
                item_id: item.item_id.clone(),
                status: report.status,
                published_url: report.published_url.clone(),
            });

            progress
                .send(PublishEvent::Item {
                    item_id: item.item_id.clone(),
                    status: report.status,
                    items_succeeded,
                    items_failed,
                    published_url: report.published_url,
                    fields_applied,
                    error,
                })
                .await;
        }

        let status = PublicationStatus::from_item_counts(items_succeeded, items_failed);
        self.publication_repo
            .complete_publication(
                publication_id,
                PublicationCompletionEntity {
                    status: status.to_string(),
                    items_succeeded,
                    items_failed,
                    fields_succeeded,
                    fields_failed,
                    completed_at: Some(Utc::now()),
                },
            )
            .await
            .context("complete publication")?;

        info!(
            %publication_id,
            %status,
            items_succeeded,
            items_failed,
            fields_succeeded,
            fields_failed,
            "publish: publication finished"
        );

        progress
            .send(PublishEvent::Completed {
                publication_id,
                status,
                items_succeeded,
                items_failed,
                fields_succeeded,
                fields_failed,
                links,
            })
            .await;

        Ok(())
    }

    /// Per-item failures are reported, not returned. `Err` only for audit-row writes.
    async fn publish_item(
        &self,
        job: &PublishJob,
        publication_id: Uuid,
        item: &StagedItem,
    ) -> AnyResult<(ItemReport, Vec<String>, Option<String>)> {
        let mut payload = Map::new();
        let mut applied = Vec::with_capacity(item.fields.len());
        let mut prepared_failures = 0;

        for (field_name, field) in &item.fields {
            match field.kind {
                FieldKind::Image => match self
                    .upload_image(job, &item.item_id, field_name, &field.value)
                    .await
                {
                    Ok(reference) => {
                        payload.insert(field_name.clone(), reference);
                        applied.push(field_name.clone());
                    }
                    Err(err) => {
                        warn!(
                            item_id = %item.item_id,
                            %field_name,
                            error = ?err,
                            "publish: image upload failed, skipping field"
                        );
                        prepared_failures += 1;
                    }
                },
                FieldKind::Text => {
                    payload.insert(field_name.clone(), Value::String(field.value.clone()));
                    applied.push(field_name.clone());
                }
            }
        }

        let publication_item_id = self
            .publication_repo
            .create_item(InsertPublicationItemEntity {
                publication_id,
                item_id: item.item_id.clone(),
                fields_total: item.fields.len() as i32,
                fields_succeeded: 0,
                fields_failed: 0,
                status: PublicationItemStatus::Processing.to_string(),
            })
            .await
            .context("create publication item")?;

        let mut slug = None;
        let (report, fields_applied, error) = if payload.is_empty() {
            warn!(item_id = %item.item_id, "publish: no fields ready to publish");
            (
                ItemReport {
                    status: PublicationItemStatus::Failed,
                    published_url: None,
                    fields_succeeded: 0,
                    fields_failed: prepared_failures,
                },
                Vec::new(),
                Some(NO_FIELDS_READY.to_string()),
            )
        } else {
            match self
                .content_store
                .update_item(
                    &job.token,
                    &job.collection.external_collection_id,
                    &item.item_id,
                    payload,
                )
                .await
            {
                Ok(stored) => {
                    slug = stored
                        .slug()
                        .or_else(|| item.text_value("slug"))
                        .map(str::to_string);
                    let published_url = job.collection.item_url(slug.as_deref());
                    (
                        ItemReport {
                            status: PublicationItemStatus::Succeeded,
                            published_url,
                            fields_succeeded: applied.len() as i32,
                            fields_failed: prepared_failures,
                        },
                        applied,
                        None,
                    )
                }
                Err(err) => {
                    warn!(
                        item_id = %item.item_id,
                        error = ?err,
                        "publish: item update failed"
                    );
                    (
                        ItemReport {
                            status: PublicationItemStatus::Failed,
                            published_url: None,
                            fields_succeeded: 0,
                            fields_failed: applied.len() as i32 + prepared_failures,
                        },
                        Vec::new(),
                        Some(err.to_string()),
                    )
                }
            }
        };

        self.publication_repo
            .complete_item(
                publication_item_id,
                PublicationItemCompletionEntity {
                    slug,
                    published_url: report.published_url.clone(),
                    fields_succeeded: report.fields_succeeded,
                    fields_failed: report.fields_failed,
                    status: report.status.to_string(),
                    error_message: error.clone(),
                    completed_at: Some(Utc::now()),
                },
            )
            .await
            .context("complete publication item")?;

        Ok((report, fields_applied, error))
    }

    async fn upload_image(
        &self,
        job: &PublishJob,
        item_id: &str,
        field_name: &str,
        value: &str,
    ) -> AnyResult<Value> {
        let image = ImagePayload::decode(value)?;
        let file_name = image.file_name(item_id, field_name);
        let asset = self
            .content_store
            .upload_asset(
                &job.token,
                &job.collection.external_site_id,
                file_name,
                image.bytes,
                image.content_type,
            )
            .await?;
        Ok(asset.field_reference())
    }

    pub async fn get_publication(
        &self,
        user_id: Uuid,
        publication_id: Uuid,
    ) -> UseCaseResult<PublicationDetailDto> {
        let publication = self
            .publication_repo
            .find_publication(publication_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %publication_id,
                    db_error = ?err,
                    "publish: failed to load publication"
                );
                PublishError::Internal(err)
            })?
            .ok_or(PublishError::PublicationNotFound)?;

        if publication.user_id != user_id {
            warn!(%user_id, %publication_id, "publish: publication belongs to another user");
            return Err(PublishError::Forbidden);
        }

        let items = self
            .publication_repo
            .list_items(publication_id)
            .await
            .map_err(|err| {
                error!(
                    %publication_id,
                    db_error = ?err,
                    "publish: failed to load publication items"
                );
                PublishError::Internal(err)
            })?;

        Ok(PublicationDetailDto {
            publication: publication.into(),
            items: items.into_iter().map(Into::into).collect(),
        })
    }

    pub async fn list_publications(
        &self,
        user_id: Uuid,
        collection_id: Uuid,
    ) -> UseCaseResult<Vec<PublicationDto>> {
        load_owned_collection(self.collection_repo.as_ref(), user_id, collection_id).await?;

        let publications = self
            .publication_repo
            .list_by_collection(collection_id, PUBLICATION_LIST_LIMIT)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %collection_id,
                    db_error = ?err,
                    "publish: failed to list publications"
                );
                PublishError::Internal(err)
            })?;

        Ok(publications.into_iter().map(Into::into).collect())
    }
}
