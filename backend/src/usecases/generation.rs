use std::{collections::HashMap, sync::Arc};

use anyhow::Result as AnyResult;
use axum::http::StatusCode;
use regenflow_core::domain::{
    entities::{generation_logs::GenerationLogSettlement, payments::PaymentEntity},
    repositories::{
        collections::CollectionRepository, content_generator::ContentGenerator,
        content_store::ContentStoreClient, credentials::CredentialRepository,
        generation_logs::GenerationLogRepository, payments::PaymentRepository,
        user_allowances::UserAllowanceRepository,
    },
    value_objects::{
        billing::AllowanceStatus,
        enums::{
            field_kinds::FieldKind, generation_statuses::GenerationStatus,
            payment_statuses::PaymentStatus,
        },
        generation::{
            ContentItem, FieldGenerationResult, GenerateRequest, GenerationOutcome, image_prompt,
            text_prompt,
        },
        staged_fields::ImagePayload,
    },
};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::usecases::{
    collection_access::{CollectionAccessError, load_owned_collection},
    credentials::{CredentialError, resolve_content_store_token, resolve_generation_credential},
};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("collection not found")]
    CollectionNotFound,
    #[error("access denied")]
    Forbidden,
    #[error("payment not found")]
    PaymentNotFound,
    #[error("generation for this payment has already started")]
    PaymentAlreadyClaimed,
    #[error("{0}")]
    Credential(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl GenerationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GenerationError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GenerationError::CollectionNotFound | GenerationError::PaymentNotFound => {
                StatusCode::NOT_FOUND
            }
            GenerationError::Forbidden => StatusCode::FORBIDDEN,
            GenerationError::PaymentAlreadyClaimed => StatusCode::CONFLICT,
            GenerationError::Credential(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GenerationError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CollectionAccessError> for GenerationError {
    fn from(err: CollectionAccessError) -> Self {
        match err {
            CollectionAccessError::NotFound => GenerationError::CollectionNotFound,
            CollectionAccessError::Forbidden => GenerationError::Forbidden,
            CollectionAccessError::Internal(err) => GenerationError::Internal(err),
        }
    }
}

impl From<CredentialError> for GenerationError {
    fn from(err: CredentialError) -> Self {
        match err {
            missing @ CredentialError::Missing(_) => {
                GenerationError::Credential(missing.to_string())
            }
            CredentialError::Internal(err) => GenerationError::Internal(err),
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, GenerationError>;

pub struct GenerationUseCase<A, C, Cr, Pay, Logs, Store, Gen>
where
    A: UserAllowanceRepository + Send + Sync + 'static,
    C: CollectionRepository + Send + Sync + 'static,
    Cr: CredentialRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    Logs: GenerationLogRepository + Send + Sync + 'static,
    Store: ContentStoreClient + Send + Sync + 'static,
    Gen: ContentGenerator + Send + Sync + 'static,
{
    allowance_repo: Arc<A>,
    collection_repo: Arc<C>,
    credential_repo: Arc<Cr>,
    payment_repo: Arc<Pay>,
    generation_log_repo: Arc<Logs>,
    content_store: Arc<Store>,
    generator: Arc<Gen>,
    platform_api_key: String,
    free_generation_limit: i32,
}

impl<A, C, Cr, Pay, Logs, Store, Gen> GenerationUseCase<A, C, Cr, Pay, Logs, Store, Gen>
where
    A: UserAllowanceRepository + Send + Sync + 'static,
    C: CollectionRepository + Send + Sync + 'static,
    Cr: CredentialRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    Logs: GenerationLogRepository + Send + Sync + 'static,
    Store: ContentStoreClient + Send + Sync + 'static,
    Gen: ContentGenerator + Send + Sync + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        allowance_repo: Arc<A>,
        collection_repo: Arc<C>,
        credential_repo: Arc<Cr>,
        payment_repo: Arc<Pay>,
        generation_log_repo: Arc<Logs>,
        content_store: Arc<Store>,
        generator: Arc<Gen>,
        platform_api_key: String,
        free_generation_limit: i32,
    ) -> Self {
        Self {
            allowance_repo,
            collection_repo,
            credential_repo,
            payment_repo,
            generation_log_repo,
            content_store,
            generator,
            platform_api_key,
            free_generation_limit,
        }
    }

    /// Runs the batch on its own task. Dropping the returned future does not stop the
    /// run, so the ledger write and the payment settlement always happen.
    pub async fn generate_detached(
        self: Arc<Self>,
        user_id: Uuid,
        request: GenerateRequest,
    ) -> UseCaseResult<GenerationOutcome> {
        let run = tokio::spawn(async move { self.generate(user_id, request).await });
        run.await.map_err(|err| {
            error!(%user_id, error = ?err, "generation: run task failed");
            GenerationError::Internal(anyhow::Error::new(err))
        })?
    }

    pub async fn generate(
        &self,
        user_id: Uuid,
        request: GenerateRequest,
    ) -> UseCaseResult<GenerationOutcome> {
        info!(
            %user_id,
            collection_id = %request.collection_id,
            items = request.item_ids.len(),
            fields = request.fields.len(),
            payment_id = ?request.payment_id,
            "generation: run requested"
        );

        if request.item_ids.is_empty() || request.fields.is_empty() {
            let err = GenerationError::InvalidRequest(
                "itemIds and fields must not be empty".to_string(),
            );
            warn!(%user_id, status = err.status_code().as_u16(), "generation: empty selection");
            return Err(err);
        }

        let collection =
            load_owned_collection(self.collection_repo.as_ref(), user_id, request.collection_id)
                .await?;
        let store_token =
            resolve_content_store_token(self.credential_repo.as_ref(), collection.id).await?;
        let credential =
            resolve_generation_credential(self.credential_repo.as_ref(), collection.id).await?;

        let items = self
            .content_store
            .list_items(&store_token, &collection.external_collection_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    collection_id = %collection.id,
                    error = ?err,
                    "generation: failed to read collection items"
                );
                GenerationError::Internal(err)
            })?;

        let payment = match request.payment_id {
            Some(payment_id) => Some(self.claim_payment(user_id, collection.id, payment_id).await?),
            None => None,
        };

        let allowance = self
            .allowance_repo
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "generation: failed to read allowance");
                GenerationError::Internal(err)
            })?;
        let allowance = AllowanceStatus::from_entity(allowance.as_ref(), self.free_generation_limit);

        let metered = !credential.is_owned() && payment.is_none();
        let api_key = credential.api_key(&self.platform_api_key);

        let items_by_id: HashMap<&str, &ContentItem> =
            items.iter().map(|item| (item.id.as_str(), item)).collect();

        let mut results = Vec::with_capacity(request.item_ids.len() * request.fields.len());
        let mut remaining_free = allowance.remaining;
        let mut free_used = 0;

        for item_id in &request.item_ids {
            let item = items_by_id.get(item_id.as_str()).copied();
            for field_name in &request.fields {
                let kind = request.kind_of(field_name);
                let result = match item {
                    Some(item) => {
                        self.generate_field(api_key, item, field_name, kind)
                            .await
                            .map(|value| {
                                FieldGenerationResult::succeeded(item_id, field_name, kind, value)
                            })
                            .unwrap_or_else(|err| {
                                warn!(
                                    %user_id,
                                    %item_id,
                                    %field_name,
                                    error = ?err,
                                    "generation: field generation failed"
                                );
                                FieldGenerationResult::failed(
                                    item_id,
                                    field_name,
                                    kind,
                                    err.to_string(),
                                )
                            })
                    }
                    None => FieldGenerationResult::failed(
                        item_id,
                        field_name,
                        kind,
                        format!("Item {item_id} not found in collection"),
                    ),
                };

                if metered && result.is_success() && remaining_free > 0 {
                    remaining_free -= 1;
                    free_used += 1;
                }
                results.push(result);
            }
        }

        let remaining_free_after = if metered {
            let stored = self
                .allowance_repo
                .increment_usage(user_id, free_used, self.free_generation_limit)
                .await
                .map_err(|err| {
                    error!(
                        %user_id,
                        free_used,
                        db_error = ?err,
                        "generation: failed to record free usage"
                    );
                    GenerationError::Internal(err)
                })?;
            AllowanceStatus::new(stored.free_generations_used, stored.generation_limit).remaining
        } else {
            allowance.remaining
        };

        if let Some(payment) = payment {
            self.settle_payment(&payment, &request.item_ids, &results)
                .await;
        }

        let succeeded = results.iter().filter(|result| result.is_success()).count();
        info!(
            %user_id,
            collection_id = %collection.id,
            succeeded,
            failed = results.len() - succeeded,
            free_used,
            remaining_free_after,
            "generation: run finished"
        );

        Ok(GenerationOutcome {
            results,
            free_used,
            remaining_free_after,
        })
    }

    async fn claim_payment(
        &self,
        user_id: Uuid,
        collection_id: Uuid,
        payment_id: Uuid,
    ) -> UseCaseResult<PaymentEntity> {
        let payment = self
            .payment_repo
            .find_by_id(payment_id)
            .await
            .map_err(|err| {
                error!(%user_id, %payment_id, db_error = ?err, "generation: failed to load payment");
                GenerationError::Internal(err)
            })?
            .ok_or_else(|| {
                warn!(%user_id, %payment_id, "generation: payment not found");
                GenerationError::PaymentNotFound
            })?;

        if payment.user_id != user_id || payment.collection_id != collection_id {
            warn!(
                %user_id,
                %payment_id,
                %collection_id,
                "generation: payment belongs to another user or collection"
            );
            return Err(GenerationError::Forbidden);
        }

        let claimed = self
            .payment_repo
            .claim_generation(payment_id)
            .await
            .map_err(|err| {
                error!(%user_id, %payment_id, db_error = ?err, "generation: failed to claim payment");
                GenerationError::Internal(err)
            })?;
        if !claimed {
            warn!(%user_id, %payment_id, "generation: payment already claimed");
            return Err(GenerationError::PaymentAlreadyClaimed);
        }

        info!(%user_id, %payment_id, "generation: payment claimed");
        Ok(payment)
    }

    async fn generate_field(
        &self,
        api_key: &str,
        item: &ContentItem,
        field_name: &str,
        kind: FieldKind,
    ) -> AnyResult<String> {
        let context = item.context_excluding(field_name);
        debug!(item_id = %item.id, %field_name, %kind, "generation: generating field");
        match kind {
            FieldKind::Text => {
                self.generator
                    .generate_text(api_key, text_prompt(field_name), context)
                    .await
            }
            FieldKind::Image => {
                let bytes = self
                    .generator
                    .generate_image(api_key, image_prompt(field_name, &context))
                    .await?;
                Ok(ImagePayload::to_data_url(&bytes))
            }
        }
    }

    /// Errors are logged only: the results have already been produced.
    async fn settle_payment(
        &self,
        payment: &PaymentEntity,
        item_ids: &[String],
        results: &[FieldGenerationResult],
    ) {
        let settlements = settlements_for(item_ids, results);
        let any_succeeded = settlements
            .iter()
            .any(|settlement| settlement.status == GenerationStatus::Succeeded.as_str());

        if let Err(err) = self
            .generation_log_repo
            .settle_logs(payment.id, settlements)
            .await
        {
            error!(
                payment_id = %payment.id,
                db_error = ?err,
                "generation: failed to settle generation logs"
            );
        }

        let status = if any_succeeded {
            PaymentStatus::Completed
        } else {
            PaymentStatus::Failed
        };
        if let Err(err) = self.payment_repo.update_status(payment.id, status).await {
            error!(
                payment_id = %payment.id,
                %status,
                db_error = ?err,
                "generation: failed to update payment status"
            );
        }
    }
}

/// One settlement per item: succeeded when every field succeeded, else the first error.
fn settlements_for(
    item_ids: &[String],
    results: &[FieldGenerationResult],
) -> Vec<GenerationLogSettlement> {
    item_ids
        .iter()
        .map(|item_id| {
            let first_error = results
                .iter()
                .filter(|result| &result.item_id == item_id)
                .find_map(|result| result.error.clone());
            GenerationLogSettlement {
                item_id: item_id.clone(),
                status: if first_error.is_none() {
                    GenerationStatus::Succeeded.to_string()
                } else {
                    GenerationStatus::Failed.to_string()
                },
                error: first_error,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::collection_access::test_support::sample_collection;
    use chrono::Utc;
    use mockall::predicate::eq;
    use regenflow_core::domain::{
        entities::{
            collections::CollectionViewEntity, user_allowances::UserAllowanceEntity,
        },
        repositories::{
            collections::MockCollectionRepository, content_generator::MockContentGenerator,
            content_store::MockContentStoreClient, credentials::MockCredentialRepository,
            generation_logs::MockGenerationLogRepository, payments::MockPaymentRepository,
            user_allowances::MockUserAllowanceRepository,
        },
        value_objects::enums::credential_providers::CredentialProvider,
    };
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::Notify;

    struct Mocks {
        allowances: MockUserAllowanceRepository,
        collections: MockCollectionRepository,
        credentials: MockCredentialRepository,
        payments: MockPaymentRepository,
        logs: MockGenerationLogRepository,
        store: MockContentStoreClient,
        generator: MockContentGenerator,
    }

    type TestUseCase = GenerationUseCase<
        MockUserAllowanceRepository,
        MockCollectionRepository,
        MockCredentialRepository,
        MockPaymentRepository,
        MockGenerationLogRepository,
        MockContentStoreClient,
        MockContentGenerator,
    >;

    impl Mocks {
        /// Owned collection, a Webflow token, two stored items and the given OpenAI key.
        fn new(collection: &CollectionViewEntity, openai_key: Option<&str>) -> Self {
            let mut collections = MockCollectionRepository::new();
            let view = collection.clone();
            collections
                .expect_find_collection_view()
                .returning(move |_| {
                    let view = view.clone();
                    Box::pin(async move { Ok(Some(view)) })
                });

            let mut credentials = MockCredentialRepository::new();
            let openai_key = openai_key.map(str::to_string);
            credentials
                .expect_get_decrypted_credential()
                .returning(move |_, provider| {
                    let token = match provider {
                        CredentialProvider::Webflow => Some("wf_token".to_string()),
                        CredentialProvider::OpenAi => openai_key.clone(),
                    };
                    Box::pin(async move { Ok(token) })
                });

            let mut store = MockContentStoreClient::new();
            store
                .expect_list_items()
                .with(eq("wf_token"), eq("wf_col_1"))
                .returning(|_, _| {
                    Box::pin(async {
                        Ok(vec![
                            content_item("item1", "First post"),
                            content_item("item2", "Second post"),
                        ])
                    })
                });

            Self {
                allowances: MockUserAllowanceRepository::new(),
                collections,
                credentials,
                payments: MockPaymentRepository::new(),
                logs: MockGenerationLogRepository::new(),
                store,
                generator: MockContentGenerator::new(),
            }
        }

        fn with_allowance(mut self, used: i32, limit: i32) -> Self {
            self.allowances
                .expect_find_by_user_id()
                .returning(move |user_id| {
                    Box::pin(async move {
                        Ok(Some(UserAllowanceEntity {
                            user_id,
                            free_generations_used: used,
                            generation_limit: limit,
                            updated_at: Utc::now(),
                        }))
                    })
                });
            self
        }

        fn into_usecase(self) -> TestUseCase {
            GenerationUseCase::new(
                Arc::new(self.allowances),
                Arc::new(self.collections),
                Arc::new(self.credentials),
                Arc::new(self.payments),
                Arc::new(self.logs),
                Arc::new(self.store),
                Arc::new(self.generator),
                "sk-platform".to_string(),
                10,
            )
        }
    }

    fn content_item(id: &str, name: &str) -> ContentItem {
        serde_json::from_value(json!({
            "id": id,
            "fieldData": { "name": name, "slug": id }
        }))
        .unwrap()
    }

    fn request(collection_id: Uuid, item_ids: &[&str], fields: &[&str]) -> GenerateRequest {
        serde_json::from_value(json!({
            "collectionId": collection_id,
            "itemIds": item_ids,
            "fields": fields,
            "columnTypes": { "hero": "image" }
        }))
        .unwrap()
    }

    fn payment(id: Uuid, user_id: Uuid, collection_id: Uuid) -> PaymentEntity {
        PaymentEntity {
            id,
            user_id,
            provider_payment_intent_id: "pi_1".to_string(),
            provider_checkout_session_id: Some("cs_1".to_string()),
            amount_cents: 20,
            collection_id,
            item_ids: vec!["item1".to_string(), "item2".to_string()],
            item_count: 2,
            status: "pending".to_string(),
            generation_logs_count: 2,
            generation_started: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn results_follow_item_field_order_and_failures_are_isolated() {
        let user_id = Uuid::new_v4();
        let collection = sample_collection(user_id);
        let mut mocks = Mocks::new(&collection, None).with_allowance(8, 10);

        mocks
            .generator
            .expect_generate_text()
            .returning(|api_key, prompt, context| {
                assert_eq!(api_key, "sk-platform");
                assert!(!context.contains("name:"));
                let fails = context.contains("slug: item1");
                Box::pin(async move {
                    if fails {
                        Err(anyhow::anyhow!("rate limited"))
                    } else {
                        Ok(format!("generated for {}", prompt.len()))
                    }
                })
            });
        mocks
            .generator
            .expect_generate_image()
            .returning(|_, _| Box::pin(async { Ok(vec![0x89, 0x50, 0x4e, 0x47]) }));

        mocks
            .allowances
            .expect_increment_usage()
            .with(eq(user_id), eq(2), eq(10))
            .times(1)
            .returning(|user_id, _, _| {
                Box::pin(async move {
                    Ok(UserAllowanceEntity {
                        user_id,
                        free_generations_used: 10,
                        generation_limit: 10,
                        updated_at: Utc::now(),
                    })
                })
            });

        let outcome = mocks
            .into_usecase()
            .generate(user_id, request(collection.id, &["item1", "item2"], &["name", "hero"]))
            .await
            .unwrap();

        let order: Vec<(&str, &str)> = outcome
            .results
            .iter()
            .map(|result| (result.item_id.as_str(), result.field_name.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("item1", "name"),
                ("item1", "hero"),
                ("item2", "name"),
                ("item2", "hero")
            ]
        );
        assert_eq!(outcome.results[0].error.as_deref(), Some("rate limited"));
        assert!(outcome.results[1].is_success());
        assert_eq!(outcome.results[1].kind, FieldKind::Image);
        assert!(
            outcome.results[1]
                .value
                .as_deref()
                .unwrap()
                .starts_with("data:image/png;base64,")
        );
        assert!(outcome.results[2].is_success());
        assert!(outcome.results[3].is_success());

        // three successes, only two free generations left
        assert_eq!(outcome.free_used, 2);
        assert_eq!(outcome.remaining_free_after, 0);
    }

    #[tokio::test]
    async fn owned_key_runs_skip_the_ledger() {
        let user_id = Uuid::new_v4();
        let collection = sample_collection(user_id);
        let mut mocks = Mocks::new(&collection, Some("sk-live-user-key")).with_allowance(4, 10);

        mocks
            .generator
            .expect_generate_text()
            .returning(|api_key, _, _| {
                assert_eq!(api_key, "sk-live-user-key");
                Box::pin(async { Ok("text".to_string()) })
            });
        mocks.allowances.expect_increment_usage().never();

        let outcome = mocks
            .into_usecase()
            .generate(user_id, request(collection.id, &["item1"], &["name"]))
            .await
            .unwrap();

        assert_eq!(outcome.free_used, 0);
        assert_eq!(outcome.remaining_free_after, 6);
    }

    #[tokio::test]
    async fn unknown_items_fail_per_field() {
        let user_id = Uuid::new_v4();
        let collection = sample_collection(user_id);
        let mut mocks = Mocks::new(&collection, None).with_allowance(0, 10);

        mocks.generator.expect_generate_text().never();
        mocks
            .allowances
            .expect_increment_usage()
            .with(eq(user_id), eq(0), eq(10))
            .times(1)
            .returning(|user_id, _, _| {
                Box::pin(async move {
                    Ok(UserAllowanceEntity {
                        user_id,
                        free_generations_used: 0,
                        generation_limit: 10,
                        updated_at: Utc::now(),
                    })
                })
            });

        let outcome = mocks
            .into_usecase()
            .generate(user_id, request(collection.id, &["missing"], &["name", "summary"]))
            .await
            .unwrap();

        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.results.iter().all(|result| !result.is_success()));
        assert_eq!(outcome.remaining_free_after, 10);
    }

    #[tokio::test]
    async fn failed_ledger_increment_fails_the_call() {
        let user_id = Uuid::new_v4();
        let collection = sample_collection(user_id);
        let mut mocks = Mocks::new(&collection, None).with_allowance(0, 10);

        mocks
            .generator
            .expect_generate_text()
            .returning(|_, _, _| Box::pin(async { Ok("text".to_string()) }));
        mocks
            .allowances
            .expect_increment_usage()
            .returning(|_, _, _| Box::pin(async { Err(anyhow::anyhow!("db down")) }));

        let err = mocks
            .into_usecase()
            .generate(user_id, request(collection.id, &["item1"], &["name"]))
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::Internal(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn missing_store_token_is_a_credential_error() {
        let user_id = Uuid::new_v4();
        let collection = sample_collection(user_id);
        let view = collection.clone();

        let mut collections = MockCollectionRepository::new();
        collections.expect_find_collection_view().returning(move |_| {
            let view = view.clone();
            Box::pin(async move { Ok(Some(view)) })
        });
        let mut credentials = MockCredentialRepository::new();
        credentials
            .expect_get_decrypted_credential()
            .returning(|_, _| Box::pin(async { Ok(None) }));
        let mut generator = MockContentGenerator::new();
        generator.expect_generate_text().never();

        let usecase: TestUseCase = GenerationUseCase::new(
            Arc::new(MockUserAllowanceRepository::new()),
            Arc::new(collections),
            Arc::new(credentials),
            Arc::new(MockPaymentRepository::new()),
            Arc::new(MockGenerationLogRepository::new()),
            Arc::new(MockContentStoreClient::new()),
            Arc::new(generator),
            "sk-platform".to_string(),
            10,
        );

        let err = usecase
            .generate(user_id, request(collection.id, &["item1"], &["name"]))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Credential(_)));
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn empty_selection_is_rejected() {
        let usecase: TestUseCase = GenerationUseCase::new(
            Arc::new(MockUserAllowanceRepository::new()),
            Arc::new(MockCollectionRepository::new()),
            Arc::new(MockCredentialRepository::new()),
            Arc::new(MockPaymentRepository::new()),
            Arc::new(MockGenerationLogRepository::new()),
            Arc::new(MockContentStoreClient::new()),
            Arc::new(MockContentGenerator::new()),
            "sk-platform".to_string(),
            10,
        );

        let err = usecase
            .generate(Uuid::new_v4(), request(Uuid::new_v4(), &[], &["name"]))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn paid_run_settles_logs_and_payment() {
        let user_id = Uuid::new_v4();
        let collection = sample_collection(user_id);
        let payment_id = Uuid::new_v4();
        let collection_id = collection.id;
        let mut mocks = Mocks::new(&collection, None).with_allowance(10, 10);

        mocks
            .payments
            .expect_find_by_id()
            .with(eq(payment_id))
            .returning(move |id| {
                Box::pin(async move { Ok(Some(payment(id, user_id, collection_id))) })
            });
        mocks
            .payments
            .expect_claim_generation()
            .with(eq(payment_id))
            .times(1)
            .returning(|_| Box::pin(async { Ok(true) }));
        mocks
            .payments
            .expect_update_status()
            .with(eq(payment_id), eq(PaymentStatus::Completed))
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(()) }));

        mocks
            .generator
            .expect_generate_text()
            .returning(|_, _, context| {
                let fails = context.contains("slug: item2");
                Box::pin(async move {
                    if fails {
                        Err(anyhow::anyhow!("content policy"))
                    } else {
                        Ok("text".to_string())
                    }
                })
            });
        mocks.allowances.expect_increment_usage().never();
        mocks
            .logs
            .expect_settle_logs()
            .withf(move |id, settlements| {
                *id == payment_id
                    && settlements
                        == &vec![
                            GenerationLogSettlement {
                                item_id: "item1".to_string(),
                                status: "succeeded".to_string(),
                                error: None,
                            },
                            GenerationLogSettlement {
                                item_id: "item2".to_string(),
                                status: "failed".to_string(),
                                error: Some("content policy".to_string()),
                            },
                        ]
            })
            .times(1)
            .returning(|_, settlements| Box::pin(async move { Ok(settlements.len()) }));

        let mut request = request(collection.id, &["item1", "item2"], &["name"]);
        request.payment_id = Some(payment_id);

        let outcome = mocks.into_usecase().generate(user_id, request).await.unwrap();
        assert_eq!(outcome.free_used, 0);
        assert_eq!(outcome.remaining_free_after, 0);
        assert_eq!(outcome.results.len(), 2);
    }

    #[tokio::test]
    async fn claimed_payment_is_a_conflict() {
        let user_id = Uuid::new_v4();
        let collection = sample_collection(user_id);
        let collection_id = collection.id;
        let mut mocks = Mocks::new(&collection, None);

        mocks.payments.expect_find_by_id().returning(move |id| {
            Box::pin(async move { Ok(Some(payment(id, user_id, collection_id))) })
        });
        mocks
            .payments
            .expect_claim_generation()
            .returning(|_| Box::pin(async { Ok(false) }));
        mocks.generator.expect_generate_text().never();

        let mut request = request(collection.id, &["item1"], &["name"]);
        request.payment_id = Some(Uuid::new_v4());

        let err = mocks.into_usecase().generate(user_id, request).await.unwrap_err();
        assert!(matches!(err, GenerationError::PaymentAlreadyClaimed));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn payment_of_another_user_is_forbidden() {
        let user_id = Uuid::new_v4();
        let collection = sample_collection(user_id);
        let collection_id = collection.id;
        let mut mocks = Mocks::new(&collection, None);

        mocks.payments.expect_find_by_id().returning(move |id| {
            Box::pin(async move { Ok(Some(payment(id, Uuid::new_v4(), collection_id))) })
        });
        mocks.payments.expect_claim_generation().never();

        let mut request = request(collection.id, &["item1"], &["name"]);
        request.payment_id = Some(Uuid::new_v4());

        let err = mocks.into_usecase().generate(user_id, request).await.unwrap_err();
        assert!(matches!(err, GenerationError::Forbidden));
    }

    #[tokio::test]
    async fn dropped_request_still_records_free_usage() {
        let user_id = Uuid::new_v4();
        let collection = sample_collection(user_id);
        let mut mocks = Mocks::new(&collection, None).with_allowance(0, 10);

        mocks.generator.expect_generate_text().returning(|_, _, _| {
            Box::pin(async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok("text".to_string())
            })
        });

        let recorded = Arc::new(Notify::new());
        let signal = Arc::clone(&recorded);
        mocks
            .allowances
            .expect_increment_usage()
            .with(eq(user_id), eq(2), eq(10))
            .times(1)
            .returning(move |user_id, _, _| {
                signal.notify_one();
                Box::pin(async move {
                    Ok(UserAllowanceEntity {
                        user_id,
                        free_generations_used: 2,
                        generation_limit: 10,
                        updated_at: Utc::now(),
                    })
                })
            });

        let usecase = Arc::new(mocks.into_usecase());
        let run = Arc::clone(&usecase)
            .generate_detached(user_id, request(collection.id, &["item1", "item2"], &["name"]));

        let cancelled = tokio::time::timeout(Duration::from_millis(60), run).await;
        assert!(cancelled.is_err());

        tokio::time::timeout(Duration::from_secs(5), recorded.notified())
            .await
            .expect("free usage should be recorded after the caller went away");
    }

    #[test]
    fn settlement_keeps_the_first_error_per_item() {
        let results = vec![
            FieldGenerationResult::succeeded("a", "name", FieldKind::Text, "x".to_string()),
            FieldGenerationResult::failed("a", "summary", FieldKind::Text, "first".to_string()),
            FieldGenerationResult::failed("a", "hero", FieldKind::Image, "second".to_string()),
        ];
        let settlements = settlements_for(&["a".to_string()], &results);
        assert_eq!(settlements[0].status, "failed");
        assert_eq!(settlements[0].error.as_deref(), Some("first"));
    }
}
