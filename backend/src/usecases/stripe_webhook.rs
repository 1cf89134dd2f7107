use std::sync::Arc;

use axum::http::StatusCode;
use regenflow_core::{
    domain::{
        entities::{generation_logs::InsertGenerationLogEntity, payments::InsertPaymentEntity},
        repositories::{
            generation_logs::GenerationLogRepository,
            payment_provider_customers::PaymentProviderCustomerRepository,
            payments::PaymentRepository,
        },
        value_objects::{
            checkout_metadata::CheckoutMetadata,
            enums::{generation_statuses::GenerationStatus, payment_statuses::PaymentStatus},
        },
    },
    payments::stripe_client::{CHECKOUT_SESSION_COMPLETED, StripeClient},
};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::usecases::{checkout::STRIPE_PROVIDER, stripe_gateway::StripeGateway};

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("webhook signature verification failed")]
    InvalidSignature,
    #[error("checkout session payload is invalid")]
    InvalidPayload,
    #[error("checkout session has no payment intent")]
    MissingPaymentIntent,
    #[error("checkout metadata is invalid: {0}")]
    InvalidMetadata(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl WebhookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::InvalidSignature
            | WebhookError::InvalidPayload
            | WebhookError::MissingPaymentIntent
            | WebhookError::InvalidMetadata(_) => StatusCode::BAD_REQUEST,
            WebhookError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Recorded { payment_id: Uuid, logs_seeded: usize },
    AlreadyProcessed,
    Ignored { event_type: String },
}

pub type UseCaseResult<T> = std::result::Result<T, WebhookError>;

pub struct StripeWebhookUseCase<Pay, Logs, Cust, Stripe>
where
    Pay: PaymentRepository + Send + Sync + 'static,
    Logs: GenerationLogRepository + Send + Sync + 'static,
    Cust: PaymentProviderCustomerRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    payment_repo: Arc<Pay>,
    generation_log_repo: Arc<Logs>,
    customer_repo: Arc<Cust>,
    stripe_client: Arc<Stripe>,
}

impl<Pay, Logs, Cust, Stripe> StripeWebhookUseCase<Pay, Logs, Cust, Stripe>
where
    Pay: PaymentRepository + Send + Sync + 'static,
    Logs: GenerationLogRepository + Send + Sync + 'static,
    Cust: PaymentProviderCustomerRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    pub fn new(
        payment_repo: Arc<Pay>,
        generation_log_repo: Arc<Logs>,
        customer_repo: Arc<Cust>,
        stripe_client: Arc<Stripe>,
    ) -> Self {
        Self {
            payment_repo,
            generation_log_repo,
            customer_repo,
            stripe_client,
        }
    }

    pub async fn handle_event(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> UseCaseResult<WebhookOutcome> {
        let event = self
            .stripe_client
            .verify_webhook_signature(payload, signature)
            .map_err(|err| {
                warn!(error = ?err, "stripe webhook: signature verification failed");
                WebhookError::InvalidSignature
            })?;

        if event.type_ != CHECKOUT_SESSION_COMPLETED {
            debug!(event_type = %event.type_, "stripe webhook: ignoring event");
            return Ok(WebhookOutcome::Ignored {
                event_type: event.type_,
            });
        }

        let session = StripeClient::extract_checkout_session(&event).ok_or_else(|| {
            warn!(event_id = ?event.id, "stripe webhook: checkout session payload is invalid");
            WebhookError::InvalidPayload
        })?;

        let payment_intent_id = session
            .payment_intent_id()
            .map(str::to_string)
            .ok_or_else(|| {
                warn!(
                    session_id = ?session.id,
                    "stripe webhook: checkout session has no payment intent"
                );
                WebhookError::MissingPaymentIntent
            })?;

        let existing = self
            .payment_repo
            .find_by_payment_intent_id(&payment_intent_id)
            .await
            .map_err(|err| {
                error!(
                    %payment_intent_id,
                    db_error = ?err,
                    "stripe webhook: failed to look up payment"
                );
                WebhookError::Internal(err)
            })?;
        if existing.is_some() {
            info!(%payment_intent_id, "stripe webhook: payment already processed");
            return Ok(WebhookOutcome::AlreadyProcessed);
        }

        let metadata = CheckoutMetadata::from_metadata(&session.metadata).map_err(|err| {
            warn!(
                %payment_intent_id,
                error = ?err,
                "stripe webhook: checkout metadata is invalid"
            );
            WebhookError::InvalidMetadata(err.to_string())
        })?;

        if metadata.item_ids.is_empty() && metadata.item_count > 0 {
            warn!(
                %payment_intent_id,
                item_count = metadata.item_count,
                "stripe webhook: item ids could not be decoded, recording payment without logs"
            );
        }

        let amount_cents = session
            .amount_total
            .unwrap_or_default()
            .clamp(0, i32::MAX as i64) as i32;
        let item_count = metadata.item_ids.len() as i32;

        let payment = InsertPaymentEntity {
            user_id: metadata.user_id,
            provider_payment_intent_id: payment_intent_id.clone(),
            provider_checkout_session_id: session.id.clone(),
            amount_cents,
            collection_id: metadata.collection_id,
            item_ids: metadata.item_ids.clone(),
            item_count: metadata.item_count,
            status: PaymentStatus::Pending.to_string(),
            generation_logs_count: item_count,
            generation_started: false,
        };

        let payment_id = match self.payment_repo.insert_if_absent(payment).await {
            Ok(Some(payment_id)) => payment_id,
            Ok(None) => {
                info!(
                    %payment_intent_id,
                    "stripe webhook: payment recorded by a concurrent delivery"
                );
                return Ok(WebhookOutcome::AlreadyProcessed);
            }
            Err(err) => {
                error!(
                    %payment_intent_id,
                    db_error = ?err,
                    "stripe webhook: failed to insert payment"
                );
                return Err(WebhookError::Internal(err));
            }
        };

        let cost_cents = if item_count > 0 {
            amount_cents / item_count
        } else {
            0
        };
        let logs: Vec<InsertGenerationLogEntity> = metadata
            .item_ids
            .iter()
            .map(|item_id| InsertGenerationLogEntity {
                user_id: metadata.user_id,
                collection_id: metadata.collection_id,
                item_id: item_id.clone(),
                payment_id: Some(payment_id),
                status: GenerationStatus::Pending.to_string(),
                is_free_tier: false,
                cost_cents,
            })
            .collect();

        let logs_seeded = if logs.is_empty() {
            0
        } else {
            match self.generation_log_repo.insert_pending_logs(logs).await {
                Ok(inserted) => inserted,
                Err(err) => {
                    error!(
                        %payment_id,
                        db_error = ?err,
                        "stripe webhook: failed to seed generation logs"
                    );
                    0
                }
            }
        };

        if let Some(customer_id) = session.customer_id() {
            if let Err(err) = self
                .customer_repo
                .upsert_customer_ref(metadata.user_id, STRIPE_PROVIDER, customer_id)
                .await
            {
                warn!(
                    user_id = %metadata.user_id,
                    db_error = ?err,
                    "stripe webhook: failed to persist stripe customer"
                );
            }
        }

        info!(
            %payment_id,
            %payment_intent_id,
            user_id = %metadata.user_id,
            logs_seeded,
            "stripe webhook: payment recorded"
        );

        Ok(WebhookOutcome::Recorded {
            payment_id,
            logs_seeded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::usecases::stripe_gateway::MockStripeGateway;
    use chrono::Utc;
    use mockall::predicate::eq;
    use regenflow_core::{
        domain::{
            entities::payments::PaymentEntity,
            repositories::{
                generation_logs::MockGenerationLogRepository,
                payment_provider_customers::MockPaymentProviderCustomerRepository,
                payments::MockPaymentRepository,
            },
        },
        payments::stripe_client::StripeEvent,
    };
    use serde_json::json;

    fn completed_event(metadata: serde_json::Value) -> StripeEvent {
        serde_json::from_value(json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "created": 1_700_000_000,
            "livemode": false,
            "data": {
                "object": {
                    "id": "cs_1",
                    "mode": "payment",
                    "customer": "cus_1",
                    "payment_intent": "pi_1",
                    "amount_total": 30,
                    "metadata": metadata
                }
            }
        }))
        .unwrap()
    }

    fn valid_metadata(user_id: Uuid, collection_id: Uuid) -> serde_json::Value {
        let metadata = CheckoutMetadata {
            user_id,
            collection_id,
            external_collection_id: "wf_col_1".to_string(),
            item_count: 3,
            item_ids: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        }
        .to_metadata()
        .unwrap();
        serde_json::to_value(metadata).unwrap()
    }

    fn stored_payment(user_id: Uuid, collection_id: Uuid, id: Uuid) -> PaymentEntity {
        PaymentEntity {
            id,
            user_id,
            provider_payment_intent_id: "pi_1".to_string(),
            provider_checkout_session_id: Some("cs_1".to_string()),
            amount_cents: 30,
            collection_id,
            item_ids: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            item_count: 3,
            status: "pending".to_string(),
            generation_logs_count: 3,
            generation_started: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_delivery_records_one_payment() {
        let user_id = Uuid::new_v4();
        let collection_id = Uuid::new_v4();
        let payment_id = Uuid::new_v4();
        let stored: Arc<Mutex<Vec<PaymentEntity>>> = Arc::new(Mutex::new(Vec::new()));

        let mut stripe = MockStripeGateway::new();
        let metadata = valid_metadata(user_id, collection_id);
        stripe
            .expect_verify_webhook_signature()
            .times(2)
            .returning(move |_, _| Ok(completed_event(metadata.clone())));

        let mut payments = MockPaymentRepository::new();
        let lookup = Arc::clone(&stored);
        payments
            .expect_find_by_payment_intent_id()
            .with(eq("pi_1"))
            .times(2)
            .returning(move |_| {
                let found = lookup.lock().unwrap().first().cloned();
                Box::pin(async move { Ok(found) })
            });
        let insert = Arc::clone(&stored);
        payments
            .expect_insert_if_absent()
            .withf(|payment| {
                payment.provider_payment_intent_id == "pi_1"
                    && payment.status == "pending"
                    && payment.generation_logs_count == 3
                    && !payment.generation_started
            })
            .times(1)
            .returning(move |payment| {
                insert.lock().unwrap().push(stored_payment(
                    payment.user_id,
                    payment.collection_id,
                    payment_id,
                ));
                Box::pin(async move { Ok(Some(payment_id)) })
            });

        let mut logs = MockGenerationLogRepository::new();
        logs.expect_insert_pending_logs()
            .withf(move |logs| {
                logs.len() == 3
                    && logs.iter().all(|log| {
                        log.payment_id == Some(payment_id)
                            && log.status == "pending"
                            && !log.is_free_tier
                            && log.cost_cents == 10
                    })
            })
            .times(1)
            .returning(|logs| Box::pin(async move { Ok(logs.len()) }));

        let mut customers = MockPaymentProviderCustomerRepository::new();
        customers
            .expect_upsert_customer_ref()
            .with(eq(user_id), eq(STRIPE_PROVIDER), eq("cus_1"))
            .times(1)
            .returning(|_, _, _| Box::pin(async { Ok(()) }));

        let usecase = StripeWebhookUseCase::new(
            Arc::new(payments),
            Arc::new(logs),
            Arc::new(customers),
            Arc::new(stripe),
        );

        let first = usecase.handle_event(b"{}", "t=1,v1=abc").await.unwrap();
        assert_eq!(
            first,
            WebhookOutcome::Recorded {
                payment_id,
                logs_seeded: 3
            }
        );

        let second = usecase.handle_event(b"{}", "t=1,v1=abc").await.unwrap();
        assert_eq!(second, WebhookOutcome::AlreadyProcessed);
        assert_eq!(stored.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn lost_insert_race_is_already_processed() {
        let user_id = Uuid::new_v4();
        let collection_id = Uuid::new_v4();

        let mut stripe = MockStripeGateway::new();
        let metadata = valid_metadata(user_id, collection_id);
        stripe
            .expect_verify_webhook_signature()
            .returning(move |_, _| Ok(completed_event(metadata.clone())));

        let mut payments = MockPaymentRepository::new();
        payments
            .expect_find_by_payment_intent_id()
            .returning(|_| Box::pin(async { Ok(None) }));
        payments
            .expect_insert_if_absent()
            .returning(|_| Box::pin(async { Ok(None) }));

        let usecase = StripeWebhookUseCase::new(
            Arc::new(payments),
            Arc::new(MockGenerationLogRepository::new()),
            Arc::new(MockPaymentProviderCustomerRepository::new()),
            Arc::new(stripe),
        );

        let outcome = usecase.handle_event(b"{}", "sig").await.unwrap();
        assert_eq!(outcome, WebhookOutcome::AlreadyProcessed);
    }

    #[tokio::test]
    async fn invalid_signature_is_rejected() {
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_verify_webhook_signature()
            .returning(|_, _| Err(anyhow::anyhow!("no matching signature")));

        let usecase = StripeWebhookUseCase::new(
            Arc::new(MockPaymentRepository::new()),
            Arc::new(MockGenerationLogRepository::new()),
            Arc::new(MockPaymentProviderCustomerRepository::new()),
            Arc::new(stripe),
        );

        let err = usecase.handle_event(b"{}", "bad").await.unwrap_err();
        assert!(matches!(err, WebhookError::InvalidSignature));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn other_event_types_are_ignored() {
        let mut stripe = MockStripeGateway::new();
        stripe.expect_verify_webhook_signature().returning(|_, _| {
            Ok(serde_json::from_value(json!({
                "type": "payment_intent.created",
                "data": { "object": {} }
            }))
            .unwrap())
        });

        let usecase = StripeWebhookUseCase::new(
            Arc::new(MockPaymentRepository::new()),
            Arc::new(MockGenerationLogRepository::new()),
            Arc::new(MockPaymentProviderCustomerRepository::new()),
            Arc::new(stripe),
        );

        let outcome = usecase.handle_event(b"{}", "sig").await.unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Ignored {
                event_type: "payment_intent.created".to_string()
            }
        );
    }

    #[tokio::test]
    async fn broken_item_ids_still_record_payment() {
        let user_id = Uuid::new_v4();
        let collection_id = Uuid::new_v4();
        let payment_id = Uuid::new_v4();

        let mut stripe = MockStripeGateway::new();
        stripe.expect_verify_webhook_signature().returning(move |_, _| {
            Ok(completed_event(json!({
                "user_id": user_id.to_string(),
                "collection_id": collection_id.to_string(),
                "item_count": "3",
                "item_ids_chunks": "1",
                "item_ids_0": "[\"a\", \"b"
            })))
        });

        let mut payments = MockPaymentRepository::new();
        payments
            .expect_find_by_payment_intent_id()
            .returning(|_| Box::pin(async { Ok(None) }));
        payments
            .expect_insert_if_absent()
            .withf(|payment| payment.item_ids.is_empty() && payment.generation_logs_count == 0)
            .times(1)
            .returning(move |_| Box::pin(async move { Ok(Some(payment_id)) }));

        let mut logs = MockGenerationLogRepository::new();
        logs.expect_insert_pending_logs().never();

        let mut customers = MockPaymentProviderCustomerRepository::new();
        customers
            .expect_upsert_customer_ref()
            .returning(|_, _, _| Box::pin(async { Err(anyhow::anyhow!("db down")) }));

        let usecase = StripeWebhookUseCase::new(
            Arc::new(payments),
            Arc::new(logs),
            Arc::new(customers),
            Arc::new(stripe),
        );

        let outcome = usecase.handle_event(b"{}", "sig").await.unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Recorded {
                payment_id,
                logs_seeded: 0
            }
        );
    }

    #[tokio::test]
    async fn missing_user_id_is_invalid_metadata() {
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_verify_webhook_signature()
            .returning(|_, _| Ok(completed_event(json!({ "item_count": "1" }))));

        let mut payments = MockPaymentRepository::new();
        payments
            .expect_find_by_payment_intent_id()
            .returning(|_| Box::pin(async { Ok(None) }));
        payments.expect_insert_if_absent().never();

        let usecase = StripeWebhookUseCase::new(
            Arc::new(payments),
            Arc::new(MockGenerationLogRepository::new()),
            Arc::new(MockPaymentProviderCustomerRepository::new()),
            Arc::new(stripe),
        );

        let err = usecase.handle_event(b"{}", "sig").await.unwrap_err();
        assert!(matches!(err, WebhookError::InvalidMetadata(_)));
    }
}
