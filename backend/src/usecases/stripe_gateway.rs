use anyhow::Result as AnyResult;
use async_trait::async_trait;
use regenflow_core::payments::stripe_client::{
    CheckoutSessionParams, CreatedCheckoutSession, StripeClient, StripeEvent,
};

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait StripeGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        params: CheckoutSessionParams,
    ) -> AnyResult<CreatedCheckoutSession>;

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent>;
}

#[async_trait]
impl StripeGateway for StripeClient {
    async fn create_checkout_session(
        &self,
        params: CheckoutSessionParams,
    ) -> AnyResult<CreatedCheckoutSession> {
        self.create_checkout_session(params).await
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent> {
        self.verify_webhook_signature(payload, signature)
    }
}
