pub mod billing;
pub mod checkout;
pub mod collection_access;
pub mod credentials;
pub mod generation;
pub mod publish;
pub mod stripe_gateway;
pub mod stripe_webhook;
