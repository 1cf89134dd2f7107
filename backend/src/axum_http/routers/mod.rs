pub mod billing;
pub mod generations;
pub mod publications;
pub mod stripe_webhook;
