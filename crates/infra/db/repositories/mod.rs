pub mod collections;
pub mod credentials;
pub mod generation_logs;
pub mod payment_provider_customers;
pub mod payments;
pub mod publications;
pub mod user_allowances;
