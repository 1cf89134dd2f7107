pub mod credential_providers;
pub mod field_kinds;
pub mod generation_statuses;
pub mod payment_statuses;
pub mod publication_statuses;
