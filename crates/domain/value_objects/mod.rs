pub mod assets;
pub mod billing;
pub mod checkout_metadata;
pub mod credentials;
pub mod enums;
pub mod generation;
pub mod publications;
pub mod publish_events;
pub mod staged_fields;
