use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::value_objects::enums::credential_providers::CredentialProvider;

#[async_trait]
#[automock]
pub trait CredentialRepository {
    /// Plain-text token stored for the collection and provider, if any. Webflow tokens
    /// come from the integration the collection's site belongs to.
    async fn get_decrypted_credential(
        &self,
        collection_id: Uuid,
        provider: CredentialProvider,
    ) -> Result<Option<String>>;
}
