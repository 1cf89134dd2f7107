use regenflow_core::domain::{
    repositories::credentials::CredentialRepository,
    value_objects::{
        credentials::GenerationCredential, enums::credential_providers::CredentialProvider,
    },
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no {0} connection for this collection")]
    Missing(CredentialProvider),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Token of the integration that owns the collection's site.
pub async fn resolve_content_store_token<Cr>(
    credential_repo: &Cr,
    collection_id: Uuid,
) -> Result<String, CredentialError>
where
    Cr: CredentialRepository + Send + Sync,
{
    let token = credential_repo
        .get_decrypted_credential(collection_id, CredentialProvider::Webflow)
        .await
        .map_err(|err| {
            error!(
                %collection_id,
                db_error = ?err,
                "credentials: failed to load content store token"
            );
            CredentialError::Internal(err)
        })?;

    match token.filter(|token| !token.trim().is_empty()) {
        Some(token) => Ok(token),
        None => {
            warn!(%collection_id, "credentials: content store token missing");
            Err(CredentialError::Missing(CredentialProvider::Webflow))
        }
    }
}

/// Decides once whether generations run on the user's own key or the platform key.
pub async fn resolve_generation_credential<Cr>(
    credential_repo: &Cr,
    collection_id: Uuid,
) -> Result<GenerationCredential, CredentialError>
where
    Cr: CredentialRepository + Send + Sync,
{
    let token = credential_repo
        .get_decrypted_credential(collection_id, CredentialProvider::OpenAi)
        .await
        .map_err(|err| {
            error!(
                %collection_id,
                db_error = ?err,
                "credentials: failed to load generation credential"
            );
            CredentialError::Internal(err)
        })?;

    let credential = GenerationCredential::classify(CredentialProvider::OpenAi, token);
    info!(
        %collection_id,
        owned = credential.is_owned(),
        "credentials: generation credential resolved"
    );
    Ok(credential)
}
