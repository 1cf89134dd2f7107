use regenflow_core::domain::{
    entities::collections::CollectionViewEntity, repositories::collections::CollectionRepository,
};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CollectionAccessError {
    #[error("collection not found")]
    NotFound,
    #[error("collection belongs to another user")]
    Forbidden,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Loads the collection view and checks that `user_id` owns it.
pub async fn load_owned_collection<C>(
    collection_repo: &C,
    user_id: Uuid,
    collection_id: Uuid,
) -> Result<CollectionViewEntity, CollectionAccessError>
where
    C: CollectionRepository + Send + Sync,
{
    let collection = collection_repo
        .find_collection_view(collection_id)
        .await
        .map_err(|err| {
            error!(
                %user_id,
                %collection_id,
                db_error = ?err,
                "collections: failed to load collection view"
            );
            CollectionAccessError::Internal(err)
        })?
        .ok_or_else(|| {
            warn!(%user_id, %collection_id, "collections: collection not found");
            CollectionAccessError::NotFound
        })?;

    if !collection.is_owned_by(user_id) {
        warn!(
            %user_id,
            %collection_id,
            owner_id = %collection.user_id,
            "collections: access denied"
        );
        return Err(CollectionAccessError::Forbidden);
    }

    Ok(collection)
}


#[cfg(test)]
mod tests {
    use super::*;
    use regenflow_core::domain::repositories::collections::MockCollectionRepository;
    use mockall::predicate::eq;

    #[tokio::test]
    async fn owner_gets_the_collection() {
        let user_id = Uuid::new_v4();
        let collection = test_support::sample_collection(user_id);
        let collection_id = collection.id;

        let mut repo = MockCollectionRepository::new();
        repo.expect_find_collection_view()
            .with(eq(collection_id))
            .returning(move |_| {
                let collection = collection.clone();
                Box::pin(async move { Ok(Some(collection)) })
            });

        let loaded = load_owned_collection(&repo, user_id, collection_id).await.unwrap();
        assert_eq!(loaded.id, collection_id);
    }

    #[tokio::test]
    async fn unknown_collection_is_not_found() {
        let mut repo = MockCollectionRepository::new();
        repo.expect_find_collection_view()
            .returning(|_| Box::pin(async { Ok(None) }));

        let err = load_owned_collection(&repo, Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, CollectionAccessError::NotFound));
    }

    #[tokio::test]
    async fn other_users_collection_is_forbidden() {
        let collection = test_support::sample_collection(Uuid::new_v4());
        let collection_id = collection.id;

        let mut repo = MockCollectionRepository::new();
        repo.expect_find_collection_view().returning(move |_| {
            let collection = collection.clone();
            Box::pin(async move { Ok(Some(collection)) })
        });

        let err = load_owned_collection(&repo, Uuid::new_v4(), collection_id)
            .await
            .unwrap_err();
        assert!(matches!(err, CollectionAccessError::Forbidden));
    }
}
