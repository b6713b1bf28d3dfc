// src/services/user_service.rs
// DOCUMENTATION: Business logic for users
// PURPOSE: Plain CRUD over the store; deletes go through the integrity manager

use crate::db::{EntityKey, EntityStore, StoreError};
use crate::errors::ImageServiceError;
use crate::models::{User, UserRequest};
use crate::services::blob_store::BlobStore;
use crate::services::integrity::GraphIntegrity;

pub struct UserService;

impl UserService {
    /// Create a new user
    pub async fn create_user(
        store: &dyn EntityStore,
        req: UserRequest,
    ) -> Result<User, ImageServiceError> {
        let mut session = store.begin().await?;
        let user = session
            .insert_user(&req.name, req.description.as_deref())
            .await?;
        session.commit().await?;

        log::info!("Created user {}", user.id);
        Ok(user)
    }

    pub async fn list_users(store: &dyn EntityStore) -> Result<Vec<User>, ImageServiceError> {
        let mut session = store.begin().await?;
        Ok(session.list_users().await?)
    }

    pub async fn get_user(store: &dyn EntityStore, id: i32) -> Result<User, ImageServiceError> {
        let mut session = store.begin().await?;
        session
            .get_user(id)
            .await?
            .ok_or_else(|| ImageServiceError::NotFound(EntityKey::User(id).to_string()))
    }

    /// Update name and description
    /// DOCUMENTATION: A body id that differs from the path id is rejected
    /// before the store is touched
    pub async fn update_user(
        store: &dyn EntityStore,
        id: i32,
        req: UserRequest,
    ) -> Result<User, ImageServiceError> {
        if req.id.map_or(false, |body_id| body_id != id) {
            return Err(ImageServiceError::InvalidInput(
                "Id in body does not match id in path".to_string(),
            ));
        }

        let key = EntityKey::User(id);
        let mut session = store.begin().await?;
        let mut user = session
            .get_user(id)
            .await?
            .ok_or_else(|| ImageServiceError::NotFound(key.to_string()))?;

        user.name = req.name;
        user.description = req.description;

        let result = async {
            let updated = session.update_user(&user).await?;
            session.commit().await?;
            Ok::<_, StoreError>(updated)
        }
        .await;
        drop(session);

        match result {
            Ok(updated) => Ok(updated),
            Err(err) => Err(GraphIntegrity::classify_commit_failure(store, key, err).await),
        }
    }

    /// Delete a user with every image it owns
    pub async fn delete_user(
        store: &dyn EntityStore,
        blobs: &dyn BlobStore,
        id: i32,
    ) -> Result<(), ImageServiceError> {
        GraphIntegrity::delete_user(store, blobs, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn request(id: Option<i32>, name: &str) -> UserRequest {
        UserRequest {
            id,
            name: name.to_string(),
            description: Some("likes sunsets".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let store = MemoryStore::new();

        let created = UserService::create_user(&store, request(None, "alice"))
            .await
            .unwrap();
        let fetched = UserService::get_user(&store, created.id).await.unwrap();

        assert_eq!(fetched, created);
        assert_eq!(UserService::list_users(&store).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_user() {
        let store = MemoryStore::new();

        assert_eq!(
            UserService::get_user(&store, 3).await,
            Err(ImageServiceError::NotFound("user 3".to_string()))
        );
    }

    #[tokio::test]
    async fn test_update_user_bumps_version() {
        let store = MemoryStore::new();
        let created = UserService::create_user(&store, request(None, "alice"))
            .await
            .unwrap();

        let updated = UserService::update_user(&store, created.id, request(Some(created.id), "bob"))
            .await
            .unwrap();

        assert_eq!(updated.name, "bob");
        assert_eq!(updated.version, created.version + 1);
    }

    #[tokio::test]
    async fn test_update_user_id_mismatch() {
        let store = MemoryStore::new();
        let created = UserService::create_user(&store, request(None, "alice"))
            .await
            .unwrap();

        let result = UserService::update_user(&store, created.id, request(Some(99), "bob")).await;

        assert!(matches!(result, Err(ImageServiceError::InvalidInput(_))));
        assert_eq!(
            UserService::get_user(&store, created.id).await.unwrap().name,
            "alice"
        );
    }

    #[tokio::test]
    async fn test_update_user_removed_concurrently() {
        let store = MemoryStore::new();
        let created = UserService::create_user(&store, request(None, "alice"))
            .await
            .unwrap();

        let id = created.id;
        store.before_next_commit(move |state| {
            state.users.remove(&id);
        });

        assert!(matches!(
            UserService::update_user(&store, id, request(None, "bob")).await,
            Err(ImageServiceError::NotFound(_))
        ));
    }
}
