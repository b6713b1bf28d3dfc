// src/services/category_service.rs
// DOCUMENTATION: Business logic for categories

use crate::db::{EntityKey, EntityStore, StoreError};
use crate::errors::ImageServiceError;
use crate::models::{Category, CategoryRequest};
use crate::services::integrity::GraphIntegrity;

pub struct CategoryService;

impl CategoryService {
    pub async fn create_category(
        store: &dyn EntityStore,
        req: CategoryRequest,
    ) -> Result<Category, ImageServiceError> {
        let mut session = store.begin().await?;
        let category = session
            .insert_category(&req.name, req.description.as_deref())
            .await?;
        session.commit().await?;

        log::info!("Created category {} ({})", category.id, category.name);
        Ok(category)
    }

    pub async fn list_categories(
        store: &dyn EntityStore,
    ) -> Result<Vec<Category>, ImageServiceError> {
        let mut session = store.begin().await?;
        Ok(session.list_categories().await?)
    }

    pub async fn get_category(
        store: &dyn EntityStore,
        id: i32,
    ) -> Result<Category, ImageServiceError> {
        let mut session = store.begin().await?;
        session
            .get_category(id)
            .await?
            .ok_or_else(|| ImageServiceError::NotFound(EntityKey::Category(id).to_string()))
    }

    pub async fn update_category(
        store: &dyn EntityStore,
        id: i32,
        req: CategoryRequest,
    ) -> Result<Category, ImageServiceError> {
        if req.id.map_or(false, |body_id| body_id != id) {
            return Err(ImageServiceError::InvalidInput(
                "Id in body does not match id in path".to_string(),
            ));
        }

        let key = EntityKey::Category(id);
        let mut session = store.begin().await?;
        let mut category = session
            .get_category(id)
            .await?
            .ok_or_else(|| ImageServiceError::NotFound(key.to_string()))?;

        category.name = req.name;
        category.description = req.description;

        let result = async {
            let updated = session.update_category(&category).await?;
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

    /// Detaches the category from every image before removing it
    pub async fn delete_category(
        store: &dyn EntityStore,
        id: i32,
    ) -> Result<(), ImageServiceError> {
        GraphIntegrity::delete_category(store, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use tokio_test::assert_ok;

    fn request(name: &str) -> CategoryRequest {
        CategoryRequest {
            id: None,
            name: name.to_string(),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_category_crud() {
        let store = MemoryStore::new();

        let created = CategoryService::create_category(&store, request("nature"))
            .await
            .unwrap();
        let renamed = CategoryService::update_category(&store, created.id, request("outdoors"))
            .await
            .unwrap();
        assert_eq!(renamed.name, "outdoors");

        assert_ok!(CategoryService::delete_category(&store, created.id).await);
        assert!(matches!(
            CategoryService::get_category(&store, created.id).await,
            Err(ImageServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_category_modified_concurrently() {
        let store = MemoryStore::new();
        let created = CategoryService::create_category(&store, request("nature"))
            .await
            .unwrap();

        let id = created.id;
        store.before_next_commit(move |state| {
            if let Some(row) = state.categories.get_mut(&id) {
                row.version += 1;
            }
        });

        assert!(matches!(
            CategoryService::update_category(&store, id, request("city")).await,
            Err(ImageServiceError::Conflict(_))
        ));
    }
}
