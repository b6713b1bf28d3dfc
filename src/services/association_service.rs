// src/services/association_service.rs
// DOCUMENTATION: Business logic for image categories, likes and saved images
// PURPOSE: One implementation for the three join-row kinds, keyed by LinkKind

use crate::db::{EntityKey, EntityStore};
use crate::errors::ImageServiceError;
use crate::models::{Link, LinkKind, LinkRequest};
use crate::services::integrity::GraphIntegrity;

pub struct AssociationService;

impl AssociationService {
    pub async fn list(
        store: &dyn EntityStore,
        kind: LinkKind,
    ) -> Result<Vec<Link>, ImageServiceError> {
        let mut session = store.begin().await?;
        Ok(session.list_links(kind).await?)
    }

    pub async fn get(
        store: &dyn EntityStore,
        kind: LinkKind,
        id: i32,
    ) -> Result<Link, ImageServiceError> {
        let mut session = store.begin().await?;
        session
            .get_link(kind, id)
            .await?
            .ok_or_else(|| ImageServiceError::NotFound(EntityKey::Link(kind, id).to_string()))
    }

    /// Any body id is ignored on create; rows are always assigned a fresh id
    pub async fn create(
        store: &dyn EntityStore,
        kind: LinkKind,
        req: &impl LinkRequest,
    ) -> Result<Link, ImageServiceError> {
        let (_, image_id, peer_id) = req.endpoints();
        GraphIntegrity::create_association(store, kind, image_id, peer_id).await
    }

    pub async fn update(
        store: &dyn EntityStore,
        kind: LinkKind,
        id: i32,
        req: &impl LinkRequest,
    ) -> Result<Link, ImageServiceError> {
        let (body_id, image_id, peer_id) = req.endpoints();
        if body_id.map_or(false, |body_id| body_id != id) {
            return Err(ImageServiceError::InvalidInput(
                "Id in body does not match id in path".to_string(),
            ));
        }

        GraphIntegrity::update_association(store, kind, id, image_id, peer_id).await
    }

    pub async fn delete(
        store: &dyn EntityStore,
        kind: LinkKind,
        id: i32,
    ) -> Result<(), ImageServiceError> {
        GraphIntegrity::delete_association(store, kind, id).await
    }
}
