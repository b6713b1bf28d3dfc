// src/services/image_service.rs
// DOCUMENTATION: Business logic for images
// PURPOSE: Reads and form handling; every write is delegated to the
// integrity manager

use crate::db::{EntityKey, EntityStore};
use crate::errors::ImageServiceError;
use crate::models::{
    Image, ImageCategory, ImageDetailResponse, ImageForm, ImageInput, LinkKind,
};
use crate::services::blob_store::{content_type_for, BlobStore};
use crate::services::integrity::GraphIntegrity;

/// Raw bytes of a stored image with the content type to serve them as
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

pub struct ImageService;

impl ImageService {
    fn input_from_form(form: ImageForm) -> Result<ImageInput, ImageServiceError> {
        let user_id = form
            .user_id
            .ok_or_else(|| ImageServiceError::InvalidInput("userId is required".to_string()))?;

        Ok(ImageInput {
            description: form.description.filter(|d| !d.trim().is_empty()),
            user_id,
            file: form.file,
            category_ids: form.category_ids,
        })
    }

    pub async fn list_images(store: &dyn EntityStore) -> Result<Vec<Image>, ImageServiceError> {
        let mut session = store.begin().await?;
        Ok(session.list_images().await?)
    }

    /// Image with its owner, likes, saved images and category rows
    pub async fn get_image_detail(
        store: &dyn EntityStore,
        id: i32,
    ) -> Result<ImageDetailResponse, ImageServiceError> {
        let mut session = store.begin().await?;
        let image = session
            .get_image(id)
            .await?
            .ok_or_else(|| ImageServiceError::NotFound(EntityKey::Image(id).to_string()))?;

        let user = session.get_user(image.user_id).await?;
        let likes = session.links_by_image(LinkKind::Like, id).await?;
        let saved_images = session.links_by_image(LinkKind::SavedImage, id).await?;
        let image_categories = session.links_by_image(LinkKind::ImageCategory, id).await?;

        Ok(ImageDetailResponse {
            image,
            user,
            likes: likes.into_iter().map(Into::into).collect(),
            saved_images: saved_images.into_iter().map(Into::into).collect(),
            image_categories: image_categories.into_iter().map(Into::into).collect(),
        })
    }

    /// Stored bytes of an image
    /// DOCUMENTATION: NotFound both for a missing row and for a row whose
    /// file is gone from the blob store
    pub async fn get_image_data(
        store: &dyn EntityStore,
        blobs: &dyn BlobStore,
        id: i32,
    ) -> Result<ImageData, ImageServiceError> {
        let mut session = store.begin().await?;
        let image = session
            .get_image(id)
            .await?
            .ok_or_else(|| ImageServiceError::NotFound(EntityKey::Image(id).to_string()))?;

        match blobs.read(&image.file_path).await? {
            Some(bytes) => Ok(ImageData {
                bytes,
                content_type: content_type_for(&image.file_path),
            }),
            None => {
                log::warn!("Image {} points at missing file {}", id, image.file_path);
                Err(ImageServiceError::NotFound(format!(
                    "file of image {}",
                    id
                )))
            }
        }
    }

    pub async fn create_image(
        store: &dyn EntityStore,
        blobs: &dyn BlobStore,
        form: ImageForm,
    ) -> Result<Image, ImageServiceError> {
        let input = Self::input_from_form(form)?;
        GraphIntegrity::create_image(store, blobs, input).await
    }

    pub async fn update_image(
        store: &dyn EntityStore,
        blobs: &dyn BlobStore,
        id: i32,
        form: ImageForm,
    ) -> Result<Image, ImageServiceError> {
        let input = Self::input_from_form(form)?;
        GraphIntegrity::update_image(store, blobs, id, input).await
    }

    pub async fn delete_image(
        store: &dyn EntityStore,
        blobs: &dyn BlobStore,
        id: i32,
    ) -> Result<(), ImageServiceError> {
        GraphIntegrity::delete_image(store, blobs, id).await
    }

    pub async fn replace_categories(
        store: &dyn EntityStore,
        id: i32,
        category_ids: &[i32],
    ) -> Result<Vec<ImageCategory>, ImageServiceError> {
        let links = GraphIntegrity::replace_image_categories(store, id, category_ids).await?;
        Ok(links.into_iter().map(Into::into).collect())
    }
}
