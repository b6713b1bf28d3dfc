// src/models/image.rs
// DOCUMENTATION: Image records, upload inputs and detail responses
// PURPOSE: Shared shapes between handlers, services and the store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{ImageCategory, Like, SavedImage, User};

/// Represents an uploaded image row
/// DOCUMENTATION: `file_path` is a server-generated name inside the upload
/// directory, never the filename the client sent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    /// Auto-assigned identifier
    pub id: i32,

    /// Optional caption
    pub description: Option<String>,

    /// Owning user (restrict-on-delete)
    pub user_id: i32,

    /// Generated blob name
    pub file_path: String,

    /// When the row was first inserted
    pub uploaded_at: DateTime<Utc>,

    /// Optimistic concurrency token
    #[serde(skip)]
    pub version: i32,
}

/// Values needed to insert a new image row
#[derive(Debug, Clone)]
pub struct NewImage {
    pub description: Option<String>,
    pub user_id: i32,
    pub file_path: String,
}

/// File part of a multipart upload, already read into memory
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Only `image/*` content types are accepted
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Parsed multipart form for POST /api/images and PUT /api/images/{id}
#[derive(Debug, Clone, Default)]
pub struct ImageForm {
    pub file: Option<UploadedFile>,
    pub description: Option<String>,
    pub user_id: Option<i32>,
    pub category_ids: Vec<i32>,
}

/// Validated input for creating or updating an image
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub description: Option<String>,
    pub user_id: i32,
    pub file: Option<UploadedFile>,
    pub category_ids: Vec<i32>,
}

/// Body of PUT /api/images/{id}/categories
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceCategoriesRequest {
    #[serde(default)]
    pub category_ids: Vec<i32>,
}

/// Image DTO with its owner and every dependent row
/// DOCUMENTATION: Returned by GET /api/images/{id}
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDetailResponse {
    #[serde(flatten)]
    pub image: Image,
    pub user: Option<User>,
    pub likes: Vec<Like>,
    pub saved_images: Vec<SavedImage>,
    pub image_categories: Vec<ImageCategory>,
}
