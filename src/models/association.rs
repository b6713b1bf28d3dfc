// src/models/association.rs
// DOCUMENTATION: Join rows between images and users/categories
// PURPOSE: ImageCategory, Like and SavedImage share one storage shape (Link)

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// The three kinds of join rows hanging off an image
/// DOCUMENTATION: Each kind links an image to a "peer": a category for
/// ImageCategory, a user for Like and SavedImage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum LinkKind {
    ImageCategory,
    Like,
    SavedImage,
}

impl LinkKind {
    pub const ALL: [LinkKind; 3] = [LinkKind::ImageCategory, LinkKind::Like, LinkKind::SavedImage];

    /// Backing table name
    pub fn table(&self) -> &'static str {
        match self {
            LinkKind::ImageCategory => "image_categories",
            LinkKind::Like => "likes",
            LinkKind::SavedImage => "saved_images",
        }
    }

    /// Column holding the peer id
    pub fn peer_column(&self) -> &'static str {
        match self {
            LinkKind::ImageCategory => "category_id",
            LinkKind::Like | LinkKind::SavedImage => "user_id",
        }
    }

    /// Whether the peer side is a user (false means category)
    pub fn peer_is_user(&self) -> bool {
        !matches!(self, LinkKind::ImageCategory)
    }

    /// Field name of the peer as clients see it
    pub fn peer_label(&self) -> &'static str {
        if self.peer_is_user() {
            "UserId"
        } else {
            "CategoryId"
        }
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkKind::ImageCategory => "image category",
            LinkKind::Like => "like",
            LinkKind::SavedImage => "saved image",
        };
        f.write_str(name)
    }
}

/// Storage shape shared by all join rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct Link {
    pub id: i32,
    pub image_id: i32,
    pub peer_id: i32,
}

/// Image tagged with a category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageCategory {
    pub id: i32,
    pub image_id: i32,
    pub category_id: i32,
}

/// User liking an image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    pub id: i32,
    pub user_id: i32,
    pub image_id: i32,
}

/// User bookmarking an image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedImage {
    pub id: i32,
    pub user_id: i32,
    pub image_id: i32,
}

impl From<Link> for ImageCategory {
    fn from(link: Link) -> Self {
        ImageCategory {
            id: link.id,
            image_id: link.image_id,
            category_id: link.peer_id,
        }
    }
}

impl From<Link> for Like {
    fn from(link: Link) -> Self {
        Like {
            id: link.id,
            user_id: link.peer_id,
            image_id: link.image_id,
        }
    }
}

impl From<Link> for SavedImage {
    fn from(link: Link) -> Self {
        SavedImage {
            id: link.id,
            user_id: link.peer_id,
            image_id: link.image_id,
        }
    }
}

/// Body of POST/PUT /api/imagecategories
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageCategoryRequest {
    #[serde(default)]
    pub id: Option<i32>,
    pub image_id: i32,
    pub category_id: i32,
}

/// Body of POST/PUT /api/likes and /api/savedimages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserImageRequest {
    #[serde(default)]
    pub id: Option<i32>,
    pub user_id: i32,
    pub image_id: i32,
}

/// Request endpoints normalised to (body id, image id, peer id)
pub trait LinkRequest {
    fn endpoints(&self) -> (Option<i32>, i32, i32);
}

impl LinkRequest for ImageCategoryRequest {
    fn endpoints(&self) -> (Option<i32>, i32, i32) {
        (self.id, self.image_id, self.category_id)
    }
}

impl LinkRequest for UserImageRequest {
    fn endpoints(&self) -> (Option<i32>, i32, i32) {
        (self.id, self.image_id, self.user_id)
    }
}
