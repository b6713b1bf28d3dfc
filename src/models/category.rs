// src/models/category.rs
// DOCUMENTATION: Category records and request DTOs
// PURPOSE: Labels images are tagged with through image_categories

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Category that images can be tagged with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    #[serde(skip)]
    pub version: i32,
}

/// Request to create or update a category
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRequest {
    #[serde(default)]
    pub id: Option<i32>,

    #[validate(length(min = 1, max = 100, message = "name must not be empty"))]
    pub name: String,

    #[validate(length(max = 1000))]
    #[serde(default)]
    pub description: Option<String>,
}
