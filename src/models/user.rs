// src/models/user.rs
// DOCUMENTATION: User account records and request DTOs
// PURPOSE: Owners of images, likes and saved images

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents a user row from the database
/// DOCUMENTATION: Maps directly to the users table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Auto-assigned identifier
    pub id: i32,

    /// Display name (required)
    pub name: String,

    /// Optional free-form profile text
    pub description: Option<String>,

    /// Optimistic concurrency token, bumped on every update
    #[serde(skip)]
    pub version: i32,
}

/// Request DTO for POST /api/users and PUT /api/users/{id}
/// DOCUMENTATION: `id` is optional on create; on update it must match the path id when present
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    #[serde(default)]
    pub id: Option<i32>,

    #[validate(length(min = 1, max = 100, message = "name must be between 1 and 100 characters"))]
    pub name: String,

    #[validate(length(max = 1000))]
    #[serde(default)]
    pub description: Option<String>,
}
