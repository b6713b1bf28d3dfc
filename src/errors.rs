// src/errors.rs
// DOCUMENTATION: Custom error types and HTTP responses
// PURPOSE: Centralized error handling for entire application

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use thiserror::Error;

use crate::db::StoreError;
use crate::services::BlobError;

/// Application-specific error types
/// DOCUMENTATION: Every operation ends in exactly one of these outcomes.
/// `DatabaseError` and `StorageError` are the fatal class: unexpected
/// backend failures surfaced unchanged.
#[derive(Error, Debug, PartialEq)]
pub enum ImageServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl ImageServiceError {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ImageServiceError::DatabaseError(_) | ImageServiceError::StorageError(_)
        )
    }
}

/// Store failures outside the integrity manager's classification
/// DOCUMENTATION: Reads and simple writes use this; the integrity manager
/// classifies commit failures itself before they reach here
impl From<StoreError> for ImageServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConcurrencyConflict => {
                ImageServiceError::Conflict("row was modified concurrently".to_string())
            }
            StoreError::Duplicate(msg) => ImageServiceError::Conflict(msg),
            StoreError::ForeignKey(msg) | StoreError::Backend(msg) => {
                ImageServiceError::DatabaseError(msg)
            }
        }
    }
}

impl From<BlobError> for ImageServiceError {
    fn from(err: BlobError) -> Self {
        ImageServiceError::StorageError(err.to_string())
    }
}

/// Convert ImageServiceError to HTTP response
/// DOCUMENTATION: Maps error types to HTTP status codes and JSON responses
impl ResponseError for ImageServiceError {
    fn error_response(&self) -> HttpResponse {
        let error_code = match self {
            ImageServiceError::NotFound(_) => "NOT_FOUND",
            ImageServiceError::InvalidReference(_) => "INVALID_REFERENCE",
            ImageServiceError::Conflict(_) => "CONFLICT",
            ImageServiceError::InvalidInput(_) => "INVALID_INPUT",
            ImageServiceError::ValidationError(_) => "VALIDATION_ERROR",
            ImageServiceError::DatabaseError(_) => "DATABASE_ERROR",
            ImageServiceError::StorageError(_) => "STORAGE_ERROR",
        };

        if self.is_fatal() {
            log::error!("Request failed: {}", self);
        }

        let body = json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        });

        HttpResponse::build(self.status_code()).json(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ImageServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ImageServiceError::InvalidReference(_) => StatusCode::BAD_REQUEST,
            ImageServiceError::Conflict(_) => StatusCode::CONFLICT,
            ImageServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ImageServiceError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ImageServiceError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ImageServiceError::StorageError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ImageServiceError::NotFound("image 1".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ImageServiceError::InvalidReference("user 9".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ImageServiceError::Conflict("dup".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ImageServiceError::StorageError("disk".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_error_conversion() {
        assert!(matches!(
            ImageServiceError::from(StoreError::Duplicate("likes".into())),
            ImageServiceError::Conflict(_)
        ));
        assert!(ImageServiceError::from(StoreError::Backend("boom".into())).is_fatal());
    }
}
