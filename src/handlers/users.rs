// src/handlers/users.rs
// DOCUMENTATION: HTTP handlers for user operations
// PURPOSE: Parse requests, call services, return responses

use crate::db::EntityStore;
use crate::errors::ImageServiceError;
use crate::models::UserRequest;
use crate::services::{BlobStore, UserService};
use actix_web::{web, HttpResponse, Responder};
use validator::Validate;

/// GET /api/users
pub async fn list_users(store: web::Data<dyn EntityStore>) -> Result<impl Responder, ImageServiceError> {
    let users = UserService::list_users(store.get_ref()).await?;
    Ok(HttpResponse::Ok().json(users))
}

/// POST /api/users
/// Create a new user
pub async fn create_user(
    store: web::Data<dyn EntityStore>,
    req: web::Json<UserRequest>,
) -> Result<impl Responder, ImageServiceError> {
    if let Err(e) = req.validate() {
        return Err(ImageServiceError::ValidationError(e.to_string()));
    }

    let user = UserService::create_user(store.get_ref(), req.into_inner()).await?;
    Ok(HttpResponse::Created().json(user))
}

/// GET /api/users/{id}
pub async fn get_user(
    store: web::Data<dyn EntityStore>,
    path: web::Path<i32>,
) -> Result<impl Responder, ImageServiceError> {
    let user = UserService::get_user(store.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(user))
}

/// PUT /api/users/{id}
pub async fn update_user(
    store: web::Data<dyn EntityStore>,
    path: web::Path<i32>,
    req: web::Json<UserRequest>,
) -> Result<impl Responder, ImageServiceError> {
    if let Err(e) = req.validate() {
        return Err(ImageServiceError::ValidationError(e.to_string()));
    }

    let user = UserService::update_user(store.get_ref(), path.into_inner(), req.into_inner()).await?;
    Ok(HttpResponse::Ok().json(user))
}

/// DELETE /api/users/{id}
/// Removes the user with its images, likes and saved images
pub async fn delete_user(
    store: web::Data<dyn EntityStore>,
    blobs: web::Data<dyn BlobStore>,
    path: web::Path<i32>,
) -> Result<impl Responder, ImageServiceError> {
    UserService::delete_user(store.get_ref(), blobs.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Configuration for user routes
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/users")
            .route("", web::get().to(list_users))
            .route("", web::post().to(create_user))
            .route("/{id}", web::get().to(get_user))
            .route("/{id}", web::put().to(update_user))
            .route("/{id}", web::delete().to(delete_user)),
    );
}
