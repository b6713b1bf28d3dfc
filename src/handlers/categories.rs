// src/handlers/categories.rs
// DOCUMENTATION: HTTP handlers for category operations

use crate::db::EntityStore;
use crate::errors::ImageServiceError;
use crate::models::CategoryRequest;
use crate::services::CategoryService;
use actix_web::{web, HttpResponse, Responder};
use validator::Validate;

/// GET /api/categories
pub async fn list_categories(
    store: web::Data<dyn EntityStore>,
) -> Result<impl Responder, ImageServiceError> {
    let categories = CategoryService::list_categories(store.get_ref()).await?;
    Ok(HttpResponse::Ok().json(categories))
}

/// POST /api/categories
pub async fn create_category(
    store: web::Data<dyn EntityStore>,
    req: web::Json<CategoryRequest>,
) -> Result<impl Responder, ImageServiceError> {
    if let Err(e) = req.validate() {
        return Err(ImageServiceError::ValidationError(e.to_string()));
    }

    let category = CategoryService::create_category(store.get_ref(), req.into_inner()).await?;
    Ok(HttpResponse::Created().json(category))
}

/// GET /api/categories/{id}
pub async fn get_category(
    store: web::Data<dyn EntityStore>,
    path: web::Path<i32>,
) -> Result<impl Responder, ImageServiceError> {
    let category = CategoryService::get_category(store.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(category))
}

/// PUT /api/categories/{id}
pub async fn update_category(
    store: web::Data<dyn EntityStore>,
    path: web::Path<i32>,
    req: web::Json<CategoryRequest>,
) -> Result<impl Responder, ImageServiceError> {
    if let Err(e) = req.validate() {
        return Err(ImageServiceError::ValidationError(e.to_string()));
    }

    let category =
        CategoryService::update_category(store.get_ref(), path.into_inner(), req.into_inner())
            .await?;
    Ok(HttpResponse::Ok().json(category))
}

/// DELETE /api/categories/{id}
pub async fn delete_category(
    store: web::Data<dyn EntityStore>,
    path: web::Path<i32>,
) -> Result<impl Responder, ImageServiceError> {
    CategoryService::delete_category(store.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/categories")
            .route("", web::get().to(list_categories))
            .route("", web::post().to(create_category))
            .route("/{id}", web::get().to(get_category))
            .route("/{id}", web::put().to(update_category))
            .route("/{id}", web::delete().to(delete_category)),
    );
}
