// src/handlers/images.rs
// DOCUMENTATION: HTTP handlers for image operations
// PURPOSE: Multipart uploads, image detail, raw image data and category
// replacement

use crate::config::Config;
use crate::db::EntityStore;
use crate::errors::ImageServiceError;
use crate::handlers::upload::read_image_form;
use crate::models::ReplaceCategoriesRequest;
use crate::services::{BlobStore, ImageService};
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Responder};

/// GET /api/images
pub async fn list_images(
    store: web::Data<dyn EntityStore>,
) -> Result<impl Responder, ImageServiceError> {
    let images = ImageService::list_images(store.get_ref()).await?;
    Ok(HttpResponse::Ok().json(images))
}

/// POST /api/images
/// Upload a new image (multipart/form-data)
pub async fn create_image(
    store: web::Data<dyn EntityStore>,
    blobs: web::Data<dyn BlobStore>,
    config: web::Data<Config>,
    payload: Multipart,
) -> Result<impl Responder, ImageServiceError> {
    let form = read_image_form(payload, config.max_upload_bytes).await?;
    let image = ImageService::create_image(store.get_ref(), blobs.get_ref(), form).await?;
    Ok(HttpResponse::Created().json(image))
}

/// GET /api/images/{id}
/// Image with owner, likes, saved images and category rows
pub async fn get_image(
    store: web::Data<dyn EntityStore>,
    path: web::Path<i32>,
) -> Result<impl Responder, ImageServiceError> {
    let detail = ImageService::get_image_detail(store.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(detail))
}

/// GET /api/images/{id}/data
pub async fn get_image_data(
    store: web::Data<dyn EntityStore>,
    blobs: web::Data<dyn BlobStore>,
    path: web::Path<i32>,
) -> Result<impl Responder, ImageServiceError> {
    let data =
        ImageService::get_image_data(store.get_ref(), blobs.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok()
        .content_type(data.content_type)
        .body(data.bytes))
}

/// PUT /api/images/{id}
/// Update description/owner, optionally replace the file, replace categories
pub async fn update_image(
    store: web::Data<dyn EntityStore>,
    blobs: web::Data<dyn BlobStore>,
    config: web::Data<Config>,
    path: web::Path<i32>,
    payload: Multipart,
) -> Result<impl Responder, ImageServiceError> {
    let form = read_image_form(payload, config.max_upload_bytes).await?;
    let image =
        ImageService::update_image(store.get_ref(), blobs.get_ref(), path.into_inner(), form)
            .await?;
    Ok(HttpResponse::Ok().json(image))
}

/// PUT /api/images/{id}/categories
pub async fn replace_categories(
    store: web::Data<dyn EntityStore>,
    path: web::Path<i32>,
    req: web::Json<ReplaceCategoriesRequest>,
) -> Result<impl Responder, ImageServiceError> {
    let rows =
        ImageService::replace_categories(store.get_ref(), path.into_inner(), &req.category_ids)
            .await?;
    Ok(HttpResponse::Ok().json(rows))
}

/// DELETE /api/images/{id}
pub async fn delete_image(
    store: web::Data<dyn EntityStore>,
    blobs: web::Data<dyn BlobStore>,
    path: web::Path<i32>,
) -> Result<impl Responder, ImageServiceError> {
    ImageService::delete_image(store.get_ref(), blobs.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Configuration for image routes
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/images")
            .route("", web::get().to(list_images))
            .route("", web::post().to(create_image))
            .route("/{id}", web::get().to(get_image))
            .route("/{id}", web::put().to(update_image))
            .route("/{id}", web::delete().to(delete_image))
            .route("/{id}/data", web::get().to(get_image_data))
            .route("/{id}/categories", web::put().to(replace_categories)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::{multipart_body, Part, TestState};
    use actix_web::{http::header, http::StatusCode, test, App};
    use serde_json::json;

    async fn seed_user(state: &TestState) -> i32 {
        let mut session = state.store.begin().await.unwrap();
        let user = session.insert_user("alice", None).await.unwrap();
        session.commit().await.unwrap();
        user.id
    }

    fn upload(uri: &str, parts: &[Part<'_>]) -> test::TestRequest {
        let (content_type, body) = multipart_body(parts);
        test::TestRequest::post()
            .uri(uri)
            .insert_header((header::CONTENT_TYPE, content_type))
            .set_payload(body)
    }

    #[actix_rt::test]
    async fn test_upload_then_fetch_data_and_detail() {
        let state = TestState::new().await;
        let user = seed_user(&state).await;
        let app = test::init_service(state.apply(App::new()).configure(config)).await;

        let user_field = user.to_string();
        let req = upload(
            "/images",
            &[
                Part::file("file", "cat.png", "image/png", b"PNGDATA"),
                Part::text("description", "a cat"),
                Part::text("userId", &user_field),
            ],
        )
        .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: serde_json::Value = test::read_body_json(resp).await;
        let id = created["id"].as_i64().unwrap();
        assert_eq!(created["description"], "a cat");

        let req = test::TestRequest::get()
            .uri(&format!("/images/{}/data", id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "image/png"
        );
        assert_eq!(&test::read_body(resp).await[..], b"PNGDATA");

        let req = test::TestRequest::get()
            .uri(&format!("/images/{}", id))
            .to_request();
        let detail: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(detail["user"]["name"], "alice");
        assert_eq!(detail["likes"], json!([]));
    }

    #[actix_rt::test]
    async fn test_upload_rejects_non_image() {
        let state = TestState::new().await;
        let user = seed_user(&state).await;
        let app = test::init_service(state.apply(App::new()).configure(config)).await;

        let user_field = user.to_string();
        let req = upload(
            "/images",
            &[
                Part::file("file", "notes.txt", "text/plain", b"hello"),
                Part::text("userId", &user_field),
            ],
        )
        .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "INVALID_INPUT");
    }

    #[actix_rt::test]
    async fn test_upload_over_limit() {
        let state = TestState::new().await;
        let user = seed_user(&state).await;
        let app = test::init_service(state.apply(App::new()).configure(config)).await;

        let big = vec![0u8; state.max_upload_bytes() + 1];
        let user_field = user.to_string();
        let req = upload(
            "/images",
            &[
                Part::text("userId", &user_field),
                Part::file("file", "big.png", "image/png", &big),
            ],
        )
        .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(state.store.snapshot().await.images.is_empty());
    }

    #[actix_rt::test]
    async fn test_upload_for_unknown_user() {
        let state = TestState::new().await;
        let app = test::init_service(state.apply(App::new()).configure(config)).await;

        let req = upload(
            "/images",
            &[
                Part::file("file", "cat.png", "image/png", b"PNGDATA"),
                Part::text("userId", "999"),
            ],
        )
        .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "INVALID_REFERENCE");
    }

    #[actix_rt::test]
    async fn test_replace_categories_and_delete() {
        let state = TestState::new().await;
        let user = seed_user(&state).await;
        let (c1, c2) = {
            let mut session = state.store.begin().await.unwrap();
            let c1 = session.insert_category("one", None).await.unwrap();
            let c2 = session.insert_category("two", None).await.unwrap();
            session.commit().await.unwrap();
            (c1.id, c2.id)
        };
        let app = test::init_service(state.apply(App::new()).configure(config)).await;

        let user_field = user.to_string();
        let categories_field = format!("{},{}", c1, c2);
        let req = upload(
            "/images",
            &[
                Part::file("file", "cat.jpg", "image/jpeg", b"JPEG"),
                Part::text("userId", &user_field),
                Part::text("categoryIds", &categories_field),
            ],
        )
        .to_request();
        let created: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let id = created["id"].as_i64().unwrap();

        let req = test::TestRequest::put()
            .uri(&format!("/images/{}/categories", id))
            .set_json(json!({"categoryIds": [c2, 999]}))
            .to_request();
        let rows: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(rows.as_array().map(Vec::len), Some(1));
        assert_eq!(rows[0]["categoryId"], c2);

        let req = test::TestRequest::delete()
            .uri(&format!("/images/{}", id))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

        let req = test::TestRequest::get()
            .uri(&format!("/images/{}", id))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
        assert_eq!(state.stored_files(), 0);
    }
}
