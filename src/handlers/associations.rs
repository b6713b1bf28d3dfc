// src/handlers/associations.rs
// DOCUMENTATION: HTTP handlers for image categories, likes and saved images
// PURPOSE: The three join-row resources share one set of generic handlers,
// instantiated per resource type

use crate::db::EntityStore;
use crate::errors::ImageServiceError;
use crate::models::{
    ImageCategory, ImageCategoryRequest, Like, Link, LinkKind, LinkRequest, SavedImage,
    UserImageRequest,
};
use crate::services::AssociationService;
use actix_web::{web, HttpResponse, Responder};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A join-row resource exposed over HTTP
pub trait LinkResource: From<Link> + Serialize + 'static {
    const KIND: LinkKind;
    const PATH: &'static str;
    type Request: LinkRequest + DeserializeOwned + 'static;
}

impl LinkResource for ImageCategory {
    const KIND: LinkKind = LinkKind::ImageCategory;
    const PATH: &'static str = "/imagecategories";
    type Request = ImageCategoryRequest;
}

impl LinkResource for Like {
    const KIND: LinkKind = LinkKind::Like;
    const PATH: &'static str = "/likes";
    type Request = UserImageRequest;
}

impl LinkResource for SavedImage {
    const KIND: LinkKind = LinkKind::SavedImage;
    const PATH: &'static str = "/savedimages";
    type Request = UserImageRequest;
}

pub async fn list<R: LinkResource>(
    store: web::Data<dyn EntityStore>,
) -> Result<impl Responder, ImageServiceError> {
    let rows: Vec<R> = AssociationService::list(store.get_ref(), R::KIND)
        .await?
        .into_iter()
        .map(R::from)
        .collect();
    Ok(HttpResponse::Ok().json(rows))
}

pub async fn get<R: LinkResource>(
    store: web::Data<dyn EntityStore>,
    path: web::Path<i32>,
) -> Result<impl Responder, ImageServiceError> {
    let link = AssociationService::get(store.get_ref(), R::KIND, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(R::from(link)))
}

/// POST: both endpoints must exist; an existing pair is a conflict
pub async fn create<R: LinkResource>(
    store: web::Data<dyn EntityStore>,
    req: web::Json<R::Request>,
) -> Result<impl Responder, ImageServiceError> {
    let link = AssociationService::create(store.get_ref(), R::KIND, &req.into_inner()).await?;
    Ok(HttpResponse::Created().json(R::from(link)))
}

pub async fn update<R: LinkResource>(
    store: web::Data<dyn EntityStore>,
    path: web::Path<i32>,
    req: web::Json<R::Request>,
) -> Result<impl Responder, ImageServiceError> {
    let link = AssociationService::update(
        store.get_ref(),
        R::KIND,
        path.into_inner(),
        &req.into_inner(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(R::from(link)))
}

pub async fn delete<R: LinkResource>(
    store: web::Data<dyn EntityStore>,
    path: web::Path<i32>,
) -> Result<impl Responder, ImageServiceError> {
    AssociationService::delete(store.get_ref(), R::KIND, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

fn resource<R: LinkResource>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope(R::PATH)
            .route("", web::get().to(list::<R>))
            .route("", web::post().to(create::<R>))
            .route("/{id}", web::get().to(get::<R>))
            .route("/{id}", web::put().to(update::<R>))
            .route("/{id}", web::delete().to(delete::<R>)),
    );
}

/// Configuration for /imagecategories, /likes and /savedimages
pub fn config(cfg: &mut web::ServiceConfig) {
    resource::<ImageCategory>(cfg);
    resource::<Like>(cfg);
    resource::<SavedImage>(cfg);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::TestState;
    use crate::models::NewImage;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::json;

    async fn seed(state: &TestState) -> (i32, i32) {
        let mut session = state.store.begin().await.unwrap();
        let user = session.insert_user("alice", None).await.unwrap();
        let image = session
            .insert_image(&NewImage {
                description: None,
                user_id: user.id,
                file_path: "cat.png".to_string(),
            })
            .await
            .unwrap();
        session.commit().await.unwrap();
        (user.id, image.id)
    }

    #[actix_rt::test]
    async fn test_like_lifecycle() {
        let state = TestState::new().await;
        let (user, image) = seed(&state).await;
        let app = test::init_service(state.apply(App::new()).configure(config)).await;

        let req = test::TestRequest::post()
            .uri("/likes")
            .set_json(json!({"userId": user, "imageId": image}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let like: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(like["userId"], user);

        let req = test::TestRequest::post()
            .uri("/likes")
            .set_json(json!({"userId": user, "imageId": image}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::get().uri("/likes").to_request();
        let all: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(all.as_array().map(Vec::len), Some(1));

        let req = test::TestRequest::delete()
            .uri(&format!("/likes/{}", like["id"]))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);
    }

    #[actix_rt::test]
    async fn test_saved_image_with_unknown_user() {
        let state = TestState::new().await;
        let (_, image) = seed(&state).await;
        let app = test::init_service(state.apply(App::new()).configure(config)).await;

        let req = test::TestRequest::post()
            .uri("/savedimages")
            .set_json(json!({"userId": 999, "imageId": image}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["message"], "Invalid reference: Invalid ImageId or UserId");
    }

    #[actix_rt::test]
    async fn test_image_category_missing_row() {
        let state = TestState::new().await;
        let app = test::init_service(state.apply(App::new()).configure(config)).await;

        let req = test::TestRequest::get().uri("/imagecategories/5").to_request();

        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
