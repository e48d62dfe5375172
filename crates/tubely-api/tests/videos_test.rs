//! Video record and service endpoint integration tests.

mod helpers;

use axum::http::StatusCode;
use helpers::setup_test_app;
use serde_json::{json, Value};
use tubely_core::models::Video;
use uuid::Uuid;

#[tokio::test]
async fn test_health() {
    let app = setup_test_app().await;

    let response = app.client().get("/health").await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_openapi_document_served() {
    let app = setup_test_app().await;

    let response = app.client().get("/api/openapi.json").await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert!(body["paths"]["/api/video_upload/{video_id}"].is_object());
}

#[tokio::test]
async fn test_create_video_draft() {
    let app = setup_test_app().await;
    let owner = Uuid::new_v4();

    let response = app
        .client()
        .post("/api/videos")
        .authorization_bearer(app.token_for(owner))
        .json(&json!({ "title": "Boots", "description": "A fine pair" }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let video: Video = response.json();
    assert_eq!(video.owner_id, owner);
    assert_eq!(video.title, "Boots");
    assert!(video.thumbnail_url.is_none());
    assert!(video.video_url.is_none());
    assert_eq!(app.record(video.id), video);
}

#[tokio::test]
async fn test_create_video_validation() {
    let app = setup_test_app().await;
    let token = app.token_for(Uuid::new_v4());

    let response = app
        .client()
        .post("/api/videos")
        .authorization_bearer(token.clone())
        .json(&json!({ "title": "   " }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = app
        .client()
        .post("/api/videos")
        .authorization_bearer(token)
        .json(&json!({ "description": "no title" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_create_video_requires_auth() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/api/videos")
        .json(&json!({ "title": "Boots" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_get_video_owner_only() {
    let app = setup_test_app().await;
    let owner = Uuid::new_v4();
    let video = app.seed_video(owner);

    let response = app
        .client()
        .get(&format!("/api/videos/{}", video.id))
        .authorization_bearer(app.token_for(owner))
        .await;
    response.assert_status(StatusCode::OK);
    let fetched: Video = response.json();
    assert_eq!(fetched, video);

    let response = app
        .client()
        .get(&format!("/api/videos/{}", video.id))
        .authorization_bearer(app.token_for(Uuid::new_v4()))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let response = app
        .client()
        .get(&format!("/api/videos/{}", Uuid::new_v4()))
        .authorization_bearer(app.token_for(owner))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}
