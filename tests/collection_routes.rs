//! Gated CRUD over named collections, end to end.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use portiere::api::{
    self,
    handlers::{
        auth::{AuthState, MemoryUserStore, TokenCodec},
        collections::MemoryRecordStore,
    },
};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const SECRET: &str = "keyboard cat";

fn app() -> Router {
    let state = Arc::new(AuthState::new(
        Arc::new(MemoryUserStore::new()),
        TokenCodec::new(SecretString::from(SECRET.to_string()), 0),
    ));

    api::router(state, Arc::new(MemoryRecordStore::new()))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

/// Register a user through the API and return their bearer token.
async fn signup(app: &Router, username: &str, role: Option<&str>) -> String {
    let mut body = json!({ "username": username, "password": "password" });
    if let Some(role) = role {
        body["role"] = json!(role);
    }

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/signup")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);

    body_json(response).await["token"]
        .as_str()
        .expect("token")
        .to_string()
}

fn request(method: Method, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"));

    match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request")
}

#[tokio::test]
async fn editor_crud_round_trip() {
    let app = app();
    let editor = signup(&app, "ed", Some("editor")).await;

    // Create
    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/v2/clothes",
            &editor,
            Some(json!({ "name": "shirt", "color": "red" })),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let id = created["id"].as_str().expect("id").to_string();

    // List
    let response = app
        .clone()
        .oneshot(request(Method::GET, "/api/v2/clothes", &editor, None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let listed = body_json(response).await;
    assert_eq!(listed.as_array().map(Vec::len), Some(1));

    // Get one
    let response = app
        .clone()
        .oneshot(request(
            Method::GET,
            &format!("/api/v2/clothes/{id}"),
            &editor,
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["name"], "shirt");

    // Update
    let response = app
        .clone()
        .oneshot(request(
            Method::PUT,
            &format!("/api/v2/clothes/{id}"),
            &editor,
            Some(json!({ "name": "shirt", "color": "blue" })),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["color"], "blue");

    // Editors cannot delete.
    let response = app
        .clone()
        .oneshot(request(
            Method::DELETE,
            &format!("/api/v2/clothes/{id}"),
            &editor,
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Admins can.
    let admin = signup(&app, "root", Some("admin")).await;
    let response = app
        .clone()
        .oneshot(request(
            Method::DELETE,
            &format!("/api/v2/clothes/{id}"),
            &admin,
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(request(Method::GET, "/api/v2/clothes", &admin, None))
        .await
        .expect("response");
    assert_eq!(body_json(response).await, json!([]));
}

#[tokio::test]
async fn default_role_cannot_create_and_leaves_no_record() {
    let app = app();
    let reader = signup(&app, "alice", None).await;

    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/v2/food",
            &reader,
            Some(json!({ "name": "pizza" })),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // The denied operation must not have run.
    let response = app
        .oneshot(request(Method::GET, "/api/v2/food", &reader, None))
        .await
        .expect("response");
    assert_eq!(body_json(response).await, json!([]));
}

#[tokio::test]
async fn reads_require_authentication() {
    let app = app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v2/clothes")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_collections_are_not_found() {
    let app = app();
    let admin = signup(&app, "root", Some("admin")).await;

    let response = app
        .oneshot(request(Method::GET, "/api/v2/widgets", &admin, None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_object_payloads_are_rejected() {
    let app = app();
    let editor = signup(&app, "ed", Some("editor")).await;

    let response = app
        .oneshot(request(
            Method::POST,
            "/api/v2/clothes",
            &editor,
            Some(json!(["not", "an", "object"])),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn missing_record_reads_as_null() {
    let app = app();
    let editor = signup(&app, "ed", Some("editor")).await;

    let response = app
        .oneshot(request(
            Method::GET,
            "/api/v2/clothes/00000000-0000-0000-0000-000000000000",
            &editor,
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, Value::Null);
}
