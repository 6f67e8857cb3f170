//! Bearer-authenticated CRUD over named record collections.
//!
//! Every route resolves a principal first, then passes through the
//! capability gate before touching the record store. Collection names come
//! from a static registry; there is no name-driven code loading.

pub mod storage;
pub use self::storage::{MemoryRecordStore, PgRecordStore, RecordStore};

use crate::api::handlers::auth::{
    acl::{gate, Capability},
    error::AuthError,
    principal::{self, Principal},
    state::AuthState,
    storage::StoreError,
};
use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, instrument};
use uuid::Uuid;

/// Statically known collections. Adding a collection is a code change, kept
/// deliberate so request input never selects what gets loaded.
pub const COLLECTIONS: &[&str] = &["clothes", "food"];

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("unknown collection")]
    UnknownCollection,
    #[error("record must be a JSON object")]
    NotAnObject,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Auth(e) => e.into_response(),
            Self::UnknownCollection => (StatusCode::NOT_FOUND, self.to_string()).into_response(),
            Self::NotAnObject => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()).into_response()
            }
        }
    }
}

fn resolve(collection: &str) -> Result<(), ApiError> {
    if COLLECTIONS.contains(&collection) {
        Ok(())
    } else {
        Err(ApiError::UnknownCollection)
    }
}

async fn authenticate(state: &AuthState, headers: &HeaderMap) -> Result<Principal, AuthError> {
    let token = principal::bearer_token(headers)?;
    principal::authenticate_bearer(state, &token).await
}

fn store_failure(e: StoreError) -> ApiError {
    error!("record store failure: {e}");
    ApiError::Auth(AuthError::Unavailable)
}

#[utoipa::path(
    get,
    path= "/api/v2/{collection}",
    params(("collection" = String, Path, description = "Collection name")),
    responses (
        (status = 200, description = "Every record in the collection"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "Unknown collection"),
    ),
    security(("bearer" = [])),
    tag= "collections"
)]
#[instrument(skip(state, records, headers))]
pub async fn list(
    state: Extension<Arc<AuthState>>,
    records: Extension<Arc<dyn RecordStore>>,
    headers: HeaderMap,
    Path(collection): Path<String>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let who = authenticate(&state, &headers).await?;
    resolve(&collection)?;

    let found = gate(&who, Capability::Read, || async {
        records.list(&collection).await
    })
    .await
    .map_err(ApiError::Auth)?
    .map_err(store_failure)?;

    Ok(Json(found))
}

#[utoipa::path(
    get,
    path= "/api/v2/{collection}/{id}",
    params(
        ("collection" = String, Path, description = "Collection name"),
        ("id" = String, Path, description = "Record id"),
    ),
    responses (
        (status = 200, description = "The record, or null when absent"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "Unknown collection"),
    ),
    security(("bearer" = [])),
    tag= "collections"
)]
#[instrument(skip(state, records, headers))]
pub async fn get_one(
    state: Extension<Arc<AuthState>>,
    records: Extension<Arc<dyn RecordStore>>,
    headers: HeaderMap,
    Path((collection, id)): Path<(String, Uuid)>,
) -> Result<Json<Value>, ApiError> {
    let who = authenticate(&state, &headers).await?;
    resolve(&collection)?;

    let found = gate(&who, Capability::Read, || async {
        records.get(&collection, id).await
    })
    .await
    .map_err(ApiError::Auth)?
    .map_err(store_failure)?;

    Ok(Json(found.unwrap_or(Value::Null)))
}

#[utoipa::path(
    post,
    path= "/api/v2/{collection}",
    params(("collection" = String, Path, description = "Collection name")),
    responses (
        (status = 201, description = "Record created"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Role lacks the create capability"),
        (status = 404, description = "Unknown collection"),
    ),
    security(("bearer" = [])),
    tag= "collections"
)]
#[instrument(skip(state, records, headers, payload))]
pub async fn create(
    state: Extension<Arc<AuthState>>,
    records: Extension<Arc<dyn RecordStore>>,
    headers: HeaderMap,
    Path(collection): Path<String>,
    payload: Option<Json<Value>>,
) -> Result<impl IntoResponse, ApiError> {
    let who = authenticate(&state, &headers).await?;
    resolve(&collection)?;
    let record = require_object(payload)?;

    let created = gate(&who, Capability::Create, || async {
        records.create(&collection, record).await
    })
    .await
    .map_err(ApiError::Auth)?
    .map_err(store_failure)?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    put,
    path= "/api/v2/{collection}/{id}",
    params(
        ("collection" = String, Path, description = "Collection name"),
        ("id" = String, Path, description = "Record id"),
    ),
    responses (
        (status = 200, description = "Updated record, or null when absent"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Role lacks the update capability"),
        (status = 404, description = "Unknown collection"),
    ),
    security(("bearer" = [])),
    tag= "collections"
)]
#[instrument(skip(state, records, headers, payload))]
pub async fn update(
    state: Extension<Arc<AuthState>>,
    records: Extension<Arc<dyn RecordStore>>,
    headers: HeaderMap,
    Path((collection, id)): Path<(String, Uuid)>,
    payload: Option<Json<Value>>,
) -> Result<Json<Value>, ApiError> {
    let who = authenticate(&state, &headers).await?;
    resolve(&collection)?;
    let record = require_object(payload)?;

    let updated = gate(&who, Capability::Update, || async {
        records.update(&collection, id, record).await
    })
    .await
    .map_err(ApiError::Auth)?
    .map_err(store_failure)?;

    Ok(Json(updated.unwrap_or(Value::Null)))
}

#[utoipa::path(
    delete,
    path= "/api/v2/{collection}/{id}",
    params(
        ("collection" = String, Path, description = "Collection name"),
        ("id" = String, Path, description = "Record id"),
    ),
    responses (
        (status = 200, description = "Deleted record, or null when absent"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Role lacks the delete capability"),
        (status = 404, description = "Unknown collection"),
    ),
    security(("bearer" = [])),
    tag= "collections"
)]
#[instrument(skip(state, records, headers))]
pub async fn delete(
    state: Extension<Arc<AuthState>>,
    records: Extension<Arc<dyn RecordStore>>,
    headers: HeaderMap,
    Path((collection, id)): Path<(String, Uuid)>,
) -> Result<Json<Value>, ApiError> {
    let who = authenticate(&state, &headers).await?;
    resolve(&collection)?;

    let deleted = gate(&who, Capability::Delete, || async {
        records.delete(&collection, id).await
    })
    .await
    .map_err(ApiError::Auth)?
    .map_err(store_failure)?;

    Ok(Json(deleted.unwrap_or(Value::Null)))
}

fn require_object(payload: Option<Json<Value>>) -> Result<Value, ApiError> {
    match payload {
        Some(Json(value)) if value.is_object() => Ok(value),
        _ => Err(ApiError::NotAnObject),
    }
}
