//! Auth core: signup/signin orchestration and the gated admin routes.

pub mod acl;
pub mod error;
pub mod password;
pub mod principal;
pub mod state;
pub mod storage;
pub mod token;
pub mod types;

pub use self::acl::{authorize, gate, Capability, Role};
pub use self::error::AuthError;
pub use self::principal::{authenticate_basic, authenticate_bearer, Principal};
pub use self::state::AuthState;
pub use self::storage::{MemoryUserStore, PgUserStore, StoreError, User, UserStore};
pub use self::token::{Claims, TokenCodec, TokenError};
pub use self::types::{SessionResponse, SignupRequest, UserResponse};

use crate::api::handlers::valid_username;
use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// Register a new user and hand back a fresh session token.
///
/// # Errors
///
/// Missing fields, malformed usernames and every persistence rejection
/// (duplicate username included) surface as [`AuthError::Invalid`].
pub async fn signup(
    state: &AuthState,
    request: SignupRequest,
) -> Result<SessionResponse, AuthError> {
    if !valid_username(&request.username) || request.password.is_empty() {
        return Err(AuthError::Invalid);
    }

    let role = request.role.unwrap_or_default();

    // Hash before persisting; plaintext never reaches the store.
    let plaintext = request.password;
    let password_hash = tokio::task::spawn_blocking(move || password::hash(&plaintext))
        .await
        .map_err(|e| {
            error!("password hashing task failed: {e}");
            AuthError::Unavailable
        })?
        .map_err(|e| {
            error!("password hashing failed: {e}");
            AuthError::Unavailable
        })?;

    let user = User {
        username: request.username,
        password_hash,
        role,
    };

    match state.users.create(&user).await {
        Ok(()) => {}
        Err(StoreError::Duplicate) => {
            debug!(username = %user.username, "duplicate signup");
            return Err(AuthError::Invalid);
        }
        Err(e) => {
            error!("signup persistence failed: {e}");
            return Err(AuthError::Invalid);
        }
    }

    let principal = Principal::from(&user);
    let token = state.codec.sign(&principal.username).map_err(|e| {
        error!("token signing failed: {e}");
        AuthError::Unavailable
    })?;

    Ok(SessionResponse::new(&principal, token))
}

/// Exchange a username/password pair for a principal and a fresh token.
///
/// # Errors
///
/// Propagates [`AuthError::AuthenticationFailed`] from basic authentication.
pub async fn signin(
    state: &AuthState,
    username: &str,
    password: &str,
) -> Result<SessionResponse, AuthError> {
    let principal = authenticate_basic(state, username, password).await?;

    let token = state.codec.sign(&principal.username).map_err(|e| {
        error!("token signing failed: {e}");
        AuthError::Unavailable
    })?;

    Ok(SessionResponse::new(&principal, token))
}

#[utoipa::path(
    post,
    path= "/signup",
    request_body = SignupRequest,
    responses (
        (status = 201, description = "Registration successful", body = [SessionResponse], content_type = "application/json"),
        (status = 422, description = "Malformed input or username already taken"),
    ),
    tag= "auth"
)]
#[instrument(skip(state, payload))]
pub async fn register(
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<SignupRequest>>,
) -> Result<impl IntoResponse, AuthError> {
    let request = match payload {
        Some(Json(payload)) => payload,
        None => return Err(AuthError::Invalid),
    };

    let session = signup(&state, request).await?;

    Ok((StatusCode::CREATED, Json(session)))
}

#[utoipa::path(
    post,
    path= "/signin",
    responses (
        (status = 200, description = "Signin successful", body = [SessionResponse], content_type = "application/json"),
        (status = 401, description = "Unknown user or wrong password"),
    ),
    security(("basic" = [])),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    state: Extension<Arc<AuthState>>,
    headers: axum::http::HeaderMap,
) -> Result<Json<SessionResponse>, AuthError> {
    let (username, password) = principal::basic_credentials(&headers)?;

    let session = signin(&state, &username, &password).await?;

    Ok(Json(session))
}

#[utoipa::path(
    get,
    path= "/users",
    responses (
        (status = 200, description = "Usernames of every registered user", body = [String]),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Role lacks the delete capability"),
    ),
    security(("bearer" = [])),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn users(
    state: Extension<Arc<AuthState>>,
    headers: axum::http::HeaderMap,
) -> Result<Json<Vec<String>>, AuthError> {
    let token = principal::bearer_token(&headers)?;
    let who = authenticate_bearer(&state, &token).await?;

    // Listing accounts is admin-only, expressed as the delete capability.
    let usernames = gate(&who, Capability::Delete, || async {
        state.users.list_usernames().await
    })
    .await?
    .map_err(|e| {
        error!("user listing failed: {e}");
        AuthError::Unavailable
    })?;

    Ok(Json(usernames))
}

#[utoipa::path(
    get,
    path= "/secret",
    responses (
        (status = 200, description = "Secret area, any authenticated user"),
        (status = 401, description = "Missing or invalid bearer token"),
    ),
    security(("bearer" = [])),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn secret(
    state: Extension<Arc<AuthState>>,
    headers: axum::http::HeaderMap,
) -> Result<String, AuthError> {
    let token = principal::bearer_token(&headers)?;
    let _who = authenticate_bearer(&state, &token).await?;

    Ok("Welcome to the secret area".to_string())
}
