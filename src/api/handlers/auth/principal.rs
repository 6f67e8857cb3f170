//! Principal resolution: both authentication strategies end here.
//!
//! Basic and bearer authentication produce the same [`Principal`] shape and
//! collapse every failure into [`AuthError::AuthenticationFailed`], so
//! downstream authorization is strategy-agnostic and the error surface leaks
//! nothing about which step failed.

use crate::api::handlers::auth::{
    acl::{Capability, Role},
    error::AuthError,
    password,
    state::AuthState,
    storage::{StoreError, User},
};
use axum::http::{header::AUTHORIZATION, HeaderMap};
use base64ct::{Base64, Encoding};
use tracing::{debug, error};

/// Authenticated actor attached to a request. Ephemeral, derived from a
/// stored [`User`] at authentication time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
    pub role: Role,
}

impl Principal {
    /// Capability set derived from the role; an explicit accessor rather
    /// than something computed during serialization.
    #[must_use]
    pub const fn capabilities(&self) -> &'static [Capability] {
        self.role.capabilities()
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            role: user.role,
        }
    }
}

/// Resolve a username/password pair into a principal.
///
/// # Errors
///
/// Unknown usernames and wrong passwords both return
/// [`AuthError::AuthenticationFailed`].
pub async fn authenticate_basic(
    state: &AuthState,
    username: &str,
    password: &str,
) -> Result<Principal, AuthError> {
    let user = state
        .users
        .find_by_username(username)
        .await
        .map_err(store_failure)?
        .ok_or(AuthError::AuthenticationFailed)?;

    // Argon2 verification is CPU-bound; keep it off the accept path.
    let candidate = password.to_string();
    let stored = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || password::verify(&candidate, &stored))
        .await
        .map_err(|e| {
            error!("password verification task failed: {e}");
            AuthError::Unavailable
        })?;

    if valid {
        Ok(Principal::from(&user))
    } else {
        Err(AuthError::AuthenticationFailed)
    }
}

/// Resolve a bearer token into a principal.
///
/// # Errors
///
/// Empty tokens, invalid signatures, malformed tokens, expiry and tokens
/// referencing a user that no longer exists all return
/// [`AuthError::AuthenticationFailed`].
pub async fn authenticate_bearer(state: &AuthState, token: &str) -> Result<Principal, AuthError> {
    if token.trim().is_empty() {
        return Err(AuthError::AuthenticationFailed);
    }

    let claims = state.codec.verify(token).map_err(|e| {
        debug!("token rejected: {e}");
        AuthError::AuthenticationFailed
    })?;

    // A valid token may reference a user deleted since it was signed.
    let user = state
        .users
        .find_by_username(&claims.sub)
        .await
        .map_err(store_failure)?
        .ok_or(AuthError::AuthenticationFailed)?;

    Ok(Principal::from(&user))
}

/// Pull `username:password` out of an `Authorization: Basic` header.
///
/// # Errors
///
/// Any missing or malformed header is an authentication failure.
pub fn basic_credentials(headers: &HeaderMap) -> Result<(String, String), AuthError> {
    let encoded = authorization(headers)?
        .strip_prefix("Basic ")
        .ok_or(AuthError::AuthenticationFailed)?;

    let decoded =
        Base64::decode_vec(encoded.trim()).map_err(|_| AuthError::AuthenticationFailed)?;
    let text = String::from_utf8(decoded).map_err(|_| AuthError::AuthenticationFailed)?;

    let (username, password) = text
        .split_once(':')
        .ok_or(AuthError::AuthenticationFailed)?;

    Ok((username.to_string(), password.to_string()))
}

/// Pull the opaque token out of an `Authorization: Bearer` header.
///
/// # Errors
///
/// Any missing or malformed header is an authentication failure.
pub fn bearer_token(headers: &HeaderMap) -> Result<String, AuthError> {
    let token = authorization(headers)?
        .strip_prefix("Bearer ")
        .ok_or(AuthError::AuthenticationFailed)?;

    Ok(token.trim().to_string())
}

fn authorization(headers: &HeaderMap) -> Result<&str, AuthError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AuthError::AuthenticationFailed)
}

fn store_failure(error: StoreError) -> AuthError {
    match error {
        // A corrupt record (e.g. unknown role) denies instead of authorizing;
        // the store already flagged it as a data-integrity concern.
        StoreError::Corrupt => AuthError::AuthenticationFailed,
        StoreError::Duplicate | StoreError::Unavailable(_) => {
            error!("credential store failure: {error}");
            AuthError::Unavailable
        }
    }
}
