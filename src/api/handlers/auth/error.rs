//! Failure kinds returned by the auth core.
//!
//! Unknown users, wrong passwords and bad bearer tokens all collapse into
//! [`AuthError::AuthenticationFailed`] so the response body cannot be used to
//! enumerate accounts.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Malformed signup input or a persistence-layer rejection, including
    /// duplicate usernames. Reported uniformly on purpose.
    #[error("invalid input")]
    Invalid,
    /// Basic or bearer credentials did not resolve to a principal.
    #[error("authentication failed")]
    AuthenticationFailed,
    /// The principal is valid but its role lacks the required capability.
    #[error("access denied")]
    Forbidden,
    /// The credential store or a crypto primitive failed mid-request.
    #[error("service unavailable")]
    Unavailable,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::Invalid => StatusCode::UNPROCESSABLE_ENTITY,
            Self::AuthenticationFailed => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Unavailable => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}
