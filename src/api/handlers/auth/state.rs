//! Shared auth state wired once at startup.

use crate::api::handlers::auth::{storage::UserStore, token::TokenCodec};
use std::sync::Arc;

/// Everything the auth handlers need: the credential store seam and the
/// token codec carrying the process-wide signing secret.
#[derive(Clone)]
pub struct AuthState {
    pub users: Arc<dyn UserStore>,
    pub codec: TokenCodec,
}

impl AuthState {
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>, codec: TokenCodec) -> Self {
        Self { users, codec }
    }
}
