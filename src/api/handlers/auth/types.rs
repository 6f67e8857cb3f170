//! Request/response types for the auth endpoints.

use crate::api::handlers::auth::{
    acl::{Capability, Role},
    principal::Principal,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// Public view of a user: never the password hash. Token and capabilities
/// are derived at response time, not persisted.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserResponse {
    pub username: String,
    pub role: Role,
    pub capabilities: Vec<Capability>,
}

impl From<&Principal> for UserResponse {
    fn from(principal: &Principal) -> Self {
        Self {
            username: principal.username.clone(),
            role: principal.role,
            capabilities: principal.capabilities().to_vec(),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionResponse {
    pub user: UserResponse,
    pub token: String,
}

impl SessionResponse {
    #[must_use]
    pub fn new(principal: &Principal, token: String) -> Self {
        Self {
            user: UserResponse::from(principal),
            token,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn signup_request_role_is_optional() -> Result<()> {
        let request: SignupRequest =
            serde_json::from_str(r#"{"username":"admin","password":"password"}"#)?;
        assert_eq!(request.role, None);

        let request: SignupRequest =
            serde_json::from_str(r#"{"username":"ed","password":"pw","role":"editor"}"#)?;
        assert_eq!(request.role, Some(Role::Editor));
        Ok(())
    }

    #[test]
    fn session_response_serializes_derived_fields() -> Result<()> {
        let principal = Principal {
            username: "ed".to_string(),
            role: Role::Editor,
        };
        let value = serde_json::to_value(SessionResponse::new(&principal, "tok".to_string()))?;

        let role = value
            .pointer("/user/role")
            .and_then(serde_json::Value::as_str)
            .context("missing role")?;
        assert_eq!(role, "editor");

        let capabilities = value
            .pointer("/user/capabilities")
            .and_then(serde_json::Value::as_array)
            .context("missing capabilities")?;
        assert_eq!(capabilities.len(), 3);

        assert!(value.get("token").is_some());
        assert!(value.pointer("/user/password_hash").is_none());
        Ok(())
    }
}
