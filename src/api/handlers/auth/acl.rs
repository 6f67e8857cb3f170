//! Role-to-capability table, the authorizer and the operation gate.

use crate::api::handlers::auth::{error::AuthError, principal::Principal};
use serde::{Deserialize, Serialize};
use std::{fmt, future::Future, str::FromStr};
use tracing::warn;
use utoipa::ToSchema;

/// Role assigned to every user record. New accounts default to `User`.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Editor,
    Admin,
}

/// Operation class a route requires.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Read,
    Create,
    Update,
    Delete,
}

impl Role {
    /// Static capability table. The match is total over the enum, so no role
    /// can end up without an entry.
    #[must_use]
    pub const fn capabilities(self) -> &'static [Capability] {
        match self {
            Self::User => &[Capability::Read],
            Self::Editor => &[Capability::Read, Capability::Create, Capability::Update],
            Self::Admin => &[
                Capability::Read,
                Capability::Create,
                Capability::Update,
                Capability::Delete,
            ],
        }
    }

    #[must_use]
    pub fn allows(self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Editor => "editor",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse the role column of a stored user record. The store constrains the
/// column to the enum, but a record that escapes the constraint must deny,
/// never default to something permissive.
impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "editor" => Ok(Self::Editor),
            "admin" => Ok(Self::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

/// Pure allow/deny decision for a principal and a required capability.
#[must_use]
pub fn authorize(principal: &Principal, capability: Capability) -> bool {
    principal.role.allows(capability)
}

/// Single choke point for gated resource operations.
///
/// The operation is only constructed and awaited after the capability check
/// passes; a denied request can never observe partial side effects.
///
/// # Errors
///
/// Returns [`AuthError::Forbidden`] when the principal's role lacks the
/// capability.
pub async fn gate<F, Fut, T>(
    principal: &Principal,
    capability: Capability,
    operation: F,
) -> Result<T, AuthError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    if !authorize(principal, capability) {
        warn!(
            username = %principal.username,
            role = %principal.role,
            capability = ?capability,
            "capability denied"
        );

        return Err(AuthError::Forbidden);
    }

    Ok(operation().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn principal(role: Role) -> Principal {
        Principal {
            username: "test".to_string(),
            role,
        }
    }

    #[test]
    fn capability_table_per_role() {
        assert_eq!(Role::User.capabilities(), &[Capability::Read]);
        assert_eq!(
            Role::Editor.capabilities(),
            &[Capability::Read, Capability::Create, Capability::Update]
        );
        assert_eq!(
            Role::Admin.capabilities(),
            &[
                Capability::Read,
                Capability::Create,
                Capability::Update,
                Capability::Delete
            ]
        );
    }

    #[test]
    fn capability_table_is_stable_across_lookups() {
        for _ in 0..3 {
            assert_eq!(Role::User.capabilities(), Role::User.capabilities());
            assert_eq!(Role::Editor.capabilities(), Role::Editor.capabilities());
            assert_eq!(Role::Admin.capabilities(), Role::Admin.capabilities());
        }
    }

    #[test]
    fn authorize_decisions() {
        assert!(!authorize(&principal(Role::User), Capability::Create));
        assert!(authorize(&principal(Role::Editor), Capability::Create));
        assert!(authorize(&principal(Role::Admin), Capability::Delete));
        assert!(!authorize(&principal(Role::User), Capability::Delete));
        assert!(authorize(&principal(Role::User), Capability::Read));
    }

    #[test]
    fn role_defaults_to_user() {
        assert_eq!(Role::default(), Role::User);
    }

    #[test]
    fn role_round_trips_through_str() -> Result<(), UnknownRole> {
        for role in [Role::User, Role::Editor, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>()?, role);
        }
        assert!("root".parse::<Role>().is_err());
        Ok(())
    }

    #[tokio::test]
    async fn gate_runs_operation_when_allowed() -> Result<(), AuthError> {
        let ran = AtomicBool::new(false);
        let result = gate(&principal(Role::Editor), Capability::Create, || async {
            ran.store(true, Ordering::SeqCst);
            42
        })
        .await?;

        assert_eq!(result, 42);
        assert!(ran.load(Ordering::SeqCst));
        Ok(())
    }

    #[tokio::test]
    async fn gate_never_runs_denied_operation() {
        let ran = AtomicBool::new(false);
        let result = gate(&principal(Role::User), Capability::Delete, || async {
            ran.store(true, Ordering::SeqCst);
        })
        .await;

        assert_eq!(result, Err(AuthError::Forbidden));
        assert!(!ran.load(Ordering::SeqCst));
    }
}
