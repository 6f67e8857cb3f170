//! Credential store: the persistence seam the auth core depends on.
//!
//! The core only sees the [`UserStore`] trait; production wires in
//! [`PgUserStore`], while tests and `--dsn memory` use [`MemoryUserStore`].

use crate::api::handlers::auth::acl::Role;
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{warn, Instrument};

/// Persisted identity record. `password_hash` is always a PHC string
/// produced by the hasher, never plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("username already exists")]
    Duplicate,
    #[error("corrupt user record")]
    Corrupt,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Persist a new user. The store guarantees username uniqueness and
    /// reports violations as [`StoreError::Duplicate`].
    async fn create(&self, user: &User) -> Result<(), StoreError>;

    /// Case-sensitive lookup by username.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Usernames of every registered user, for the admin listing route.
    async fn list_usernames(&self) -> Result<Vec<String>, StoreError>;
}

/// PostgreSQL-backed store.
#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the users table and its uniqueness constraint if missing.
    ///
    /// # Errors
    ///
    /// Returns an error when the DDL statement fails.
    pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                username TEXT PRIMARY KEY,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'user'
            )",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    fn user_from_row(row: &sqlx::postgres::PgRow) -> Result<User, StoreError> {
        let username: String = row.try_get("username").map_err(unavailable)?;
        let password_hash: String = row.try_get("password_hash").map_err(unavailable)?;
        let role_text: String = row.try_get("role").map_err(unavailable)?;

        // The column is constrained to the role enum, but a record that
        // escapes the constraint must deny, not default.
        let role = role_text.parse::<Role>().map_err(|e| {
            warn!(%username, error = %e, "user record with unknown role");
            StoreError::Corrupt
        })?;

        Ok(User {
            username,
            password_hash,
            role,
        })
    }
}

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: &User) -> Result<(), StoreError> {
        let query = "INSERT INTO users (username, password_hash, role) VALUES ($1, $2, $3)";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );

        sqlx::query(query)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Duplicate
                } else {
                    unavailable(e)
                }
            })?;

        Ok(())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let query = "SELECT username, password_hash, role FROM users WHERE username = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );

        let row = sqlx::query(query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(unavailable)?;

        row.as_ref().map(Self::user_from_row).transpose()
    }

    async fn list_usernames(&self) -> Result<Vec<String>, StoreError> {
        let query = "SELECT username FROM users ORDER BY username";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );

        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .map_err(unavailable)?;

        rows.iter()
            .map(|row| row.try_get("username").map_err(unavailable))
            .collect()
    }
}

/// In-process store for tests and local development.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().await;

        if users.contains_key(&user.username) {
            return Err(StoreError::Duplicate);
        }

        users.insert(user.username.clone(), user.clone());

        Ok(())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(username).cloned())
    }

    async fn list_usernames(&self) -> Result<Vec<String>, StoreError> {
        let mut usernames: Vec<String> = self.users.read().await.keys().cloned().collect();
        usernames.sort();

        Ok(usernames)
    }
}
