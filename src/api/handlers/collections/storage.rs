//! Record persistence for named collections.
//!
//! Records are schemaless JSON documents keyed by a server-assigned UUID.
//! One jsonb table holds every collection; the collection name is part of
//! the key, so new collections need no DDL.

use crate::api::handlers::auth::storage::StoreError;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::Instrument;
use uuid::Uuid;

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list(&self, collection: &str) -> Result<Vec<Value>, StoreError>;
    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Value>, StoreError>;
    async fn create(&self, collection: &str, record: Value) -> Result<Value, StoreError>;
    async fn update(
        &self,
        collection: &str,
        id: Uuid,
        record: Value,
    ) -> Result<Option<Value>, StoreError>;
    async fn delete(&self, collection: &str, id: Uuid) -> Result<Option<Value>, StoreError>;
}

/// Stamp the record with its id so responses always carry it.
fn with_id(mut record: Value, id: Uuid) -> Value {
    if let Some(object) = record.as_object_mut() {
        object.insert("id".to_string(), Value::String(id.to_string()));
    }

    record
}

/// PostgreSQL-backed record store.
#[derive(Debug, Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the records table if missing.
    ///
    /// # Errors
    ///
    /// Returns an error when the DDL statement fails.
    pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS records (
                collection TEXT NOT NULL,
                id UUID NOT NULL,
                data JSONB NOT NULL,
                PRIMARY KEY (collection, id)
            )",
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn list(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        let query = "SELECT id, data FROM records WHERE collection = $1 ORDER BY id";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );

        let rows = sqlx::query(query)
            .bind(collection)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .map_err(unavailable)?;

        rows.iter()
            .map(|row| {
                let id: Uuid = row.try_get("id").map_err(unavailable)?;
                let data: Value = row.try_get("data").map_err(unavailable)?;
                Ok(with_id(data, id))
            })
            .collect()
    }

    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Value>, StoreError> {
        let query = "SELECT data FROM records WHERE collection = $1 AND id = $2";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );

        let row = sqlx::query(query)
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(unavailable)?;

        row.map(|row| {
            let data: Value = row.try_get("data").map_err(unavailable)?;
            Ok(with_id(data, id))
        })
        .transpose()
    }

    async fn create(&self, collection: &str, record: Value) -> Result<Value, StoreError> {
        let id = Uuid::new_v4();
        let query = "INSERT INTO records (collection, id, data) VALUES ($1, $2, $3)";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );

        sqlx::query(query)
            .bind(collection)
            .bind(id)
            .bind(&record)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(unavailable)?;

        Ok(with_id(record, id))
    }

    async fn update(
        &self,
        collection: &str,
        id: Uuid,
        record: Value,
    ) -> Result<Option<Value>, StoreError> {
        let query = "UPDATE records SET data = $3 WHERE collection = $1 AND id = $2";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );

        let result = sqlx::query(query)
            .bind(collection)
            .bind(id)
            .bind(&record)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(unavailable)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(with_id(record, id)))
    }

    async fn delete(&self, collection: &str, id: Uuid) -> Result<Option<Value>, StoreError> {
        let query = "DELETE FROM records WHERE collection = $1 AND id = $2 RETURNING data";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );

        let row = sqlx::query(query)
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(unavailable)?;

        row.map(|row| {
            let data: Value = row.try_get("data").map_err(unavailable)?;
            Ok(with_id(data, id))
        })
        .transpose()
    }
}

/// In-process record store for tests and local development.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    collections: RwLock<HashMap<String, HashMap<Uuid, Value>>>,
}

impl MemoryRecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn list(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        let collections = self.collections.read().await;

        let mut records: Vec<(Uuid, Value)> = collections
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .map(|(id, data)| (*id, data.clone()))
                    .collect()
            })
            .unwrap_or_default();
        records.sort_by_key(|(id, _)| *id);

        Ok(records
            .into_iter()
            .map(|(id, data)| with_id(data, id))
            .collect())
    }

    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Value>, StoreError> {
        let collections = self.collections.read().await;

        Ok(collections
            .get(collection)
            .and_then(|records| records.get(&id))
            .map(|data| with_id(data.clone(), id)))
    }

    async fn create(&self, collection: &str, record: Value) -> Result<Value, StoreError> {
        let id = Uuid::new_v4();
        let mut collections = self.collections.write().await;

        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id, record.clone());

        Ok(with_id(record, id))
    }

    async fn update(
        &self,
        collection: &str,
        id: Uuid,
        record: Value,
    ) -> Result<Option<Value>, StoreError> {
        let mut collections = self.collections.write().await;

        let Some(records) = collections.get_mut(collection) else {
            return Ok(None);
        };

        if !records.contains_key(&id) {
            return Ok(None);
        }

        records.insert(id, record.clone());

        Ok(Some(with_id(record, id)))
    }

    async fn delete(&self, collection: &str, id: Uuid) -> Result<Option<Value>, StoreError> {
        let mut collections = self.collections.write().await;

        Ok(collections
            .get_mut(collection)
            .and_then(|records| records.remove(&id))
            .map(|data| with_id(data, id)))
    }
}
