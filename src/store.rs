//! Record store abstraction.
//!
//! The [`RecordStore`] trait is the seam between the cart engine and
//! whatever backend-as-a-service holds the remote records, enabling
//! pluggable backends (the PocketBase HTTP client, an in-memory store
//! for tests and embedded deployments).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Abstract collection-based record store.
///
/// "Not found" is an `Ok(None)` on the getters, never a hard error —
/// callers branch on absence without unwinding.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get_first_list_item`](RecordStore::get_first_list_item) | First record matching a filter |
/// | [`get_one`](RecordStore::get_one) | Fetch a record by id |
/// | [`create`](RecordStore::create) | Insert a record, returning it with its assigned id |
/// | [`update`](RecordStore::update) | Patch a record by id |
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Return the first record in `collection` matching `filter`, or
    /// `None` when nothing matches.
    ///
    /// The filter syntax is the backend's; the engine only ever issues
    /// single-field equality filters such as `user="abc123"`.
    async fn get_first_list_item(&self, collection: &str, filter: &str) -> Result<Option<Value>>;

    /// Fetch a record by id, `None` when it does not exist.
    async fn get_one(&self, collection: &str, id: &str) -> Result<Option<Value>>;

    /// Insert a record and return the stored copy, including its
    /// assigned `id`.
    async fn create(&self, collection: &str, payload: &Value) -> Result<Value>;

    /// Patch an existing record and return the stored copy.
    async fn update(&self, collection: &str, id: &str, payload: &Value) -> Result<Value>;
}

/// In-memory [`RecordStore`] backed by per-collection vectors.
///
/// Supports the single-field equality filter the engine uses
/// (`field="value"`). Used in tests and local-only deployments.
#[derive(Default)]
pub struct MemoryRecordStore {
    collections: Mutex<HashMap<String, Vec<Value>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

/// Parse a `field="value"` (or single-quoted) equality filter.
fn parse_equality_filter(filter: &str) -> Option<(String, String)> {
    let (field, raw) = filter.split_once('=')?;
    let raw = raw.trim();
    let value = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))?;
    Some((field.trim().to_string(), value.to_string()))
}

fn matches_filter(record: &Value, field: &str, value: &str) -> bool {
    record.get(field).and_then(Value::as_str) == Some(value)
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get_first_list_item(&self, collection: &str, filter: &str) -> Result<Option<Value>> {
        let Some((field, value)) = parse_equality_filter(filter) else {
            anyhow::bail!("unsupported filter expression: '{}'", filter);
        };

        let collections = self.collections.lock().unwrap();
        let records = collections.get(collection);
        Ok(records.and_then(|records| {
            records
                .iter()
                .find(|record| matches_filter(record, &field, &value))
                .cloned()
        }))
    }

    async fn get_one(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let collections = self.collections.lock().unwrap();
        let records = collections.get(collection);
        Ok(records.and_then(|records| {
            records
                .iter()
                .find(|record| matches_filter(record, "id", id))
                .cloned()
        }))
    }

    async fn create(&self, collection: &str, payload: &Value) -> Result<Value> {
        let mut record = payload.clone();
        if record.get("id").and_then(Value::as_str).is_none() {
            record["id"] = Value::String(Uuid::new_v4().to_string());
        }

        let mut collections = self.collections.lock().unwrap();
        collections
            .entry(collection.to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn update(&self, collection: &str, id: &str, payload: &Value) -> Result<Value> {
        let mut collections = self.collections.lock().unwrap();
        let records = collections
            .get_mut(collection)
            .ok_or_else(|| anyhow::anyhow!("collection '{}' not found", collection))?;

        let record = records
            .iter_mut()
            .find(|record| matches_filter(record, "id", id))
            .ok_or_else(|| anyhow::anyhow!("record '{}' not found in '{}'", id, collection))?;

        if let (Some(target), Some(fields)) = (record.as_object_mut(), payload.as_object()) {
            for (key, value) in fields {
                if key != "id" {
                    target.insert(key.clone(), value.clone());
                }
            }
        }

        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn create_assigns_id_and_get_one_finds_it() {
        let store = MemoryRecordStore::new();
        let record = store.create("carts", &json!({"user": "u1"})).await.unwrap();
        let id = record["id"].as_str().unwrap().to_string();

        let fetched = store.get_one("carts", &id).await.unwrap();
        assert_eq!(fetched.unwrap()["user"], "u1");
    }

    #[tokio::test]
    async fn get_one_missing_is_none_not_error() {
        let store = MemoryRecordStore::new();
        assert!(store.get_one("users", "ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn filter_matches_exact_field_value() {
        let store = MemoryRecordStore::new();
        store.create("carts", &json!({"user": "u1", "items": "[]"})).await.unwrap();
        store.create("carts", &json!({"user": "u2", "items": "[]"})).await.unwrap();

        let found = store
            .get_first_list_item("carts", "user=\"u2\"")
            .await
            .unwrap();
        assert_eq!(found.unwrap()["user"], "u2");

        let missing = store
            .get_first_list_item("carts", "user=\"u3\"")
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn update_patches_fields_but_not_id() {
        let store = MemoryRecordStore::new();
        let record = store.create("carts", &json!({"user": "u1", "items": "[]"})).await.unwrap();
        let id = record["id"].as_str().unwrap().to_string();

        let updated = store
            .update("carts", &id, &json!({"items": "[1]", "id": "spoofed"}))
            .await
            .unwrap();
        assert_eq!(updated["items"], "[1]");
        assert_eq!(updated["id"], id.as_str());
    }

    #[tokio::test]
    async fn update_missing_record_is_an_error() {
        let store = MemoryRecordStore::new();
        assert!(store.update("carts", "ghost", &json!({})).await.is_err());
    }
}
