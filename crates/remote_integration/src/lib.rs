use async_trait::async_trait;
use serde_json::Value;
use shared::protocol::BlobObject;

mod rest;

pub use rest::{RestBackend, RestBackendOptions};

/// Row-level access to the hosted tables. Rows travel as JSON objects; the
/// caller owns the typed model.
#[async_trait]
pub trait TableBackend: Send + Sync {
    async fn select_all(&self, table: &str) -> anyhow::Result<Vec<Value>>;
    /// Returns the inserted row, including generated columns.
    async fn insert(&self, table: &str, row: Value) -> anyhow::Result<Value>;
    /// Patches the row whose `id` equals `id` and returns it. Fails when no row matches.
    async fn update(&self, table: &str, id: &str, patch: Value) -> anyhow::Result<Value>;
    /// Deletes the row whose `id` equals `id`. Fails when no row matches.
    async fn delete(&self, table: &str, id: &str) -> anyhow::Result<()>;
    /// Inserts or merges rows by primary key and returns them.
    async fn upsert(&self, table: &str, rows: Vec<Value>) -> anyhow::Result<Vec<Value>>;
}

/// A single bucket of the hosted object storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn list(&self, prefix: &str) -> anyhow::Result<Vec<BlobObject>>;
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<()>;
    fn public_url(&self, path: &str) -> String;
    async fn remove(&self, paths: &[String]) -> anyhow::Result<()>;
}

#[cfg(test)]
#[path = "tests/rest_tests.rs"]
mod tests;
