//! Document store seam and bundled implementations.
//!
//! # Responsibility
//! - Define the request surface a document database client must offer.
//! - Provide a process-local store and a durable SQLite-backed store.
//!
//! # Invariants
//! - Stores never see schema types; they exchange raw `Document`s.
//! - `SetMode::Merge` merges nested maps and replaces every other value.
//! - Deleting a missing document is not an error.

pub mod memory;
pub mod sqlite;

use crate::config::ClientConfig;
use crate::db::DbError;
use crate::model::document::{Document, DocumentId};
use crate::query::StructuredQuery;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub use memory::MemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure surfaced by a document store.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    Serialization(serde_json::Error),
    InvalidData(String),
    Unavailable(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "document serialization failed: {err}"),
            Self::InvalidData(message) => write!(f, "invalid stored document: {message}"),
            Self::Unavailable(message) => write!(f, "document store unavailable: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection is not migrated: schema version {actual_version}, expected {expected_version}"
            ),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::InvalidData(_)
            | Self::Unavailable(_)
            | Self::UninitializedConnection { .. } => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// Write behavior of `DocumentStore::set_document`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMode {
    /// Replace the whole document.
    Overwrite,
    /// Merge into the existing document, creating it when missing.
    Merge,
}

/// Request surface of a document database client.
pub trait DocumentStore {
    fn get_document(&self, collection: &str, id: &DocumentId) -> StoreResult<Option<Document>>;

    fn set_document(
        &self,
        collection: &str,
        id: &DocumentId,
        fields: Map<String, Value>,
        mode: SetMode,
    ) -> StoreResult<()>;

    fn delete_document(&self, collection: &str, id: &DocumentId) -> StoreResult<()>;

    fn run_query(&self, collection: &str, query: &StructuredQuery) -> StoreResult<Vec<Document>>;

    fn document_exists(&self, collection: &str, id: &DocumentId) -> StoreResult<bool> {
        Ok(self.get_document(collection, id)?.is_some())
    }
}

macro_rules! forward_document_store {
    ($($wrapper:ty),+) => {
        $(
            impl<T: DocumentStore + ?Sized> DocumentStore for $wrapper {
                fn get_document(
                    &self,
                    collection: &str,
                    id: &DocumentId,
                ) -> StoreResult<Option<Document>> {
                    (**self).get_document(collection, id)
                }

                fn set_document(
                    &self,
                    collection: &str,
                    id: &DocumentId,
                    fields: Map<String, Value>,
                    mode: SetMode,
                ) -> StoreResult<()> {
                    (**self).set_document(collection, id, fields, mode)
                }

                fn delete_document(&self, collection: &str, id: &DocumentId) -> StoreResult<()> {
                    (**self).delete_document(collection, id)
                }

                fn run_query(
                    &self,
                    collection: &str,
                    query: &StructuredQuery,
                ) -> StoreResult<Vec<Document>> {
                    (**self).run_query(collection, query)
                }

                fn document_exists(&self, collection: &str, id: &DocumentId) -> StoreResult<bool> {
                    (**self).document_exists(collection, id)
                }
            }
        )+
    };
}

forward_document_store!(&T, Box<T>, Arc<T>);

/// Merges `patch` into `target`; nested maps merge recursively.
pub fn merge_fields(target: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (key, value) in patch {
        let Value::Object(nested) = value else {
            target.insert(key, value);
            continue;
        };
        if let Some(Value::Object(existing)) = target.get_mut(&key) {
            merge_fields(existing, nested);
            continue;
        }
        target.insert(key, Value::Object(nested));
    }
}

/// Opens the store described by `config`.
///
/// Uses `database_path` when configured, otherwise a private in-memory
/// database. Documents are namespaced by the configured project id.
pub fn open_store(config: &ClientConfig) -> StoreResult<SqliteDocumentStore> {
    match &config.database_path {
        Some(path) => SqliteDocumentStore::open(path, config.project_id.as_str()),
        None => SqliteDocumentStore::open_in_memory(config.project_id.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::merge_fields;
    use serde_json::json;

    #[test]
    fn merge_replaces_scalars_and_merges_maps() {
        let mut target = json!({"a": 1, "nested": {"x": 1, "y": 2}, "list": [1, 2]})
            .as_object()
            .unwrap()
            .clone();
        let patch = json!({"a": 2, "nested": {"y": 3, "z": 4}, "list": [3]})
            .as_object()
            .unwrap()
            .clone();

        merge_fields(&mut target, patch);

        assert_eq!(
            json!(target),
            json!({"a": 2, "nested": {"x": 1, "y": 3, "z": 4}, "list": [3]})
        );
    }
}
