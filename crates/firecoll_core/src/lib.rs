//! Typed schema collections over a document database.
//!
//! A `Schema` type describes one collection; `Collection` turns records of
//! that type into documents for CRUD and attribute queries against any
//! `DocumentStore`.

pub mod collection;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod schema;
pub mod store;

pub use collection::{Collection, CollectionError, CollectionResult, WriteOptions};
pub use config::{ClientConfig, ConfigError, Credentials};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingError,
};
pub use model::document::{Document, DocumentId};
pub use model::secret::SecretString;
pub use model::timestamp::Timestamp;
pub use query::{Condition, Direction, Operator, OrderBy, QueryError, StructuredQuery};
pub use schema::validate::ValidationError;
pub use schema::{OwnerMeta, Schema, SchemaError, SchemaMeta};
pub use store::{
    open_store, DocumentStore, MemoryDocumentStore, SetMode, SqliteDocumentStore, StoreError,
    StoreResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
