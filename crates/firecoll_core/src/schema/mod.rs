//! Typed schema contract mapped onto store documents.
//!
//! # Responsibility
//! - Declare how a record type maps to a collection.
//! - Convert records to and from raw `Document` fields.
//!
//! # Invariants
//! - The `id` field lives in `SchemaMeta`, never in stored fields.
//! - Records read back from a store pass `Schema::validate` before they are
//!   returned; invalid persisted state is rejected, not masked.
//!
//! # Example
//! ```
//! use firecoll_core::{Schema, SchemaMeta};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct User {
//!     #[serde(flatten)]
//!     meta: SchemaMeta,
//!     email: String,
//! }
//!
//! impl Schema for User {
//!     const COLLECTION_NAME: &'static str = "users";
//!     const UNIQUE_KEYS: &'static [&'static str] = &["email"];
//!
//!     fn meta(&self) -> &SchemaMeta {
//!         &self.meta
//!     }
//!
//!     fn meta_mut(&mut self) -> &mut SchemaMeta {
//!         &mut self.meta
//!     }
//! }
//! ```

pub mod validate;

use crate::model::document::{Document, DocumentId};
use crate::model::timestamp::Timestamp;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use validate::ValidationError;

pub const ID_FIELD: &str = "id";
pub const CREATED_AT_FIELD: &str = "created_at";
pub const UPDATED_AT_FIELD: &str = "updated_at";
pub const CREATED_BY_FIELD: &str = "created_by";
pub const UPDATED_BY_FIELD: &str = "updated_by";
pub const DELETED_FIELD: &str = "deleted";

/// Bookkeeping fields every schema embeds via `#[serde(flatten)]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<DocumentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

impl SchemaMeta {
    pub fn with_id(id: DocumentId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }
}

/// Actor bookkeeping for schemas that track who wrote a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

/// Typed record stored as one document in `COLLECTION_NAME`.
pub trait Schema: Serialize + DeserializeOwned {
    const COLLECTION_NAME: &'static str;
    /// Fields whose values must be unique across the collection.
    const UNIQUE_KEYS: &'static [&'static str] = &[];
    /// Fields whose RFC 3339 string query values are coerced to timestamps.
    const TIMESTAMP_FIELDS: &'static [&'static str] = &[CREATED_AT_FIELD, UPDATED_AT_FIELD];
    /// Set for schemas that embed `OwnerMeta`.
    const IS_OWNED: bool = false;

    fn meta(&self) -> &SchemaMeta;

    fn meta_mut(&mut self) -> &mut SchemaMeta;

    /// Owned schemas return their `OwnerMeta`.
    fn owner_meta_mut(&mut self) -> Option<&mut OwnerMeta> {
        None
    }

    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

pub type SchemaResult<T> = Result<T, SchemaError>;

/// Conversion failure between records and raw documents.
#[derive(Debug)]
pub enum SchemaError {
    Serialization(serde_json::Error),
    NotAnObject(&'static str),
    Validation(ValidationError),
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serialization(err) => write!(f, "schema serialization failed: {err}"),
            Self::NotAnObject(schema) => {
                write!(f, "schema `{schema}` must serialize to a JSON object")
            }
            Self::Validation(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SchemaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Serialization(err) => Some(err),
            Self::NotAnObject(_) => None,
            Self::Validation(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for SchemaError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

impl From<ValidationError> for SchemaError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Short type name of a schema, used in error messages and logs.
pub fn schema_name<S: Schema>() -> &'static str {
    let full = std::any::type_name::<S>();
    full.rsplit("::").next().unwrap_or(full)
}

/// Serializes a record into store fields, stripping `id`.
pub fn to_fields<S: Schema>(record: &S) -> SchemaResult<Map<String, Value>> {
    match serde_json::to_value(record)? {
        Value::Object(mut fields) => {
            fields.remove(ID_FIELD);
            Ok(fields)
        }
        _ => Err(SchemaError::NotAnObject(schema_name::<S>())),
    }
}

/// Rebuilds a validated record from a stored document.
pub fn from_document<S: Schema>(document: Document) -> SchemaResult<S> {
    let record: S = serde_json::from_value(document.into_value())?;
    record.validate()?;
    Ok(record)
}
