//! Errors surfaced by typed collection operations.

use crate::model::document::DocumentId;
use crate::query::QueryError;
use crate::schema::validate::ValidationError;
use crate::schema::SchemaError;
use crate::store::StoreError;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CollectionResult<T> = Result<T, CollectionError>;

#[derive(Debug)]
pub enum CollectionError {
    InvalidCollectionName {
        name: &'static str,
        source: ValidationError,
    },
    Validation(ValidationError),
    /// A record could not be turned into document fields.
    Serialization(SchemaError),
    /// A stored document could not be turned back into a record.
    InvalidData {
        collection: &'static str,
        id: DocumentId,
        source: SchemaError,
    },
    Store(StoreError),
    Query(QueryError),
    NotFound {
        collection: &'static str,
        id: DocumentId,
    },
    NotFoundByAttribute {
        collection: &'static str,
        attribute: String,
        value: Value,
    },
    AlreadyExists {
        schema: &'static str,
        id: DocumentId,
    },
    Conflict {
        schema: &'static str,
        key: &'static str,
        value: Value,
    },
    MissingId {
        schema: &'static str,
    },
    OwnerRequired {
        schema: &'static str,
    },
    InvalidArguments(String),
}

impl CollectionError {
    /// Stable machine-readable code, safe to log.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCollectionName { .. } => "invalid_collection_name",
            Self::Validation(_) => "validation_failed",
            Self::Serialization(_) => "serialization_failed",
            Self::InvalidData { .. } => "invalid_data",
            Self::Store(_) => "store_failed",
            Self::Query(_) => "invalid_query",
            Self::NotFound { .. } | Self::NotFoundByAttribute { .. } => "not_found",
            Self::AlreadyExists { .. } => "already_exists",
            Self::Conflict { .. } => "conflict",
            Self::MissingId { .. } => "missing_id",
            Self::OwnerRequired { .. } => "owner_required",
            Self::InvalidArguments(_) => "invalid_arguments",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::NotFoundByAttribute { .. })
    }
}

impl Display for CollectionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCollectionName { name, source } => {
                write!(f, "invalid collection name `{name}`: {source}")
            }
            Self::Validation(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "{err}"),
            Self::InvalidData {
                collection,
                id,
                source,
            } => write!(f, "invalid stored document {collection}.{id}: {source}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Query(err) => write!(f, "{err}"),
            Self::NotFound { collection, id } => {
                write!(f, "document {collection}.{id} could not be found")
            }
            Self::NotFoundByAttribute {
                collection,
                attribute,
                value,
            } => write!(
                f,
                "document could not be found in {collection} with `{attribute}=={value}`"
            ),
            Self::AlreadyExists { schema, id } => {
                write!(f, "{schema} already exists with id: {id}")
            }
            Self::Conflict { schema, key, value } => {
                write!(f, "{schema} with {key} {value} already exists")
            }
            Self::MissingId { schema } => write!(f, "provided {schema} document has no id"),
            Self::OwnerRequired { schema } => {
                write!(f, "an owner must be defined for collection {schema}")
            }
            Self::InvalidArguments(message) => write!(f, "invalid arguments: {message}"),
        }
    }
}

impl Error for CollectionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidCollectionName { source, .. } => Some(source),
            Self::Validation(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::InvalidData { source, .. } => Some(source),
            Self::Store(err) => Some(err),
            Self::Query(err) => Some(err),
            Self::NotFound { .. }
            | Self::NotFoundByAttribute { .. }
            | Self::AlreadyExists { .. }
            | Self::Conflict { .. }
            | Self::MissingId { .. }
            | Self::OwnerRequired { .. }
            | Self::InvalidArguments(_) => None,
        }
    }
}

impl From<ValidationError> for CollectionError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for CollectionError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<QueryError> for CollectionError {
    fn from(value: QueryError) -> Self {
        Self::Query(value)
    }
}

impl From<SchemaError> for CollectionError {
    fn from(value: SchemaError) -> Self {
        match value {
            SchemaError::Validation(err) => Self::Validation(err),
            other => Self::Serialization(other),
        }
    }
}
