//! Document identity and raw document shape.
//!
//! # Responsibility
//! - Validate caller-provided document ids against store naming rules.
//! - Generate fresh ids when a record is inserted without one.
//!
//! # Invariants
//! - Generated ids are 24 lowercase hex chars in ObjectId layout:
//!   4-byte unix seconds, 5-byte process random, 3-byte counter.
//! - Ids generated within one process are never repeated until the 24-bit
//!   counter wraps within a single second.

use crate::schema::validate::{validate_identifier, ValidationError};
use chrono::Utc;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU32, Ordering};
use uuid::Uuid;

const COUNTER_MASK: u32 = 0x00FF_FFFF;

static PROCESS_RANDOM: Lazy<[u8; 5]> = Lazy::new(|| {
    let bytes = Uuid::new_v4().into_bytes();
    [bytes[0], bytes[1], bytes[2], bytes[3], bytes[4]]
});

static ID_COUNTER: Lazy<AtomicU32> = Lazy::new(|| {
    let bytes = Uuid::new_v4().into_bytes();
    AtomicU32::new(u32::from_be_bytes([0, bytes[10], bytes[11], bytes[12]]))
});

/// Identifier of one document inside a collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

impl DocumentId {
    /// Validates a caller-provided id.
    pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        validate_identifier("id", &value)?;
        Ok(Self(value))
    }

    /// Generates a new time-ordered id.
    pub fn generate() -> Self {
        let seconds = Utc::now().timestamp().clamp(0, i64::from(u32::MAX)) as u32;
        let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed) & COUNTER_MASK;

        let mut raw = [0_u8; 12];
        raw[..4].copy_from_slice(&seconds.to_be_bytes());
        raw[4..9].copy_from_slice(PROCESS_RANDOM.as_slice());
        raw[9..].copy_from_slice(&counter.to_be_bytes()[1..]);

        let mut hex = String::with_capacity(24);
        for byte in raw {
            hex.push_str(&format!("{byte:02x}"));
        }
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for DocumentId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<&str> for DocumentId {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<DocumentId> for String {
    fn from(value: DocumentId) -> Self {
        value.0
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for DocumentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw document as exchanged with a `DocumentStore`.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    /// Top-level fields. Never contains the `id` key.
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: DocumentId, fields: Map<String, Value>) -> Self {
        Self { id, fields }
    }

    /// Resolves a dot-separated field path through nested maps.
    pub fn field(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.fields.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Converts into a flat JSON object with `id` merged in.
    pub fn into_value(self) -> Value {
        let mut fields = self.fields;
        fields.insert("id".to_string(), Value::String(self.id.into_string()));
        Value::Object(fields)
    }
}
