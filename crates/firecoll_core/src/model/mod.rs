//! Value objects shared by schemas, stores and collections.
//!
//! # Responsibility
//! - Define the document shape exchanged with document stores.
//! - Provide identifier, timestamp and secret types with stable wire formats.
//!
//! # Invariants
//! - A `Document` never carries its id inside `fields`.
//! - Timestamps serialize with fixed width so lexical order is chronological.

pub mod document;
pub mod secret;
pub mod timestamp;
