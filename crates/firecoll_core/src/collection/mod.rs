//! Typed collection operations over a `DocumentStore`.
//!
//! # Responsibility
//! - Map schema records onto documents for CRUD and attribute queries.
//! - Stamp bookkeeping fields (`created_at`, `updated_at`, owners).
//! - Enforce unique keys and id uniqueness before writes.
//!
//! # Invariants
//! - Every write validates the record first.
//! - Inserts never overwrite an existing document id.
//! - Updates merge into the stored document and never drop unknown fields.
//! - Records returned to callers always carry their document id.

mod error;

pub use error::{CollectionError, CollectionResult};

use crate::model::document::{Document, DocumentId};
use crate::model::timestamp::Timestamp;
use crate::query::plan::{plan_query, run_plan};
use crate::query::{Condition, Operator, OrderBy, StructuredQuery};
use crate::schema::validate::validate_collection_name;
use crate::schema::{
    from_document, schema_name, to_fields, Schema, DELETED_FIELD, UPDATED_AT_FIELD,
    UPDATED_BY_FIELD,
};
use crate::store::{DocumentStore, SetMode};
use log::{debug, warn};
use serde_json::{Map, Value};
use std::marker::PhantomData;

/// Actor settings for one write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Written to `created_by` / `updated_by` on owned schemas.
    pub owner: Option<String>,
    /// Skips the owner requirement of `force_ownership` collections.
    pub force: bool,
}

impl WriteOptions {
    pub fn owned_by(owner: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
            force: false,
        }
    }

    pub fn forced() -> Self {
        Self {
            owner: None,
            force: true,
        }
    }
}

/// Typed view of the `S::COLLECTION_NAME` collection in `St`.
pub struct Collection<S, St> {
    store: St,
    force_ownership: bool,
    _schema: PhantomData<fn() -> S>,
}

impl<S: Schema, St: DocumentStore> Collection<S, St> {
    /// Binds schema `S` to `store`.
    ///
    /// # Errors
    /// - `InvalidCollectionName` when `S::COLLECTION_NAME` is not a valid id.
    pub fn new(store: St) -> CollectionResult<Self> {
        Self::with_force_ownership(store, false)
    }

    /// Like `new`, but owned schemas then require an owner on every write
    /// unless `WriteOptions::force` is set.
    pub fn with_force_ownership(store: St, force_ownership: bool) -> CollectionResult<Self> {
        validate_collection_name(S::COLLECTION_NAME).map_err(|source| {
            CollectionError::InvalidCollectionName {
                name: S::COLLECTION_NAME,
                source,
            }
        })?;

        Ok(Self {
            store,
            force_ownership,
            _schema: PhantomData,
        })
    }

    /// Schema type name.
    pub fn name(&self) -> &'static str {
        schema_name::<S>()
    }

    pub fn collection_name(&self) -> &'static str {
        S::COLLECTION_NAME
    }

    pub fn unique_keys(&self) -> &'static [&'static str] {
        S::UNIQUE_KEYS
    }

    pub fn force_ownership(&self) -> bool {
        self.force_ownership
    }

    pub fn store(&self) -> &St {
        &self.store
    }

    /// Loads one record by id.
    pub fn get(&self, id: &str) -> CollectionResult<S> {
        let id = DocumentId::parse(id)?;
        match self.store.get_document(S::COLLECTION_NAME, &id)? {
            Some(document) => self.decode(document),
            None => Err(CollectionError::NotFound {
                collection: S::COLLECTION_NAME,
                id,
            }),
        }
    }

    /// Lists records, optionally ordered and limited.
    pub fn get_all(&self, limit: Option<usize>, order_by: &[OrderBy]) -> CollectionResult<Vec<S>> {
        self.query(Vec::new(), limit, order_by)
    }

    /// Returns the first record whose `attribute` equals `value`.
    pub fn get_by_attribute(
        &self,
        attribute: &str,
        value: impl Into<Value>,
    ) -> CollectionResult<S> {
        let value = value.into();
        let mut hits =
            self.query_by_attribute(attribute, value.clone(), Operator::Equal, Some(1), &[])?;
        if hits.is_empty() {
            return Err(CollectionError::NotFoundByAttribute {
                collection: S::COLLECTION_NAME,
                attribute: attribute.to_string(),
                value,
            });
        }
        Ok(hits.swap_remove(0))
    }

    pub fn query_by_attribute(
        &self,
        attribute: &str,
        value: impl Into<Value>,
        op: Operator,
        limit: Option<usize>,
        order_by: &[OrderBy],
    ) -> CollectionResult<Vec<S>> {
        self.query(vec![Condition::new(attribute, op, value)], limit, order_by)
    }

    /// Queries with one condition per `(attribute, operator, value)` triple.
    ///
    /// # Errors
    /// - `InvalidArguments` when the three slices differ in length.
    pub fn query_by_attributes(
        &self,
        attributes: &[&str],
        values: Vec<Value>,
        operators: &[Operator],
        limit: Option<usize>,
        order_by: &[OrderBy],
    ) -> CollectionResult<Vec<S>> {
        if attributes.len() != values.len() || attributes.len() != operators.len() {
            return Err(CollectionError::InvalidArguments(format!(
                "got {} attributes, {} values and {} operators; counts must be equal",
                attributes.len(),
                values.len(),
                operators.len()
            )));
        }

        let conditions = attributes
            .iter()
            .zip(operators)
            .zip(values)
            .map(|((attribute, op), value)| Condition::new(*attribute, *op, value))
            .collect();
        self.query(conditions, limit, order_by)
    }

    /// Runs an arbitrary condition list.
    ///
    /// An `in` condition fans out into several store requests whose results
    /// are concatenated and capped at `limit`.
    pub fn query(
        &self,
        conditions: Vec<Condition>,
        limit: Option<usize>,
        order_by: &[OrderBy],
    ) -> CollectionResult<Vec<S>> {
        let conditions = conditions.into_iter().map(coerce_timestamps::<S>).collect();
        let plan = plan_query(conditions, limit, order_by)?;

        let records = run_plan(&self.store, S::COLLECTION_NAME, &plan)?
            .into_iter()
            .map(|document| self.decode(document))
            .collect::<CollectionResult<Vec<S>>>()?;

        debug!(
            "event=collection_query module=collection status=ok collection={} requests={} hits={}",
            S::COLLECTION_NAME,
            plan.queries().len(),
            records.len()
        );
        Ok(records)
    }

    pub fn insert(&self, doc: S) -> CollectionResult<S> {
        self.insert_with(doc, &WriteOptions::default())
    }

    /// Inserts a new record and returns it as stored, id included.
    ///
    /// # Errors
    /// - `OwnerRequired` for owned schemas in `force_ownership` collections.
    /// - `Validation` when the record fails `Schema::validate`.
    /// - `Conflict` when a unique key value is already taken.
    /// - `AlreadyExists` when the record carries an id that is in use.
    pub fn insert_with(&self, mut doc: S, options: &WriteOptions) -> CollectionResult<S> {
        doc.meta_mut().created_at = Some(Timestamp::now());
        if let Some(owner_meta) = doc.owner_meta_mut() {
            owner_meta.created_by = self.resolve_owner(options)?;
        }
        doc.validate()?;

        let fields = to_fields(&doc)?;
        self.check_unique_keys(&fields, None)?;

        let id = match doc.meta().id.clone() {
            Some(id) => {
                if self.store.document_exists(S::COLLECTION_NAME, &id)? {
                    warn!(
                        "event=collection_insert module=collection status=error collection={} id={} error_code=already_exists",
                        S::COLLECTION_NAME,
                        id
                    );
                    return Err(CollectionError::AlreadyExists {
                        schema: self.name(),
                        id,
                    });
                }
                id
            }
            None => DocumentId::generate(),
        };

        self.store
            .set_document(S::COLLECTION_NAME, &id, fields, SetMode::Overwrite)?;
        debug!(
            "event=collection_insert module=collection status=ok collection={} id={}",
            S::COLLECTION_NAME,
            id
        );

        match self.store.get_document(S::COLLECTION_NAME, &id)? {
            Some(document) => self.decode(document),
            None => Err(CollectionError::NotFound {
                collection: S::COLLECTION_NAME,
                id,
            }),
        }
    }

    pub fn update(&self, doc: S) -> CollectionResult<()> {
        self.update_with(doc, &WriteOptions::default())
    }

    /// Merges `doc` into its stored document.
    ///
    /// A unique key clash with the document itself is allowed.
    pub fn update_with(&self, mut doc: S, options: &WriteOptions) -> CollectionResult<()> {
        let Some(id) = doc.meta().id.clone() else {
            return Err(CollectionError::MissingId {
                schema: self.name(),
            });
        };
        doc.validate()?;

        doc.meta_mut().updated_at = Some(Timestamp::now());
        let updated_by = match doc.owner_meta_mut() {
            Some(owner_meta) => {
                owner_meta.updated_by = self.resolve_owner(options)?;
                Some(owner_meta.updated_by.clone())
            }
            None => None,
        };

        let mut fields = to_fields(&doc)?;
        // A merge must clear the previous actor when this write has none.
        if let Some(updated_by) = updated_by {
            fields.insert(
                UPDATED_BY_FIELD.to_string(),
                updated_by.map_or(Value::Null, Value::String),
            );
        }
        self.check_unique_keys(&fields, Some(&id))?;

        self.store
            .set_document(S::COLLECTION_NAME, &id, fields, SetMode::Merge)?;
        debug!(
            "event=collection_update module=collection status=ok collection={} id={}",
            S::COLLECTION_NAME,
            id
        );
        Ok(())
    }

    pub fn delete(&self, id: &str) -> CollectionResult<()> {
        self.delete_with(id, &WriteOptions::default())
    }

    /// Deletes one document; deleting a missing id succeeds.
    ///
    /// For owned schemas with an owner given, the document is first marked
    /// `deleted` with `updated_by`/`updated_at` so change listeners see who
    /// removed it.
    pub fn delete_with(&self, id: &str, options: &WriteOptions) -> CollectionResult<()> {
        let id = DocumentId::parse(id)?;

        if S::IS_OWNED {
            if let Some(owner) = self.resolve_owner(options)? {
                let mut marker = Map::new();
                marker.insert(
                    UPDATED_AT_FIELD.to_string(),
                    Value::String(Timestamp::now().to_canonical_string()),
                );
                marker.insert(UPDATED_BY_FIELD.to_string(), Value::String(owner));
                marker.insert(DELETED_FIELD.to_string(), Value::Bool(true));
                self.store
                    .set_document(S::COLLECTION_NAME, &id, marker, SetMode::Merge)?;
            }
        }

        self.store.delete_document(S::COLLECTION_NAME, &id)?;
        debug!(
            "event=collection_delete module=collection status=ok collection={} id={}",
            S::COLLECTION_NAME,
            id
        );
        Ok(())
    }

    fn resolve_owner(&self, options: &WriteOptions) -> CollectionResult<Option<String>> {
        if self.force_ownership && !options.force && options.owner.is_none() {
            return Err(CollectionError::OwnerRequired {
                schema: self.name(),
            });
        }
        Ok(options.owner.clone())
    }

    /// Fails with `Conflict` when another document holds a unique key value.
    ///
    /// Missing and null values are not checked.
    fn check_unique_keys(
        &self,
        fields: &Map<String, Value>,
        own_id: Option<&DocumentId>,
    ) -> CollectionResult<()> {
        for key in S::UNIQUE_KEYS {
            let Some(value) = fields.get(*key).filter(|value| !value.is_null()) else {
                continue;
            };

            let query = StructuredQuery::all()
                .filter(Condition::eq(*key, value.clone()))
                .limit(2);
            let clashes = self.store.run_query(S::COLLECTION_NAME, &query)?;
            if clashes
                .iter()
                .any(|document| Some(&document.id) != own_id)
            {
                warn!(
                    "event=unique_key_check module=collection status=error collection={} key={} error_code=conflict",
                    S::COLLECTION_NAME,
                    key
                );
                return Err(CollectionError::Conflict {
                    schema: self.name(),
                    key: *key,
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }

    fn decode(&self, document: Document) -> CollectionResult<S> {
        let id = document.id.clone();
        from_document(document).map_err(|source| {
            warn!(
                "event=document_decode module=collection status=error collection={} id={} error_code=invalid_data",
                S::COLLECTION_NAME,
                id
            );
            CollectionError::InvalidData {
                collection: S::COLLECTION_NAME,
                id,
                source,
            }
        })
    }
}

/// Rewrites RFC 3339 string operands on timestamp fields to canonical form.
fn coerce_timestamps<S: Schema>(mut condition: Condition) -> Condition {
    if !S::TIMESTAMP_FIELDS.contains(&condition.field.as_str()) {
        return condition;
    }
    match &mut condition.value {
        Value::Array(values) => values.iter_mut().for_each(coerce_timestamp_value),
        value => coerce_timestamp_value(value),
    }
    condition
}

fn coerce_timestamp_value(value: &mut Value) {
    if let Value::String(raw) = value {
        if let Ok(timestamp) = Timestamp::parse(raw) {
            *raw = timestamp.to_canonical_string();
        }
    }
}
