//! Process-local document store.
//!
//! Backs tests and embedded use where no hosted database is configured.
//! All collections live in one mutex-guarded map.

use super::{merge_fields, DocumentStore, SetMode, StoreError, StoreResult};
use crate::model::document::{Document, DocumentId};
use crate::query::eval::apply_query;
use crate::query::StructuredQuery;
use log::debug;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

type Collections = BTreeMap<String, BTreeMap<DocumentId, Map<String, Value>>>;

#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: Mutex<Collections>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently stored in `collection`.
    pub fn len(&self, collection: &str) -> StoreResult<usize> {
        Ok(self
            .lock()?
            .get(collection)
            .map_or(0, |documents| documents.len()))
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Collections>> {
        self.collections
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn get_document(&self, collection: &str, id: &DocumentId) -> StoreResult<Option<Document>> {
        let collections = self.lock()?;
        let document = collections
            .get(collection)
            .and_then(|documents| documents.get(id))
            .map(|fields| Document::new(id.clone(), fields.clone()));
        debug!(
            "event=doc_get module=store status=ok backend=memory collection={collection} id={id} found={}",
            document.is_some()
        );
        Ok(document)
    }

    fn set_document(
        &self,
        collection: &str,
        id: &DocumentId,
        fields: Map<String, Value>,
        mode: SetMode,
    ) -> StoreResult<()> {
        let mut collections = self.lock()?;
        let documents = collections.entry(collection.to_string()).or_default();
        match mode {
            SetMode::Overwrite => {
                documents.insert(id.clone(), fields);
            }
            SetMode::Merge => merge_fields(documents.entry(id.clone()).or_default(), fields),
        }
        debug!(
            "event=doc_set module=store status=ok backend=memory collection={collection} id={id} mode={mode:?}"
        );
        Ok(())
    }

    fn delete_document(&self, collection: &str, id: &DocumentId) -> StoreResult<()> {
        let mut collections = self.lock()?;
        if let Some(documents) = collections.get_mut(collection) {
            documents.remove(id);
        }
        debug!("event=doc_delete module=store status=ok backend=memory collection={collection} id={id}");
        Ok(())
    }

    fn run_query(&self, collection: &str, query: &StructuredQuery) -> StoreResult<Vec<Document>> {
        let snapshot: Vec<Document> = {
            let collections = self.lock()?;
            collections
                .get(collection)
                .map(|documents| {
                    documents
                        .iter()
                        .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                        .collect()
                })
                .unwrap_or_default()
        };
        let hits = apply_query(snapshot, query);
        debug!(
            "event=doc_query module=store status=ok backend=memory collection={collection} filters={} hits={}",
            query.filters.len(),
            hits.len()
        );
        Ok(hits)
    }
}
