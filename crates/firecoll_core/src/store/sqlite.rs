//! SQLite-backed document store.
//!
//! # Responsibility
//! - Persist documents as JSON rows keyed by `(project_id, collection, doc_id)`.
//! - Execute queries with the shared in-process evaluator.
//!
//! # Invariants
//! - The wrapped connection is fully migrated before any document access.
//! - Merge writes read and write inside one transaction.
//! - Stored `fields` must decode to a JSON object; anything else is rejected.

use super::{merge_fields, DocumentStore, SetMode, StoreError, StoreResult};
use crate::db::migrations::{current_user_version, latest_version};
use crate::db::{open_db, open_db_in_memory};
use crate::model::document::{Document, DocumentId};
use crate::query::eval::apply_query;
use crate::query::StructuredQuery;
use chrono::Utc;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::path::Path;

const UPSERT_SQL: &str = "INSERT INTO documents (
        project_id,
        collection,
        doc_id,
        fields,
        create_time,
        update_time
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?5)
    ON CONFLICT (project_id, collection, doc_id) DO UPDATE SET
        fields = excluded.fields,
        update_time = excluded.update_time;";

const SELECT_ONE_SQL: &str = "SELECT fields
    FROM documents
    WHERE project_id = ?1 AND collection = ?2 AND doc_id = ?3;";

pub struct SqliteDocumentStore {
    conn: Connection,
    project_id: String,
}

impl SqliteDocumentStore {
    /// Wraps an already migrated connection.
    pub fn try_new(conn: Connection, project_id: impl Into<String>) -> StoreResult<Self> {
        let actual_version = current_user_version(&conn)?;
        let expected_version = latest_version();
        if actual_version != expected_version {
            return Err(StoreError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }

        Ok(Self {
            conn,
            project_id: project_id.into(),
        })
    }

    pub fn open(path: impl AsRef<Path>, project_id: impl Into<String>) -> StoreResult<Self> {
        Self::try_new(open_db(path)?, project_id)
    }

    pub fn open_in_memory(project_id: impl Into<String>) -> StoreResult<Self> {
        Self::try_new(open_db_in_memory()?, project_id)
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn read_fields(
        conn: &Connection,
        project_id: &str,
        collection: &str,
        id: &DocumentId,
    ) -> StoreResult<Option<Map<String, Value>>> {
        let raw: Option<String> = conn
            .query_row(
                SELECT_ONE_SQL,
                params![project_id, collection, id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|text| decode_fields(collection, id.as_str(), &text))
            .transpose()
    }

    fn write_fields(
        conn: &Connection,
        project_id: &str,
        collection: &str,
        id: &DocumentId,
        fields: &Map<String, Value>,
    ) -> StoreResult<()> {
        let encoded = serde_json::to_string(fields)?;
        conn.execute(
            UPSERT_SQL,
            params![
                project_id,
                collection,
                id.as_str(),
                encoded,
                Utc::now().timestamp_millis()
            ],
        )?;
        Ok(())
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn get_document(&self, collection: &str, id: &DocumentId) -> StoreResult<Option<Document>> {
        let fields = Self::read_fields(&self.conn, &self.project_id, collection, id)?;
        debug!(
            "event=doc_get module=store status=ok backend=sqlite collection={collection} id={id} found={}",
            fields.is_some()
        );
        Ok(fields.map(|fields| Document::new(id.clone(), fields)))
    }

    fn set_document(
        &self,
        collection: &str,
        id: &DocumentId,
        fields: Map<String, Value>,
        mode: SetMode,
    ) -> StoreResult<()> {
        match mode {
            SetMode::Overwrite => {
                Self::write_fields(&self.conn, &self.project_id, collection, id, &fields)?;
            }
            SetMode::Merge => {
                let tx = self.conn.unchecked_transaction()?;
                let mut merged = Self::read_fields(&tx, &self.project_id, collection, id)?
                    .unwrap_or_default();
                merge_fields(&mut merged, fields);
                Self::write_fields(&tx, &self.project_id, collection, id, &merged)?;
                tx.commit()?;
            }
        }
        debug!(
            "event=doc_set module=store status=ok backend=sqlite collection={collection} id={id} mode={mode:?}"
        );
        Ok(())
    }

    fn delete_document(&self, collection: &str, id: &DocumentId) -> StoreResult<()> {
        let removed = self.conn.execute(
            "DELETE FROM documents
             WHERE project_id = ?1 AND collection = ?2 AND doc_id = ?3;",
            params![self.project_id, collection, id.as_str()],
        )?;
        debug!("event=doc_delete module=store status=ok backend=sqlite collection={collection} id={id} removed={removed}");
        Ok(())
    }

    fn run_query(&self, collection: &str, query: &StructuredQuery) -> StoreResult<Vec<Document>> {
        let mut stmt = self.conn.prepare(
            "SELECT doc_id, fields
             FROM documents
             WHERE project_id = ?1 AND collection = ?2;",
        )?;
        let mut rows = stmt.query(params![self.project_id, collection])?;

        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            let raw_id: String = row.get("doc_id")?;
            let raw_fields: String = row.get("fields")?;
            let id = DocumentId::parse(raw_id.as_str()).map_err(|err| {
                StoreError::InvalidData(format!("{collection}.{raw_id}: {err}"))
            })?;
            let fields = decode_fields(collection, &raw_id, &raw_fields)?;
            documents.push(Document::new(id, fields));
        }

        let hits = apply_query(documents, query);
        debug!(
            "event=doc_query module=store status=ok backend=sqlite collection={collection} filters={} hits={}",
            query.filters.len(),
            hits.len()
        );
        Ok(hits)
    }
}

fn decode_fields(collection: &str, id: &str, raw: &str) -> StoreResult<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(fields) => Ok(fields),
        other => Err(StoreError::InvalidData(format!(
            "{collection}.{id}: expected JSON object, found {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
