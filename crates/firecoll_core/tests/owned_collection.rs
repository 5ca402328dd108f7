mod common;

use common::{Note, User};
use firecoll_core::{
    Collection, CollectionError, Document, DocumentId, DocumentStore, MemoryDocumentStore,
    SetMode, StoreResult, StructuredQuery, WriteOptions,
};
use serde_json::{json, Map, Value};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Set {
        id: String,
        fields: Map<String, Value>,
        mode: SetMode,
    },
    Delete {
        id: String,
    },
}

/// Memory store that records every write it receives.
#[derive(Default)]
struct RecordingStore {
    inner: MemoryDocumentStore,
    calls: Mutex<Vec<Call>>,
}

impl RecordingStore {
    fn writes(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl DocumentStore for RecordingStore {
    fn get_document(&self, collection: &str, id: &DocumentId) -> StoreResult<Option<Document>> {
        self.inner.get_document(collection, id)
    }

    fn set_document(
        &self,
        collection: &str,
        id: &DocumentId,
        fields: Map<String, Value>,
        mode: SetMode,
    ) -> StoreResult<()> {
        self.calls.lock().unwrap().push(Call::Set {
            id: id.to_string(),
            fields: fields.clone(),
            mode,
        });
        self.inner.set_document(collection, id, fields, mode)
    }

    fn delete_document(&self, collection: &str, id: &DocumentId) -> StoreResult<()> {
        self.calls.lock().unwrap().push(Call::Delete { id: id.to_string() });
        self.inner.delete_document(collection, id)
    }

    fn run_query(&self, collection: &str, query: &StructuredQuery) -> StoreResult<Vec<Document>> {
        self.inner.run_query(collection, query)
    }
}

fn note_id(note: &Note) -> String {
    note.meta.id.as_ref().expect("stored note has an id").to_string()
}

#[test]
fn forced_ownership_requires_owner_or_force() {
    let store = MemoryDocumentStore::new();
    let notes = Collection::<Note, _>::with_force_ownership(&store, true).unwrap();
    assert!(notes.force_ownership());

    let err = notes.insert(Note::new("draft")).unwrap_err();
    assert!(matches!(err, CollectionError::OwnerRequired { schema: "Note" }));
    assert_eq!(store.len("notes").unwrap(), 0);

    let forced = notes
        .insert_with(Note::new("system"), &WriteOptions::forced())
        .unwrap();
    assert_eq!(forced.owner.created_by, None);

    let owned = notes
        .insert_with(Note::new("mine"), &WriteOptions::owned_by("alice"))
        .unwrap();
    assert_eq!(owned.owner.created_by.as_deref(), Some("alice"));

    let err = notes.delete(&note_id(&owned)).unwrap_err();
    assert_eq!(err.code(), "owner_required");
    assert!(notes.get(&note_id(&owned)).is_ok());
}

#[test]
fn owners_are_stamped_on_insert_and_update() {
    let store = MemoryDocumentStore::new();
    let notes = Collection::<Note, _>::new(&store).unwrap();

    let created = notes
        .insert_with(Note::new("plan"), &WriteOptions::owned_by("alice"))
        .unwrap();
    assert_eq!(created.owner.created_by.as_deref(), Some("alice"));
    assert_eq!(created.owner.updated_by, None);

    let mut edited = created.clone();
    edited.title = "plan v2".to_string();
    notes
        .update_with(edited, &WriteOptions::owned_by("bob"))
        .unwrap();

    let loaded = notes.get(&note_id(&created)).unwrap();
    assert_eq!(loaded.title, "plan v2");
    assert_eq!(loaded.owner.created_by.as_deref(), Some("alice"));
    assert_eq!(loaded.owner.updated_by.as_deref(), Some("bob"));
}

#[test]
fn update_without_owner_clears_previous_actor() {
    let store = MemoryDocumentStore::new();
    let notes = Collection::<Note, _>::new(&store).unwrap();

    let created = notes
        .insert_with(Note::new("a"), &WriteOptions::owned_by("alice"))
        .unwrap();
    let id = note_id(&created);

    let mut edited = notes.get(&id).unwrap();
    edited.title = "b".to_string();
    notes
        .update_with(edited, &WriteOptions::owned_by("bob"))
        .unwrap();

    let mut edited = notes.get(&id).unwrap();
    assert_eq!(edited.owner.updated_by.as_deref(), Some("bob"));
    edited.title = "c".to_string();
    notes.update(edited).unwrap();

    let loaded = notes.get(&id).unwrap();
    assert_eq!(loaded.title, "c");
    assert_eq!(loaded.owner.updated_by, None);
    assert_eq!(loaded.owner.created_by.as_deref(), Some("alice"));

    let raw = store
        .get_document("notes", &DocumentId::parse(id.as_str()).unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(raw.fields["updated_by"], Value::Null);
}

#[test]
fn owned_delete_marks_document_before_removing_it() {
    let store = RecordingStore::default();
    let notes = Collection::<Note, _>::new(&store).unwrap();

    let created = notes
        .insert_with(Note::new("temp"), &WriteOptions::owned_by("alice"))
        .unwrap();
    let id = note_id(&created);
    store.clear();

    notes
        .delete_with(&id, &WriteOptions::owned_by("bob"))
        .unwrap();

    let writes = store.writes();
    assert_eq!(writes.len(), 2);
    match &writes[0] {
        Call::Set {
            id: marked,
            fields,
            mode,
        } => {
            assert_eq!(marked, &id);
            assert_eq!(*mode, SetMode::Merge);
            assert_eq!(fields["deleted"], json!(true));
            assert_eq!(fields["updated_by"], json!("bob"));
            assert!(fields["updated_at"].is_string());
        }
        other => panic!("expected merge marker first, got {other:?}"),
    }
    assert_eq!(writes[1], Call::Delete { id: id.clone() });
    assert!(notes.get(&id).unwrap_err().is_not_found());
}

#[test]
fn delete_without_owner_skips_the_marker() {
    let store = RecordingStore::default();
    let notes = Collection::<Note, _>::new(&store).unwrap();

    let created = notes.insert(Note::new("anonymous")).unwrap();
    let id = note_id(&created);
    store.clear();

    notes.delete(&id).unwrap();
    assert_eq!(store.writes(), vec![Call::Delete { id }]);
}

#[test]
fn unowned_schemas_ignore_owner_on_delete() {
    let store = RecordingStore::default();
    let users = Collection::<User, _>::new(&store).unwrap();

    let created = users.insert(User::new("owner@doe.com")).unwrap();
    let id = created.id().to_string();
    store.clear();

    users
        .delete_with(&id, &WriteOptions::owned_by("alice"))
        .unwrap();
    assert_eq!(store.writes(), vec![Call::Delete { id }]);
}

#[test]
fn owner_check_happens_before_any_write() {
    let store = RecordingStore::default();
    let notes = Collection::<Note, _>::with_force_ownership(&store, true).unwrap();

    let created = notes
        .insert_with(Note::new("locked"), &WriteOptions::forced())
        .unwrap();
    store.clear();

    let err = notes.update(created).unwrap_err();
    assert!(matches!(err, CollectionError::OwnerRequired { .. }));
    assert!(store.writes().is_empty());
}
