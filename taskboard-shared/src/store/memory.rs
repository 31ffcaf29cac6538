//! Process-local document store
//!
//! Keeps every collection in memory behind a single `RwLock`. Used when no
//! database URL is configured and throughout the test suites.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::filter::{values_equal, Filter, Update};
use super::identifier::{DocumentId, ObjectId};
use super::{
    Collection, Cursor, Document, DocumentStore, StoreError, StoreResult, UpdateOutcome, ID_FIELD,
};

/// In-memory [`DocumentStore`]
///
/// Documents are kept in insertion order, which is also the order reads
/// return them in.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Ensures `doc` carries a usable primary key, generating one if needed
pub(crate) fn assign_id(doc: &mut Document) -> StoreResult<DocumentId> {
    let needs_id = match doc.get(ID_FIELD) {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    };
    if needs_id {
        let id = DocumentId::from(ObjectId::new());
        doc.insert(ID_FIELD.to_string(), id.to_value());
        return Ok(id);
    }

    doc.get(ID_FIELD)
        .and_then(DocumentId::from_value)
        .ok_or_else(|| StoreError::InvalidQuery(format!("unsupported {ID_FIELD} value")))
}

/// Finds a unique-index conflict between `candidate` and the other documents
fn unique_conflict(
    collection: Collection,
    docs: &[Document],
    candidate: &Document,
    skip: Option<usize>,
) -> Option<StoreError> {
    let mut keys = vec![ID_FIELD];
    keys.extend_from_slice(collection.unique_fields());

    for key in keys {
        let Some(value) = candidate.get(key).filter(|v| !v.is_null()) else {
            continue;
        };
        let clash = docs
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != skip)
            .any(|(_, other)| other.get(key).is_some_and(|o| values_equal(o, value)));
        if clash {
            return Some(StoreError::DuplicateKey {
                collection,
                key: format!("{key}: {value}"),
            });
        }
    }
    None
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn find(&self, collection: Collection, filter: &Filter) -> StoreResult<Cursor> {
        let matcher = filter.compile()?;
        let collections = self.collections.read().await;
        let docs = collections
            .get(&collection)
            .map(|docs| docs.iter().filter(|d| matcher.matches(d)).cloned().collect())
            .unwrap_or_default();
        Ok(Cursor::new(docs))
    }

    async fn insert_one(&self, collection: Collection, mut doc: Document) -> StoreResult<DocumentId> {
        let id = assign_id(&mut doc)?;
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();

        if let Some(err) = unique_conflict(collection, docs, &doc, None) {
            return Err(err);
        }
        docs.push(doc);
        Ok(id)
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<UpdateOutcome> {
        if update.fields().contains_key(ID_FIELD) {
            return Err(StoreError::InvalidQuery(format!(
                "{ID_FIELD} cannot be updated"
            )));
        }

        let matcher = filter.compile()?;
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(&collection) else {
            return Ok(UpdateOutcome::default());
        };
        let Some(index) = docs.iter().position(|d| matcher.matches(d)) else {
            return Ok(UpdateOutcome::default());
        };

        let mut updated = docs[index].clone();
        let changed = update.apply(&mut updated);
        if changed {
            if let Some(err) = unique_conflict(collection, docs, &updated, Some(index)) {
                return Err(err);
            }
            docs[index] = updated;
        }

        Ok(UpdateOutcome {
            matched: 1,
            modified: u64::from(changed),
        })
    }

    async fn delete_one(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        let matcher = filter.compile()?;
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(&collection) else {
            return Ok(0);
        };

        match docs.iter().position(|d| matcher.matches(d)) {
            Some(index) => {
                docs.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn count(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        let matcher = filter.compile()?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .map(|docs| docs.iter().filter(|d| matcher.matches(d)).count() as u64)
            .unwrap_or(0))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_insert_generates_object_id() {
        let store = MemoryStore::new();
        let id = store
            .insert_one(Collection::Tasks, doc(json!({"title": "a"})))
            .await
            .unwrap();
        assert!(matches!(id, DocumentId::ObjectId(_)));

        let found: Vec<_> = store
            .find(Collection::Tasks, &Filter::eq(ID_FIELD, id.to_value()))
            .await
            .unwrap()
            .collect();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_insert_with_empty_id_generates_one() {
        let store = MemoryStore::new();
        let id = store
            .insert_one(Collection::Tasks, doc(json!({"_id": "", "title": "a"})))
            .await
            .unwrap();
        assert!(matches!(id, DocumentId::ObjectId(_)));
    }

    #[tokio::test]
    async fn test_insert_keeps_caller_id() {
        let store = MemoryStore::new();
        let id = store
            .insert_one(Collection::Tasks, doc(json!({"_id": "0001"})))
            .await
            .unwrap();
        assert_eq!(id, DocumentId::Text("0001".to_string()));
    }

    #[tokio::test]
    async fn test_duplicate_id_and_email_rejected() {
        let store = MemoryStore::new();
        store
            .insert_one(Collection::Users, doc(json!({"_id": "u1", "email": "a@x.io"})))
            .await
            .unwrap();

        let err = store
            .insert_one(Collection::Users, doc(json!({"_id": "u1", "email": "b@x.io"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));

        let err = store
            .insert_one(Collection::Users, doc(json!({"_id": "u2", "email": "a@x.io"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));

        // Email is only unique for users
        store
            .insert_one(Collection::Projects, doc(json!({"email": "a@x.io"})))
            .await
            .unwrap();
        store
            .insert_one(Collection::Projects, doc(json!({"email": "a@x.io"})))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_reports_matched_and_modified() {
        let store = MemoryStore::new();
        store
            .insert_one(Collection::Tasks, doc(json!({"_id": "t1", "status": "Todo"})))
            .await
            .unwrap();

        let filter = Filter::eq(ID_FIELD, "t1");
        let update = Update::new().set("status", "Done");

        let first = store.update_one(Collection::Tasks, &filter, &update).await.unwrap();
        assert_eq!(first, UpdateOutcome { matched: 1, modified: 1 });

        let second = store.update_one(Collection::Tasks, &filter, &update).await.unwrap();
        assert_eq!(second, UpdateOutcome { matched: 1, modified: 0 });

        let missing = store
            .update_one(Collection::Tasks, &Filter::eq(ID_FIELD, "nope"), &update)
            .await
            .unwrap();
        assert_eq!(missing, UpdateOutcome::default());
    }

    #[tokio::test]
    async fn test_update_cannot_change_id() {
        let store = MemoryStore::new();
        let err = store
            .update_one(Collection::Tasks, &Filter::All, &Update::new().set("_id", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_update_into_duplicate_email_rejected() {
        let store = MemoryStore::new();
        for (id, email) in [("u1", "a@x.io"), ("u2", "b@x.io")] {
            store
                .insert_one(Collection::Users, doc(json!({"_id": id, "email": email})))
                .await
                .unwrap();
        }

        let err = store
            .update_one(
                Collection::Users,
                &Filter::eq(ID_FIELD, "u2"),
                &Update::new().set("email", "a@x.io"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));
    }

    #[tokio::test]
    async fn test_delete_one_and_count() {
        let store = MemoryStore::new();
        for i in 0..3 {
            store
                .insert_one(Collection::Tasks, doc(json!({"n": i, "kind": "x"})))
                .await
                .unwrap();
        }

        let kind = Filter::eq("kind", "x");
        assert_eq!(store.count(Collection::Tasks, &kind).await.unwrap(), 3);
        assert_eq!(store.delete_one(Collection::Tasks, &kind).await.unwrap(), 1);
        assert_eq!(store.count(Collection::Tasks, &kind).await.unwrap(), 2);
        assert_eq!(
            store
                .delete_one(Collection::Tasks, &Filter::eq("kind", "y"))
                .await
                .unwrap(),
            0
        );
        assert_eq!(store.count(Collection::Users, &Filter::All).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reads_preserve_insertion_order() {
        let store = MemoryStore::new();
        for name in ["c", "a", "b"] {
            store
                .insert_one(Collection::Projects, doc(json!({"name": name})))
                .await
                .unwrap();
        }
        let names: Vec<_> = store
            .find(Collection::Projects, &Filter::All)
            .await
            .unwrap()
            .map(|d| d["name"].clone())
            .collect();
        assert_eq!(names, vec![json!("c"), json!("a"), json!("b")]);
    }
}
