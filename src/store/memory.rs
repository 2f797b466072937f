//! In-process [`DocumentStore`] with failure injection.
//!
//! Behaves like a remote document database (backend-assigned ids, server
//! timestamps, ordered queries) without leaving the process. Hosts can embed
//! it; tests use it to drive the remote path and to make writes or reads fail.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use super::backend::{BackendError, Collection, Document, DocumentStore, DocumentWrite, Query};

/// Remote-compatible document store kept in memory.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: Mutex<HashMap<Collection, Vec<Document>>>,
    next_id: AtomicU64,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryDocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Make every subsequent read fail (or succeed again).
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Relaxed);
    }

    /// All documents in `collection`, in insertion order.
    #[must_use]
    pub fn documents(&self, collection: Collection) -> Vec<Document> {
        self.collections
            .lock()
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    fn allocate_id(&self, collection: Collection) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{n:06}", collection.name())
    }

    fn check_write(&self, collection: Collection) -> Result<(), BackendError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(BackendError::Write {
                collection,
                details: "injected write failure".to_string(),
            });
        }
        Ok(())
    }

    fn check_read(&self, collection: Collection) -> Result<(), BackendError> {
        if self.fail_reads.load(Ordering::Relaxed) {
            return Err(BackendError::Read {
                collection,
                details: "injected read failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create(
        &self,
        collection: Collection,
        write: DocumentWrite,
    ) -> Result<String, BackendError> {
        self.check_write(collection)?;
        let id = self.allocate_id(collection);
        let fields = write.resolve(Utc::now());
        self.collections
            .lock()
            .entry(collection)
            .or_default()
            .push(Document {
                id: id.clone(),
                fields,
            });
        Ok(id)
    }

    async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Document>, BackendError> {
        self.check_read(collection)?;
        Ok(self
            .collections
            .lock()
            .get(&collection)
            .and_then(|docs| docs.iter().find(|doc| doc.id == id).cloned()))
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        write: DocumentWrite,
    ) -> Result<(), BackendError> {
        self.check_write(collection)?;
        let fields = write.resolve(Utc::now());
        let mut collections = self.collections.lock();
        let doc = collections
            .get_mut(&collection)
            .and_then(|docs| docs.iter_mut().find(|doc| doc.id == id))
            .ok_or_else(|| BackendError::NotFound {
                collection,
                id: id.to_string(),
            })?;
        doc.fields.extend(fields);
        Ok(())
    }

    async fn set(
        &self,
        collection: Collection,
        id: &str,
        write: DocumentWrite,
    ) -> Result<(), BackendError> {
        self.check_write(collection)?;
        let fields = write.resolve(Utc::now());
        let mut collections = self.collections.lock();
        let docs = collections.entry(collection).or_default();
        match docs.iter_mut().find(|doc| doc.id == id) {
            Some(doc) => doc.fields = fields,
            None => docs.push(Document {
                id: id.to_string(),
                fields,
            }),
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: Collection,
        query: &Query,
    ) -> Result<Vec<Document>, BackendError> {
        self.check_read(collection)?;
        let docs = self.documents(collection);
        Ok(query.apply(docs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::backend::Direction;
    use crate::store::records::fields;
    use serde_json::json;

    fn write(value: serde_json::Value) -> DocumentWrite {
        DocumentWrite::new(fields(value))
    }

    #[tokio::test]
    async fn create_assigns_ids_and_stamps() {
        let store = MemoryDocumentStore::new();
        let id = store
            .create(
                Collection::Analytics,
                write(json!({"eventName": "page_view"})).stamp("timestamp"),
            )
            .await
            .unwrap();
        assert!(id.starts_with("analytics-"));
        let doc = store.get(Collection::Analytics, &id).await.unwrap().unwrap();
        assert!(doc.fields["timestamp"].is_string());
    }

    #[tokio::test]
    async fn update_merges_and_requires_existing() {
        let store = MemoryDocumentStore::new();
        let id = store
            .create(Collection::UserPreferences, write(json!({"a": 1, "b": 2})))
            .await
            .unwrap();
        store
            .update(Collection::UserPreferences, &id, write(json!({"b": 3})))
            .await
            .unwrap();
        let doc = store
            .get(Collection::UserPreferences, &id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.fields, fields(json!({"a": 1, "b": 3})));

        let err = store
            .update(Collection::UserPreferences, "nope", write(json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::NotFound { .. }));
    }

    #[tokio::test]
    async fn set_replaces_wholesale() {
        let store = MemoryDocumentStore::new();
        store
            .set(Collection::UserPreferences, "u1", write(json!({"a": 1, "b": 2})))
            .await
            .unwrap();
        store
            .set(Collection::UserPreferences, "u1", write(json!({"c": 3})))
            .await
            .unwrap();
        let docs = store.documents(Collection::UserPreferences);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].fields, fields(json!({"c": 3})));
    }

    #[tokio::test]
    async fn query_orders_newest_first() {
        let store = MemoryDocumentStore::new();
        for n in 0..3 {
            store
                .create(
                    Collection::Analytics,
                    write(json!({"n": n})).stamp("timestamp"),
                )
                .await
                .unwrap();
        }
        let out = store
            .query(
                Collection::Analytics,
                &Query::new().order_by("timestamp", Direction::Descending),
            )
            .await
            .unwrap();
        let ns: Vec<i64> = out
            .iter()
            .map(|d| d.fields["n"].as_i64().unwrap())
            .collect();
        assert_eq!(ns, vec![2, 1, 0]);
    }

    #[tokio::test]
    async fn injected_failures_surface() {
        let store = MemoryDocumentStore::new();
        store.set_fail_writes(true);
        assert!(matches!(
            store.create(Collection::Analytics, write(json!({}))).await,
            Err(BackendError::Write { .. })
        ));
        store.set_fail_writes(false);
        store.set_fail_reads(true);
        assert!(matches!(
            store.query(Collection::Analytics, &Query::new()).await,
            Err(BackendError::Read { .. })
        ));
    }
}
