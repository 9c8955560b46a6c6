//! In-process document store.
//!
//! Behaves like the hosted store closely enough for tests and demo runs:
//! merge writes, atomic section commits, and push notifications to
//! subscribers (including an initial snapshot on subscribe).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, trace};

use crate::models::{Section, UserDocument};

use super::{merge_json, stored_version, DocumentStore, RemoteError, Subscription};

/// Buffer for change notifications; slow subscribers skip ahead.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

type DocKey = (String, String);

#[derive(Clone)]
pub struct MemoryDocumentStore {
    inner: Arc<Inner>,
}

struct Inner {
    documents: Mutex<HashMap<DocKey, Value>>,
    changes: broadcast::Sender<(DocKey, Value)>,
    failing_reads: AtomicU32,
    fail_writes: AtomicBool,
    reads: AtomicU32,
    writes: AtomicU32,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                documents: Mutex::new(HashMap::new()),
                changes,
                failing_reads: AtomicU32::new(0),
                fail_writes: AtomicBool::new(false),
                reads: AtomicU32::new(0),
                writes: AtomicU32::new(0),
            }),
        }
    }

    fn key(collection: &str, id: &str) -> DocKey {
        (collection.to_string(), id.to_string())
    }

    fn documents(&self) -> std::sync::MutexGuard<'_, HashMap<DocKey, Value>> {
        self.inner.documents.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace a document wholesale and notify subscribers.
    pub fn insert(&self, collection: &str, id: &str, document: Value) {
        let key = Self::key(collection, id);
        self.documents().insert(key.clone(), document.clone());
        self.notify(key, document);
    }

    /// The raw stored JSON, for assertions.
    pub fn raw(&self, collection: &str, id: &str) -> Option<Value> {
        self.documents().get(&Self::key(collection, id)).cloned()
    }

    /// Make the next `n` reads fail with `RemoteError::Unavailable`.
    pub fn fail_next_reads(&self, n: u32) {
        self.inner.failing_reads.store(n, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn read_count(&self) -> u32 {
        self.inner.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> u32 {
        self.inner.writes.load(Ordering::SeqCst)
    }

    fn notify(&self, key: DocKey, document: Value) {
        // No receivers is fine
        let _ = self.inner.changes.send((key, document));
    }

    fn check_writable(&self) -> Result<(), RemoteError> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("simulated write failure".to_string()));
        }
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<UserDocument>, RemoteError> {
        self.inner.reads.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .inner
            .failing_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(RemoteError::Unavailable("simulated read failure".to_string()));
        }

        let raw = self.documents().get(&Self::key(collection, id)).cloned();
        match raw {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn set_document(&self, collection: &str, id: &str, patch: Value, merge: bool) -> Result<(), RemoteError> {
        self.check_writable()?;
        let key = Self::key(collection, id);
        let updated = {
            let mut documents = self.documents();
            let document = documents
                .entry(key.clone())
                .or_insert_with(|| Value::Object(Default::default()));
            if merge {
                merge_json(document, patch);
            } else {
                *document = patch;
            }
            document.clone()
        };
        trace!(collection, id, merge, "Document written");
        self.notify(key, updated);
        Ok(())
    }

    async fn commit_section(
        &self,
        collection: &str,
        id: &str,
        section: Section,
        mut data: Value,
        base_version: u64,
    ) -> Result<u64, RemoteError> {
        self.check_writable()?;
        let key = Self::key(collection, id);
        let field = section.field_name();

        let (version, updated) = {
            let mut documents = self.documents();
            let document = documents
                .entry(key.clone())
                .or_insert_with(|| Value::Object(Default::default()));

            let stored = stored_version(document.get(field));
            let version = stored.max(base_version) + 1;
            if let Value::Object(ref mut map) = data {
                map.insert("version".to_string(), Value::from(version));
            }
            let mut patch = serde_json::Map::new();
            patch.insert(field.to_string(), data);
            merge_json(document, Value::Object(patch));
            (version, document.clone())
        };

        debug!(collection, id, section = field, version, "Section committed");
        self.notify(key, updated);
        Ok(version)
    }

    async fn subscribe(
        &self,
        collection: &str,
        id: &str,
        sink: mpsc::Sender<UserDocument>,
    ) -> Result<Subscription, RemoteError> {
        let key = Self::key(collection, id);
        let mut changes = self.inner.changes.subscribe();

        let current = self.documents().get(&key).cloned();
        if let Some(current) = current {
            let document: UserDocument = serde_json::from_value(current)?;
            let _ = sink.send(document).await;
        }

        let handle = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok((changed, value)) if changed == key => {
                        let document: UserDocument = match serde_json::from_value(value) {
                            Ok(doc) => doc,
                            Err(e) => {
                                debug!(error = %e, "Skipping malformed pushed document");
                                continue;
                            }
                        };
                        if sink.send(document).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Subscriber lagged behind document changes");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(Subscription::from_task(handle))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_missing_document_is_none() {
        let store = MemoryDocumentStore::new();
        assert!(store.get_document("users", "nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fail_next_reads_counts_down() {
        let store = MemoryDocumentStore::new();
        store.insert("users", "u1", json!({}));
        store.fail_next_reads(2);

        assert!(store.get_document("users", "u1").await.is_err());
        assert!(store.get_document("users", "u1").await.is_err());
        assert!(store.get_document("users", "u1").await.is_ok());
        assert_eq!(store.read_count(), 3);
    }

    #[tokio::test]
    async fn test_commit_section_bumps_from_highest_known_version() {
        let store = MemoryDocumentStore::new();
        store.insert("users", "u1", json!({ "quizData": { "goal": [], "version": 5 } }));

        // Caller thinks it is at 2, store is at 5
        let v = store
            .commit_section("users", "u1", Section::Quiz, json!({ "goal": ["x"] }), 2)
            .await
            .unwrap();
        assert_eq!(v, 6);

        // Caller ahead of store (fresh document)
        let v = store
            .commit_section("users", "u2", Section::Quiz, json!({ "goal": [] }), 2)
            .await
            .unwrap();
        assert_eq!(v, 3);
        assert_eq!(store.raw("users", "u2").unwrap()["quizData"]["version"], 3);
    }

    #[tokio::test]
    async fn test_merge_write_keeps_other_sections() {
        let store = MemoryDocumentStore::new();
        store.insert("users", "u1", json!({ "quizData": { "goal": ["a"], "version": 1 } }));
        store
            .set_document("users", "u1", json!({ "progressData": { "streakDays": 3 } }), true)
            .await
            .unwrap();

        let doc = store.get_document("users", "u1").await.unwrap().unwrap();
        assert_eq!(doc.quiz_data.unwrap().goal, vec!["a"]);
        assert_eq!(doc.progress_data.unwrap().streak_days, 3);
    }

    #[tokio::test]
    async fn test_failed_writes_leave_document_untouched() {
        let store = MemoryDocumentStore::new();
        store.set_fail_writes(true);
        let result = store
            .set_document("users", "u1", json!({ "progressData": {} }), true)
            .await;
        assert!(matches!(result, Err(RemoteError::Unavailable(_))));
        assert!(store.raw("users", "u1").is_none());
    }

    #[tokio::test]
    async fn test_subscribe_pushes_snapshot_then_changes() {
        let store = MemoryDocumentStore::new();
        store.insert("users", "u1", json!({ "dietPlan": { "meals": [], "version": 1 } }));

        let (tx, mut rx) = mpsc::channel(8);
        let sub = store.subscribe("users", "u1", tx).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.diet_plan.unwrap().version, Some(1));

        // Other documents are not forwarded
        store.insert("users", "u2", json!({ "dietPlan": { "version": 9 } }));
        store.insert("users", "u1", json!({ "dietPlan": { "meals": [], "version": 2 } }));

        let second = rx.recv().await.unwrap();
        assert_eq!(second.diet_plan.unwrap().version, Some(2));

        sub.cancel();
        tokio::task::yield_now().await;
        store.insert("users", "u1", json!({ "dietPlan": { "version": 3 } }));
        // Sender dropped with the aborted task, so the channel closes
        assert!(rx.recv().await.is_none());
    }
}
