//! Remote document store.
//!
//! The layer talks to the remote database only through `DocumentStore`:
//! read a user document, merge-write part of it, commit one section with an
//! atomic version bump, and subscribe to pushes. Two adapters ship here:
//!
//! - `MemoryDocumentStore`: in-process, with broadcast pushes and failure injection
//! - `HttpDocumentStore`: JSON over HTTP via `ApiClient`, pushes by polling

pub mod error;
pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::models::{Section, UserDocument};

pub use error::RemoteError;
pub use http::HttpDocumentStore;
pub use memory::MemoryDocumentStore;

/// Collection holding one document per user.
pub const USERS_COLLECTION: &str = "users";

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// `Ok(None)` when the document does not exist.
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<UserDocument>, RemoteError>;

    /// Write `patch` (a JSON object of top-level sections). With `merge`,
    /// nested objects are merged into the stored document instead of replacing it.
    async fn set_document(&self, collection: &str, id: &str, patch: Value, merge: bool) -> Result<(), RemoteError>;

    /// Atomically write one section with version `max(stored, base_version) + 1`.
    /// Returns the committed version.
    async fn commit_section(
        &self,
        collection: &str,
        id: &str,
        section: Section,
        data: Value,
        base_version: u64,
    ) -> Result<u64, RemoteError>;

    /// Forward every change of the document to `sink` until the returned
    /// handle is torn down.
    async fn subscribe(
        &self,
        collection: &str,
        id: &str,
        sink: mpsc::Sender<UserDocument>,
    ) -> Result<Subscription, RemoteError>;
}

/// A live listener. Tearing down happens at most once: on `cancel` or on drop.
pub struct Subscription {
    teardown: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(teardown: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    /// Stop a spawned forwarding task when the handle goes away.
    pub fn from_task(handle: tokio::task::JoinHandle<()>) -> Self {
        Self::new(move || handle.abort())
    }

    pub fn cancel(mut self) {
        self.run_teardown();
    }

    pub fn is_active(&self) -> bool {
        self.teardown.is_some()
    }

    fn run_teardown(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_teardown();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Version stored in a raw section value, 0 when absent.
pub(crate) fn stored_version(section_value: Option<&Value>) -> u64 {
    section_value
        .and_then(|v| v.get("version"))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

/// Recursively merge `patch` into `target`. Non-object values replace.
pub(crate) fn merge_json(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                if value.is_object() {
                    if let Some(existing) = target.get_mut(&key).filter(|e| e.is_object()) {
                        merge_json(existing, value);
                        continue;
                    }
                }
                target.insert(key, value);
            }
        }
        (target, patch) => *target = patch,
    }
}
