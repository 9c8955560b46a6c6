//! Remote sync: loading, pushing, plan generation and push subscriptions.
//!
//! `SyncService` owns the handles every sync action needs (the state store,
//! the remote document store, the local mirror) and the session generation
//! that lets in-flight work notice it has been superseded. Actions never
//! return errors; failures end up in `State::error`, `State::data_source`
//! or the returned outcome.

pub mod generation;
pub mod loader;
pub mod plans;
pub mod push;
pub mod subscription;

use std::sync::Arc;

use tracing::warn;

use crate::api::ApiClient;
use crate::cache::LocalMirror;
use crate::clock::{system_clock, SharedClock};
use crate::models::Record;
use crate::remote::{DocumentStore, USERS_COLLECTION};
use crate::store::Store;

pub use generation::SessionGeneration;
pub use loader::{FallbackReason, LoadOutcome, MAX_LOAD_RETRIES};
pub use plans::{PlanOutcome, GENERATE_PLANS_FALLBACK_ERROR};
pub use push::SyncOutcome;
pub use subscription::{SubscriptionKey, SubscriptionRegistry, USER_DATA_SUBSCRIPTION};

/// Remote store, local mirror and plan backend scoped to one session.
pub struct SessionHandles {
    pub remote: Arc<dyn DocumentStore>,
    pub mirror: LocalMirror,
    pub api: Option<ApiClient>,
}

#[derive(Clone)]
pub struct SyncService {
    store: Arc<Store>,
    remote: Arc<dyn DocumentStore>,
    api: Option<ApiClient>,
    mirror: LocalMirror,
    generation: Arc<SessionGeneration>,
    subscriptions: Arc<SubscriptionRegistry>,
    collection: String,
    clock: SharedClock,
}

impl SyncService {
    pub fn new(store: Arc<Store>, remote: Arc<dyn DocumentStore>, mirror: LocalMirror) -> Self {
        Self {
            store,
            remote,
            api: None,
            mirror,
            generation: Arc::new(SessionGeneration::new()),
            subscriptions: Arc::new(SubscriptionRegistry::new()),
            collection: USERS_COLLECTION.to_string(),
            clock: system_clock(),
        }
    }

    /// Backend used for plan generation.
    pub fn with_api(mut self, api: ApiClient) -> Self {
        self.api = Some(api);
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// A service for another session: same state store, generation and
    /// subscription registry, with that session's remote, mirror and backend.
    pub fn rebind(&self, handles: SessionHandles) -> Self {
        Self {
            remote: handles.remote,
            mirror: handles.mirror,
            api: handles.api,
            ..self.clone()
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn mirror(&self) -> &LocalMirror {
        &self.mirror
    }

    pub fn generation(&self) -> &Arc<SessionGeneration> {
        &self.generation
    }

    pub fn subscriptions(&self) -> &Arc<SubscriptionRegistry> {
        &self.subscriptions
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn mirror_records<'a>(&self, records: impl IntoIterator<Item = &'a Record>) {
        for record in records {
            if !self.mirror.save_record(record) {
                warn!(section = record.section().field_name(), "Record not mirrored locally");
            }
        }
    }
}
