//! Push listeners on the user's remote document.
//!
//! Handles live in a `SubscriptionRegistry` keyed by `(user_id, name)`.
//! Registering a key that is already present tears the old handle down
//! first, so re-subscribing can never leak a listener.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::auth::SessionData;
use crate::cache::LocalMirror;
use crate::models::{Section, UserDocument, Versioned};
use crate::remote::{RemoteError, Subscription};
use crate::store::{should_replace, Action, Store};

use super::{SessionGeneration, SyncService};

/// Name of the listener on the whole user document.
pub const USER_DATA_SUBSCRIPTION: &str = "userData";

/// Pushed documents buffered between the store adapter and the forwarder.
const PUSH_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionKey {
    pub user_id: String,
    pub name: String,
}

impl SubscriptionKey {
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
        }
    }

    pub fn user_data(user_id: impl Into<String>) -> Self {
        Self::new(user_id, USER_DATA_SUBSCRIPTION)
    }
}

impl std::fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.user_id, self.name)
    }
}

/// Live subscription handles. Teardowns run outside the lock.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    handles: Mutex<HashMap<SubscriptionKey, Subscription>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn handles(&self) -> std::sync::MutexGuard<'_, HashMap<SubscriptionKey, Subscription>> {
        self.handles.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `subscription`, tearing down any handle already under `key`.
    pub fn insert(&self, key: SubscriptionKey, subscription: Subscription) {
        let previous = self.handles().insert(key.clone(), subscription);
        if let Some(previous) = previous {
            debug!(key = %key, "Replacing existing subscription");
            previous.cancel();
        }
    }

    /// Tear down the handle under `key`. Returns whether one was registered.
    pub fn remove(&self, key: &SubscriptionKey) -> bool {
        let removed = self.handles().remove(key);
        match removed {
            Some(subscription) => {
                subscription.cancel();
                true
            }
            None => false,
        }
    }

    /// Tear down every handle belonging to `user_id`.
    pub fn remove_user(&self, user_id: &str) -> usize {
        let removed: Vec<Subscription> = {
            let mut handles = self.handles();
            let keys: Vec<SubscriptionKey> = handles
                .keys()
                .filter(|k| k.user_id == user_id)
                .cloned()
                .collect();
            keys.iter().filter_map(|k| handles.remove(k)).collect()
        };
        let count = removed.len();
        removed.into_iter().for_each(Subscription::cancel);
        count
    }

    /// Tear down everything, returning the keys that were registered.
    pub fn drain(&self) -> Vec<SubscriptionKey> {
        let removed: Vec<(SubscriptionKey, Subscription)> = self.handles().drain().collect();
        removed
            .into_iter()
            .map(|(key, subscription)| {
                subscription.cancel();
                key
            })
            .collect()
    }

    /// Tear down everything.
    pub fn clear(&self) -> usize {
        self.drain().len()
    }

    pub fn len(&self) -> usize {
        self.handles().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles().is_empty()
    }

    pub fn contains(&self, key: &SubscriptionKey) -> bool {
        self.handles().contains_key(key)
    }
}

impl SyncService {
    /// Listen for pushes on the user's document and apply the tracked
    /// records whose version advanced.
    pub async fn subscribe_to_user_data(&self, session: &SessionData) -> Result<(), RemoteError> {
        let key = SubscriptionKey::user_data(&session.user_id);
        let (tx, rx) = mpsc::channel(PUSH_CHANNEL_CAPACITY);

        let listener = self
            .remote
            .subscribe(&self.collection, &session.user_id, tx)
            .await?;

        let forwarder = tokio::spawn(forward_pushes(
            rx,
            self.store.clone(),
            self.mirror.clone(),
            self.generation.clone(),
            self.generation.current(),
            key.clone(),
        ));

        let subscription = Subscription::new(move || {
            forwarder.abort();
            listener.cancel();
        });

        self.subscriptions.insert(key.clone(), subscription);
        self.store
            .dispatch(Action::SubscriptionAdded(key.name.clone()))
            .await;
        info!(key = %key, "Subscribed to user data");
        Ok(())
    }

    /// Stop listening for `user_id`. Calling it again is harmless.
    pub async fn unsubscribe_from_user_data(&self, user_id: &str) -> bool {
        let key = SubscriptionKey::user_data(user_id);
        if !self.subscriptions.remove(&key) {
            debug!(key = %key, "No subscription to remove");
            return false;
        }
        self.store
            .dispatch(Action::SubscriptionRemoved(key.name))
            .await;
        info!(user_id, "Unsubscribed from user data");
        true
    }

    /// Tear down every listener, each exactly once.
    pub async fn unsubscribe_all(&self) -> usize {
        let keys = self.subscriptions.drain();
        if keys.is_empty() {
            return 0;
        }
        let count = keys.len();
        debug!(count, "Tore down subscriptions");
        self.store
            .dispatch_all(keys.into_iter().map(|key| Action::SubscriptionRemoved(key.name)))
            .await;
        count
    }
}

async fn forward_pushes(
    mut rx: mpsc::Receiver<UserDocument>,
    store: Arc<Store>,
    mirror: LocalMirror,
    generation: Arc<SessionGeneration>,
    captured: u64,
    key: SubscriptionKey,
) {
    while let Some(document) = rx.recv().await {
        if !generation.is_current(captured) {
            debug!(key = %key, "Session changed, ignoring push");
            break;
        }
        apply_push(&store, &mirror, &document, || generation.is_current(captured)).await;
    }
    debug!(key = %key, "Push channel closed");
}

/// Dispatch the tracked records from `document` that are newer than the held ones.
async fn apply_push(
    store: &Store,
    mirror: &LocalMirror,
    document: &UserDocument,
    still_current: impl Fn() -> bool,
) {
    let held: Vec<(Section, Option<u64>)> = store
        .read(|s| {
            Section::TRACKED
                .iter()
                .map(|&section| (section, s.held_version(section)))
                .collect()
        })
        .await;

    let mut advanced = Vec::new();
    for (section, held_version) in held {
        let Some(record) = document.record(section) else {
            continue;
        };
        if should_replace(held_version, record.version()) {
            advanced.push(record);
        } else {
            debug!(section = section.field_name(), ?held_version, "Stale push ignored");
        }
    }
    if advanced.is_empty() || !still_current() {
        return;
    }

    for record in &advanced {
        if !mirror.save_record(record) {
            warn!(section = record.section().field_name(), "Failed to mirror pushed record");
        }
    }
    debug!(count = advanced.len(), "Applying pushed records");
    store
        .dispatch_all(advanced.into_iter().map(Action::set_record))
        .await;
}
