use std::time::Duration;

use tracing::{debug, info, warn};

use crate::auth::SessionData;
use crate::cache::CacheTtl;
use crate::models::{Record, Section, UserDocument, Versioned};
use crate::store::{Action, DataSource, LoadingFlag};

use super::SyncService;

// ============================================================================
// Constants
// ============================================================================

/// Retries after the first failed read before falling back to the local mirror.
pub const MAX_LOAD_RETRIES: u32 = 3;

/// First retry delay; doubles on every further attempt (1s, 2s, 4s).
const INITIAL_RETRY_DELAY_SECS: u64 = 1;

/// How a load resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No session, nothing loaded
    SignedOut,
    /// Fresh records were already cached
    Cache,
    Remote,
    LocalFallback { reason: FallbackReason },
    /// Identity changed while the read was in flight; results dropped
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// The remote store has no document for this user
    MissingDocument,
    /// Every read attempt failed
    RetriesExhausted,
    /// The remote refused the read and retrying cannot help
    Rejected,
}

/// Delay before retry number `attempt` (1-based).
fn retry_delay(attempt: u32) -> Duration {
    Duration::from_secs(INITIAL_RETRY_DELAY_SECS << attempt.saturating_sub(1))
}

impl SyncService {
    /// Load the signed-in user's records: cache first, then the remote
    /// document with bounded retries, then the local mirror.
    pub async fn load_user_data(&self, session: Option<&SessionData>) -> LoadOutcome {
        let Some(session) = session else {
            debug!("No session, skipping load");
            return LoadOutcome::SignedOut;
        };
        let generation = self.generation.current();

        if self.load_from_cache().await {
            debug!(user_id = %session.user_id, "Serving user data from cache");
            return LoadOutcome::Cache;
        }

        self.set_loading(true).await;
        let outcome = self.load_from_remote(&session.user_id, generation).await;
        self.set_loading(false).await;

        info!(user_id = %session.user_id, ?outcome, "User data load finished");
        outcome
    }

    /// The remote read covers the quiz and both plans.
    async fn set_loading(&self, value: bool) {
        self.store
            .dispatch_all([
                Action::SetLoading {
                    flag: LoadingFlag::QuizData,
                    value,
                },
                Action::SetLoading {
                    flag: LoadingFlag::Plans,
                    value,
                },
            ])
            .await;
    }

    /// Dispatch cached records if the quiz entry is still fresh by the startup TTL.
    async fn load_from_cache(&self) -> bool {
        if self.store.cached(Section::Quiz, CacheTtl::InitialLoad).await.is_none() {
            return false;
        }

        let mut actions = Vec::new();
        for section in Section::ALL {
            if let Some(record) = self.store.cached(section, CacheTtl::InitialLoad).await {
                actions.push(Action::set_record(record));
            }
        }
        actions.push(Action::DataSourceResolved(DataSource::Cache));
        self.store.dispatch_all(actions).await;
        true
    }

    async fn load_from_remote(&self, user_id: &str, generation: u64) -> LoadOutcome {
        let mut attempt = 0;

        loop {
            let result = self.remote.get_document(&self.collection, user_id).await;
            if !self.generation.is_current(generation) {
                debug!(user_id, "Session changed during load, dropping result");
                return LoadOutcome::Cancelled;
            }

            match result {
                Ok(Some(document)) => {
                    self.apply_remote_document(document).await;
                    return LoadOutcome::Remote;
                }
                Ok(None) => {
                    info!(user_id, "No remote document, using local mirror");
                    return self.fall_back(FallbackReason::MissingDocument).await;
                }
                Err(e) if !e.is_transient() => {
                    warn!(user_id, error = %e, "User document read rejected, using local mirror");
                    return self.fall_back(FallbackReason::Rejected).await;
                }
                Err(e) if attempt < MAX_LOAD_RETRIES => {
                    attempt += 1;
                    let delay = retry_delay(attempt);
                    warn!(
                        user_id,
                        attempt,
                        delay_secs = delay.as_secs(),
                        error = %e,
                        "Failed to read user document, retrying"
                    );
                    self.store.dispatch(Action::RetryScheduled(attempt)).await;
                    tokio::time::sleep(delay).await;

                    if !self.generation.is_current(generation) {
                        debug!(user_id, "Session changed during backoff, abandoning load");
                        return LoadOutcome::Cancelled;
                    }
                }
                Err(e) => {
                    warn!(user_id, error = %e, "Retries exhausted, using local mirror");
                    return self.fall_back(FallbackReason::RetriesExhausted).await;
                }
            }
        }
    }

    async fn apply_remote_document(&self, document: UserDocument) {
        let records: Vec<Record> = document
            .records()
            .into_iter()
            .map(|mut record| {
                if record.version().is_none() {
                    record.set_version(1);
                }
                record
            })
            .collect();

        self.mirror_records(&records);

        let mut actions: Vec<Action> = records.into_iter().map(Action::set_record).collect();
        actions.push(Action::SyncCompleted(self.clock.now()));
        actions.push(Action::RetryScheduled(0));
        actions.push(Action::DataSourceResolved(DataSource::Remote));
        self.store.dispatch_all(actions).await;
    }

    /// Serve whatever the local mirror holds. Runs at most once per load.
    async fn fall_back(&self, reason: FallbackReason) -> LoadOutcome {
        let mut actions = Vec::new();
        match self.mirror.load_document() {
            Some(document) => {
                actions.extend(document.records().into_iter().map(Action::set_record));
            }
            None => debug!("Local mirror is empty"),
        }
        actions.push(Action::DataSourceResolved(DataSource::LocalMirror));
        self.store.dispatch_all(actions).await;
        LoadOutcome::LocalFallback { reason }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::cache::LocalMirror;
    use crate::remote::MemoryDocumentStore;
    use crate::store::Store;

    fn service(remote: &MemoryDocumentStore) -> SyncService {
        SyncService::new(
            Arc::new(Store::default()),
            Arc::new(remote.clone()),
            LocalMirror::in_memory(),
        )
    }

    #[test]
    fn test_retry_delays_double() {
        assert_eq!(retry_delay(1), Duration::from_secs(1));
        assert_eq!(retry_delay(2), Duration::from_secs(2));
        assert_eq!(retry_delay(3), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_signed_out_touches_nothing() {
        let remote = MemoryDocumentStore::new();
        let sync = service(&remote);

        assert_eq!(sync.load_user_data(None).await, LoadOutcome::SignedOut);
        assert_eq!(remote.read_count(), 0);
        assert!(sync.store().read(|s| s.data_source.is_none()).await);
    }

    #[tokio::test]
    async fn test_second_load_is_served_from_cache() {
        let remote = MemoryDocumentStore::new();
        remote.insert("users", "u1", json!({ "quizData": { "goal": ["ganhar-massa"] } }));
        let sync = service(&remote);
        let session = SessionData::new("u1", "t");

        assert_eq!(sync.load_user_data(Some(&session)).await, LoadOutcome::Remote);
        assert_eq!(sync.load_user_data(Some(&session)).await, LoadOutcome::Cache);
        assert_eq!(remote.read_count(), 1);
        assert_eq!(
            sync.store().read(|s| s.data_source).await,
            Some(DataSource::Cache)
        );
    }

    #[tokio::test]
    async fn test_missing_document_falls_back_to_mirror() {
        let remote = MemoryDocumentStore::new();
        let sync = service(&remote);
        sync.mirror().save_diet_plan(&crate::models::DietPlan {
            version: Some(2),
            ..Default::default()
        });

        let outcome = sync.load_user_data(Some(&SessionData::new("u1", "t"))).await;
        assert_eq!(
            outcome,
            LoadOutcome::LocalFallback {
                reason: FallbackReason::MissingDocument
            }
        );

        let state = sync.store().snapshot().await;
        assert_eq!(state.diet_plan.unwrap().version, Some(2));
        assert_eq!(state.data_source, Some(DataSource::LocalMirror));
        assert!(!state.loading_quiz_data);
        assert!(!state.loading_plans);
    }

    #[tokio::test]
    async fn test_malformed_document_is_not_retried() {
        let remote = MemoryDocumentStore::new();
        remote.insert("users", "u1", json!({ "quizData": { "goal": "not-a-list" } }));
        let sync = service(&remote);

        let outcome = sync.load_user_data(Some(&SessionData::new("u1", "t"))).await;

        assert_eq!(
            outcome,
            LoadOutcome::LocalFallback {
                reason: FallbackReason::Rejected
            }
        );
        assert_eq!(remote.read_count(), 1);
        assert_eq!(sync.store().read(|s| s.retry_count).await, 0);
    }

    #[tokio::test]
    async fn test_remote_load_mirrors_and_resets_retries() {
        let remote = MemoryDocumentStore::new();
        remote.insert(
            "users",
            "u1",
            json!({ "workoutPlan": { "days": [], "version": 4 } }),
        );
        let sync = service(&remote);
        sync.store().dispatch(Action::RetryScheduled(2)).await;

        sync.load_user_data(Some(&SessionData::new("u1", "t"))).await;

        let state = sync.store().snapshot().await;
        assert_eq!(state.retry_count, 0);
        assert!(state.last_sync.is_some());
        assert_eq!(sync.mirror().load_workout_plan().unwrap().version, 4);
    }
}
