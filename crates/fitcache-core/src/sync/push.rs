use futures::future;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::models::{ProgressPatch, QuizData, Section};
use crate::remote::RemoteError;
use crate::store::{Action, LoadingFlag};

use super::SyncService;

/// How a write to the remote store resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Offline or signed out; nothing was sent
    Skipped,
    /// Written. Carries the committed quiz version when the quiz was pushed.
    Synced { quiz_version: Option<u64> },
    /// The write failed; the message is also in `State::error`
    Failed(String),
}

impl SyncService {
    /// Push the held quiz and progress data to the remote document.
    ///
    /// The quiz goes through `commit_section`, so its version is bumped
    /// atomically on the store side from the held version. Progress is a
    /// plain merge-write. No retry.
    pub async fn sync_data(&self) -> SyncOutcome {
        let (online, user_id, quiz, progress) = self
            .store
            .read(|s| {
                (
                    s.is_online,
                    s.user_id().map(str::to_string),
                    s.quiz_data.clone(),
                    s.progress_data.clone(),
                )
            })
            .await;

        if !online {
            debug!("Offline, skipping sync");
            return SyncOutcome::Skipped;
        }
        let Some(user_id) = user_id else {
            debug!("Signed out, skipping sync");
            return SyncOutcome::Skipped;
        };
        let generation = self.generation.current();

        self.set_syncing(true).await;

        let quiz_write = async {
            match quiz {
                Some(quiz) => self.commit_quiz(&user_id, quiz).await.map(Some),
                None => Ok(None),
            }
        };
        let progress_write = async {
            match progress {
                Some(ref progress) => self.merge_section(&user_id, Section::Progress, progress).await,
                None => Ok(()),
            }
        };
        let (quiz_result, progress_result) = future::join(quiz_write, progress_write).await;

        let outcome = match (quiz_result, progress_result) {
            (Ok(committed), Ok(())) => {
                if self.generation.is_current(generation) {
                    let mut actions = Vec::new();
                    if let Some(quiz) = committed.clone() {
                        actions.push(Action::SetQuizData(quiz));
                    }
                    actions.push(Action::SyncCompleted(self.clock.now()));
                    self.store.dispatch_all(actions).await;
                }
                let quiz_version = committed.and_then(|q| q.version);
                info!(user_id = %user_id, ?quiz_version, "User data synced");
                SyncOutcome::Synced { quiz_version }
            }
            (Ok(Some(committed)), Err(e)) => {
                // The remote already holds the new quiz version
                if self.generation.is_current(generation) {
                    self.store.dispatch(Action::SetQuizData(committed)).await;
                }
                self.surface_failure("Failed to sync data", e).await
            }
            (Err(e), _) | (_, Err(e)) => self.surface_failure("Failed to sync data", e).await,
        };

        self.set_syncing(false).await;
        outcome
    }

    /// Apply a progress edit locally, mirror it, and merge-write it to the
    /// remote document when online and signed in.
    pub async fn update_progress_data(&self, patch: ProgressPatch) -> SyncOutcome {
        self.store.dispatch(Action::PatchProgress(patch)).await;

        let (online, user_id, progress) = self
            .store
            .read(|s| (s.is_online, s.user_id().map(str::to_string), s.progress_data.clone()))
            .await;
        let Some(progress) = progress else {
            return SyncOutcome::Skipped;
        };

        if !self.mirror.save_progress_data(&progress) {
            debug!("Progress not mirrored locally");
        }

        let Some(user_id) = user_id.filter(|_| online) else {
            debug!("Offline or signed out, progress kept locally");
            return SyncOutcome::Skipped;
        };

        match self.merge_section(&user_id, Section::Progress, &progress).await {
            Ok(()) => {
                debug!(user_id = %user_id, "Progress written");
                SyncOutcome::Synced { quiz_version: None }
            }
            Err(e) => self.surface_failure("Failed to update progress", e).await,
        }
    }

    /// Commit the quiz with the held version as base. Returns the quiz
    /// stamped with the committed version.
    async fn commit_quiz(&self, user_id: &str, mut quiz: QuizData) -> Result<QuizData, RemoteError> {
        let base_version = quiz.version.unwrap_or(0);
        let data = serde_json::to_value(&quiz)?;
        let version = self
            .remote
            .commit_section(&self.collection, user_id, Section::Quiz, data, base_version)
            .await?;
        debug!(user_id, base_version, version, "Quiz committed");
        quiz.version = Some(version);
        Ok(quiz)
    }

    async fn merge_section<T: Serialize>(&self, user_id: &str, section: Section, data: &T) -> Result<(), RemoteError> {
        let mut patch = serde_json::Map::new();
        patch.insert(section.field_name().to_string(), serde_json::to_value(data)?);
        self.remote
            .set_document(&self.collection, user_id, patch.into(), true)
            .await
    }

    async fn surface_failure(&self, context: &str, e: RemoteError) -> SyncOutcome {
        error!(error = %e, "{}", context);
        let message = format!("{}: {}", context, e);
        self.store.dispatch(Action::SetError(Some(message.clone()))).await;
        SyncOutcome::Failed(message)
    }

    async fn set_syncing(&self, value: bool) {
        self.store
            .dispatch(Action::SetLoading {
                flag: LoadingFlag::Syncing,
                value,
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::auth::SessionData;
    use crate::cache::LocalMirror;
    use crate::models::ProgressData;
    use crate::remote::MemoryDocumentStore;
    use crate::store::Store;

    async fn signed_in(remote: &MemoryDocumentStore) -> SyncService {
        let sync = SyncService::new(
            Arc::new(Store::default()),
            Arc::new(remote.clone()),
            LocalMirror::in_memory(),
        );
        sync.store()
            .dispatch(Action::AuthChanged(Some(SessionData::new("u1", "t"))))
            .await;
        sync
    }

    #[tokio::test]
    async fn test_skipped_when_offline_or_signed_out() {
        let remote = MemoryDocumentStore::new();
        let sync = SyncService::new(
            Arc::new(Store::default()),
            Arc::new(remote.clone()),
            LocalMirror::in_memory(),
        );
        assert_eq!(sync.sync_data().await, SyncOutcome::Skipped);

        let sync = signed_in(&remote).await;
        sync.store().dispatch(Action::SetOnline(false)).await;
        assert_eq!(sync.sync_data().await, SyncOutcome::Skipped);
        assert_eq!(remote.write_count(), 0);
    }

    #[tokio::test]
    async fn test_sync_commits_quiz_and_merges_progress() {
        let remote = MemoryDocumentStore::new();
        remote.insert("users", "u1", json!({ "dietPlan": { "meals": [], "version": 1 } }));
        let sync = signed_in(&remote).await;
        sync.store()
            .dispatch_all([
                Action::SetQuizData(QuizData {
                    goal: vec!["perder-peso".to_string()],
                    version: Some(2),
                    ..Default::default()
                }),
                Action::SetProgressData(ProgressData {
                    streak_days: 4,
                    ..Default::default()
                }),
            ])
            .await;

        let outcome = sync.sync_data().await;
        assert_eq!(outcome, SyncOutcome::Synced { quiz_version: Some(3) });

        let raw = remote.raw("users", "u1").unwrap();
        assert_eq!(raw["quizData"]["version"], 3);
        assert_eq!(raw["progressData"]["streakDays"], 4);
        // Merge leaves other sections alone
        assert_eq!(raw["dietPlan"]["version"], 1);

        let state = sync.store().snapshot().await;
        assert_eq!(state.quiz_data.unwrap().version, Some(3));
        assert!(state.last_sync.is_some());
        assert!(!state.syncing);
    }

    #[tokio::test]
    async fn test_sync_failure_is_surfaced() {
        let remote = MemoryDocumentStore::new();
        remote.set_fail_writes(true);
        let sync = signed_in(&remote).await;
        sync.store()
            .dispatch(Action::SetQuizData(QuizData::default()))
            .await;

        let outcome = sync.sync_data().await;
        assert!(matches!(outcome, SyncOutcome::Failed(_)));

        let state = sync.store().snapshot().await;
        assert!(state.error.unwrap().starts_with("Failed to sync data"));
        assert!(!state.syncing);
    }

    #[tokio::test]
    async fn test_update_progress_writes_mirror_and_remote() {
        let remote = MemoryDocumentStore::new();
        let sync = signed_in(&remote).await;

        let outcome = sync
            .update_progress_data(ProgressPatch {
                current_weight: Some(78.5),
                ..Default::default()
            })
            .await;
        assert_eq!(outcome, SyncOutcome::Synced { quiz_version: None });
        assert_eq!(
            sync.mirror().load_progress_data().unwrap().data.current_weight,
            Some(78.5)
        );
        assert_eq!(remote.raw("users", "u1").unwrap()["progressData"]["currentWeight"], 78.5);
    }

    #[tokio::test]
    async fn test_update_progress_offline_stays_local() {
        let remote = MemoryDocumentStore::new();
        let sync = signed_in(&remote).await;
        sync.store().dispatch(Action::SetOnline(false)).await;

        let outcome = sync
            .update_progress_data(ProgressPatch {
                streak_days: Some(1),
                ..Default::default()
            })
            .await;
        assert_eq!(outcome, SyncOutcome::Skipped);
        assert!(sync.mirror().load_progress_data().is_some());
        assert_eq!(remote.write_count(), 0);
    }
}
