//! Reducer-based state store.
//!
//! All mutation goes through `Store::dispatch`, which runs `reduce` under the
//! write lock. Readers clone a snapshot or borrow through `read`.

pub mod action;
pub mod reducer;
pub mod state;

use tokio::sync::RwLock;

use crate::cache::CacheTtl;
use crate::models::{Record, Section};

pub use action::Action;
pub use reducer::{reduce, should_replace};
pub use state::{DataSource, LoadingFlag, State};

#[derive(Debug, Default)]
pub struct Store {
    state: RwLock<State>,
}

impl Store {
    pub fn new(state: State) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    pub async fn dispatch(&self, action: Action) {
        let mut state = self.state.write().await;
        reduce(&mut state, action);
    }

    /// Apply several actions under one lock so readers never see a partial batch.
    pub async fn dispatch_all(&self, actions: impl IntoIterator<Item = Action>) {
        let mut state = self.state.write().await;
        for action in actions {
            reduce(&mut state, action);
        }
    }

    pub async fn snapshot(&self) -> State {
        self.state.read().await.clone()
    }

    pub async fn read<R>(&self, f: impl FnOnce(&State) -> R) -> R {
        let state = self.state.read().await;
        f(&state)
    }

    /// Fresh cached record for `section`. Takes the write lock because a hit
    /// refreshes LRU order.
    pub async fn cached(&self, section: Section, ttl: CacheTtl) -> Option<Record> {
        let mut state = self.state.write().await;
        state.cache.get(section.field_name(), ttl).cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::cache::VersionedCache;
    use crate::clock::ManualClock;
    use crate::models::{DietPlan, QuizData};

    #[tokio::test]
    async fn test_dispatch_and_read() {
        let store = Store::default();
        store
            .dispatch(Action::SetQuizData(QuizData {
                goal: vec!["perder-peso".to_string()],
                ..Default::default()
            }))
            .await;

        let goal = store
            .read(|s| s.quiz_data.as_ref().map(|q| q.goal.clone()))
            .await;
        assert_eq!(goal, Some(vec!["perder-peso".to_string()]));
        assert!(store.snapshot().await.quiz_data.is_some());
    }

    #[tokio::test]
    async fn test_cached_respects_ttl() {
        let clock = Arc::new(ManualClock::default());
        let cache = VersionedCache::new(crate::cache::versioned::DEFAULT_CACHE_CAPACITY, clock.clone());
        let store = Store::new(State::new(cache));

        store
            .dispatch(Action::SetDietPlan(DietPlan {
                version: Some(2),
                ..Default::default()
            }))
            .await;
        assert!(store.cached(Section::DietPlan, CacheTtl::InitialLoad).await.is_some());

        clock.advance(Duration::minutes(5));
        assert!(store.cached(Section::DietPlan, CacheTtl::InitialLoad).await.is_none());
        assert!(store.cached(Section::DietPlan, CacheTtl::General).await.is_some());
    }

    #[tokio::test]
    async fn test_dispatch_all_applies_in_order() {
        let store = Store::default();
        store
            .dispatch_all([
                Action::RetryScheduled(1),
                Action::RetryScheduled(2),
                Action::SetError(Some("x".to_string())),
                Action::SetError(None),
            ])
            .await;
        let (retries, error) = store.read(|s| (s.retry_count, s.error.clone())).await;
        assert_eq!(retries, 2);
        assert_eq!(error, None);
    }
}
