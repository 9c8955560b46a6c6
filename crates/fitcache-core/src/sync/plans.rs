use tracing::{error, info, warn};

use crate::api::ApiError;
use crate::models::Section;
use crate::store::{Action, LoadingFlag};

use super::{LoadOutcome, SyncService};

/// Shown when the backend failure carries no readable message.
pub const GENERATE_PLANS_FALLBACK_ERROR: &str = "Failed to generate plans";

const NOT_SIGNED_IN_ERROR: &str = "Sign in to generate plans";
const MISSING_QUIZ_ERROR: &str = "Complete the quiz before generating plans";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    /// Plans generated and reloaded
    Generated(LoadOutcome),
    /// No session or no quiz; nothing was sent
    MissingPrerequisites,
    Failed(String),
}

impl SyncService {
    /// Ask the backend to build diet and workout plans from the held quiz,
    /// then reload everything from the remote store. No retry.
    pub async fn generate_plans(&self) -> PlanOutcome {
        let (session, quiz) = self
            .store
            .read(|s| (s.auth.session().cloned(), s.quiz_data.clone()))
            .await;

        let Some(session) = session else {
            self.store
                .dispatch(Action::SetError(Some(NOT_SIGNED_IN_ERROR.to_string())))
                .await;
            return PlanOutcome::MissingPrerequisites;
        };
        let Some(quiz) = quiz else {
            self.store
                .dispatch(Action::SetError(Some(MISSING_QUIZ_ERROR.to_string())))
                .await;
            return PlanOutcome::MissingPrerequisites;
        };
        let Some(api) = self.api.as_ref() else {
            warn!("No plan generation backend configured");
            self.store
                .dispatch(Action::SetError(Some(GENERATE_PLANS_FALLBACK_ERROR.to_string())))
                .await;
            return PlanOutcome::Failed(GENERATE_PLANS_FALLBACK_ERROR.to_string());
        };

        self.set_generating(true).await;

        let api = api.with_token(session.token.as_str());
        let outcome = match api.generate_plans(&session.user_id, &quiz).await {
            Ok(()) => {
                info!(user_id = %session.user_id, "Plans generated, reloading");
                // The regenerated plans replace whatever is held, whatever their version
                self.store
                    .dispatch_all([
                        Action::InvalidateCache(None),
                        Action::ClearRecord(Section::DietPlan),
                        Action::ClearRecord(Section::WorkoutPlan),
                        Action::SetError(None),
                    ])
                    .await;
                PlanOutcome::Generated(self.load_user_data(Some(&session)).await)
            }
            Err(e) => {
                error!(user_id = %session.user_id, error = %e, "Plan generation failed");
                let message = e
                    .downcast_ref::<ApiError>()
                    .and_then(ApiError::server_message)
                    .unwrap_or_else(|| GENERATE_PLANS_FALLBACK_ERROR.to_string());
                self.store.dispatch(Action::SetError(Some(message.clone()))).await;
                PlanOutcome::Failed(message)
            }
        };

        self.set_generating(false).await;
        outcome
    }

    async fn set_generating(&self, value: bool) {
        self.store
            .dispatch(Action::SetLoading {
                flag: LoadingFlag::GeneratingPlans,
                value,
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::SessionData;
    use crate::cache::LocalMirror;
    use crate::remote::MemoryDocumentStore;
    use crate::store::Store;

    fn service() -> SyncService {
        SyncService::new(
            Arc::new(Store::default()),
            Arc::new(MemoryDocumentStore::new()),
            LocalMirror::in_memory(),
        )
    }

    #[tokio::test]
    async fn test_requires_session() {
        let sync = service();
        assert_eq!(sync.generate_plans().await, PlanOutcome::MissingPrerequisites);
        assert_eq!(
            sync.store().read(|s| s.error.clone()).await.as_deref(),
            Some(NOT_SIGNED_IN_ERROR)
        );
    }

    #[tokio::test]
    async fn test_requires_quiz() {
        let sync = service();
        sync.store()
            .dispatch(Action::AuthChanged(Some(SessionData::new("u1", "t"))))
            .await;
        assert_eq!(sync.generate_plans().await, PlanOutcome::MissingPrerequisites);
        assert_eq!(
            sync.store().read(|s| s.error.clone()).await.as_deref(),
            Some(MISSING_QUIZ_ERROR)
        );
        assert!(!sync.store().read(|s| s.is_generating_plans).await);
    }
}
