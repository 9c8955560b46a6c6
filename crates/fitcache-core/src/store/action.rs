use chrono::{DateTime, Utc};

use crate::auth::SessionData;
use crate::models::{DietPlan, ProgressData, ProgressPatch, QuizData, Record, Section, WorkoutPlan};

use super::state::{DataSource, LoadingFlag};

/// The closed set of state transitions.
#[derive(Debug, Clone)]
pub enum Action {
    AuthChanged(Option<SessionData>),

    SetQuizData(QuizData),
    SetDietPlan(DietPlan),
    SetWorkoutPlan(WorkoutPlan),
    SetProgressData(ProgressData),
    PatchProgress(ProgressPatch),
    /// Drop the held record so the next Set is accepted whatever its version.
    ClearRecord(Section),

    SetLoading { flag: LoadingFlag, value: bool },
    SetError(Option<String>),
    SetOnline(bool),
    SyncCompleted(DateTime<Utc>),
    RetryScheduled(u32),
    DataSourceResolved(DataSource),

    CacheUpdated { section: Section, record: Record },
    InvalidateCache(Option<Section>),

    SubscriptionAdded(String),
    SubscriptionRemoved(String),

    /// Clear records, flags, cache and subscriptions. Auth and connectivity stay.
    Reset,
}

impl Action {
    /// The Set action carrying `record`.
    pub fn set_record(record: Record) -> Self {
        match record {
            Record::Quiz(r) => Action::SetQuizData(r),
            Record::DietPlan(r) => Action::SetDietPlan(r),
            Record::WorkoutPlan(r) => Action::SetWorkoutPlan(r),
            Record::Progress(r) => Action::SetProgressData(r),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::AuthChanged(_) => "AUTH_CHANGED",
            Action::SetQuizData(_) => "SET_QUIZ_DATA",
            Action::SetDietPlan(_) => "SET_DIET_PLAN",
            Action::SetWorkoutPlan(_) => "SET_WORKOUT_PLAN",
            Action::SetProgressData(_) => "SET_PROGRESS_DATA",
            Action::PatchProgress(_) => "PATCH_PROGRESS",
            Action::ClearRecord(_) => "CLEAR_RECORD",
            Action::SetLoading { .. } => "SET_LOADING",
            Action::SetError(_) => "SET_ERROR",
            Action::SetOnline(_) => "SET_ONLINE",
            Action::SyncCompleted(_) => "SYNC_COMPLETED",
            Action::RetryScheduled(_) => "RETRY_SCHEDULED",
            Action::DataSourceResolved(_) => "DATA_SOURCE_RESOLVED",
            Action::CacheUpdated { .. } => "CACHE_UPDATED",
            Action::InvalidateCache(_) => "INVALIDATE_CACHE",
            Action::SubscriptionAdded(_) => "SUBSCRIPTION_ADDED",
            Action::SubscriptionRemoved(_) => "SUBSCRIPTION_REMOVED",
            Action::Reset => "RESET",
        }
    }
}
