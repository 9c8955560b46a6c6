use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::auth::AuthState;
use crate::cache::VersionedCache;
use crate::models::{DietPlan, ProgressData, QuizData, Record, Section, Versioned, WorkoutPlan};

/// Where the records currently on screen came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// Served from the in-memory cache without a remote read
    Cache,
    Remote,
    /// Remote unreachable or empty; local mirror used instead
    LocalMirror,
    /// Anonymous session showing the sample document
    Demo,
}

/// Loading indicators bracketing remote calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingFlag {
    QuizData,
    Plans,
    GeneratingPlans,
    Syncing,
}

/// Everything the UI can observe. Mutated only by `reduce`.
#[derive(Debug, Clone)]
pub struct State {
    pub auth: AuthState,

    pub quiz_data: Option<QuizData>,
    pub diet_plan: Option<DietPlan>,
    pub workout_plan: Option<WorkoutPlan>,
    pub progress_data: Option<ProgressData>,

    pub loading_quiz_data: bool,
    pub loading_plans: bool,
    pub is_generating_plans: bool,
    pub syncing: bool,
    pub is_online: bool,

    pub error: Option<String>,
    pub last_sync: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub data_source: Option<DataSource>,

    /// Names of live push listeners, for display
    pub active_subscriptions: BTreeSet<String>,

    pub cache: VersionedCache<Record>,
}

impl State {
    pub fn new(cache: VersionedCache<Record>) -> Self {
        Self {
            auth: AuthState::Unknown,
            quiz_data: None,
            diet_plan: None,
            workout_plan: None,
            progress_data: None,
            loading_quiz_data: false,
            loading_plans: false,
            is_generating_plans: false,
            syncing: false,
            is_online: true,
            error: None,
            last_sync: None,
            retry_count: 0,
            data_source: None,
            active_subscriptions: BTreeSet::new(),
            cache,
        }
    }

    pub fn auth_loading(&self) -> bool {
        self.auth.auth_loading()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.auth.user_id()
    }

    /// Version of the record held for `section`. `None` when nothing is
    /// held or the held record carries no version; either way any incoming
    /// record may replace it.
    pub fn held_version(&self, section: Section) -> Option<u64> {
        match section {
            Section::Quiz => self.quiz_data.as_ref().and_then(Versioned::version),
            Section::DietPlan => self.diet_plan.as_ref().and_then(Versioned::version),
            Section::WorkoutPlan => self.workout_plan.as_ref().and_then(Versioned::version),
            Section::Progress => self.progress_data.as_ref().and_then(Versioned::version),
        }
    }

    pub fn record(&self, section: Section) -> Option<Record> {
        match section {
            Section::Quiz => self.quiz_data.clone().map(Record::Quiz),
            Section::DietPlan => self.diet_plan.clone().map(Record::DietPlan),
            Section::WorkoutPlan => self.workout_plan.clone().map(Record::WorkoutPlan),
            Section::Progress => self.progress_data.clone().map(Record::Progress),
        }
    }

    pub fn has_plans(&self) -> bool {
        self.diet_plan.is_some() && self.workout_plan.is_some()
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new(VersionedCache::default())
    }
}
