//! The reducer: `(state, action) -> state'`, no I/O.
//!
//! Setting a record also writes it through to the versioned cache with the
//! record's own version (1 when it has none), so reads prefer the cache and
//! writes always refresh it.

use tracing::{debug, trace};

use crate::cache::versioned::DEFAULT_ENTRY_VERSION;
use crate::cache::VersionedCache;
use crate::models::{Record, Section, Versioned};

use super::action::Action;
use super::state::{LoadingFlag, State};

/// Whether an incoming record may replace the held one.
///
/// Replace when nothing is held, when the held record never had a version,
/// or when the incoming version is strictly greater. A missing incoming
/// version counts as 0.
pub fn should_replace(held: Option<u64>, incoming: Option<u64>) -> bool {
    match held {
        None => true,
        Some(held) => incoming.unwrap_or(0) > held,
    }
}

pub fn reduce(state: &mut State, action: Action) {
    trace!(action = action.name(), "Reducing");

    match action {
        Action::AuthChanged(session) => {
            state.auth = crate::auth::AuthState::from_session(session);
        }

        Action::SetQuizData(quiz) => {
            apply_record(&mut state.quiz_data, quiz, &mut state.cache, Section::Quiz, Record::Quiz);
        }
        Action::SetDietPlan(plan) => {
            apply_record(&mut state.diet_plan, plan, &mut state.cache, Section::DietPlan, Record::DietPlan);
        }
        Action::SetWorkoutPlan(plan) => {
            apply_record(
                &mut state.workout_plan,
                plan,
                &mut state.cache,
                Section::WorkoutPlan,
                Record::WorkoutPlan,
            );
        }
        Action::SetProgressData(progress) => {
            apply_record(
                &mut state.progress_data,
                progress,
                &mut state.cache,
                Section::Progress,
                Record::Progress,
            );
        }
        Action::PatchProgress(patch) => {
            let mut progress = state.progress_data.take().unwrap_or_default();
            patch.apply_to(&mut progress);
            let version = progress.version().unwrap_or(DEFAULT_ENTRY_VERSION);
            state.cache.set(
                Section::Progress.field_name(),
                Record::Progress(progress.clone()),
                version,
            );
            state.progress_data = Some(progress);
        }
        Action::ClearRecord(section) => match section {
            Section::Quiz => state.quiz_data = None,
            Section::DietPlan => state.diet_plan = None,
            Section::WorkoutPlan => state.workout_plan = None,
            Section::Progress => state.progress_data = None,
        },

        Action::SetLoading { flag, value } => match flag {
            LoadingFlag::QuizData => state.loading_quiz_data = value,
            LoadingFlag::Plans => state.loading_plans = value,
            LoadingFlag::GeneratingPlans => state.is_generating_plans = value,
            LoadingFlag::Syncing => state.syncing = value,
        },
        Action::SetError(error) => state.error = error,
        Action::SetOnline(online) => state.is_online = online,
        Action::SyncCompleted(at) => state.last_sync = Some(at),
        Action::RetryScheduled(count) => state.retry_count = count,
        Action::DataSourceResolved(source) => state.data_source = Some(source),

        Action::CacheUpdated { section, record } => {
            let version = record.version().unwrap_or(DEFAULT_ENTRY_VERSION);
            state.cache.set(section.field_name(), record, version);
        }
        Action::InvalidateCache(section) => {
            state.cache.invalidate(section.map(|s| s.field_name()));
        }

        Action::SubscriptionAdded(name) => {
            state.active_subscriptions.insert(name);
        }
        Action::SubscriptionRemoved(name) => {
            state.active_subscriptions.remove(&name);
        }

        Action::Reset => {
            state.quiz_data = None;
            state.diet_plan = None;
            state.workout_plan = None;
            state.progress_data = None;
            state.loading_quiz_data = false;
            state.loading_plans = false;
            state.is_generating_plans = false;
            state.syncing = false;
            state.error = None;
            state.last_sync = None;
            state.retry_count = 0;
            state.data_source = None;
            state.active_subscriptions.clear();
            state.cache.invalidate(None);
        }
    }
}

/// Replace `slot` with `incoming` if its version allows, writing through to the cache.
fn apply_record<T: Versioned + Clone>(
    slot: &mut Option<T>,
    incoming: T,
    cache: &mut VersionedCache<Record>,
    section: Section,
    wrap: fn(T) -> Record,
) -> bool {
    let held = slot.as_ref().and_then(Versioned::version);

    if !should_replace(held, incoming.version()) {
        debug!(
            section = section.field_name(),
            held = ?held,
            incoming = ?incoming.version(),
            "Ignoring record that is not newer than the one held"
        );
        return false;
    }

    let version = incoming.version().unwrap_or(DEFAULT_ENTRY_VERSION);
    cache.set(section.field_name(), wrap(incoming.clone()), version);
    *slot = Some(incoming);
    true
}
