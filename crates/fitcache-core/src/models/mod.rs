//! Data models for the user records this layer caches and syncs.
//!
//! This module contains:
//!
//! - `QuizData`: onboarding answers
//! - `DietPlan`, `WorkoutPlan`: generated plans
//! - `ProgressData`, `ProgressPatch`: progress counters and partial updates
//! - `UserDocument`: the remote per-user document holding all four
//! - `Section` / `Record`: a tagged view over the four record kinds
//!
//! Every record carries an optional `version`. A missing version counts as 0.

pub mod document;
pub mod plan;
pub mod progress;
pub mod quiz;

use serde::{Deserialize, Serialize};

pub use document::UserDocument;
pub use plan::{DietPlan, Exercise, FoodItem, MacroTotals, Meal, WorkoutDay, WorkoutPlan};
pub use progress::{ProgressData, ProgressPatch, WeightEntry};
pub use quiz::QuizData;

/// Records with a logical clock.
pub trait Versioned {
    fn version(&self) -> Option<u64>;

    fn set_version(&mut self, version: u64);

    fn version_or_zero(&self) -> u64 {
        self.version().unwrap_or(0)
    }
}

macro_rules! impl_versioned {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Versioned for $ty {
                fn version(&self) -> Option<u64> {
                    self.version
                }

                fn set_version(&mut self, version: u64) {
                    self.version = Some(version);
                }
            }
        )*
    };
}

impl_versioned!(QuizData, DietPlan, WorkoutPlan, ProgressData);

/// Top-level sections of the user document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Section {
    #[serde(rename = "quizData")]
    Quiz,
    #[serde(rename = "dietPlan")]
    DietPlan,
    #[serde(rename = "workoutPlan")]
    WorkoutPlan,
    #[serde(rename = "progressData")]
    Progress,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::Quiz,
        Section::DietPlan,
        Section::WorkoutPlan,
        Section::Progress,
    ];

    /// Sections the push listener compares versions for.
    pub const TRACKED: [Section; 3] = [Section::Quiz, Section::DietPlan, Section::WorkoutPlan];

    /// Field name in the remote document; also the cache key.
    pub fn field_name(&self) -> &'static str {
        match self {
            Section::Quiz => "quizData",
            Section::DietPlan => "dietPlan",
            Section::WorkoutPlan => "workoutPlan",
            Section::Progress => "progressData",
        }
    }

    pub fn from_field_name(name: &str) -> Option<Self> {
        Section::ALL.into_iter().find(|s| s.field_name() == name)
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.field_name())
    }
}

/// One record of any kind, tagged by section.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Quiz(QuizData),
    DietPlan(DietPlan),
    WorkoutPlan(WorkoutPlan),
    Progress(ProgressData),
}

impl Record {
    pub fn section(&self) -> Section {
        match self {
            Record::Quiz(_) => Section::Quiz,
            Record::DietPlan(_) => Section::DietPlan,
            Record::WorkoutPlan(_) => Section::WorkoutPlan,
            Record::Progress(_) => Section::Progress,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Record::Quiz(r) => serde_json::to_value(r),
            Record::DietPlan(r) => serde_json::to_value(r),
            Record::WorkoutPlan(r) => serde_json::to_value(r),
            Record::Progress(r) => serde_json::to_value(r),
        }
    }

    pub fn from_json(section: Section, value: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match section {
            Section::Quiz => Record::Quiz(serde_json::from_value(value)?),
            Section::DietPlan => Record::DietPlan(serde_json::from_value(value)?),
            Section::WorkoutPlan => Record::WorkoutPlan(serde_json::from_value(value)?),
            Section::Progress => Record::Progress(serde_json::from_value(value)?),
        })
    }
}

impl Versioned for Record {
    fn version(&self) -> Option<u64> {
        match self {
            Record::Quiz(r) => r.version(),
            Record::DietPlan(r) => r.version(),
            Record::WorkoutPlan(r) => r.version(),
            Record::Progress(r) => r.version(),
        }
    }

    fn set_version(&mut self, version: u64) {
        match self {
            Record::Quiz(r) => r.set_version(version),
            Record::DietPlan(r) => r.set_version(version),
            Record::WorkoutPlan(r) => r.set_version(version),
            Record::Progress(r) => r.set_version(version),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_field_names_round_trip() {
        for section in Section::ALL {
            assert_eq!(Section::from_field_name(section.field_name()), Some(section));
        }
        assert_eq!(Section::from_field_name("payments"), None);
    }

    #[test]
    fn test_missing_version_is_zero() {
        let quiz = QuizData::default();
        assert_eq!(quiz.version_or_zero(), 0);

        let mut record = Record::Quiz(quiz);
        record.set_version(4);
        assert_eq!(record.version(), Some(4));
    }

    #[test]
    fn test_record_json_uses_section_shape() {
        let record = Record::from_json(
            Section::DietPlan,
            serde_json::json!({ "meals": [], "version": 2 }),
        )
        .unwrap();
        assert_eq!(record.section(), Section::DietPlan);
        assert_eq!(record.version(), Some(2));
        assert_eq!(record.to_json().unwrap()["version"], 2);
    }
}
