use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightEntry {
    /// ISO date (YYYY-MM-DD)
    pub date: String,
    pub weight: f64,
}

/// Progress counters and body measurements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressData {
    #[serde(rename = "currentWeight", default, skip_serializing_if = "Option::is_none")]
    pub current_weight: Option<f64>,
    #[serde(rename = "weightHistory", default)]
    pub weight_history: Vec<WeightEntry>,
    /// Body measurements in centimeters, keyed by site ("waist", "hips", ...)
    #[serde(default)]
    pub measurements: BTreeMap<String, f64>,
    #[serde(rename = "photosAnalyzed", default)]
    pub photos_analyzed: u32,
    #[serde(rename = "workoutsCompleted", default)]
    pub workouts_completed: u32,
    #[serde(rename = "streakDays", default)]
    pub streak_days: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProgressData {
    /// Weight change from the first recorded entry to the current weight.
    pub fn weight_change(&self) -> Option<f64> {
        let first = self.weight_history.first()?.weight;
        let current = self
            .current_weight
            .or_else(|| self.weight_history.last().map(|e| e.weight))?;
        Some(current - first)
    }
}

/// Partial update applied by `update_progress_data`.
///
/// Only the provided fields change; measurement keys are merged rather
/// than replaced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressPatch {
    #[serde(rename = "currentWeight", default, skip_serializing_if = "Option::is_none")]
    pub current_weight: Option<f64>,
    #[serde(rename = "weightEntry", default, skip_serializing_if = "Option::is_none")]
    pub weight_entry: Option<WeightEntry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub measurements: BTreeMap<String, f64>,
    #[serde(rename = "photosAnalyzed", default, skip_serializing_if = "Option::is_none")]
    pub photos_analyzed: Option<u32>,
    #[serde(rename = "workoutsCompleted", default, skip_serializing_if = "Option::is_none")]
    pub workouts_completed: Option<u32>,
    #[serde(rename = "streakDays", default, skip_serializing_if = "Option::is_none")]
    pub streak_days: Option<u32>,
}

impl ProgressPatch {
    pub fn is_empty(&self) -> bool {
        self == &ProgressPatch::default()
    }

    /// Apply onto `progress`, leaving the version untouched.
    pub fn apply_to(&self, progress: &mut ProgressData) {
        if let Some(weight) = self.current_weight {
            progress.current_weight = Some(weight);
        }
        if let Some(ref entry) = self.weight_entry {
            // One entry per date; a second weigh-in the same day replaces the first
            progress.weight_history.retain(|e| e.date != entry.date);
            progress.weight_history.push(entry.clone());
            progress.weight_history.sort_by(|a, b| a.date.cmp(&b.date));
        }
        for (site, value) in &self.measurements {
            progress.measurements.insert(site.clone(), *value);
        }
        if let Some(n) = self.photos_analyzed {
            progress.photos_analyzed = n;
        }
        if let Some(n) = self.workouts_completed {
            progress.workouts_completed = n;
        }
        if let Some(n) = self.streak_days {
            progress.streak_days = n;
        }
    }
}
