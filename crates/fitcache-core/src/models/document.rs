use serde::{Deserialize, Serialize};

use super::{DietPlan, ProgressData, QuizData, Record, Section, WorkoutPlan};

/// The per-user document held by the remote store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserDocument {
    #[serde(rename = "quizData", default, skip_serializing_if = "Option::is_none")]
    pub quiz_data: Option<QuizData>,
    #[serde(rename = "dietPlan", default, skip_serializing_if = "Option::is_none")]
    pub diet_plan: Option<DietPlan>,
    #[serde(rename = "workoutPlan", default, skip_serializing_if = "Option::is_none")]
    pub workout_plan: Option<WorkoutPlan>,
    #[serde(rename = "progressData", default, skip_serializing_if = "Option::is_none")]
    pub progress_data: Option<ProgressData>,
}

impl UserDocument {
    pub fn is_empty(&self) -> bool {
        self.quiz_data.is_none()
            && self.diet_plan.is_none()
            && self.workout_plan.is_none()
            && self.progress_data.is_none()
    }

    pub fn record(&self, section: Section) -> Option<Record> {
        match section {
            Section::Quiz => self.quiz_data.clone().map(Record::Quiz),
            Section::DietPlan => self.diet_plan.clone().map(Record::DietPlan),
            Section::WorkoutPlan => self.workout_plan.clone().map(Record::WorkoutPlan),
            Section::Progress => self.progress_data.clone().map(Record::Progress),
        }
    }

    /// Populated sections, in `Section::ALL` order.
    pub fn records(&self) -> Vec<Record> {
        Section::ALL
            .iter()
            .filter_map(|&section| self.record(section))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_uses_camel_case_sections() {
        let json = serde_json::json!({
            "quizData": { "goal": ["perder-peso"], "version": 1 },
            "workoutPlan": { "days": [] }
        });
        let doc: UserDocument = serde_json::from_value(json).unwrap();
        assert_eq!(doc.quiz_data.as_ref().unwrap().goal, vec!["perder-peso"]);
        assert!(doc.diet_plan.is_none());
        assert!(doc.workout_plan.is_some());
        assert_eq!(doc.records().len(), 2);
    }

    #[test]
    fn test_empty_document() {
        assert!(UserDocument::default().is_empty());
        let serialized = serde_json::to_value(UserDocument::default()).unwrap();
        assert_eq!(serialized, serde_json::json!({}));
    }
}
