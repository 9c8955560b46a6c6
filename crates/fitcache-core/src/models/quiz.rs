use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Onboarding quiz answers. Drives plan generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuizData {
    #[serde(default)]
    pub goal: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    /// Body weight in kilograms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    /// Height in centimeters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(rename = "targetWeight", default, skip_serializing_if = "Option::is_none")]
    pub target_weight: Option<f64>,
    #[serde(rename = "activityLevel", default, skip_serializing_if = "Option::is_none")]
    pub activity_level: Option<String>,
    #[serde(rename = "trainingDays", default, skip_serializing_if = "Option::is_none")]
    pub training_days: Option<u32>,
    #[serde(rename = "dietaryRestrictions", default)]
    pub dietary_restrictions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    /// Answers this layer does not interpret, kept for round-tripping
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl QuizData {
    /// Body mass index, when both weight and height are known.
    pub fn bmi(&self) -> Option<f64> {
        match (self.weight, self.height) {
            (Some(w), Some(h)) if h > 0.0 => {
                let meters = h / 100.0;
                Some(w / (meters * meters))
            }
            _ => None,
        }
    }

    pub fn has_goal(&self, goal: &str) -> bool {
        self.goal.iter().any(|g| g.eq_ignore_ascii_case(goal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiz_preserves_unknown_fields() {
        let json = serde_json::json!({
            "goal": ["perder-peso"],
            "weight": 80.0,
            "bodyType": "mesomorfo",
            "version": 2
        });
        let quiz: QuizData = serde_json::from_value(json).unwrap();
        assert_eq!(quiz.goal, vec!["perder-peso"]);
        assert_eq!(quiz.version, Some(2));
        assert_eq!(quiz.extra.get("bodyType"), Some(&Value::from("mesomorfo")));

        let back = serde_json::to_value(&quiz).unwrap();
        assert_eq!(back["bodyType"], "mesomorfo");
    }

    #[test]
    fn test_bmi() {
        let quiz = QuizData {
            weight: Some(80.0),
            height: Some(200.0),
            ..Default::default()
        };
        assert_eq!(quiz.bmi(), Some(20.0));
        assert_eq!(QuizData::default().bmi(), None);
    }

    #[test]
    fn test_has_goal_ignores_case() {
        let quiz = QuizData {
            goal: vec!["Ganhar-Massa".to_string()],
            ..Default::default()
        };
        assert!(quiz.has_goal("ganhar-massa"));
        assert!(!quiz.has_goal("perder-peso"));
    }
}
