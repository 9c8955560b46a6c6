//! Generated diet and workout plans.
//!
//! Plans come back from the generation service as loosely structured JSON.
//! Numeric fields are optional because the generator sometimes only puts
//! them in free text; see `crate::nutrition` for recovering them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Calorie and macro totals. Grams for the macros.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroTotals {
    #[serde(default)]
    pub calories: f64,
    #[serde(default)]
    pub protein: f64,
    #[serde(default)]
    pub carbs: f64,
    #[serde(default)]
    pub fats: f64,
}

impl MacroTotals {
    pub fn is_empty(&self) -> bool {
        self.calories == 0.0 && self.protein == 0.0 && self.carbs == 0.0 && self.fats == 0.0
    }
}

impl std::ops::Add for MacroTotals {
    type Output = MacroTotals;

    fn add(self, rhs: MacroTotals) -> MacroTotals {
        MacroTotals {
            calories: self.calories + rhs.calories,
            protein: self.protein + rhs.protein,
            carbs: self.carbs + rhs.carbs,
            fats: self.fats + rhs.fats,
        }
    }
}

impl std::iter::Sum for MacroTotals {
    fn sum<I: Iterator<Item = MacroTotals>>(iter: I) -> Self {
        iter.fold(MacroTotals::default(), |acc, m| acc + m)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FoodItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carbs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fats: Option<f64>,
    /// Free text from the generator, may contain the numbers above
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FoodItem {
    pub fn macros(&self) -> MacroTotals {
        MacroTotals {
            calories: self.calories.unwrap_or(0.0),
            protein: self.protein.unwrap_or(0.0),
            carbs: self.carbs.unwrap_or(0.0),
            fats: self.fats.unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default)]
    pub foods: Vec<FoodItem>,
    #[serde(default)]
    pub totals: MacroTotals,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DietPlan {
    #[serde(default)]
    pub meals: Vec<Meal>,
    #[serde(rename = "dailyTotals", default)]
    pub daily_totals: MacroTotals,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sets: Option<u32>,
    /// Kept as text: generators write "8-12" or "até a falha"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reps: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkoutDay {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<String>,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkoutPlan {
    #[serde(default)]
    pub days: Vec<WorkoutDay>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WorkoutPlan {
    pub fn total_exercises(&self) -> usize {
        self.days.iter().map(|d| d.exercises.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macro_totals_sum() {
        let totals: MacroTotals = [
            MacroTotals { calories: 100.0, protein: 10.0, carbs: 5.0, fats: 2.0 },
            MacroTotals { calories: 50.0, protein: 1.0, carbs: 10.0, fats: 0.5 },
        ]
        .into_iter()
        .sum();
        assert_eq!(totals.calories, 150.0);
        assert_eq!(totals.protein, 11.0);
        assert_eq!(totals.carbs, 15.0);
        assert_eq!(totals.fats, 2.5);
    }

    #[test]
    fn test_diet_plan_parses_sparse_generator_output() {
        let json = serde_json::json!({
            "meals": [
                { "name": "Café da manhã", "foods": [{ "name": "Ovos", "description": "3 ovos - 210 kcal" }] }
            ],
            "version": 3
        });
        let plan: DietPlan = serde_json::from_value(json).unwrap();
        assert_eq!(plan.meals.len(), 1);
        assert_eq!(plan.meals[0].foods[0].calories, None);
        assert!(plan.daily_totals.is_empty());
        assert_eq!(plan.version, Some(3));
    }

    #[test]
    fn test_workout_total_exercises() {
        let plan = WorkoutPlan {
            days: vec![
                WorkoutDay {
                    name: "A".to_string(),
                    exercises: vec![Exercise::default(), Exercise::default()],
                    ..Default::default()
                },
                WorkoutDay {
                    name: "B".to_string(),
                    exercises: vec![Exercise::default()],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(plan.total_exercises(), 3);
    }
}
