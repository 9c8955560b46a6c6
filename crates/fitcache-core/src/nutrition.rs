//! Macro recovery and recalculation for generated diet plans.
//!
//! The generator often leaves the numeric fields empty and writes the
//! numbers into the food description instead ("Frango grelhado (150g) -
//! 250 kcal, 30g proteína"). These helpers pull them back out and re-sum
//! meal and daily totals.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{DietPlan, FoodItem, MacroTotals, Meal};

// ============================================================================
// Patterns
// ============================================================================

/// Patterns compiled once. `None` only if a literal below fails to compile.
static CALORIES_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    // Matches: 250 kcal, 250kcal, 180 cal, 1.850,5 calorias
    Regex::new(r"(?i)(\d+(?:[.,]\d+)?)\s*(?:kcal|calorias|calories|cal)\b").ok()
});

static PROTEIN_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    // Matches: 30g proteína, 30 g de proteínas, protein: 30g
    Regex::new(
        r"(?i)(\d+(?:[.,]\d+)?)\s*g\s*(?:de\s+)?(?:prote[ií]nas?|protein)|(?:prote[ií]nas?|protein)\s*:?\s*(\d+(?:[.,]\d+)?)\s*g",
    )
    .ok()
});

static CARBS_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    // Matches: 45g carboidratos, 45 g carbs, carbohydrates: 45g
    Regex::new(
        r"(?i)(\d+(?:[.,]\d+)?)\s*g\s*(?:de\s+)?(?:carboidratos?|carbohydrates?|carbs?)|(?:carboidratos?|carbohydrates?|carbs?)\s*:?\s*(\d+(?:[.,]\d+)?)\s*g",
    )
    .ok()
});

static FATS_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    // Matches: 10g gordura, 10 g de gorduras, fat: 10g
    Regex::new(
        r"(?i)(\d+(?:[.,]\d+)?)\s*g\s*(?:de\s+)?(?:gorduras?|fats?)|(?:gorduras?|fats?)\s*:?\s*(\d+(?:[.,]\d+)?)\s*g",
    )
    .ok()
});

/// First amount matched by `pattern`. Accepts a decimal comma.
fn find_amount(pattern: &LazyLock<Option<Regex>>, text: &str) -> Option<f64> {
    let captures = pattern.as_ref()?.captures(text)?;
    let amount = captures.get(1).or_else(|| captures.get(2))?;
    amount.as_str().replace(',', ".").parse().ok()
}

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn rounded(totals: MacroTotals) -> MacroTotals {
    MacroTotals {
        calories: round1(totals.calories),
        protein: round1(totals.protein),
        carbs: round1(totals.carbs),
        fats: round1(totals.fats),
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Calories and macros mentioned in `text`; absent values are 0.
pub fn extract_macros(text: &str) -> MacroTotals {
    MacroTotals {
        calories: find_amount(&CALORIES_PATTERN, text).unwrap_or(0.0),
        protein: find_amount(&PROTEIN_PATTERN, text).unwrap_or(0.0),
        carbs: find_amount(&CARBS_PATTERN, text).unwrap_or(0.0),
        fats: find_amount(&FATS_PATTERN, text).unwrap_or(0.0),
    }
}

/// Fill the food's missing numbers from its description (or name).
/// Values already present are kept.
pub fn fill_food_macros(food: &mut FoodItem) {
    let text = match food.description.as_deref() {
        Some(description) => format!("{} {}", food.name, description),
        None => food.name.clone(),
    };

    fill(&mut food.calories, &CALORIES_PATTERN, &text);
    fill(&mut food.protein, &PROTEIN_PATTERN, &text);
    fill(&mut food.carbs, &CARBS_PATTERN, &text);
    fill(&mut food.fats, &FATS_PATTERN, &text);
}

fn fill(slot: &mut Option<f64>, pattern: &LazyLock<Option<Regex>>, text: &str) {
    if slot.is_none() {
        *slot = find_amount(pattern, text);
    }
}

// ============================================================================
// Recalculation
// ============================================================================

/// Fill missing food macros and re-sum the meal totals.
pub fn recalculate_meal(meal: &mut Meal) {
    meal.foods.iter_mut().for_each(fill_food_macros);
    meal.totals = rounded(meal.foods.iter().map(FoodItem::macros).sum());
}

/// Recalculate every meal and the daily totals.
pub fn recalculate_plan(plan: &mut DietPlan) {
    plan.meals.iter_mut().for_each(recalculate_meal);
    plan.daily_totals = rounded(plan.meals.iter().map(|m| m.totals).sum());
}
