use chrono::{DateTime, Utc};

use crate::models::MacroTotals;

/// Placeholder for values that are not known yet
const MISSING: &str = "-";

/// Format a body weight in kilograms, or a dash when unknown
pub fn format_weight(weight: Option<f64>) -> String {
    match weight {
        Some(kg) => format!("{:.1} kg", kg),
        None => MISSING.to_string(),
    }
}

/// Format a weight difference with an explicit sign
pub fn format_signed_kg(delta: f64) -> String {
    if delta > 0.0 {
        format!("+{:.1} kg", delta)
    } else {
        format!("{:.1} kg", delta)
    }
}

/// One-line calorie and macro summary
pub fn format_macros(totals: &MacroTotals) -> String {
    format!(
        "{:.0} kcal | P {:.1}g | C {:.1}g | F {:.1}g",
        totals.calories, totals.protein, totals.carbs, totals.fats
    )
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format an optional string, returning a default if None
pub fn format_optional(value: Option<&str>, default: &str) -> String {
    value.unwrap_or(default).to_string()
}

/// Format a timestamp for status output
pub fn format_date(date: Option<DateTime<Utc>>) -> String {
    match date {
        Some(dt) => dt.format("%b %d, %Y %H:%M UTC").to_string(),
        None => "never".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_format_weight() {
        assert_eq!(format_weight(Some(78.46)), "78.5 kg");
        assert_eq!(format_weight(None), "-");
    }

    #[test]
    fn test_format_signed_kg() {
        assert_eq!(format_signed_kg(1.26), "+1.3 kg");
        assert_eq!(format_signed_kg(-3.0), "-3.0 kg");
        assert_eq!(format_signed_kg(0.0), "0.0 kg");
    }

    #[test]
    fn test_format_macros() {
        let totals = MacroTotals {
            calories: 1850.4,
            protein: 120.0,
            carbs: 200.5,
            fats: 60.0,
        };
        assert_eq!(format_macros(&totals), "1850 kcal | P 120.0g | C 200.5g | F 60.0g");
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
        assert_eq!(truncate_string("Café da manhã", 7), "Café...");
    }

    #[test]
    fn test_format_date() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap();
        assert_eq!(format_date(Some(dt)), "Mar 05, 2024 14:30 UTC");
        assert_eq!(format_date(None), "never");
    }
}
