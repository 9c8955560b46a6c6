//! Utility functions for display formatting.

pub mod format;

pub use format::{format_date, format_macros, format_optional, format_signed_kg, format_weight, truncate_string};
