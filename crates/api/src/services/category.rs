//! Category taxonomy normalization.
//!
//! The taxonomy evolved over time: `safe_place` and `dangerous_place` were
//! folded into `self_definition`, and rows persisted before the migration may
//! carry either alias or arbitrary junk. Write paths reject anything outside
//! the current set; read paths coerce unknown stored values to the fallback
//! so legacy rows cannot break queries.

use std::fmt;

use thiserror::Error;

/// Currently supported marker categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    AccessibleToilet,
    FriendlyClinic,
    ConversionTherapy,
    SelfDefinition,
}

/// Read-path fallback for stored values outside the current taxonomy.
pub const FALLBACK_CATEGORY: Category = Category::SelfDefinition;

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::AccessibleToilet => "accessible_toilet",
            Category::FriendlyClinic => "friendly_clinic",
            Category::ConversionTherapy => "conversion_therapy",
            Category::SelfDefinition => "self_definition",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error(
    "unsupported category \"{value}\"; supported categories: accessible_toilet, friendly_clinic, conversion_therapy, self_definition"
)]
pub struct CategoryError {
    pub value: String,
}

/// Canonicalizes a caller-supplied category before it is persisted or used in
/// a query. Legacy aliases map to their current replacement; anything else is
/// rejected. Must run on every category value crossing the write boundary.
pub fn normalize_for_write(raw: &str) -> Result<Category, CategoryError> {
    let normalized = raw.trim().to_lowercase();
    match normalized.as_str() {
        "safe_place" | "dangerous_place" => Ok(Category::SelfDefinition),
        "accessible_toilet" => Ok(Category::AccessibleToilet),
        "friendly_clinic" => Ok(Category::FriendlyClinic),
        "conversion_therapy" => Ok(Category::ConversionTherapy),
        "self_definition" => Ok(Category::SelfDefinition),
        _ => Err(CategoryError {
            value: raw.trim().to_string(),
        }),
    }
}

/// Total variant for stored rows: anything outside the current set coerces to
/// the fallback instead of failing the read.
pub fn normalize_for_read(raw: &str) -> Category {
    match raw.trim().to_lowercase().as_str() {
        "accessible_toilet" => Category::AccessibleToilet,
        "friendly_clinic" => Category::FriendlyClinic,
        "conversion_therapy" => Category::ConversionTherapy,
        "self_definition" => Category::SelfDefinition,
        _ => FALLBACK_CATEGORY,
    }
}
