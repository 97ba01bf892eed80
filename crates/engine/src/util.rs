//! Internal helpers for model validation and conversion.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation and mapping logic so the engine enforces consistent invariants.

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Fallback category when nothing better can be inferred.
pub(crate) const UNCATEGORIZED: &str = "uncategorized";

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::InvalidInput(format!("invalid {label} id")))
}

/// Normalised matching key for a free-text category.
///
/// `"  Makan-Siang "` and `"makan siang"` share the key `"makan siang"`;
/// accents are folded (`"Café"` -> `"cafe"`). Blank input yields `""`.
pub(crate) fn category_key(input: &str) -> String {
    let mut out = String::new();
    let mut prev_space = false;
    for ch in input.trim().nfkd() {
        if is_combining_mark(ch) {
            continue;
        }
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            prev_space = false;
        } else if !out.is_empty() && !prev_space {
            out.push(' ');
            prev_space = true;
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Best-effort category for a transaction without one: the first word of the
/// description, lowercased.
pub(crate) fn infer_category(description: &str) -> String {
    description
        .split_whitespace()
        .map(category_key)
        .find(|word| !word.is_empty() && !word.chars().all(|c| c.is_numeric()))
        .unwrap_or_else(|| UNCATEGORIZED.to_string())
}

pub(crate) fn normalize_required_text(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidInput(format!(
            "{label} must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}
