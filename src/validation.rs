// Validation kernel
// Sanitizes and bounds-checks scalar input before any store access.
// Pure functions only; repositories turn a `FieldError` into a failed envelope.

use std::fmt::Display;
use std::sync::OnceLock;

use regex::RegexSet;
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

/// Injection-indicative token patterns.
///
/// This is a finite denylist, not an HTML sanitizer: harmless markup such as
/// `<b>` or `<em>` passes, script and SQL statement shapes do not.
const UNSAFE_PATTERNS: &[&str] = &[
    r"(?i)<\s*/?\s*script",
    r"(?i)javascript\s*:",
    r"(?i)\bon(error|load|click|mouseover|focus)\s*=",
    r"(?i)\bdrop\s+(table|database)\b",
    r"(?i)\bdelete\s+from\b",
    r"(?i)\binsert\s+into\b",
    r"(?i)\btruncate\s+table\b",
    r"(?i)\bunion\s+(all\s+)?select\b",
    r"(?i)\bexec(ute)?\s+(sp|xp)_",
    r"(?i);\s*--",
    r"(?i)'\s*or\s*'?1'?\s*=\s*'?1",
];

fn unsafe_patterns() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| RegexSet::new(UNSAFE_PATTERNS).expect("denylist patterns are valid"))
}

/// Validation failure for a single field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("{field} non valido")]
    InvalidId { field: String },

    #[error("{field} obbligatorio")]
    Required { field: String },

    #[error("{field} non valido: massimo {max} caratteri")]
    TooLong { field: String, max: usize },

    #[error("{field} non valido: deve essere compreso tra {min} e {max}")]
    OutOfRange {
        field: String,
        min: String,
        max: String,
    },

    #[error("{field} contiene caratteri non validi")]
    UnsafeContent { field: String },

    #[error("{field} non valido")]
    Invalid { field: String },
}

impl FieldError {
    pub fn field(&self) -> &str {
        match self {
            FieldError::InvalidId { field }
            | FieldError::Required { field }
            | FieldError::TooLong { field, .. }
            | FieldError::OutOfRange { field, .. }
            | FieldError::UnsafeContent { field }
            | FieldError::Invalid { field } => field,
        }
    }
}

/// True when `value` contains any denylisted token.
pub fn contains_unsafe_tokens(value: &str) -> bool {
    unsafe_patterns().is_match(value)
}

/// Identifiers must be strictly positive.
pub fn validate_id(id: i64, field: &str) -> Result<i64, FieldError> {
    if id <= 0 {
        return Err(FieldError::InvalidId {
            field: field.to_string(),
        });
    }
    Ok(id)
}

/// Required text: trimmed, non-blank, bounded, free of denylisted tokens.
pub fn validate_required_text(
    value: &str,
    field: &str,
    max_len: usize,
) -> Result<String, FieldError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FieldError::Required {
            field: field.to_string(),
        });
    }
    check_text(trimmed, field, max_len)?;
    Ok(trimmed.to_string())
}

/// Optional text: blank input normalizes to `None`.
pub fn validate_optional_text(
    value: Option<&str>,
    field: &str,
    max_len: usize,
) -> Result<Option<String>, FieldError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(trimmed) => {
            check_text(trimmed, field, max_len)?;
            Ok(Some(trimmed.to_string()))
        }
    }
}

fn check_text(trimmed: &str, field: &str, max_len: usize) -> Result<(), FieldError> {
    if trimmed.chars().count() > max_len {
        return Err(FieldError::TooLong {
            field: field.to_string(),
            max: max_len,
        });
    }
    if contains_unsafe_tokens(trimmed) {
        return Err(FieldError::UnsafeContent {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Inclusive numeric range check. NaN never passes.
pub fn validate_range<T>(value: T, min: T, max: T, field: &str) -> Result<T, FieldError>
where
    T: PartialOrd + Display + Copy,
{
    if value >= min && value <= max {
        Ok(value)
    } else {
        Err(FieldError::OutOfRange {
            field: field.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        })
    }
}

/// Business keys compare trimmed and case-insensitively.
pub fn normalize_key(value: &str) -> String {
    value.trim().to_lowercase()
}

// ----------------------------------------------------------------------------
// `validator` integration
// ----------------------------------------------------------------------------

/// Custom field validator: text must not contain denylisted tokens.
pub fn validate_safe_text(value: &str) -> Result<(), ValidationError> {
    if contains_unsafe_tokens(value) {
        return Err(ValidationError::new("unsafe_content"));
    }
    Ok(())
}

/// Custom field validator: amounts must be finite.
///
/// `range` bounds alone let NaN through, which SQLite would store as NULL.
pub fn validate_finite(value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::new("not_finite"));
    }
    Ok(())
}

/// Custom field validator: text must be non-blank and safe.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required"));
    }
    validate_safe_text(value)
}

/// Runs derive-based validation and reduces the result to the first field error.
///
/// Fields are visited in name order so the reported error is deterministic.
pub fn validate_dto<T: Validate>(dto: &T) -> Result<(), FieldError> {
    dto.validate().map_err(|errors| first_error(&errors))
}

fn first_error(errors: &ValidationErrors) -> FieldError {
    let field_errors = errors.field_errors();
    let mut fields: Vec<_> = field_errors.keys().copied().collect();
    fields.sort_unstable();

    let Some(field) = fields.first() else {
        return FieldError::Invalid {
            field: "Richiesta".to_string(),
        };
    };
    let label = humanize(field);
    let code = field_errors
        .get(field)
        .and_then(|list| list.first())
        .map(|err| err.code.as_ref())
        .unwrap_or("invalid");

    match code {
        "required" => FieldError::Required { field: label },
        "unsafe_content" => FieldError::UnsafeContent { field: label },
        _ => FieldError::Invalid { field: label },
    }
}

/// `prezzo_unitario` -> `Prezzo unitario`
fn humanize(field: &str) -> String {
    let spaced = field.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => spaced,
    }
}
