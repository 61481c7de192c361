//! Post and comment text rules shared by services and views.

use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};

use crate::domain::error::DomainError;

/// Number of characters shown by record labels.
pub const LABEL_CHARS: usize = 15;

pub const HUMAN_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[day padding:none] [month repr:short] [year], [hour]:[minute]");

pub const REQUIRED_FIELD_MESSAGE: &str = "This field is required.";

/// First [`LABEL_CHARS`] characters of `text`, counted in Unicode scalar values.
pub fn short_label(text: &str) -> String {
    text.chars().take(LABEL_CHARS).collect()
}

/// Normalise a required free-text field. Surrounding whitespace is stripped and
/// blank input is rejected.
pub fn clean_text(field: &'static str, raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(field, REQUIRED_FIELD_MESSAGE));
    }
    Ok(trimmed.to_string())
}

pub fn format_human_date(timestamp: OffsetDateTime) -> String {
    timestamp
        .format(HUMAN_DATE_FORMAT)
        .unwrap_or_else(|_| timestamp.to_string())
}
