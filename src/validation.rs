// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Input validation and sanitization for todo fields.
//!
//! Every function here is pure. Validators return `Ok(None)` when an optional
//! field is absent, `Ok(Some(value))` with the normalized value, or a
//! [`ValidationError`] naming the broken rule.

use chrono::NaiveDate;

pub const TODO_NAME_MAX_LENGTH: usize = 200;
pub const NOTES_MAX_LENGTH: usize = 2000;
pub const KEYWORD_PHRASE_MAX_LENGTH: usize = 500;

const DUE_DATE_FORMAT: &str = "%Y-%m-%d";

/// A rejected input value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Todo name is required")]
    NameRequired,
    #[error("Todo name must be at most {} characters", TODO_NAME_MAX_LENGTH)]
    NameTooLong,
    #[error("Priority must be 0, 1, 2, or 3")]
    PriorityOutOfRange,
    #[error("Priority must be a valid integer")]
    PriorityNotInteger,
    #[error("Due date must be in YYYY-MM-DD format")]
    InvalidDueDate,
    #[error("Notes must be at most {} characters", NOTES_MAX_LENGTH)]
    NotesTooLong,
    #[error("Todo ID is required")]
    IdRequired,
    #[error("Todo ID must be a positive integer")]
    IdNotPositive,
    #[error("Todo ID must be a valid integer")]
    IdNotInteger,
}

/// Trim, cap at `max_chars` characters and strip NUL characters.
///
/// Used before storage on every free-text field, independent of validation.
pub fn sanitize_string(value: &str, max_chars: usize) -> String {
    value
        .trim()
        .chars()
        .take(max_chars)
        .filter(|c| *c != '\0')
        .collect()
}

/// Validate a todo name, returning it trimmed with NUL characters removed.
pub fn validate_todo_name(name: &str) -> Result<String, ValidationError> {
    let cleaned: String = name.chars().filter(|c| *c != '\0').collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::NameRequired);
    }
    if trimmed.chars().count() > TODO_NAME_MAX_LENGTH {
        return Err(ValidationError::NameTooLong);
    }
    Ok(trimmed.to_string())
}

/// Validate an optional priority given as form text.
pub fn validate_priority(priority: Option<&str>) -> Result<Option<u8>, ValidationError> {
    let Some(raw) = priority.map(str::trim).filter(|p| !p.is_empty()) else {
        return Ok(None);
    };

    let value: i64 = raw
        .parse()
        .map_err(|_| ValidationError::PriorityNotInteger)?;

    match value {
        0..=3 => Ok(Some(value as u8)),
        _ => Err(ValidationError::PriorityOutOfRange),
    }
}

/// Validate an optional due date, returning it normalized as `YYYY-MM-DD`.
pub fn validate_due_date(due_date: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(raw) = due_date
        .map(str::trim)
        .filter(|d| !d.is_empty() && *d != "None")
    else {
        return Ok(None);
    };

    NaiveDate::parse_from_str(raw, DUE_DATE_FORMAT)
        .map(|date| Some(date.format(DUE_DATE_FORMAT).to_string()))
        .map_err(|_| ValidationError::InvalidDueDate)
}

/// Validate optional notes. Over-long notes are rejected, not truncated.
pub fn validate_notes(notes: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(trimmed) = notes.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };

    if trimmed.chars().count() > NOTES_MAX_LENGTH {
        return Err(ValidationError::NotesTooLong);
    }
    Ok(Some(trimmed.to_string()))
}

/// Validate a todo ID taken from a path or form field.
pub fn validate_todo_id(id: &str) -> Result<i64, ValidationError> {
    let raw = id.trim();
    if raw.is_empty() {
        return Err(ValidationError::IdRequired);
    }

    let value: i64 = raw.parse().map_err(|_| ValidationError::IdNotInteger)?;
    if value <= 0 {
        return Err(ValidationError::IdNotPositive);
    }
    Ok(value)
}
