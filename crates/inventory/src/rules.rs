//! Shared text validation rules.

use stockbook_core::{DomainError, DomainResult};

/// Trim and validate a required name.
pub(crate) fn required_text(field: &str, value: &str, max_chars: usize) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    if trimmed.chars().count() > max_chars {
        return Err(DomainError::validation(format!(
            "{field} cannot exceed {max_chars} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Trim and validate optional free text. Blank input collapses to `None`.
pub(crate) fn optional_text(
    field: &str,
    value: Option<&str>,
    max_chars: usize,
) -> DomainResult<Option<String>> {
    let Some(trimmed) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if trimmed.chars().count() > max_chars {
        return Err(DomainError::validation(format!(
            "{field} cannot exceed {max_chars} characters"
        )));
    }
    Ok(Some(trimmed.to_string()))
}
