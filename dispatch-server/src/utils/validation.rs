//! Input validation helpers
//!
//! Centralized text length constants and validation functions for request bodies.

use crate::utils::AppError;

// ── Limits ──────────────────────────────────────────────────────────

/// Staff names, table ids
pub const MAX_NAME_LEN: usize = 200;

/// Assignment / cancellation reasons
pub const MAX_NOTE_LEN: usize = 500;

/// Identifiers supplied by clients (order id, staff id, hotel/branch id)
pub const MAX_ID_LEN: usize = 100;

/// Per-staff capacity bounds
pub const MIN_CAPACITY: u32 = 1;
pub const MAX_CAPACITY: u32 = 1000;

// ── Helpers ─────────────────────────────────────────────────────────

/// Validate that a required string is non-empty and within the length limit.
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    if value.len() > max_len {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            value.len()
        )));
    }
    Ok(())
}

/// Validate that an optional string, if present, is within the length limit.
pub fn validate_optional_text(
    value: &Option<String>,
    field: &str,
    max_len: usize,
) -> Result<(), AppError> {
    if let Some(v) = value
        && v.len() > max_len
    {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            v.len()
        )));
    }
    Ok(())
}

/// Validate a hotel or branch id: `[A-Za-z0-9_-]`, within [`MAX_ID_LEN`].
///
/// `:` 是 scope key 的分隔符，不允许出现在 id 中
pub fn validate_scope_id(value: &str, field: &str) -> Result<(), AppError> {
    validate_required_text(value, field, MAX_ID_LEN)?;
    if !shared::models::is_valid_scope_id(value) {
        return Err(AppError::validation(format!(
            "{field} may only contain letters, digits, '_' and '-'"
        )));
    }
    Ok(())
}

/// Validate a staff capacity value.
pub fn validate_capacity(value: u32) -> Result<(), AppError> {
    if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&value) {
        return Err(AppError::with_message(
            shared::error::ErrorCode::ValueOutOfRange,
            format!("max_orders_capacity must be between {MIN_CAPACITY} and {MAX_CAPACITY}, got {value}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::error::ErrorCode;

    #[test]
    fn test_required_text() {
        assert!(validate_required_text("Asha", "name", MAX_NAME_LEN).is_ok());
        assert!(validate_required_text("   ", "name", MAX_NAME_LEN).is_err());
        let long = "x".repeat(MAX_NAME_LEN + 1);
        let err = validate_required_text(&long, "name", MAX_NAME_LEN).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }

    #[test]
    fn test_optional_text() {
        assert!(validate_optional_text(&None, "reason", MAX_NOTE_LEN).is_ok());
        assert!(validate_optional_text(&Some("late".into()), "reason", MAX_NOTE_LEN).is_ok());
        let long = Some("x".repeat(MAX_NOTE_LEN + 1));
        assert!(validate_optional_text(&long, "reason", MAX_NOTE_LEN).is_err());
    }

    #[test]
    fn test_scope_id() {
        assert!(validate_scope_id("hotel_1-a", "hotel_id").is_ok());
        let err = validate_scope_id("h:1", "hotel_id").unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert!(validate_scope_id("1:b", "branch_id").is_err());
        assert!(validate_scope_id("", "branch_id").is_err());
        assert!(validate_scope_id(&"h".repeat(MAX_ID_LEN + 1), "hotel_id").is_err());
    }

    #[test]
    fn test_capacity_bounds() {
        assert!(validate_capacity(1).is_ok());
        assert!(validate_capacity(1000).is_ok());
        assert_eq!(validate_capacity(0).unwrap_err().code, ErrorCode::ValueOutOfRange);
        assert!(validate_capacity(1001).is_err());
    }
}
