//! Input validation primitives.
//!
//! Every check here runs before any file or process is touched, so a
//! validation failure never leaves side effects behind.

use crate::error::{Error, Result};

/// Require an Option to contain a value.
pub fn require<T>(opt: Option<T>, field: &str) -> Result<T> {
    opt.ok_or_else(|| Error::validation_missing_argument(vec![field.to_string()]))
}

/// Require a string to be non-empty after trimming.
///
/// Returns the trimmed string on success.
pub fn require_non_empty<'a>(value: &'a str, field: &str, message: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(Error::validation_missing_argument(vec![field.to_string()]).with_hint(message))
    } else {
        Ok(trimmed)
    }
}

/// Require a collection to be non-empty.
pub fn require_non_empty_vec<'a, T>(vec: &'a [T], field: &str, message: &str) -> Result<&'a [T]> {
    if vec.is_empty() {
        Err(Error::validation_invalid_argument(field, message))
    } else {
        Ok(vec)
    }
}

/// Require every entry of a list to be non-blank.
pub fn require_no_blank_entries(values: &[String], field: &str) -> Result<()> {
    match values.iter().position(|v| v.trim().is_empty()) {
        Some(index) => Err(Error::validation_invalid_argument(
            field,
            format!("Entry {} of {} is empty", index, field),
        )),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn require_returns_value_when_some() {
        let result = require(Some("value"), "field");
        assert_eq!(result.unwrap(), "value");
    }

    #[test]
    fn require_returns_error_when_none() {
        let result: Result<&str> = require(None, "field");
        assert_eq!(result.unwrap_err().code, ErrorCode::ValidationMissingArgument);
    }

    #[test]
    fn require_non_empty_trims_whitespace() {
        let result = require_non_empty("  hello  ", "field", "msg");
        assert_eq!(result.unwrap(), "hello");
    }

    #[test]
    fn require_non_empty_fails_for_whitespace_only() {
        let err = require_non_empty("   ", "version", "Version is required").unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationMissingArgument);
        assert_eq!(err.hints[0].message, "Version is required");
    }

    #[test]
    fn require_non_empty_vec_fails_for_empty() {
        let vec: Vec<i32> = vec![];
        let result = require_non_empty_vec(&vec, "field", "Cannot be empty");
        assert!(result.is_err());
    }

    #[test]
    fn require_no_blank_entries_points_at_offender() {
        let values = vec!["a".to_string(), " ".to_string()];
        let err = require_no_blank_entries(&values, "services").unwrap_err();
        assert!(err.message.contains("Entry 1"));
        assert!(require_no_blank_entries(&values[..1], "services").is_ok());
    }
}
