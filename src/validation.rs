//! Small validators shared by the configuration loader.
use std::ops::RangeInclusive;

/// Validates that a required setting is present and not just whitespace.
///
/// # Arguments
///
/// * `value` - The string to validate.
///
/// # Returns
///
/// * `Ok(())` if the string has non-whitespace content.
/// * `Err(&'static str)` if the string is empty or blank.
pub fn is_not_empty(value: &str) -> Result<(), &'static str> {
    if value.trim().is_empty() {
        Err("Value cannot be empty")
    } else {
        Ok(())
    }
}

/// Validates if a given value is within a specified numeric range.
///
/// # Arguments
///
/// * `value` - The value to validate.
/// * `range` - The inclusive range to validate against.
///
/// # Returns
///
/// * `Ok(())` if the value is within the range.
/// * `Err(&'static str)` if the value is outside the range.
pub fn is_in_range<T: PartialOrd>(value: T, range: RangeInclusive<T>) -> Result<(), &'static str> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err("Value is outside the specified range")
    }
}

/// Validates a remote field or trackor type name.
///
/// Names travel in URL query strings and inside search expressions, so only
/// ASCII letters, digits and underscores are accepted.
pub fn is_valid_field_name(name: &str) -> Result<(), &'static str> {
    is_not_empty(name)?;
    if name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        Ok(())
    } else {
        Err("Field names may only contain ASCII letters, digits and underscores")
    }
}
