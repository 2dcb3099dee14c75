//! Validation helpers for inbound payloads.

use validator::ValidationError;

/// Rejects strings that are empty or whitespace-only once trimmed.
///
/// Length bounds are enforced separately with `length` rules; this catches
/// payloads like `"   "` that satisfy a minimum length without carrying any
/// content.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("not_blank");
        err.message = Some("value must not be blank".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_regular_text() {
        assert!(validate_not_blank("retro").is_ok());
        assert!(validate_not_blank("  padded  ").is_ok());
    }

    #[test]
    fn rejects_blank_values() {
        assert!(validate_not_blank("").is_err());
        assert!(validate_not_blank("   ").is_err());
        assert!(validate_not_blank("\t\n").is_err());
    }
}
