//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest accepted countdown title, in characters.
pub const TITLE_MAX_CHARS: usize = 200;
/// Longest accepted countdown description, in characters.
pub const DESCRIPTION_MAX_CHARS: usize = 2000;

/// Validates that a title is non-blank and at most [`TITLE_MAX_CHARS`] characters.
///
/// # Examples
///
/// ```ignore
/// validate_title("LES RÉSULTATS SERONT DISPONIBLES DANS") // Ok
/// validate_title("   ")                                   // Err - blank
/// ```
pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        let mut err = ValidationError::new("title_blank");
        err.message = Some("Title must not be blank".into());
        return Err(err);
    }

    let length = title.chars().count();
    if length > TITLE_MAX_CHARS {
        let mut err = ValidationError::new("title_length");
        err.message = Some(
            format!("Title must be at most {TITLE_MAX_CHARS} characters (got {length})").into(),
        );
        return Err(err);
    }

    Ok(())
}

/// Validates that a description is at most [`DESCRIPTION_MAX_CHARS`] characters.
pub fn validate_description(description: &str) -> Result<(), ValidationError> {
    let length = description.chars().count();
    if length > DESCRIPTION_MAX_CHARS {
        let mut err = ValidationError::new("description_length");
        err.message = Some(
            format!(
                "Description must be at most {DESCRIPTION_MAX_CHARS} characters (got {length})"
            )
            .into(),
        );
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_title_valid() {
        assert!(validate_title("LES RÉSULTATS SERONT DISPONIBLES DANS").is_ok());
        assert!(validate_title("x").is_ok());
        assert!(validate_title(&"é".repeat(200)).is_ok()); // counted in chars, not bytes
    }

    #[test]
    fn test_validate_title_invalid() {
        assert!(validate_title("").is_err());
        assert!(validate_title(" \t ").is_err());
        assert!(validate_title(&"a".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_description_length() {
        assert!(validate_description("").is_ok());
        assert!(validate_description(&"a".repeat(2000)).is_ok());
        assert!(validate_description(&"a".repeat(2001)).is_err());
    }
}
