use chrono::{Datelike, Utc};
use validator::ValidationError;

// Field-level rules shared by the DTO derive validators and the handlers.
// Every function takes its input explicitly and only accepts or rejects;
// nothing here touches the database.

/// Usernames may contain ASCII letters, digits, '_' and '-'. The literal
/// "me" is reserved for the profile endpoint and rejected in any case
/// variant, with its own error code so clients can tell the two failures
/// apart.
pub fn validate_username(value: &str) -> Result<(), ValidationError> {
    if value.is_empty()
        || !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ValidationError::new("username_charset")
            .with_message("username: only letters, digits, '_' and '-' are allowed".into()));
    }
    if value.eq_ignore_ascii_case("me") {
        return Err(ValidationError::new("username_reserved")
            .with_message("username: 'me' is a reserved name".into()));
    }
    Ok(())
}

/// Slugs identify categories and genres in URLs and write bodies.
pub fn validate_slug(value: &str) -> Result<(), ValidationError> {
    if value.is_empty()
        || !value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return Err(ValidationError::new("slug_charset")
            .with_message("slug: only lowercase letters, digits, '_' and '-' are allowed".into()));
    }
    Ok(())
}

/// A title's release year must not lie in the future. The current year is
/// read at call time, not cached, so the bound moves with the clock.
pub fn validate_year(value: i32) -> Result<(), ValidationError> {
    let current_year = Utc::now().year();
    if value > current_year {
        return Err(ValidationError::new("year_in_future")
            .with_message(format!("year: {} is later than the current year", value).into()));
    }
    Ok(())
}

/// Review scores are integers in [1, 10] inclusive.
pub fn validate_score(value: i32) -> Result<(), ValidationError> {
    if !(1..=10).contains(&value) {
        return Err(ValidationError::new("score_out_of_range")
            .with_message("score: must be between 1 and 10".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_accepts_word_characters() {
        assert!(validate_username("capybara_77").is_ok());
        assert!(validate_username("a-b-c").is_ok());
        assert!(validate_username("MEMEME").is_ok());
    }

    #[test]
    fn username_rejects_forbidden_characters() {
        for bad in ["", "with space", "dot.ted", "cyrillic\u{0436}", "at@sign"] {
            let err = validate_username(bad).unwrap_err();
            assert_eq!(err.code, "username_charset", "input: {bad:?}");
        }
    }

    #[test]
    fn username_me_is_reserved_in_any_case() {
        for bad in ["me", "Me", "mE", "ME"] {
            let err = validate_username(bad).unwrap_err();
            assert_eq!(err.code, "username_reserved", "input: {bad:?}");
        }
    }

    #[test]
    fn slug_rejects_uppercase() {
        assert!(validate_slug("sci-fi").is_ok());
        assert!(validate_slug("Sci-Fi").is_err());
        assert!(validate_slug("").is_err());
    }

    #[test]
    fn year_boundary_is_the_current_year() {
        let current = Utc::now().year();
        assert!(validate_year(current).is_ok());
        assert!(validate_year(current - 30).is_ok());
        assert_eq!(
            validate_year(current + 1).unwrap_err().code,
            "year_in_future"
        );
    }

    #[test]
    fn score_bounds_are_inclusive() {
        assert!(validate_score(1).is_ok());
        assert!(validate_score(10).is_ok());
        for bad in [0, -3, 11, 100] {
            let err = validate_score(bad).unwrap_err();
            assert_eq!(err.code, "score_out_of_range", "input: {bad}");
        }
    }
}
