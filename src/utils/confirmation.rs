use chrono::{DateTime, Duration, Utc};

use crate::models::User;

/// Confirmation codes stay valid for this long after signup.
pub const CODE_TTL_HOURS: i64 = 24;

/// Generate a fresh single-use confirmation code and its expiry.
pub fn generate() -> (String, DateTime<Utc>) {
    let code = uuid::Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::hours(CODE_TTL_HOURS);
    (code, expires_at)
}

/// Verify a submitted code against the user's stored confirmation state.
/// Fails on mismatch, on a missing stored code (already used), and on
/// expiry.
pub fn verify(user: &User, submitted: &str) -> bool {
    let Some(stored) = user.confirmation_code.as_deref() else {
        return false;
    };
    if stored != submitted {
        return false;
    }
    match user.code_expires_at {
        Some(expires_at) => Utc::now() <= expires_at,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use uuid::Uuid;

    fn user_with_code(code: Option<&str>, expires_at: Option<DateTime<Utc>>) -> User {
        User {
            id: Uuid::new_v4(),
            username: "bob".to_string(),
            email: "bob@example.com".to_string(),
            role: UserRole::User,
            first_name: None,
            last_name: None,
            bio: None,
            is_superuser: false,
            confirmation_code: code.map(str::to_string),
            code_expires_at: expires_at,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn fresh_code_verifies_once_issued() {
        let (code, expires_at) = generate();
        let user = user_with_code(Some(&code), Some(expires_at));
        assert!(verify(&user, &code));
    }

    #[test]
    fn mismatched_code_fails() {
        let (code, expires_at) = generate();
        let user = user_with_code(Some(&code), Some(expires_at));
        assert!(!verify(&user, "not-the-code"));
    }

    #[test]
    fn consumed_or_absent_code_fails() {
        let user = user_with_code(None, None);
        assert!(!verify(&user, "anything"));
    }

    #[test]
    fn expired_code_fails() {
        let user = user_with_code(Some("code"), Some(Utc::now() - Duration::minutes(1)));
        assert!(!verify(&user, "code"));
    }
}
