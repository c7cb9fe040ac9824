use crate::models::{Category, Genre, User, UserRole};
use crate::validation::{validate_score, validate_slug, validate_username, validate_year};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

// DTOs define the structure of data exchanged with clients. They are kept
// separate from the database models to control exactly what is exposed.

// ============================================================================
// Authentication DTOs
// ============================================================================

/// Signup request. Confirmed identities are created lazily: posting the same
/// (username, email) pair again just re-issues a confirmation code.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct SignUpDto {
    #[validate(
        length(min = 1, max = 150, message = "username: required, at most 150 characters"),
        custom(function = "validate_username")
    )]
    pub username: String,

    #[validate(
        length(min = 1, max = 254, message = "email: required, at most 254 characters"),
        email(message = "email: invalid address")
    )]
    pub email: String,
}

/// Confirmation-code exchange request.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct GetTokenDto {
    #[validate(length(min = 1, message = "username: required"))]
    pub username: String,

    #[validate(length(min = 1, message = "confirmation_code: required"))]
    pub confirmation_code: String,
}

/// Successful token exchange response.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponseDto {
    pub token: String,
}

// ============================================================================
// User DTOs
// ============================================================================

/// User data sent to clients. Excludes the confirmation code and internal
/// flags; mirrors the admin and profile read shape.
#[derive(Debug, Serialize, Deserialize)]
pub struct FilterUserDto {
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: String,
}

impl FilterUserDto {
    pub fn filter_user(user: &User) -> Self {
        FilterUserDto {
            username: user.username.to_owned(),
            email: user.email.to_owned(),
            first_name: user.first_name.to_owned(),
            last_name: user.last_name.to_owned(),
            bio: user.bio.to_owned(),
            role: user.role.to_str().to_string(),
        }
    }

    pub fn filter_users(users: &[User]) -> Vec<FilterUserDto> {
        users.iter().map(FilterUserDto::filter_user).collect()
    }
}

/// Admin user creation request. Role defaults to `user` when omitted.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct CreateUserDto {
    #[validate(
        length(min = 1, max = 150, message = "username: required, at most 150 characters"),
        custom(function = "validate_username")
    )]
    pub username: String,

    #[validate(
        length(min = 1, max = 254, message = "email: required, at most 254 characters"),
        email(message = "email: invalid address")
    )]
    pub email: String,

    #[validate(length(max = 150, message = "first_name: at most 150 characters"))]
    pub first_name: Option<String>,

    #[validate(length(max = 150, message = "last_name: at most 150 characters"))]
    pub last_name: Option<String>,

    pub bio: Option<String>,

    pub role: Option<UserRole>,
}

/// Admin partial update for any user, addressed by username. May change role.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct UserUpdateDto {
    #[validate(
        length(min = 1, max = 150, message = "username: required, at most 150 characters"),
        custom(function = "validate_username")
    )]
    pub username: Option<String>,

    #[validate(email(message = "email: invalid address"))]
    pub email: Option<String>,

    #[validate(length(max = 150, message = "first_name: at most 150 characters"))]
    pub first_name: Option<String>,

    #[validate(length(max = 150, message = "last_name: at most 150 characters"))]
    pub last_name: Option<String>,

    pub bio: Option<String>,

    pub role: Option<UserRole>,
}

/// Self-service profile update (`/users/me`). Role is deliberately absent:
/// a principal cannot promote themselves through this path.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct ProfileUpdateDto {
    #[validate(
        length(min = 1, max = 150, message = "username: required, at most 150 characters"),
        custom(function = "validate_username")
    )]
    pub username: Option<String>,

    #[validate(email(message = "email: invalid address"))]
    pub email: Option<String>,

    #[validate(length(max = 150, message = "first_name: at most 150 characters"))]
    pub first_name: Option<String>,

    #[validate(length(max = 150, message = "last_name: at most 150 characters"))]
    pub last_name: Option<String>,

    pub bio: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponseDto {
    pub status: String,
    pub data: FilterUserDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserListResponseDto {
    pub status: String,
    pub users: Vec<FilterUserDto>,
    pub results: i64,
}

// ============================================================================
// Pagination & Query DTOs
// ============================================================================

#[derive(Serialize, Deserialize, Validate, Debug)]
pub struct RequestQueryDto {
    #[validate(range(min = 1))]
    pub page: Option<i32>,

    #[validate(range(min = 1, max = 50))]
    pub limit: Option<i32>,
}

/// List query with an optional substring search (categories, genres, users).
#[derive(Serialize, Deserialize, Validate, Debug)]
pub struct SearchQueryDto {
    #[validate(length(min = 1))]
    pub search: Option<String>,

    #[validate(range(min = 1))]
    pub page: Option<i32>,

    #[validate(range(min = 1, max = 50))]
    pub limit: Option<i32>,
}

/// Title list filters: category/genre by slug, name substring, exact year.
#[derive(Serialize, Deserialize, Validate, Debug)]
pub struct TitlesQueryDto {
    pub category: Option<String>,
    pub genre: Option<String>,
    pub name: Option<String>,
    pub year: Option<i32>,

    #[validate(range(min = 1))]
    pub page: Option<i32>,

    #[validate(range(min = 1, max = 50))]
    pub limit: Option<i32>,
}

/// Pagination metadata attached to list responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct PaginationDto {
    pub page: i32,
    pub limit: i32,
    pub total: i32,
    pub total_pages: i32,
}

// ============================================================================
// Category & Genre DTOs
// ============================================================================

/// Shared write body for the two catalog tags; both expose (name, slug).
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct InputTagDto {
    #[validate(length(min = 1, max = 200, message = "name: required, at most 200 characters"))]
    pub name: String,

    #[validate(
        length(min = 1, max = 50, message = "slug: required, at most 50 characters"),
        custom(function = "validate_slug")
    )]
    pub slug: String,
}

/// Public tag shape: the slug is the identifier, internal ids stay internal.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TagDto {
    pub name: String,
    pub slug: String,
}

impl From<Category> for TagDto {
    fn from(c: Category) -> Self {
        TagDto {
            name: c.name,
            slug: c.slug,
        }
    }
}

impl From<Genre> for TagDto {
    fn from(g: Genre) -> Self {
        TagDto {
            name: g.name,
            slug: g.slug,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TagListResponseDto {
    pub status: String,
    pub data: Vec<TagDto>,
    pub pagination: PaginationDto,
}

#[derive(Debug, Serialize)]
pub struct SingleTagResponseDto {
    pub status: String,
    pub data: TagDto,
}

// ============================================================================
// Title DTOs
// ============================================================================

/// Title creation request. Genres and category are referenced by slug, not
/// by internal id; unknown slugs fail validation.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct InputTitleDto {
    #[validate(length(min = 1, max = 200, message = "name: required, at most 200 characters"))]
    pub name: String,

    #[validate(custom(function = "validate_year"))]
    pub year: i32,

    pub description: Option<String>,

    pub genre: Option<Vec<String>>,

    pub category: Option<String>,
}

/// Partial title update (PATCH). Absent fields are left untouched; a present
/// `genre` list replaces the full set of links.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct UpdateTitleDto {
    #[validate(length(min = 1, max = 200, message = "name: required, at most 200 characters"))]
    pub name: Option<String>,

    #[validate(custom(function = "validate_year"))]
    pub year: Option<i32>,

    pub description: Option<String>,

    pub genre: Option<Vec<String>>,

    pub category: Option<String>,
}

/// Full title read shape with embedded tags and the derived rating.
/// `rating` is null while the title has no reviews.
#[derive(Debug, Serialize, Deserialize)]
pub struct TitleDto {
    pub id: i32,
    pub name: String,
    pub year: i32,
    pub rating: Option<f64>,
    pub description: Option<String>,
    pub genre: Vec<TagDto>,
    pub category: Option<TagDto>,
}

#[derive(Debug, Serialize)]
pub struct TitleListResponseDto {
    pub status: String,
    pub data: Vec<TitleDto>,
    pub pagination: PaginationDto,
}

#[derive(Debug, Serialize)]
pub struct SingleTitleResponseDto {
    pub status: String,
    pub data: TitleDto,
}

// ============================================================================
// Review DTOs
// ============================================================================

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct InputReviewDto {
    #[validate(length(min = 1, message = "text: required"))]
    pub text: String,

    #[validate(custom(function = "validate_score"))]
    pub score: i32,
}

/// Partial review update. The one-review-per-title rule applies to creation
/// only, so edits never re-check it.
#[derive(Debug, Deserialize, Serialize, Validate, Default)]
pub struct UpdateReviewDto {
    #[validate(length(min = 1, message = "text: required"))]
    pub text: Option<String>,

    #[validate(custom(function = "validate_score"))]
    pub score: Option<i32>,
}

/// Review as read by clients; `author` is the author's username.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReviewDto {
    pub id: i32,
    pub text: String,
    pub author: String,
    pub score: i32,
    pub pub_date: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ReviewListResponseDto {
    pub status: String,
    pub data: Vec<ReviewDto>,
    pub pagination: PaginationDto,
}

#[derive(Debug, Serialize)]
pub struct SingleReviewResponseDto {
    pub status: String,
    pub data: ReviewDto,
}

// ============================================================================
// Comment DTOs
// ============================================================================

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct InputCommentDto {
    #[validate(length(min = 1, message = "text: required"))]
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommentDto {
    pub id: i32,
    pub text: String,
    pub author: String,
    pub pub_date: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CommentListResponseDto {
    pub status: String,
    pub data: Vec<CommentDto>,
    pub pagination: PaginationDto,
}

#[derive(Debug, Serialize)]
pub struct SingleCommentResponseDto {
    pub status: String,
    pub data: CommentDto,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_rejects_reserved_username() {
        let dto = SignUpDto {
            username: "ME".to_string(),
            email: "someone@example.com".to_string(),
        };
        let err = dto.validate().unwrap_err();
        assert!(err.field_errors().contains_key("username"));
    }

    #[test]
    fn signup_accepts_normal_payload() {
        let dto = SignUpDto {
            username: "bob_42".to_string(),
            email: "bob@example.com".to_string(),
        };
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn review_score_is_validated_through_the_dto() {
        let dto = InputReviewDto {
            text: "fine".to_string(),
            score: 11,
        };
        assert!(dto.validate().is_err());

        let dto = InputReviewDto {
            text: "fine".to_string(),
            score: 10,
        };
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn update_review_skips_absent_fields() {
        // PATCH with an empty body is valid; nothing to check.
        let dto = UpdateReviewDto::default();
        assert!(dto.validate().is_ok());

        let dto = UpdateReviewDto {
            text: None,
            score: Some(0),
        };
        assert!(dto.validate().is_err());
    }

    #[test]
    fn title_rating_serializes_as_null_when_absent() {
        let dto = TitleDto {
            id: 1,
            name: "Solaris".to_string(),
            year: 1972,
            rating: None,
            description: None,
            genre: vec![],
            category: None,
        };
        let json = serde_json::to_string(&dto).unwrap();
        assert!(json.contains(r#""rating":null"#));
    }

    #[test]
    fn profile_update_has_no_role_field() {
        // Deserializing a role through the self-edit DTO must not carry it.
        let json = r#"{"bio": "hi", "role": "admin"}"#;
        let dto: ProfileUpdateDto = serde_json::from_str(json).unwrap();
        assert_eq!(dto.bio.as_deref(), Some("hi"));
        let round_trip = serde_json::to_string(&dto).unwrap();
        assert!(!round_trip.contains("admin"));
    }

    #[test]
    fn filter_user_exposes_no_confirmation_state() {
        let json = serde_json::to_string(&FilterUserDto {
            username: "bob".to_string(),
            email: "bob@example.com".to_string(),
            first_name: None,
            last_name: None,
            bio: None,
            role: "user".to_string(),
        })
        .unwrap();
        assert!(!json.contains("confirmation"));
        assert!(json.contains(r#""role":"user""#));
    }
}
