use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User role for role-based access control.
///
/// Stored in the database as the PostgreSQL ENUM type "user_role".
/// Moderators may edit or remove any review/comment; admins additionally
/// manage the catalog and user records.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Moderator,
    Admin,
}

impl UserRole {
    pub fn to_str(&self) -> &str {
        match self {
            UserRole::User => "user",
            UserRole::Moderator => "moderator",
            UserRole::Admin => "admin",
        }
    }
}

/// User model mapping the "users" table.
///
/// `confirmation_code` and `code_expires_at` carry the pending signup
/// confirmation; both are cleared once the code is exchanged for a token.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub is_superuser: bool,
    pub confirmation_code: Option<String>,
    pub code_expires_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    /// Admin capability holds for the admin role or the superuser flag.
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin || self.is_superuser
    }

    pub fn is_moderator(&self) -> bool {
        self.role == UserRole::Moderator
    }
}

/// Classification tag for titles ("categories" table). Slug is the public
/// identifier; deleting a category detaches its titles (SET NULL).
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub slug: String,
}

/// Genre tag ("genres" table). Linked to titles through genre_titles.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Genre {
    pub id: i32,
    pub name: String,
    pub slug: String,
}

/// A reviewable work ("titles" table).
///
/// The average rating is never stored; it is computed from reviews at query
/// time (see TitleExt).
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Title {
    pub id: i32,
    pub name: String,
    pub year: i32,
    pub description: Option<String>,
    pub category_id: Option<i32>,
}

/// Explicit join row linking a title to one of its genres
/// ("genre_titles" table, duplicate-free pairing).
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct GenreTitle {
    pub id: i32,
    pub title_id: i32,
    pub genre_id: i32,
}

/// One user's scored opinion on a title ("reviews" table).
/// At most one review per (author, title) pair, enforced by a unique
/// constraint. Score is an integer in [1, 10].
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Review {
    pub id: i32,
    pub title_id: i32,
    pub author_id: Uuid,
    pub text: String,
    pub score: i32,
    pub pub_date: DateTime<Utc>,
}

/// Threaded comment on a review ("comments" table), listed in publication
/// order ascending.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Comment {
    pub id: i32,
    pub review_id: i32,
    pub author_id: Uuid,
    pub text: String,
    pub pub_date: DateTime<Utc>,
}
