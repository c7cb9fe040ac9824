use super::DBClient;
use crate::dtos::UserUpdateDto;
use crate::models::{User, UserRole};
use chrono::{DateTime, Utc};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, username, email, role, first_name, last_name, bio, \
     is_superuser, confirmation_code, code_expires_at, created_at, updated_at";

/// User database operations trait
pub trait UserExt {
    /// Get a single user by id, username or email; first given key wins.
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error>;

    /// Paginated user list for administration, optionally filtered by a
    /// username substring.
    async fn get_users(
        &self,
        search: Option<&str>,
        page: i32,
        limit: i32,
    ) -> Result<Vec<User>, sqlx::Error>;

    async fn get_user_count(&self, search: Option<&str>) -> Result<i64, sqlx::Error>;

    /// Admin-side user creation with an explicit role.
    async fn save_user(
        &self,
        username: &str,
        email: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
        bio: Option<&str>,
        role: UserRole,
    ) -> Result<User, sqlx::Error>;

    /// Signup-side user creation: role defaults to `user`, the confirmation
    /// code is stored alongside.
    async fn signup_user(
        &self,
        username: &str,
        email: &str,
        code: &str,
        code_expires_at: DateTime<Utc>,
    ) -> Result<User, sqlx::Error>;

    /// Store a fresh confirmation code on an existing user (re-signup).
    async fn set_confirmation_code(
        &self,
        user_id: Uuid,
        code: &str,
        code_expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error>;

    /// Consume the stored code once it has been exchanged for a token.
    async fn clear_confirmation_code(&self, user_id: Uuid) -> Result<(), sqlx::Error>;

    /// Partial update addressed by username; absent fields stay untouched.
    async fn update_user(
        &self,
        username: &str,
        update: &UserUpdateDto,
    ) -> Result<Option<User>, sqlx::Error>;

    /// Delete by username; RowNotFound when no such user exists.
    async fn delete_user(&self, username: &str) -> Result<(), sqlx::Error>;
}

impl UserExt for DBClient {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error> {
        let mut user: Option<User> = None;

        if let Some(user_id) = user_id {
            user = sqlx::query_as::<_, User>(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
            ))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        } else if let Some(username) = username {
            user = sqlx::query_as::<_, User>(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
            ))
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        } else if let Some(email) = email {
            user = sqlx::query_as::<_, User>(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
            ))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        }

        Ok(user)
    }

    async fn get_users(
        &self,
        search: Option<&str>,
        page: i32,
        limit: i32,
    ) -> Result<Vec<User>, sqlx::Error> {
        let offset = (page - 1) * limit;
        let pattern = format!("%{}%", search.unwrap_or(""));

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE username ILIKE $1 \
             ORDER BY username LIMIT $2 OFFSET $3"
        ))
        .bind(pattern)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn get_user_count(&self, search: Option<&str>) -> Result<i64, sqlx::Error> {
        let pattern = format!("%{}%", search.unwrap_or(""));

        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE username ILIKE $1",
        )
        .bind(pattern)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn save_user(
        &self,
        username: &str,
        email: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
        bio: Option<&str>,
        role: UserRole,
    ) -> Result<User, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, first_name, last_name, bio, role) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(username)
        .bind(email)
        .bind(first_name)
        .bind(last_name)
        .bind(bio)
        .bind(role)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn signup_user(
        &self,
        username: &str,
        email: &str,
        code: &str,
        code_expires_at: DateTime<Utc>,
    ) -> Result<User, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, confirmation_code, code_expires_at) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(username)
        .bind(email)
        .bind(code)
        .bind(code_expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn set_confirmation_code(
        &self,
        user_id: Uuid,
        code: &str,
        code_expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET confirmation_code = $1, code_expires_at = $2, updated_at = NOW() \
             WHERE id = $3",
        )
        .bind(code)
        .bind(code_expires_at)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear_confirmation_code(&self, user_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET confirmation_code = NULL, code_expires_at = NULL, \
             updated_at = NOW() WHERE id = $1",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_user(
        &self,
        username: &str,
        update: &UserUpdateDto,
    ) -> Result<Option<User>, sqlx::Error> {
        // COALESCE keeps the stored value for fields the PATCH omitted.
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET \
                username = COALESCE($2, username), \
                email = COALESCE($3, email), \
                first_name = COALESCE($4, first_name), \
                last_name = COALESCE($5, last_name), \
                bio = COALESCE($6, bio), \
                role = COALESCE($7, role), \
                updated_at = NOW() \
             WHERE username = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(username)
        .bind(update.username.as_deref())
        .bind(update.email.as_deref())
        .bind(update.first_name.as_deref())
        .bind(update.last_name.as_deref())
        .bind(update.bio.as_deref())
        .bind(update.role)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn delete_user(&self, username: &str) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE username = $1")
            .bind(username)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }
}
