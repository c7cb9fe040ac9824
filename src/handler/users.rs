use crate::{
    AppState,
    db::UserExt,
    dtos::{
        CreateUserDto, FilterUserDto, ProfileUpdateDto, SearchQueryDto, UserListResponseDto,
        UserResponseDto, UserUpdateDto,
    },
    error::{ErrorMessage, HttpError},
    middleware::{JWTAuthMiddleware, auth},
    models::{User, UserRole},
    policy::{Action, Principal, ResourceKind, authorize},
};
use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::get,
};
use tracing::instrument;
use validator::Validate;

/// Router for profile and user administration. Every route requires a
/// bearer token; the admin-only routes are additionally gated by the
/// authorization policy inside the handlers.
pub fn users_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me).patch(update_me))
        .route("/", get(get_users).post(create_user))
        .route(
            "/{username}",
            get(get_user_by_username)
                .patch(update_user_by_username)
                .delete(delete_user_by_username),
        )
        .layer(middleware::from_fn_with_state(app_state, auth))
}

/// Deny unless the acting user passes the policy for user administration.
fn require_user_admin(user: &User, action: Action) -> Result<(), HttpError> {
    if !authorize(Principal::Known(user), ResourceKind::User, None, action) {
        tracing::error!(username = %user.username, "User administration denied");
        return Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }
    Ok(())
}

/// Map a users-table unique violation onto a field-keyed 400.
fn duplicate_user_error(db_err: &dyn sqlx::error::DatabaseError) -> HttpError {
    let message = match db_err.constraint() {
        Some("users_email_key") => "email: already in use",
        _ => "username: already in use",
    };
    HttpError::bad_request(message.to_string())
}

/// Current user's own profile. Bypasses the admin gate by design.
#[instrument(skip(user), fields(username = %user.user.username))]
pub async fn get_me(
    Extension(user): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let response = UserResponseDto {
        status: "success".to_string(),
        data: FilterUserDto::filter_user(&user.user),
    };
    tracing::info!("get_me successful");
    Ok(Json(response))
}

/// Partial self-edit. The DTO carries no role field, so a principal cannot
/// promote themselves here.
#[instrument(skip(app_state, user, body), fields(username = %user.user.username))]
pub async fn update_me(
    State(app_state): State<AppState>,
    Extension(user): Extension<JWTAuthMiddleware>,
    Json(body): Json<ProfileUpdateDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid update_me input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let update = UserUpdateDto {
        username: body.username,
        email: body.email,
        first_name: body.first_name,
        last_name: body.last_name,
        bio: body.bio,
        role: None,
    };

    let updated = app_state
        .db_client
        .update_user(&user.user.username, &update)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.is_unique_violation() {
                    tracing::error!("DB error, update_me unique violation: {}", db_err);
                    return duplicate_user_error(db_err.as_ref());
                }
            }
            tracing::error!("DB error, updating profile: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| {
            tracing::error!("Authenticated user vanished during update");
            HttpError::not_found("username: user not found".to_string())
        })?;

    let response = UserResponseDto {
        status: "success".to_string(),
        data: FilterUserDto::filter_user(&updated),
    };
    tracing::info!("update_me successful");
    Ok(Json(response))
}

/// Paginated user list with username search (admin only).
#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn get_users(
    Query(query_params): Query<SearchQueryDto>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    require_user_admin(&jwt.user, Action::Read)?;

    query_params.validate().map_err(|e| {
        tracing::error!("Invalid get_users input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let page = query_params.page.unwrap_or(1);
    let limit = query_params.limit.unwrap_or(10);
    let search = query_params.search.as_deref();

    let users = app_state
        .db_client
        .get_users(search, page, limit)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting users: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let user_count = app_state
        .db_client
        .get_user_count(search)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting user count: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let response = UserListResponseDto {
        status: "success".to_string(),
        users: FilterUserDto::filter_users(&users),
        results: user_count,
    };
    tracing::info!("get_users successful");
    Ok(Json(response))
}

/// Direct user creation (admin only); may set any role.
#[instrument(skip(app_state, jwt, body), fields(username = %jwt.user.username))]
pub async fn create_user(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<CreateUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    require_user_admin(&jwt.user, Action::Create)?;

    body.validate().map_err(|e| {
        tracing::error!("Invalid create_user input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let result = app_state
        .db_client
        .save_user(
            &body.username,
            &body.email,
            body.first_name.as_deref(),
            body.last_name.as_deref(),
            body.bio.as_deref(),
            body.role.unwrap_or(UserRole::User),
        )
        .await;

    let user = match result {
        Ok(user) => user,
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            tracing::error!("DB error, create_user unique violation: {}", db_err);
            return Err(duplicate_user_error(db_err.as_ref()));
        }
        Err(e) => {
            tracing::error!("DB error, creating user: {}", e);
            return Err(HttpError::server_error(
                ErrorMessage::ServerError.to_string(),
            ));
        }
    };

    let response = UserResponseDto {
        status: "success".to_string(),
        data: FilterUserDto::filter_user(&user),
    };
    tracing::info!(new_user = %user.username, "create_user successful");
    Ok((StatusCode::CREATED, Json(response)))
}

/// Look up a user by username, not numeric id (admin only).
#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn get_user_by_username(
    Path(username): Path<String>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    require_user_admin(&jwt.user, Action::Read)?;

    let user = app_state
        .db_client
        .get_user(None, Some(&username), None)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting user: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("username: user not found".to_string()))?;

    let response = UserResponseDto {
        status: "success".to_string(),
        data: FilterUserDto::filter_user(&user),
    };
    tracing::info!("get_user_by_username successful");
    Ok(Json(response))
}

/// Partial update of any user, role included (admin only).
#[instrument(skip(app_state, jwt, body), fields(username = %jwt.user.username))]
pub async fn update_user_by_username(
    Path(username): Path<String>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Json(body): Json<UserUpdateDto>,
) -> Result<impl IntoResponse, HttpError> {
    require_user_admin(&jwt.user, Action::Update)?;

    body.validate().map_err(|e| {
        tracing::error!("Invalid update_user input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let updated = app_state
        .db_client
        .update_user(&username, &body)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.is_unique_violation() {
                    tracing::error!("DB error, update_user unique violation: {}", db_err);
                    return duplicate_user_error(db_err.as_ref());
                }
            }
            tracing::error!("DB error, updating user: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("username: user not found".to_string()))?;

    let response = UserResponseDto {
        status: "success".to_string(),
        data: FilterUserDto::filter_user(&updated),
    };
    tracing::info!("update_user_by_username successful");
    Ok(Json(response))
}

/// Delete a user by username (admin only).
#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn delete_user_by_username(
    Path(username): Path<String>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    require_user_admin(&jwt.user, Action::Delete)?;

    app_state
        .db_client
        .delete_user(&username)
        .await
        .map_err(|e| {
            if let sqlx::Error::RowNotFound = e {
                tracing::error!("User not found for deletion");
                HttpError::not_found("username: user not found".to_string())
            } else {
                tracing::error!("DB error, deleting user: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
        })?;

    tracing::info!("delete_user_by_username successful");
    Ok(StatusCode::NO_CONTENT)
}
