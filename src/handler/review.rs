use crate::{
    AppState,
    db::{ReviewExt, TitleExt},
    dtos::{
        InputReviewDto, PaginationDto, ReviewListResponseDto, SingleReviewResponseDto,
        UpdateReviewDto,
    },
    error::{ErrorMessage, HttpError},
    middleware::{JWTAuthMiddleware, auth},
    models::Review,
    policy::{Action, Principal, ResourceKind, authorize},
};
use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
};
use tracing::instrument;
use validator::Validate;

use crate::dtos::RequestQueryDto;

/// Router for review endpoints nested under /titles/{title_id}/reviews.
/// Public read; create for any authenticated user; update/delete for the
/// author, moderators and admins.
pub fn review_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(get_reviews))
        .route(
            "/",
            post(create_review)
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route("/{review_id}", get(get_review))
        .route(
            "/{review_id}",
            patch(update_review)
                .delete(delete_review)
                .route_layer(middleware::from_fn_with_state(app_state, auth)),
        )
}

/// The nested path is only meaningful while the parent title exists.
async fn ensure_title_exists(app_state: &AppState, title_id: i32) -> Result<(), HttpError> {
    app_state
        .db_client
        .get_title_record(title_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, resolving parent title: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| {
            tracing::error!(title_id, "Parent title not found");
            HttpError::not_found("title: not found".to_string())
        })?;
    Ok(())
}

/// Fetch the review scoped by its parent title; a review of a different
/// title is as absent as an unknown id.
async fn load_review(
    app_state: &AppState,
    title_id: i32,
    review_id: i32,
) -> Result<Review, HttpError> {
    app_state
        .db_client
        .get_review(title_id, review_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting review: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("review: not found".to_string()))
}

/// Paginated reviews of one title, newest first (public).
#[instrument(skip(app_state))]
pub async fn get_reviews(
    Path(title_id): Path<i32>,
    Query(params): Query<RequestQueryDto>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    params.validate().map_err(|e| {
        tracing::error!("Invalid get_reviews input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    ensure_title_exists(&app_state, title_id).await?;

    let page = params.page.unwrap_or(1);
    let limit = params.limit.unwrap_or(10);

    let reviews = app_state
        .db_client
        .get_reviews(title_id, page, limit)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting reviews: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let total = app_state
        .db_client
        .get_review_count(title_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting review count: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let total_pages = (total as f64 / limit as f64).ceil() as i32;

    let response = ReviewListResponseDto {
        status: "success".to_string(),
        data: reviews,
        pagination: PaginationDto {
            page,
            limit,
            total: total as i32,
            total_pages,
        },
    };
    tracing::info!("get_reviews successful");
    Ok(Json(response))
}

/// Single review scoped by its title (public).
#[instrument(skip(app_state))]
pub async fn get_review(
    Path((title_id, review_id)): Path<(i32, i32)>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let review = app_state
        .db_client
        .get_review_dto(title_id, review_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting review: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("review: not found".to_string()))?;

    let response = SingleReviewResponseDto {
        status: "success".to_string(),
        data: review,
    };
    tracing::info!("get_review successful");
    Ok(Json(response))
}

/// Create a review on a title (authenticated).
///
/// One review per (author, title): the probe rejects repeats on creation
/// only, and the unique constraint closes the race window.
#[instrument(skip(app_state, jwt, body), fields(username = %jwt.user.username))]
pub async fn create_review(
    Path(title_id): Path<i32>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<InputReviewDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid create_review input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    ensure_title_exists(&app_state, title_id).await?;

    let author_id = jwt.user.id;

    let already_reviewed = app_state
        .db_client
        .has_review(author_id, title_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, checking existing review: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    if already_reviewed {
        tracing::error!(title_id, "Second review on the same title rejected");
        return Err(HttpError::bad_request(
            "review: only one review per title is allowed".to_string(),
        ));
    }

    let result = app_state
        .db_client
        .create_review(title_id, author_id, &body.text, body.score)
        .await;

    let review = match result {
        Ok(review) => review,
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            tracing::error!("DB error, duplicate review race: {}", db_err);
            return Err(HttpError::bad_request(
                "review: only one review per title is allowed".to_string(),
            ));
        }
        Err(e) => {
            tracing::error!("DB error, creating review: {}", e);
            return Err(HttpError::server_error(
                ErrorMessage::ServerError.to_string(),
            ));
        }
    };

    let response = SingleReviewResponseDto {
        status: "success".to_string(),
        data: review,
    };
    tracing::info!(title_id, "create_review successful");
    Ok((StatusCode::CREATED, Json(response)))
}

/// Edit a review (author, moderator or admin). Repeat-review checks do not
/// apply to edits.
#[instrument(skip(app_state, jwt, body), fields(username = %jwt.user.username))]
pub async fn update_review(
    Path((title_id, review_id)): Path<(i32, i32)>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<UpdateReviewDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid update_review input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let review = load_review(&app_state, title_id, review_id).await?;

    if !authorize(
        Principal::Known(&jwt.user),
        ResourceKind::Review,
        Some(review.author_id),
        Action::Update,
    ) {
        tracing::error!(review_id, "Review update denied");
        return Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }

    let updated = app_state
        .db_client
        .update_review(review.id, body.text.as_deref(), body.score)
        .await
        .map_err(|e| {
            tracing::error!("DB error, updating review: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let response = SingleReviewResponseDto {
        status: "success".to_string(),
        data: updated,
    };
    tracing::info!(review_id, "update_review successful");
    Ok(Json(response))
}

/// Delete a review (author, moderator or admin).
#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn delete_review(
    Path((title_id, review_id)): Path<(i32, i32)>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let review = load_review(&app_state, title_id, review_id).await?;

    if !authorize(
        Principal::Known(&jwt.user),
        ResourceKind::Review,
        Some(review.author_id),
        Action::Delete,
    ) {
        tracing::error!(review_id, "Review deletion denied");
        return Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }

    app_state
        .db_client
        .delete_review(review.id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, deleting review: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    tracing::info!(review_id, "delete_review successful");
    Ok(StatusCode::NO_CONTENT)
}
