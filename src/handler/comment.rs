use crate::{
    AppState,
    db::{CommentExt, ReviewExt},
    dtos::{
        CommentListResponseDto, InputCommentDto, PaginationDto, RequestQueryDto,
        SingleCommentResponseDto,
    },
    error::{ErrorMessage, HttpError},
    middleware::{JWTAuthMiddleware, auth},
    models::Comment,
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

/// Router for comment endpoints nested under
/// /titles/{title_id}/reviews/{review_id}/comments. GET/POST/PATCH/DELETE
/// only; same ownership rules as reviews.
pub fn comment_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(get_comments))
        .route(
            "/",
            post(create_comment)
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route("/{comment_id}", get(get_comment))
        .route(
            "/{comment_id}",
            patch(update_comment)
                .delete(delete_comment)
                .route_layer(middleware::from_fn_with_state(app_state, auth)),
        )
}

/// Resolve the (title, review) chain before touching any comment. A review
/// that exists but hangs off a different title is a 404, not a 400.
async fn ensure_review_chain(
    app_state: &AppState,
    title_id: i32,
    review_id: i32,
) -> Result<(), HttpError> {
    app_state
        .db_client
        .get_review(title_id, review_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, resolving review chain: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| {
            tracing::error!(title_id, review_id, "Review chain mismatch");
            HttpError::not_found("review: not found".to_string())
        })?;
    Ok(())
}

async fn load_comment(
    app_state: &AppState,
    review_id: i32,
    comment_id: i32,
) -> Result<Comment, HttpError> {
    app_state
        .db_client
        .get_comment(review_id, comment_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting comment: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("comment: not found".to_string()))
}

/// Comments of one review in publication order (public).
#[instrument(skip(app_state))]
pub async fn get_comments(
    Path((title_id, review_id)): Path<(i32, i32)>,
    Query(params): Query<RequestQueryDto>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    params.validate().map_err(|e| {
        tracing::error!("Invalid get_comments input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    ensure_review_chain(&app_state, title_id, review_id).await?;

    let page = params.page.unwrap_or(1);
    let limit = params.limit.unwrap_or(10);

    let comments = app_state
        .db_client
        .get_comments(review_id, page, limit)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting comments: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let total = app_state
        .db_client
        .get_comment_count(review_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting comment count: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let total_pages = (total as f64 / limit as f64).ceil() as i32;

    let response = CommentListResponseDto {
        status: "success".to_string(),
        data: comments,
        pagination: PaginationDto {
            page,
            limit,
            total: total as i32,
            total_pages,
        },
    };
    tracing::info!("get_comments successful");
    Ok(Json(response))
}

/// Single comment scoped by the full path chain (public).
#[instrument(skip(app_state))]
pub async fn get_comment(
    Path((title_id, review_id, comment_id)): Path<(i32, i32, i32)>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    ensure_review_chain(&app_state, title_id, review_id).await?;

    let comment = app_state
        .db_client
        .get_comment_dto(review_id, comment_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting comment: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("comment: not found".to_string()))?;

    let response = SingleCommentResponseDto {
        status: "success".to_string(),
        data: comment,
    };
    tracing::info!("get_comment successful");
    Ok(Json(response))
}

/// Comment on a review (authenticated).
#[instrument(skip(app_state, jwt, body), fields(username = %jwt.user.username))]
pub async fn create_comment(
    Path((title_id, review_id)): Path<(i32, i32)>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<InputCommentDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid create_comment input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    ensure_review_chain(&app_state, title_id, review_id).await?;

    let comment = app_state
        .db_client
        .create_comment(review_id, jwt.user.id, &body.text)
        .await
        .map_err(|e| {
            tracing::error!("DB error, creating comment: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let response = SingleCommentResponseDto {
        status: "success".to_string(),
        data: comment,
    };
    tracing::info!(review_id, "create_comment successful");
    Ok((StatusCode::CREATED, Json(response)))
}

/// Edit a comment (author, moderator or admin).
#[instrument(skip(app_state, jwt, body), fields(username = %jwt.user.username))]
pub async fn update_comment(
    Path((title_id, review_id, comment_id)): Path<(i32, i32, i32)>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<InputCommentDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid update_comment input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    ensure_review_chain(&app_state, title_id, review_id).await?;
    let comment = load_comment(&app_state, review_id, comment_id).await?;

    if !authorize(
        Principal::Known(&jwt.user),
        ResourceKind::Comment,
        Some(comment.author_id),
        Action::Update,
    ) {
        tracing::error!(comment_id, "Comment update denied");
        return Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }

    let updated = app_state
        .db_client
        .update_comment(comment.id, &body.text)
        .await
        .map_err(|e| {
            tracing::error!("DB error, updating comment: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let response = SingleCommentResponseDto {
        status: "success".to_string(),
        data: updated,
    };
    tracing::info!(comment_id, "update_comment successful");
    Ok(Json(response))
}

/// Delete a comment (author, moderator or admin).
#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn delete_comment(
    Path((title_id, review_id, comment_id)): Path<(i32, i32, i32)>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    ensure_review_chain(&app_state, title_id, review_id).await?;
    let comment = load_comment(&app_state, review_id, comment_id).await?;

    if !authorize(
        Principal::Known(&jwt.user),
        ResourceKind::Comment,
        Some(comment.author_id),
        Action::Delete,
    ) {
        tracing::error!(comment_id, "Comment deletion denied");
        return Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }

    app_state
        .db_client
        .delete_comment(comment.id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, deleting comment: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    tracing::info!(comment_id, "delete_comment successful");
    Ok(StatusCode::NO_CONTENT)
}
