use crate::{
    AppState,
    db::CategoryExt,
    dtos::{
        InputTagDto, PaginationDto, SearchQueryDto, SingleTagResponseDto, TagDto,
        TagListResponseDto,
    },
    error::{ErrorMessage, HttpError},
    middleware::{JWTAuthMiddleware, auth},
    models::User,
    policy::{Action, Principal, ResourceKind, authorize},
};
use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post},
};
use tracing::instrument;
use validator::Validate;

/// Router for category endpoints: public read, admin write.
pub fn category_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(get_categories))
        .route(
            "/",
            post(create_category)
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route(
            "/{slug}",
            delete(delete_category)
                .route_layer(middleware::from_fn_with_state(app_state, auth)),
        )
}

fn require_catalog_admin(user: &User, action: Action) -> Result<(), HttpError> {
    if !authorize(
        Principal::Known(user),
        ResourceKind::Category,
        None,
        action,
    ) {
        tracing::error!(username = %user.username, "Category write denied");
        return Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }
    Ok(())
}

/// Paginated category list with name search (public).
#[instrument(skip(app_state))]
pub async fn get_categories(
    Query(params): Query<SearchQueryDto>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    params.validate().map_err(|e| {
        tracing::error!("Invalid get_categories input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let page = params.page.unwrap_or(1);
    let limit = params.limit.unwrap_or(10);
    let search = params.search.as_deref();

    let categories = app_state
        .db_client
        .get_categories(search, page, limit)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting categories: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let total = app_state
        .db_client
        .get_category_count(search)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting category count: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let total_pages = (total as f64 / limit as f64).ceil() as i32;

    let response = TagListResponseDto {
        status: "success".to_string(),
        data: categories.into_iter().map(TagDto::from).collect(),
        pagination: PaginationDto {
            page,
            limit,
            total: total as i32,
            total_pages,
        },
    };
    tracing::info!("get_categories successful");
    Ok(Json(response))
}

/// Create a category (admin only).
#[instrument(skip(app_state, jwt, body), fields(username = %jwt.user.username))]
pub async fn create_category(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<InputTagDto>,
) -> Result<impl IntoResponse, HttpError> {
    require_catalog_admin(&jwt.user, Action::Create)?;

    body.validate().map_err(|e| {
        tracing::error!("Invalid create_category input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let result = app_state
        .db_client
        .create_category(&body.name, &body.slug)
        .await;

    let category = match result {
        Ok(category) => category,
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            tracing::error!("DB error, create_category unique violation: {}", db_err);
            return Err(HttpError::bad_request("slug: already in use".to_string()));
        }
        Err(e) => {
            tracing::error!("DB error, creating category: {}", e);
            return Err(HttpError::server_error(
                ErrorMessage::ServerError.to_string(),
            ));
        }
    };

    let response = SingleTagResponseDto {
        status: "success".to_string(),
        data: TagDto::from(category),
    };
    tracing::info!(slug = %body.slug, "create_category successful");
    Ok((StatusCode::CREATED, Json(response)))
}

/// Delete a category by slug (admin only). Titles referencing it are
/// detached, not deleted.
#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn delete_category(
    Path(slug): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    require_catalog_admin(&jwt.user, Action::Delete)?;

    app_state
        .db_client
        .delete_category(&slug)
        .await
        .map_err(|e| {
            if let sqlx::Error::RowNotFound = e {
                tracing::error!("Category not found for deletion");
                HttpError::not_found("slug: category not found".to_string())
            } else {
                tracing::error!("DB error, deleting category: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
        })?;

    tracing::info!(slug = %slug, "delete_category successful");
    Ok(StatusCode::NO_CONTENT)
}
