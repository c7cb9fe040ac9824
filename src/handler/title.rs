use crate::{
    AppState,
    db::{CategoryExt, GenreExt, TitleExt},
    dtos::{
        InputTitleDto, PaginationDto, SingleTitleResponseDto, TitleListResponseDto,
        TitlesQueryDto, UpdateTitleDto,
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
    routing::{get, patch, post},
};
use tracing::instrument;
use validator::Validate;

/// Router for title endpoints: public read, admin write, no PUT.
pub fn title_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(get_titles))
        .route(
            "/",
            post(create_title)
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route("/{title_id}", get(get_title))
        .route(
            "/{title_id}",
            patch(update_title)
                .delete(delete_title)
                .route_layer(middleware::from_fn_with_state(app_state, auth)),
        )
}

fn require_catalog_admin(user: &User, action: Action) -> Result<(), HttpError> {
    if !authorize(Principal::Known(user), ResourceKind::Title, None, action) {
        tracing::error!(username = %user.username, "Title write denied");
        return Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }
    Ok(())
}

/// Resolve a category slug from a write body to its internal id.
async fn resolve_category(app_state: &AppState, slug: &str) -> Result<i32, HttpError> {
    let category = app_state
        .db_client
        .get_category_by_slug(slug)
        .await
        .map_err(|e| {
            tracing::error!("DB error, resolving category slug: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| {
            tracing::error!(slug = %slug, "Unknown category slug in title body");
            HttpError::bad_request(format!("category: unknown slug '{}'", slug))
        })?;
    Ok(category.id)
}

/// Resolve genre slugs from a write body; any unknown slug fails the whole
/// request.
async fn resolve_genres(app_state: &AppState, slugs: &[String]) -> Result<Vec<i32>, HttpError> {
    let genres = app_state
        .db_client
        .get_genres_by_slugs(slugs)
        .await
        .map_err(|e| {
            tracing::error!("DB error, resolving genre slugs: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    if genres.len() != slugs.iter().collect::<std::collections::HashSet<_>>().len() {
        let known: Vec<&str> = genres.iter().map(|g| g.slug.as_str()).collect();
        let missing: Vec<&str> = slugs
            .iter()
            .map(String::as_str)
            .filter(|s| !known.contains(s))
            .collect();
        tracing::error!(missing = ?missing, "Unknown genre slugs in title body");
        return Err(HttpError::bad_request(format!(
            "genre: unknown slug(s) {}",
            missing.join(", ")
        )));
    }

    Ok(genres.into_iter().map(|g| g.id).collect())
}

/// Filtered, paginated title list (public). Embeds category/genres and the
/// derived rating.
#[instrument(skip(app_state))]
pub async fn get_titles(
    Query(params): Query<TitlesQueryDto>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    params.validate().map_err(|e| {
        tracing::error!("Invalid get_titles input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let page = params.page.unwrap_or(1);
    let limit = params.limit.unwrap_or(10);

    let titles = app_state
        .db_client
        .get_titles(
            params.category.as_deref(),
            params.genre.as_deref(),
            params.name.as_deref(),
            params.year,
            page,
            limit,
        )
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting titles: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let total = app_state
        .db_client
        .get_title_count(
            params.category.as_deref(),
            params.genre.as_deref(),
            params.name.as_deref(),
            params.year,
        )
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting title count: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let total_pages = (total as f64 / limit as f64).ceil() as i32;

    let response = TitleListResponseDto {
        status: "success".to_string(),
        data: titles,
        pagination: PaginationDto {
            page,
            limit,
            total: total as i32,
            total_pages,
        },
    };
    tracing::info!("get_titles successful");
    Ok(Json(response))
}

/// Single title with embedded tags and rating (public).
#[instrument(skip(app_state))]
pub async fn get_title(
    Path(title_id): Path<i32>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let title = app_state
        .db_client
        .get_title(title_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting title: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("title: not found".to_string()))?;

    let response = SingleTitleResponseDto {
        status: "success".to_string(),
        data: title,
    };
    tracing::info!("get_title successful");
    Ok(Json(response))
}

/// Create a title (admin only). Genres and category come in as slugs.
#[instrument(skip(app_state, jwt, body), fields(username = %jwt.user.username))]
pub async fn create_title(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<InputTitleDto>,
) -> Result<impl IntoResponse, HttpError> {
    require_catalog_admin(&jwt.user, Action::Create)?;

    body.validate().map_err(|e| {
        tracing::error!("Invalid create_title input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let category_id = match body.category.as_deref() {
        Some(slug) => Some(resolve_category(&app_state, slug).await?),
        None => None,
    };

    let genre_ids = match body.genre.as_deref() {
        Some(slugs) => resolve_genres(&app_state, slugs).await?,
        None => Vec::new(),
    };

    let title_id = app_state
        .db_client
        .create_title(
            &body.name,
            body.year,
            body.description.as_deref(),
            category_id,
            &genre_ids,
        )
        .await
        .map_err(|e| {
            tracing::error!("DB error, creating title: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let title = app_state
        .db_client
        .get_title(title_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, reloading created title: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::server_error(ErrorMessage::ServerError.to_string()))?;

    let response = SingleTitleResponseDto {
        status: "success".to_string(),
        data: title,
    };
    tracing::info!(title_id, "create_title successful");
    Ok((StatusCode::CREATED, Json(response)))
}

/// Partial title update (admin only). A present genre list replaces the
/// whole link set.
#[instrument(skip(app_state, jwt, body), fields(username = %jwt.user.username))]
pub async fn update_title(
    Path(title_id): Path<i32>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<UpdateTitleDto>,
) -> Result<impl IntoResponse, HttpError> {
    require_catalog_admin(&jwt.user, Action::Update)?;

    body.validate().map_err(|e| {
        tracing::error!("Invalid update_title input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let category_id = match body.category.as_deref() {
        Some(slug) => Some(resolve_category(&app_state, slug).await?),
        None => None,
    };

    let genre_ids = match body.genre.as_deref() {
        Some(slugs) => Some(resolve_genres(&app_state, slugs).await?),
        None => None,
    };

    app_state
        .db_client
        .update_title(
            title_id,
            body.name.as_deref(),
            body.year,
            body.description.as_deref(),
            category_id,
            genre_ids.as_deref(),
        )
        .await
        .map_err(|e| {
            if let sqlx::Error::RowNotFound = e {
                tracing::error!("Title not found for update");
                HttpError::not_found("title: not found".to_string())
            } else {
                tracing::error!("DB error, updating title: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
        })?;

    let title = app_state
        .db_client
        .get_title(title_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, reloading updated title: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("title: not found".to_string()))?;

    let response = SingleTitleResponseDto {
        status: "success".to_string(),
        data: title,
    };
    tracing::info!(title_id, "update_title successful");
    Ok(Json(response))
}

/// Delete a title (admin only). Reviews and comments go with it.
#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn delete_title(
    Path(title_id): Path<i32>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    require_catalog_admin(&jwt.user, Action::Delete)?;

    app_state
        .db_client
        .delete_title(title_id)
        .await
        .map_err(|e| {
            if let sqlx::Error::RowNotFound = e {
                tracing::error!("Title not found for deletion");
                HttpError::not_found("title: not found".to_string())
            } else {
                tracing::error!("DB error, deleting title: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
        })?;

    tracing::info!(title_id, "delete_title successful");
    Ok(StatusCode::NO_CONTENT)
}
