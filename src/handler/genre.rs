use crate::{
    AppState,
    db::GenreExt,
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

/// Router for genre endpoints: public read, admin write.
pub fn genre_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(get_genres))
        .route(
            "/",
            post(create_genre)
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route(
            "/{slug}",
            delete(delete_genre).route_layer(middleware::from_fn_with_state(app_state, auth)),
        )
}

fn require_catalog_admin(user: &User, action: Action) -> Result<(), HttpError> {
    if !authorize(Principal::Known(user), ResourceKind::Genre, None, action) {
        tracing::error!(username = %user.username, "Genre write denied");
        return Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }
    Ok(())
}

/// Paginated genre list with name search (public).
#[instrument(skip(app_state))]
pub async fn get_genres(
    Query(params): Query<SearchQueryDto>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    params.validate().map_err(|e| {
        tracing::error!("Invalid get_genres input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let page = params.page.unwrap_or(1);
    let limit = params.limit.unwrap_or(10);
    let search = params.search.as_deref();

    let genres = app_state
        .db_client
        .get_genres(search, page, limit)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting genres: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let total = app_state
        .db_client
        .get_genre_count(search)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting genre count: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let total_pages = (total as f64 / limit as f64).ceil() as i32;

    let response = TagListResponseDto {
        status: "success".to_string(),
        data: genres.into_iter().map(TagDto::from).collect(),
        pagination: PaginationDto {
            page,
            limit,
            total: total as i32,
            total_pages,
        },
    };
    tracing::info!("get_genres successful");
    Ok(Json(response))
}

/// Create a genre (admin only).
#[instrument(skip(app_state, jwt, body), fields(username = %jwt.user.username))]
pub async fn create_genre(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<InputTagDto>,
) -> Result<impl IntoResponse, HttpError> {
    require_catalog_admin(&jwt.user, Action::Create)?;

    body.validate().map_err(|e| {
        tracing::error!("Invalid create_genre input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let result = app_state.db_client.create_genre(&body.name, &body.slug).await;

    let genre = match result {
        Ok(genre) => genre,
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            tracing::error!("DB error, create_genre unique violation: {}", db_err);
            return Err(HttpError::bad_request("slug: already in use".to_string()));
        }
        Err(e) => {
            tracing::error!("DB error, creating genre: {}", e);
            return Err(HttpError::server_error(
                ErrorMessage::ServerError.to_string(),
            ));
        }
    };

    let response = SingleTagResponseDto {
        status: "success".to_string(),
        data: TagDto::from(genre),
    };
    tracing::info!(slug = %body.slug, "create_genre successful");
    Ok((StatusCode::CREATED, Json(response)))
}

/// Delete a genre by slug (admin only). Title links are dropped with it.
#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn delete_genre(
    Path(slug): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    require_catalog_admin(&jwt.user, Action::Delete)?;

    app_state.db_client.delete_genre(&slug).await.map_err(|e| {
        if let sqlx::Error::RowNotFound = e {
            tracing::error!("Genre not found for deletion");
            HttpError::not_found("slug: genre not found".to_string())
        } else {
            tracing::error!("DB error, deleting genre: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        }
    })?;

    tracing::info!(slug = %slug, "delete_genre successful");
    Ok(StatusCode::NO_CONTENT)
}
