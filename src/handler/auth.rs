use crate::{
    AppState,
    db::UserExt,
    dtos::{GetTokenDto, SignUpDto, TokenResponseDto},
    error::{ErrorMessage, HttpError},
    mail::mails::send_confirmation_email,
    utils::{confirmation, token},
};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use tracing::instrument;
use validator::Validate;

/// Router for the signup / token-exchange endpoints. Both are public.
pub fn auth_handler() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/token", post(get_token))
}

/// Register (or re-register) an identity by (username, email).
///
/// A matching existing pair is idempotent: the user is reused and a fresh
/// confirmation code is issued. Either field colliding with a *different*
/// identity is a validation failure keyed to that field.
#[instrument(skip(app_state, body), fields(username = %body.username, email = %body.email))]
pub async fn signup(
    State(app_state): State<AppState>,
    Json(body): Json<SignUpDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid signup input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let by_username = app_state
        .db_client
        .get_user(None, Some(&body.username), None)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting user by username: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let (user, code) = match by_username {
        Some(user) if user.email == body.email => {
            // Same identity signing up again: issue a fresh code.
            let (code, expires_at) = confirmation::generate();
            app_state
                .db_client
                .set_confirmation_code(user.id, &code, expires_at)
                .await
                .map_err(|e| {
                    tracing::error!("DB error, setting confirmation code: {}", e);
                    HttpError::server_error(ErrorMessage::ServerError.to_string())
                })?;
            (user, code)
        }
        Some(_) => {
            tracing::error!("Signup username collision with different email");
            return Err(HttpError::bad_request(
                "username: already registered with a different email".to_string(),
            ));
        }
        None => {
            let by_email = app_state
                .db_client
                .get_user(None, None, Some(&body.email))
                .await
                .map_err(|e| {
                    tracing::error!("DB error, getting user by email: {}", e);
                    HttpError::server_error(ErrorMessage::ServerError.to_string())
                })?;

            if by_email.is_some() {
                tracing::error!("Signup email collision with different username");
                return Err(HttpError::bad_request(
                    "email: already registered with a different username".to_string(),
                ));
            }

            let (code, expires_at) = confirmation::generate();
            let result = app_state
                .db_client
                .signup_user(&body.username, &body.email, &code, expires_at)
                .await;

            match result {
                Ok(user) => (user, code),
                Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                    // Lost the race against a concurrent signup.
                    tracing::error!("DB error, signup unique violation: {}", db_err);
                    return Err(HttpError::bad_request(
                        "username: already registered".to_string(),
                    ));
                }
                Err(e) => {
                    tracing::error!("DB error, saving signup user: {}", e);
                    return Err(HttpError::server_error(
                        ErrorMessage::ServerError.to_string(),
                    ));
                }
            }
        }
    };

    // The confirmation flow survives a failed delivery; the code can be
    // re-requested by signing up again.
    if let Err(e) = send_confirmation_email(&user.email, &user.username, &code).await {
        tracing::error!("Failed to send confirmation email: {}", e);
    }

    tracing::info!(username = %body.username, "Signup successful");
    Ok((StatusCode::OK, Json(body)))
}

/// Exchange a confirmation code for a bearer access token.
#[instrument(skip(app_state, body), fields(username = %body.username))]
pub async fn get_token(
    State(app_state): State<AppState>,
    Json(body): Json<GetTokenDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid get_token input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let user = app_state
        .db_client
        .get_user(None, Some(&body.username), None)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting user: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| {
            tracing::error!("Token requested for unknown username");
            HttpError::not_found("username: user not found".to_string())
        })?;

    if !confirmation::verify(&user, &body.confirmation_code) {
        tracing::error!(user_id = %user.id, "Confirmation code mismatch or expired");
        return Err(HttpError::bad_request(
            "confirmation_code: invalid or expired confirmation code".to_string(),
        ));
    }

    // Single use: consume the code before handing out the token.
    app_state
        .db_client
        .clear_confirmation_code(user.id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, clearing confirmation code: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let access_token = token::create_token(
        &user.id.to_string(),
        app_state.env.jwt_secret.as_bytes(),
        app_state.env.jwt_maxage,
    )
    .map_err(|e| {
        tracing::error!("Access token creation error: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    tracing::info!(user_id = %user.id, "Token issued");
    Ok((
        StatusCode::CREATED,
        Json(TokenResponseDto {
            token: access_token,
        }),
    ))
}
