use std::sync::Arc;

use axum::Extension;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{TimeDelta, Utc};
use tower_cookies::Cookies;

use comanda_core::AppError;
use comanda_core::auth::{
    NewUser, generate_session_token, hash_password, hash_session_token, normalize_email,
    validate_registration, verify_password,
};

use crate::auth::{CurrentUser, SESSION_COOKIE, clear_session_cookie, session_cookie};
use crate::dto::{LoginRequest, RegisterRequest};
use crate::error::{ApiError, AppJson};
use crate::state::AppState;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Run CPU-bound password hashing on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Generic(format!("Password task failed: {e}")))?
}

/// Create a session row for `user` and hand its token to the browser.
async fn start_session(
    state: &AppState,
    cookies: &Cookies,
    user: &CurrentUser,
) -> Result<(), AppError> {
    let token = generate_session_token();
    let expires_at = Utc::now() + TimeDelta::hours(state.session_ttl_hours);
    state
        .db
        .user_repo()
        .create_session(user.id, &hash_session_token(&token), expires_at)
        .await?;

    cookies.add(session_cookie(
        token,
        state.cookie_secure,
        state.session_ttl_hours,
    ));
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created and signed in", body = CurrentUser),
        (status = 400, description = "Invalid email, password, or business name", body = crate::dto::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::dto::ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    AppJson(body): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&body.email);
    validate_registration(&email, &body.password, &body.business_name)?;

    let password = body.password;
    let password_hash = blocking(move || hash_password(&password)).await?;
    let user = state
        .db
        .user_repo()
        .create(&NewUser {
            email,
            password_hash,
            business_name: body.business_name.trim().to_string(),
        })
        .await?;
    let user = CurrentUser::from(user);

    start_session(&state, &cookies, &user).await?;
    tracing::info!(user_id = %user.id, "User registered");

    Ok((StatusCode::CREATED, axum::Json(user)))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = CurrentUser),
        (status = 401, description = "Invalid email or password", body = crate::dto::ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    AppJson(body): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let credentials = state
        .db
        .user_repo()
        .find_credentials(&normalize_email(&body.email))
        .await?
        .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.into()))?;

    let password = body.password;
    let stored_hash = credentials.password_hash;
    if !blocking(move || verify_password(&password, &stored_hash)).await? {
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()).into());
    }

    let user = CurrentUser::from(credentials.user);
    start_session(&state, &cookies, &user).await?;
    tracing::info!(user_id = %user.id, "User signed in");

    Ok(axum::Json(user))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 204, description = "Signed out; the session cookie is cleared"),
    ),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = cookies.get(SESSION_COOKIE).map(|c| c.value().to_string()) {
        let token_hash = hash_session_token(&token);
        state.db.user_repo().delete_session(&token_hash).await?;
        state.sessions.invalidate(&token_hash).await;
    }
    clear_session_cookie(&cookies);

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = CurrentUser),
        (status = 401, description = "Not signed in", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "auth"
)]
pub async fn me(Extension(user): Extension<CurrentUser>) -> impl IntoResponse {
    axum::Json(user)
}
