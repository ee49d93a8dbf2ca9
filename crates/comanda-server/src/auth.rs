use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use comanda_core::auth::{User, hash_session_token};
use comanda_core::AppError;
use moka::future::Cache;
use serde::Serialize;
use tower_cookies::cookie::SameSite;
use tower_cookies::cookie::time::Duration as CookieDuration;
use tower_cookies::{Cookie, Cookies};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "comanda_session";

const CACHE_CAPACITY: u64 = 10_000;
const CACHE_TTL: Duration = Duration::from_secs(300);

/// The signed-in user, inserted into request extensions by [`require_session`].
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub business_name: String,
}

impl From<User> for CurrentUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            business_name: user.business_name,
        }
    }
}

#[derive(Clone)]
struct CachedSession {
    user: CurrentUser,
    expires_at: DateTime<Utc>,
}

/// Session lookups keyed by token hash. Entries live at most a few minutes so
/// sessions deleted in another process expire from here too, and never past
/// the session's own expiry.
#[derive(Clone)]
pub struct SessionCache {
    inner: Cache<String, CachedSession>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }

    pub async fn get(&self, token_hash: &str) -> Option<CurrentUser> {
        let cached = self.inner.get(token_hash).await?;
        if cached.expires_at <= Utc::now() {
            self.inner.invalidate(token_hash).await;
            return None;
        }
        Some(cached.user)
    }

    pub async fn insert(&self, token_hash: String, user: CurrentUser, expires_at: DateTime<Utc>) {
        self.inner
            .insert(token_hash, CachedSession { user, expires_at })
            .await;
    }

    pub async fn invalidate(&self, token_hash: &str) {
        self.inner.invalidate(token_hash).await;
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new()
    }
}

pub fn session_cookie(token: String, secure: bool, ttl_hours: i64) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(CookieDuration::hours(ttl_hours))
        .build()
}

pub fn clear_session_cookie(cookies: &Cookies) {
    cookies.remove(Cookie::build(SESSION_COOKIE).path("/").build());
}

/// Middleware that resolves the `comanda_session` cookie to a [`CurrentUser`].
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = cookies.get(SESSION_COOKIE).map(|c| c.value().to_string()) else {
        return ApiError(AppError::Unauthorized("Not signed in".into())).into_response();
    };
    let token_hash = hash_session_token(&token);

    let user = match state.sessions.get(&token_hash).await {
        Some(user) => user,
        None => match state.db.user_repo().find_session_user(&token_hash).await {
            Ok(Some(session)) => {
                let user = CurrentUser::from(session.user);
                state
                    .sessions
                    .insert(token_hash, user.clone(), session.expires_at)
                    .await;
                user
            }
            Ok(None) => {
                clear_session_cookie(&cookies);
                return ApiError(AppError::Unauthorized("Session expired or invalid".into()))
                    .into_response();
            }
            Err(e) => return ApiError(e).into_response(),
        },
    };

    request.extensions_mut().insert(user);
    next.run(request).await
}
