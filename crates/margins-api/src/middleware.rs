use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use margins_db::models::UserRow;

use crate::error::ApiError;
use crate::state::{AppState, run_blocking};

pub const SESSION_COOKIE: &str = "margins_session";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: i64,
    /// Session row id.
    pub sid: String,
    pub exp: usize,
}

/// The signed-in reader, attached to the request by [`require_auth`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: UserRow,
    pub session_id: String,
}

pub fn create_token(
    secret: &str,
    user_id: i64,
    session_id: &str,
    expires_at: DateTime<Utc>,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        sid: session_id.to_string(),
        exp: expires_at.timestamp().max(0) as usize,
    };

    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

/// Resolves the session cookie to a user. Bad signatures, expired tokens and
/// deleted or expired session rows all read as "not signed in".
pub async fn resolve_session(state: &AppState, jar: &CookieJar) -> Result<Option<CurrentUser>, ApiError> {
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return Ok(None);
    };

    let Ok(token) = decode::<Claims>(
        cookie.value(),
        &DecodingKey::from_secret(state.config.secret.as_bytes()),
        &Validation::default(),
    ) else {
        return Ok(None);
    };
    let claims = token.claims;
    let now = Utc::now();

    run_blocking(state, move |db| {
        let Some(session) = db.get_session(&claims.sid)? else {
            return Ok(None);
        };
        if session.user_id != claims.sub || session.expires_at <= now {
            return Ok(None);
        }
        Ok(db
            .get_user_by_id(session.user_id)?
            .map(|user| CurrentUser { user, session_id: session.id }))
    })
    .await
}

pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = resolve_session(&state, &jar)
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Runs inside [`require_auth`].
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    let user = req
        .extensions()
        .get::<CurrentUser>()
        .ok_or(ApiError::Unauthenticated)?;

    if !user.user.is_admin {
        return Err(ApiError::Forbidden);
    }
    Ok(next.run(req).await)
}
