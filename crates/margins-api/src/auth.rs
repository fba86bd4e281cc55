use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::SaltString,
};
use axum::{Extension, Json, extract::State};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::{Duration, Utc};
use rand_core::OsRng;
use tracing::info;

use margins_db::models::{SignupOutcome, UserRow};
use margins_types::api::{LoginRequest, MeResponse, OkResponse, SignupRequest, UserSummary};

use crate::error::{ApiError, ApiResult};
use crate::extract::{Payload, clean};
use crate::middleware::{CurrentUser, SESSION_COOKIE, create_token, resolve_session, session_cookie};
use crate::state::{AppState, run_blocking};

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?;
    Ok(hash.to_string())
}

/// False for a wrong password and for a hash that does not parse.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

pub fn user_summary(user: &UserRow) -> UserSummary {
    UserSummary {
        id: user.id,
        name: user.name.clone(),
        email: user.email.clone(),
        is_admin: user.is_admin,
    }
}

/// Stores a new session row and returns the cookie that names it.
async fn open_session(state: &AppState, user_id: i64) -> ApiResult<Cookie<'static>> {
    let now = Utc::now();
    let expires_at = now + Duration::days(state.config.session_days);

    let session_id = run_blocking(state, move |db| {
        db.prune_sessions(user_id, now)?;
        db.create_session(user_id, now, expires_at)
    })
    .await?;

    let token = create_token(&state.config.secret, user_id, &session_id, expires_at)?;
    Ok(session_cookie(token, state.config.cookie_secure))
}

pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Payload(req): Payload<SignupRequest>,
) -> ApiResult<(CookieJar, Json<OkResponse>)> {
    let name = clean(req.name);
    let email = clean(req.email).map(|e| e.to_lowercase());
    let invite_code = clean(req.invite_code);
    let password = req.password.filter(|p| !p.is_empty());

    let (Some(name), Some(email), Some(password), Some(invite_code)) =
        (name, email, password, invite_code)
    else {
        return Err(ApiError::bad_request("Missing required fields"));
    };

    let new_email = email.clone();
    // Bad invites are refused before paying for the hash.
    let outcome = run_blocking(&state, move |db| {
        if let Some(rejected) = db.check_signup(&new_email, &invite_code)? {
            return Ok(rejected);
        }
        let password_hash = hash_password(&password)?;
        db.signup(&name, &new_email, &password_hash, &invite_code, Utc::now())
    })
    .await?;

    let user_id = match outcome {
        SignupOutcome::Created { user_id } => user_id,
        SignupOutcome::InvalidInvite => return Err(ApiError::bad_request("Invalid invite code")),
        SignupOutcome::InviteUsed => return Err(ApiError::bad_request("Invite code already used")),
        SignupOutcome::EmailTaken => return Err(ApiError::bad_request("Email already registered")),
    };

    info!("New reader signed up: {}", email);
    let cookie = open_session(&state, user_id).await?;
    Ok((jar.add(cookie), Json(OkResponse::ok())))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Payload(req): Payload<LoginRequest>,
) -> ApiResult<(CookieJar, Json<OkResponse>)> {
    let email = clean(req.email).map(|e| e.to_lowercase()).unwrap_or_default();
    let password = req.password.unwrap_or_default();

    let user = run_blocking(&state, move |db| {
        Ok(db
            .get_user_by_email(&email)?
            .filter(|user| verify_password(&password, &user.password_hash)))
    })
    .await?
    .ok_or_else(|| ApiError::bad_request("Invalid email or password"))?;

    info!("Reader logged in: {}", user.email);
    let cookie = open_session(&state, user.id).await?;
    Ok((jar.add(cookie), Json(OkResponse::ok())))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<OkResponse>)> {
    let session_id = current.session_id;
    run_blocking(&state, move |db| db.delete_session(&session_id)).await?;

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((jar, Json(OkResponse::ok())))
}

pub async fn me(State(state): State<AppState>, jar: CookieJar) -> ApiResult<Json<MeResponse>> {
    let current = resolve_session(&state, &jar).await?;

    Ok(Json(MeResponse {
        authenticated: current.is_some(),
        user: current.map(|c| user_summary(&c.user)),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("battery staple", &hash));
    }

    #[test]
    fn unparseable_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }
}
