//! Author's console. Routes here sit behind `require_admin`.

use axum::{Extension, Json, extract::State};
use tracing::info;

use margins_db::models::{FeedbackRow, InviteRow, ReaderProgressRow};
use margins_types::api::{
    AdminProgressItem, FeedbackItem, FeedbackStatus, FeedbackStatusUpdate, InviteItem, Items,
    NewInviteRequest, OkResponse,
};

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiPath, Payload, clean};
use crate::listening::progress_item;
use crate::middleware::CurrentUser;
use crate::state::{AppState, run_blocking};

fn invite_item(row: InviteRow) -> InviteItem {
    InviteItem {
        code: row.code,
        used_at: row.used_at,
        used_by_email: row.used_by_email,
    }
}

fn feedback_item(row: FeedbackRow) -> FeedbackItem {
    FeedbackItem {
        id: row.id,
        user_id: row.user_id,
        scope: row.scope,
        chapter_id: row.chapter_id,
        status: row.status,
        draft_version: row.draft_version,
        text: row.text,
        created_at: row.created_at,
    }
}

fn progress_summary(row: ReaderProgressRow) -> AdminProgressItem {
    AdminProgressItem {
        user_id: row.user_id,
        name: row.name,
        email: row.email,
        created_at: row.created_at,
        chapters_started: row.chapters_started,
        latest: row.latest.map(progress_item),
    }
}

pub async fn list_invites(State(state): State<AppState>) -> ApiResult<Json<Items<InviteItem>>> {
    let rows = run_blocking(&state, |db| db.list_invites()).await?;
    Ok(Json(Items {
        items: rows.into_iter().map(invite_item).collect(),
    }))
}

pub async fn add_invite(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Payload(req): Payload<NewInviteRequest>,
) -> ApiResult<Json<OkResponse>> {
    let code = clean(req.code).ok_or_else(|| ApiError::bad_request("Missing code"))?;

    let new_code = code.clone();
    if !run_blocking(&state, move |db| db.create_invite(&new_code)).await? {
        return Err(ApiError::bad_request("Code already exists"));
    }

    info!("Invite code {} created by {}", code, current.user.email);
    Ok(Json(OkResponse::ok()))
}

pub async fn list_feedback(State(state): State<AppState>) -> ApiResult<Json<Items<FeedbackItem>>> {
    let rows = run_blocking(&state, |db| db.list_feedback(None)).await?;
    Ok(Json(Items {
        items: rows.into_iter().map(feedback_item).collect(),
    }))
}

pub async fn update_feedback(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    Payload(req): Payload<FeedbackStatusUpdate>,
) -> ApiResult<Json<OkResponse>> {
    let status = req
        .status
        .and_then(|s| s.parse::<FeedbackStatus>().ok())
        .ok_or_else(|| ApiError::bad_request("Invalid status"))?;

    if !run_blocking(&state, move |db| db.set_feedback_status(id, status.as_str())).await? {
        return Err(ApiError::not_found());
    }

    info!("Feedback {} marked {}", id, status.as_str());
    Ok(Json(OkResponse::ok()))
}

pub async fn reader_progress(State(state): State<AppState>) -> ApiResult<Json<Items<AdminProgressItem>>> {
    let rows = run_blocking(&state, |db| db.reader_progress()).await?;
    Ok(Json(Items {
        items: rows.into_iter().map(progress_summary).collect(),
    }))
}
