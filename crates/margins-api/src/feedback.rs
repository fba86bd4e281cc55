use axum::{Extension, Json, extract::State};
use chrono::Utc;
use tracing::info;

use margins_db::models::NewFeedback;
use margins_types::api::{FeedbackRequest, FeedbackScope, FeedbackSummary, OkResponse};

use crate::error::{ApiError, ApiResult};
use crate::extract::{Payload, clean};
use crate::middleware::CurrentUser;
use crate::state::{AppState, run_blocking};

/// Validates a submission. Chapter feedback must name its chapter.
pub fn new_feedback(req: FeedbackRequest) -> ApiResult<NewFeedback> {
    let scope = clean(req.scope)
        .and_then(|s| s.parse::<FeedbackScope>().ok())
        .ok_or_else(|| ApiError::bad_request("Invalid scope"))?;

    let chapter_id = clean(req.chapter_id);
    if scope == FeedbackScope::Chapter && chapter_id.is_none() {
        return Err(ApiError::bad_request("chapterId required for chapter feedback"));
    }
    let text = clean(req.text).ok_or_else(|| ApiError::bad_request("Text required"))?;

    Ok(NewFeedback {
        scope: scope.as_str().to_string(),
        chapter_id,
        draft_version: clean(req.draft_version),
        text,
    })
}

pub async fn submit(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Payload(req): Payload<FeedbackRequest>,
) -> ApiResult<Json<OkResponse>> {
    let feedback = new_feedback(req)?;

    let user_id = current.user.id;
    let scope = feedback.scope.clone();
    run_blocking(&state, move |db| db.create_feedback(user_id, &feedback, Utc::now())).await?;

    info!("Feedback ({}) received from {}", scope, current.user.email);
    Ok(Json(OkResponse::ok()))
}

/// How much feedback the reader has sent, for the "thanks" counter.
pub async fn mine(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<FeedbackSummary>> {
    let user_id = current.user.id;
    let rows = run_blocking(&state, move |db| db.list_feedback(Some(user_id))).await?;

    Ok(Json(FeedbackSummary {
        count: rows.len(),
        latest_created_at: rows.first().map(|r| r.created_at),
    }))
}
