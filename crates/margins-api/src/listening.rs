//! Audiobook listening state: per-chapter progress, timestamp bookmarks and
//! reviewer notes. Every query is scoped to the signed-in reader, so another
//! reader's ids read as not found.

use axum::{Extension, Json, extract::State};
use chrono::Utc;

use margins_db::models::{BookmarkRow, NoteEdit, NoteMeta, NoteRow, ProgressRow};
use margins_types::api::{
    BookmarkItem, ChapterFilter, CreatedResponse, EditNoteRequest, Items, NewBookmarkRequest,
    NewNoteRequest, NoteItem, OkResponse, ProgressItem, ProgressUpdate,
};

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiPath, ApiQuery, Payload, clean, clean_present, position};
use crate::middleware::CurrentUser;
use crate::state::{AppState, run_blocking};

pub fn progress_item(row: ProgressRow) -> ProgressItem {
    ProgressItem {
        chapter_id: row.chapter_id,
        position_seconds: row.position_seconds,
        updated_at: row.updated_at,
    }
}

fn bookmark_item(row: BookmarkRow) -> BookmarkItem {
    BookmarkItem {
        id: row.id,
        chapter_id: row.chapter_id,
        position_seconds: row.position_seconds,
        label: row.label,
        created_at: row.created_at,
    }
}

fn note_item(row: NoteRow) -> NoteItem {
    NoteItem {
        id: row.id,
        chapter_id: row.chapter_id,
        position_seconds: row.position_seconds,
        note_type: row.note_type,
        severity: row.severity,
        spoiler: row.spoiler,
        text: row.text,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

/// Builds a partial note edit. Text is mandatory; metadata keys that were
/// absent from the body stay untouched.
pub fn note_edit(req: EditNoteRequest) -> ApiResult<NoteEdit> {
    let text = clean(req.text).ok_or_else(|| ApiError::bad_request("Missing text"))?;
    Ok(NoteEdit {
        text,
        note_type: clean_present(req.note_type),
        severity: clean_present(req.severity),
        spoiler: req.spoiler,
        excerpt: clean_present(req.excerpt),
    })
}

// -- Progress --

pub async fn get_progress(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Items<ProgressItem>>> {
    let user_id = current.user.id;
    let rows = run_blocking(&state, move |db| db.list_progress(user_id)).await?;

    Ok(Json(Items {
        items: rows.into_iter().map(progress_item).collect(),
    }))
}

pub async fn save_progress(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Payload(req): Payload<ProgressUpdate>,
) -> ApiResult<Json<OkResponse>> {
    let chapter_id = clean(req.chapter_id).ok_or_else(|| ApiError::bad_request("Missing chapterId"))?;
    let position_seconds = position(req.position_seconds)?;

    let user_id = current.user.id;
    run_blocking(&state, move |db| {
        db.upsert_progress(user_id, &chapter_id, position_seconds, Utc::now())
    })
    .await?;

    Ok(Json(OkResponse::ok()))
}

// -- Bookmarks --

pub async fn list_bookmarks(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiQuery(filter): ApiQuery<ChapterFilter>,
) -> ApiResult<Json<Items<BookmarkItem>>> {
    let user_id = current.user.id;
    let chapter_id = clean(filter.chapter_id);
    let rows = run_blocking(&state, move |db| db.list_bookmarks(user_id, chapter_id.as_deref())).await?;

    Ok(Json(Items {
        items: rows.into_iter().map(bookmark_item).collect(),
    }))
}

pub async fn add_bookmark(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Payload(req): Payload<NewBookmarkRequest>,
) -> ApiResult<Json<CreatedResponse>> {
    let chapter_id = clean(req.chapter_id).ok_or_else(|| ApiError::bad_request("Missing chapterId"))?;
    let position_seconds = position(req.position_seconds)?;
    let label = clean(req.label);

    let user_id = current.user.id;
    let id = run_blocking(&state, move |db| {
        db.create_bookmark(user_id, &chapter_id, position_seconds, label.as_deref(), Utc::now())
    })
    .await?;

    Ok(Json(CreatedResponse { ok: true, id }))
}

pub async fn delete_bookmark(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<OkResponse>> {
    let user_id = current.user.id;
    let deleted = run_blocking(&state, move |db| db.delete_bookmark(user_id, id)).await?;
    if !deleted {
        return Err(ApiError::not_found());
    }
    Ok(Json(OkResponse::ok()))
}

// -- Notes --

pub async fn list_notes(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiQuery(filter): ApiQuery<ChapterFilter>,
) -> ApiResult<Json<Items<NoteItem>>> {
    let user_id = current.user.id;
    let chapter_id = clean(filter.chapter_id);
    let rows = run_blocking(&state, move |db| db.list_notes(user_id, chapter_id.as_deref())).await?;

    Ok(Json(Items {
        items: rows.into_iter().map(note_item).collect(),
    }))
}

pub async fn add_note(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Payload(req): Payload<NewNoteRequest>,
) -> ApiResult<Json<CreatedResponse>> {
    let (Some(chapter_id), Some(text)) = (clean(req.chapter_id), clean(req.text)) else {
        return Err(ApiError::bad_request("Missing chapterId or text"));
    };
    let position_seconds = position(req.position_seconds)?;
    let meta = NoteMeta {
        note_type: clean(req.note_type),
        severity: clean(req.severity),
        spoiler: req.spoiler,
    };

    let user_id = current.user.id;
    let id = run_blocking(&state, move |db| {
        db.create_note(user_id, &chapter_id, position_seconds, &meta, &text, Utc::now())
    })
    .await?;

    Ok(Json(CreatedResponse { ok: true, id }))
}

pub async fn edit_note(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
    Payload(req): Payload<EditNoteRequest>,
) -> ApiResult<Json<OkResponse>> {
    let edit = note_edit(req)?;

    let user_id = current.user.id;
    let updated = run_blocking(&state, move |db| db.edit_note(user_id, id, &edit, Utc::now())).await?;
    if !updated {
        return Err(ApiError::not_found());
    }
    Ok(Json(OkResponse::ok()))
}

pub async fn delete_note(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<OkResponse>> {
    let user_id = current.user.id;
    let deleted = run_blocking(&state, move |db| db.delete_note(user_id, id)).await?;
    if !deleted {
        return Err(ApiError::not_found());
    }
    Ok(Json(OkResponse::ok()))
}
