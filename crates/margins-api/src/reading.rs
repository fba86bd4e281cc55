//! E-book reading state. Locations are EPUB CFIs; chapter href and title ride
//! along so lists can show where an annotation sits.

use axum::{Extension, Json, extract::State};
use chrono::Utc;

use margins_db::models::{EpubBookmarkRow, EpubLocation, EpubNoteRow, NoteMeta};
use margins_types::api::{
    CreatedResponse, EditNoteRequest, EpubBookmarkItem, EpubNoteItem, EpubProgressResponse,
    EpubProgressUpdate, Items, NewEpubBookmarkRequest, NewEpubNoteRequest, OkResponse,
};

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiPath, Payload, clean};
use crate::listening::note_edit;
use crate::middleware::CurrentUser;
use crate::state::{AppState, run_blocking};

fn location(cfi: String, chapter_href: Option<String>, chapter_title: Option<String>) -> EpubLocation {
    EpubLocation {
        cfi,
        chapter_href: clean(chapter_href),
        chapter_title: clean(chapter_title),
    }
}

fn missing_cfi() -> ApiError {
    ApiError::bad_request("Missing cfi")
}

fn bookmark_item(row: EpubBookmarkRow) -> EpubBookmarkItem {
    EpubBookmarkItem {
        id: row.id,
        cfi: row.cfi,
        chapter_href: row.chapter_href,
        chapter_title: row.chapter_title,
        label: row.label,
        created_at: row.created_at,
    }
}

fn note_item(row: EpubNoteRow) -> EpubNoteItem {
    EpubNoteItem {
        id: row.id,
        cfi: row.cfi,
        chapter_href: row.chapter_href,
        chapter_title: row.chapter_title,
        note_type: row.note_type,
        severity: row.severity,
        spoiler: row.spoiler,
        excerpt: row.excerpt,
        text: row.text,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

// -- Progress --

pub async fn get_progress(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<EpubProgressResponse>> {
    let user_id = current.user.id;
    let row = run_blocking(&state, move |db| db.get_epub_progress(user_id)).await?;

    Ok(Json(match row {
        Some(row) => EpubProgressResponse {
            cfi: Some(row.cfi),
            chapter_href: row.chapter_href,
            chapter_title: row.chapter_title,
            updated_at: Some(row.updated_at),
        },
        None => EpubProgressResponse {
            cfi: None,
            chapter_href: None,
            chapter_title: None,
            updated_at: None,
        },
    }))
}

pub async fn save_progress(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Payload(req): Payload<EpubProgressUpdate>,
) -> ApiResult<Json<OkResponse>> {
    let cfi = clean(req.cfi).ok_or_else(missing_cfi)?;
    let at = location(cfi, req.chapter_href, req.chapter_title);

    let user_id = current.user.id;
    run_blocking(&state, move |db| db.upsert_epub_progress(user_id, &at, Utc::now())).await?;

    Ok(Json(OkResponse::ok()))
}

// -- Bookmarks --

pub async fn list_bookmarks(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Items<EpubBookmarkItem>>> {
    let user_id = current.user.id;
    let rows = run_blocking(&state, move |db| db.list_epub_bookmarks(user_id)).await?;

    Ok(Json(Items {
        items: rows.into_iter().map(bookmark_item).collect(),
    }))
}

pub async fn add_bookmark(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Payload(req): Payload<NewEpubBookmarkRequest>,
) -> ApiResult<Json<CreatedResponse>> {
    let cfi = clean(req.cfi).ok_or_else(missing_cfi)?;
    let at = location(cfi, req.chapter_href, req.chapter_title);
    let label = clean(req.label);

    let user_id = current.user.id;
    let id = run_blocking(&state, move |db| {
        db.create_epub_bookmark(user_id, &at, label.as_deref(), Utc::now())
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
    if !run_blocking(&state, move |db| db.delete_epub_bookmark(user_id, id)).await? {
        return Err(ApiError::not_found());
    }
    Ok(Json(OkResponse::ok()))
}

// -- Notes --

pub async fn list_notes(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Items<EpubNoteItem>>> {
    let user_id = current.user.id;
    let rows = run_blocking(&state, move |db| db.list_epub_notes(user_id)).await?;

    Ok(Json(Items {
        items: rows.into_iter().map(note_item).collect(),
    }))
}

pub async fn add_note(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Payload(req): Payload<NewEpubNoteRequest>,
) -> ApiResult<Json<CreatedResponse>> {
    let cfi = clean(req.cfi).ok_or_else(missing_cfi)?;
    let text = clean(req.text).ok_or_else(|| ApiError::bad_request("Missing text"))?;
    let at = location(cfi, req.chapter_href, req.chapter_title);
    let meta = NoteMeta {
        note_type: clean(req.note_type),
        severity: clean(req.severity),
        spoiler: req.spoiler,
    };
    let excerpt = clean(req.excerpt);

    let user_id = current.user.id;
    let id = run_blocking(&state, move |db| {
        db.create_epub_note(user_id, &at, &meta, excerpt.as_deref(), &text, Utc::now())
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
    if !run_blocking(&state, move |db| db.edit_epub_note(user_id, id, &edit, Utc::now())).await? {
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
    if !run_blocking(&state, move |db| db.delete_epub_note(user_id, id)).await? {
        return Err(ApiError::not_found());
    }
    Ok(Json(OkResponse::ok()))
}
