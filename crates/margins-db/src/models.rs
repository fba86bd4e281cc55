//! Database row types. These map directly to SQLite rows and stay independent
//! of the JSON shapes in margins-types.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub reader_theme: String,
    pub reader_font_scale: f64,
    pub reader_line_height: f64,
}

#[derive(Debug, Clone)]
pub struct InviteRow {
    pub code: String,
    pub used_at: Option<DateTime<Utc>>,
    pub used_by_email: Option<String>,
}

impl InviteRow {
    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct SessionRow {
    pub id: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ProgressRow {
    pub chapter_id: String,
    pub position_seconds: f64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BookmarkRow {
    pub id: i64,
    pub chapter_id: String,
    pub position_seconds: f64,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NoteRow {
    pub id: i64,
    pub chapter_id: String,
    pub position_seconds: f64,
    pub note_type: Option<String>,
    pub severity: Option<String>,
    pub spoiler: bool,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct EpubProgressRow {
    pub cfi: String,
    pub chapter_href: Option<String>,
    pub chapter_title: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct EpubBookmarkRow {
    pub id: i64,
    pub cfi: String,
    pub chapter_href: Option<String>,
    pub chapter_title: Option<String>,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct EpubNoteRow {
    pub id: i64,
    pub cfi: String,
    pub chapter_href: Option<String>,
    pub chapter_title: Option<String>,
    pub note_type: Option<String>,
    pub severity: Option<String>,
    pub spoiler: bool,
    pub excerpt: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FeedbackRow {
    pub id: i64,
    pub user_id: i64,
    pub scope: String,
    pub chapter_id: Option<String>,
    pub status: String,
    pub draft_version: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Per-reader listening summary for the admin console.
#[derive(Debug, Clone)]
pub struct ReaderProgressRow {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub chapters_started: i64,
    pub latest: Option<ProgressRow>,
}

// -- Inputs --

/// Where an e-book annotation points.
#[derive(Debug, Clone, Default)]
pub struct EpubLocation {
    pub cfi: String,
    pub chapter_href: Option<String>,
    pub chapter_title: Option<String>,
}

/// Reviewer metadata shared by audio and e-book notes.
#[derive(Debug, Clone, Default)]
pub struct NoteMeta {
    pub note_type: Option<String>,
    pub severity: Option<String>,
    pub spoiler: bool,
}

/// Partial note edit. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct NoteEdit {
    pub text: String,
    pub note_type: Option<Option<String>>,
    pub severity: Option<Option<String>>,
    pub spoiler: Option<bool>,
    pub excerpt: Option<Option<String>>,
}

#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub scope: String,
    pub chapter_id: Option<String>,
    pub draft_version: Option<String>,
    pub text: String,
}

/// Result of attempting a signup against an invite code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignupOutcome {
    Created { user_id: i64 },
    InvalidInvite,
    InviteUsed,
    EmailTaken,
}
