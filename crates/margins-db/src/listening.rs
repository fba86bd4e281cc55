use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};

use crate::Database;
use crate::models::{BookmarkRow, NoteEdit, NoteMeta, NoteRow, ProgressRow, ReaderProgressRow};

impl Database {
    // -- Listening progress --

    /// One row per (user, chapter): inserts or moves the saved position.
    pub fn upsert_progress(
        &self,
        user_id: i64,
        chapter_id: &str,
        position_seconds: f64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO listening_progress (user_id, chapter_id, position_seconds, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id, chapter_id)
                 DO UPDATE SET position_seconds = excluded.position_seconds,
                               updated_at = excluded.updated_at",
                params![user_id, chapter_id, position_seconds, now],
            )?;
            Ok(())
        })
    }

    pub fn list_progress(&self, user_id: i64) -> Result<Vec<ProgressRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT chapter_id, position_seconds, updated_at FROM listening_progress
                 WHERE user_id = ?1 ORDER BY chapter_id",
            )?;
            let rows = stmt
                .query_map([user_id], progress_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Every reader with their chapter count and most recent position,
    /// ordered by signup.
    pub fn reader_progress(&self) -> Result<Vec<ReaderProgressRow>> {
        self.with_conn(|conn| {
            let mut users = conn.prepare(
                "SELECT u.id, u.name, u.email, u.created_at,
                        (SELECT COUNT(*) FROM listening_progress p WHERE p.user_id = u.id)
                 FROM users u ORDER BY u.created_at ASC, u.id ASC",
            )?;
            let mut latest = conn.prepare(
                "SELECT chapter_id, position_seconds, updated_at FROM listening_progress
                 WHERE user_id = ?1 ORDER BY updated_at DESC, id DESC LIMIT 1",
            )?;

            let readers = users
                .query_map([], |row| {
                    Ok(ReaderProgressRow {
                        user_id: row.get(0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                        created_at: row.get(3)?,
                        chapters_started: row.get(4)?,
                        latest: None,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            readers
                .into_iter()
                .map(|mut reader| {
                    reader.latest =
                        latest.query_row([reader.user_id], progress_from_row).optional()?;
                    Ok::<_, anyhow::Error>(reader)
                })
                .collect()
        })
    }

    // -- Bookmarks --

    pub fn create_bookmark(
        &self,
        user_id: i64,
        chapter_id: &str,
        position_seconds: f64,
        label: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO bookmarks (user_id, chapter_id, position_seconds, label, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![user_id, chapter_id, position_seconds, label, now],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// A user's bookmarks, newest first, optionally for one chapter.
    pub fn list_bookmarks(&self, user_id: i64, chapter_id: Option<&str>) -> Result<Vec<BookmarkRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, chapter_id, position_seconds, label, created_at FROM bookmarks
                 WHERE user_id = ?1 AND (?2 IS NULL OR chapter_id = ?2)
                 ORDER BY created_at DESC, id DESC",
            )?;
            let rows = stmt
                .query_map(params![user_id, chapter_id], |row| {
                    Ok(BookmarkRow {
                        id: row.get(0)?,
                        chapter_id: row.get(1)?,
                        position_seconds: row.get(2)?,
                        label: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Deletes one of the user's bookmarks. Returns false if it was not theirs or absent.
    pub fn delete_bookmark(&self, user_id: i64, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM bookmarks WHERE id = ?1 AND user_id = ?2", params![id, user_id])?;
            Ok(n > 0)
        })
    }

    // -- Notes --

    pub fn create_note(
        &self,
        user_id: i64,
        chapter_id: &str,
        position_seconds: f64,
        meta: &NoteMeta,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notes (user_id, chapter_id, position_seconds, note_type, severity,
                                    spoiler, text, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                params![
                    user_id,
                    chapter_id,
                    position_seconds,
                    meta.note_type,
                    meta.severity,
                    meta.spoiler,
                    text,
                    now
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn list_notes(&self, user_id: i64, chapter_id: Option<&str>) -> Result<Vec<NoteRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, chapter_id, position_seconds, note_type, severity, spoiler, text,
                        created_at, updated_at
                 FROM notes
                 WHERE user_id = ?1 AND (?2 IS NULL OR chapter_id = ?2)
                 ORDER BY created_at DESC, id DESC",
            )?;
            let rows = stmt
                .query_map(params![user_id, chapter_id], |row| {
                    Ok(NoteRow {
                        id: row.get(0)?,
                        chapter_id: row.get(1)?,
                        position_seconds: row.get(2)?,
                        note_type: row.get(3)?,
                        severity: row.get(4)?,
                        spoiler: row.get(5)?,
                        text: row.get(6)?,
                        created_at: row.get(7)?,
                        updated_at: row.get(8)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Applies an edit to one of the user's notes. `edit.excerpt` is ignored;
    /// audio notes have none. Returns false if the note was not found.
    pub fn edit_note(&self, user_id: i64, id: i64, edit: &NoteEdit, now: DateTime<Utc>) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE notes SET
                    text = ?3,
                    note_type = CASE WHEN ?4 THEN ?5 ELSE note_type END,
                    severity = CASE WHEN ?6 THEN ?7 ELSE severity END,
                    spoiler = COALESCE(?8, spoiler),
                    updated_at = ?9
                 WHERE id = ?1 AND user_id = ?2",
                params![
                    id,
                    user_id,
                    edit.text,
                    edit.note_type.is_some(),
                    edit.note_type.clone().flatten(),
                    edit.severity.is_some(),
                    edit.severity.clone().flatten(),
                    edit.spoiler,
                    now
                ],
            )?;
            Ok(n > 0)
        })
    }

    pub fn delete_note(&self, user_id: i64, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM notes WHERE id = ?1 AND user_id = ?2", params![id, user_id])?;
            Ok(n > 0)
        })
    }
}

fn progress_from_row(row: &Row<'_>) -> rusqlite::Result<ProgressRow> {
    Ok(ProgressRow {
        chapter_id: row.get(0)?,
        position_seconds: row.get(1)?,
        updated_at: row.get(2)?,
    })
}
