use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};

use crate::Database;
use crate::models::{EpubBookmarkRow, EpubLocation, EpubNoteRow, EpubProgressRow, NoteEdit, NoteMeta};

impl Database {
    // -- Reading position --

    /// One row per user: the last location they read in the e-book.
    pub fn upsert_epub_progress(&self, user_id: i64, at: &EpubLocation, now: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO epub_progress (user_id, cfi, chapter_href, chapter_title, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(user_id)
                 DO UPDATE SET cfi = excluded.cfi,
                               chapter_href = excluded.chapter_href,
                               chapter_title = excluded.chapter_title,
                               updated_at = excluded.updated_at",
                params![user_id, at.cfi, at.chapter_href, at.chapter_title, now],
            )?;
            Ok(())
        })
    }

    pub fn get_epub_progress(&self, user_id: i64) -> Result<Option<EpubProgressRow>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT cfi, chapter_href, chapter_title, updated_at FROM epub_progress
                     WHERE user_id = ?1",
                    [user_id],
                    |row| {
                        Ok(EpubProgressRow {
                            cfi: row.get(0)?,
                            chapter_href: row.get(1)?,
                            chapter_title: row.get(2)?,
                            updated_at: row.get(3)?,
                        })
                    },
                )
                .optional()?)
        })
    }

    // -- Bookmarks --

    pub fn create_epub_bookmark(
        &self,
        user_id: i64,
        at: &EpubLocation,
        label: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO epub_bookmarks (user_id, cfi, chapter_href, chapter_title, label, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![user_id, at.cfi, at.chapter_href, at.chapter_title, label, now],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn list_epub_bookmarks(&self, user_id: i64) -> Result<Vec<EpubBookmarkRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, cfi, chapter_href, chapter_title, label, created_at FROM epub_bookmarks
                 WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(EpubBookmarkRow {
                        id: row.get(0)?,
                        cfi: row.get(1)?,
                        chapter_href: row.get(2)?,
                        chapter_title: row.get(3)?,
                        label: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn delete_epub_bookmark(&self, user_id: i64, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM epub_bookmarks WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )?;
            Ok(n > 0)
        })
    }

    // -- Notes --

    pub fn create_epub_note(
        &self,
        user_id: i64,
        at: &EpubLocation,
        meta: &NoteMeta,
        excerpt: Option<&str>,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO epub_notes (user_id, cfi, chapter_href, chapter_title, note_type, severity,
                                         spoiler, excerpt, text, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
                params![
                    user_id,
                    at.cfi,
                    at.chapter_href,
                    at.chapter_title,
                    meta.note_type,
                    meta.severity,
                    meta.spoiler,
                    excerpt,
                    text,
                    now
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn list_epub_notes(&self, user_id: i64) -> Result<Vec<EpubNoteRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, cfi, chapter_href, chapter_title, note_type, severity, spoiler, excerpt,
                        text, created_at, updated_at
                 FROM epub_notes WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(EpubNoteRow {
                        id: row.get(0)?,
                        cfi: row.get(1)?,
                        chapter_href: row.get(2)?,
                        chapter_title: row.get(3)?,
                        note_type: row.get(4)?,
                        severity: row.get(5)?,
                        spoiler: row.get(6)?,
                        excerpt: row.get(7)?,
                        text: row.get(8)?,
                        created_at: row.get(9)?,
                        updated_at: row.get(10)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn edit_epub_note(&self, user_id: i64, id: i64, edit: &NoteEdit, now: DateTime<Utc>) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE epub_notes SET
                    text = ?3,
                    note_type = CASE WHEN ?4 THEN ?5 ELSE note_type END,
                    severity = CASE WHEN ?6 THEN ?7 ELSE severity END,
                    spoiler = COALESCE(?8, spoiler),
                    excerpt = CASE WHEN ?9 THEN ?10 ELSE excerpt END,
                    updated_at = ?11
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
                    edit.excerpt.is_some(),
                    edit.excerpt.clone().flatten(),
                    now
                ],
            )?;
            Ok(n > 0)
        })
    }

    pub fn delete_epub_note(&self, user_id: i64, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM epub_notes WHERE id = ?1 AND user_id = ?2", params![id, user_id])?;
            Ok(n > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SignupOutcome;

    fn reader(db: &Database) -> i64 {
        db.create_invite("code").unwrap();
        match db.signup("Reader", "r@example.com", "h", "code", Utc::now()).unwrap() {
            SignupOutcome::Created { user_id } => user_id,
            other => panic!("signup failed: {other:?}"),
        }
    }

    fn at(cfi: &str) -> EpubLocation {
        EpubLocation {
            cfi: cfi.into(),
            chapter_href: Some("ch03.xhtml".into()),
            chapter_title: Some("Three".into()),
        }
    }

    #[test]
    fn epub_progress_keeps_one_row_per_user() {
        let db = Database::open_in_memory().unwrap();
        let uid = reader(&db);
        assert!(db.get_epub_progress(uid).unwrap().is_none());

        db.upsert_epub_progress(uid, &at("epubcfi(/6/4!/4/2)"), Utc::now()).unwrap();
        let moved = EpubLocation { cfi: "epubcfi(/6/8!/4/10)".into(), ..Default::default() };
        db.upsert_epub_progress(uid, &moved, Utc::now()).unwrap();

        let row = db.get_epub_progress(uid).unwrap().unwrap();
        assert_eq!(row.cfi, "epubcfi(/6/8!/4/10)");
        assert_eq!(row.chapter_href, None);
    }

    #[test]
    fn epub_note_edit_can_replace_excerpt() {
        let db = Database::open_in_memory().unwrap();
        let uid = reader(&db);
        let id = db
            .create_epub_note(uid, &at("epubcfi(/6/4)"), &NoteMeta::default(), Some("old"), "hm", Utc::now())
            .unwrap();

        let edit = NoteEdit {
            text: "clearer now".into(),
            excerpt: Some(Some("new".into())),
            spoiler: Some(true),
            ..Default::default()
        };
        assert!(db.edit_epub_note(uid, id, &edit, Utc::now()).unwrap());

        let note = &db.list_epub_notes(uid).unwrap()[0];
        assert_eq!(note.excerpt.as_deref(), Some("new"));
        assert!(note.spoiler);
        assert_eq!(note.chapter_title.as_deref(), Some("Three"));

        assert!(db.delete_epub_note(uid, id).unwrap());
        assert!(!db.delete_epub_note(uid, id).unwrap());
    }

    #[test]
    fn epub_bookmarks_list_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let uid = reader(&db);
        let a = db.create_epub_bookmark(uid, &at("a"), None, Utc::now()).unwrap();
        let b = db.create_epub_bookmark(uid, &at("b"), Some("here"), Utc::now()).unwrap();

        let ids: Vec<i64> = db.list_epub_bookmarks(uid).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![b, a]);
    }
}
