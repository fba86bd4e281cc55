use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Row, params};

use crate::Database;
use crate::models::{FeedbackRow, NewFeedback};

const FEEDBACK_COLUMNS: &str =
    "id, user_id, scope, chapter_id, status, draft_version, text, created_at";

impl Database {
    pub fn create_feedback(&self, user_id: i64, feedback: &NewFeedback, now: DateTime<Utc>) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO feedback (user_id, scope, chapter_id, draft_version, text, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    user_id,
                    feedback.scope,
                    feedback.chapter_id,
                    feedback.draft_version,
                    feedback.text,
                    now
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Feedback from one reader, or from everyone when `user_id` is `None`.
    /// Newest first.
    pub fn list_feedback(&self, user_id: Option<i64>) -> Result<Vec<FeedbackRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {FEEDBACK_COLUMNS} FROM feedback
                 WHERE ?1 IS NULL OR user_id = ?1
                 ORDER BY created_at DESC, id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], feedback_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns false if no feedback has that id.
    pub fn set_feedback_status(&self, id: i64, status: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("UPDATE feedback SET status = ?1 WHERE id = ?2", params![status, id])?;
            Ok(n > 0)
        })
    }
}

fn feedback_from_row(row: &Row<'_>) -> rusqlite::Result<FeedbackRow> {
    Ok(FeedbackRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        scope: row.get(2)?,
        chapter_id: row.get(3)?,
        status: row.get(4)?,
        draft_version: row.get(5)?,
        text: row.get(6)?,
        created_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SignupOutcome;

    fn reader(db: &Database, email: &str) -> i64 {
        db.create_invite(email).unwrap();
        match db.signup("Reader", email, "h", email, Utc::now()).unwrap() {
            SignupOutcome::Created { user_id } => user_id,
            other => panic!("signup failed: {other:?}"),
        }
    }

    fn general(text: &str) -> NewFeedback {
        NewFeedback {
            scope: "general".into(),
            chapter_id: None,
            draft_version: Some("d2".into()),
            text: text.into(),
        }
    }

    #[test]
    fn feedback_defaults_to_new_and_lists_per_reader() {
        let db = Database::open_in_memory().unwrap();
        let ann = reader(&db, "ann@example.com");
        let bob = reader(&db, "bob@example.com");

        let first = db.create_feedback(ann, &general("slow start"), Utc::now()).unwrap();
        db.create_feedback(bob, &general("loved it"), Utc::now()).unwrap();

        let mine = db.list_feedback(Some(ann)).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, first);
        assert_eq!(mine[0].status, "new");

        let all = db.list_feedback(None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].text, "loved it");
    }

    #[test]
    fn status_update_reports_missing_rows() {
        let db = Database::open_in_memory().unwrap();
        let ann = reader(&db, "ann@example.com");
        let id = db.create_feedback(ann, &general("x"), Utc::now()).unwrap();

        assert!(db.set_feedback_status(id, "triaged").unwrap());
        assert_eq!(db.list_feedback(None).unwrap()[0].status, "triaged");
        assert!(!db.set_feedback_status(id + 100, "fixed").unwrap());
    }
}
