use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use crate::Database;
use crate::models::{InviteRow, SessionRow, SignupOutcome, UserRow};

const USER_COLUMNS: &str = "id, name, email, password_hash, is_admin, created_at, \
     reader_theme, reader_font_scale, reader_line_height";

impl Database {
    // -- Users --

    /// Consumes the invite and creates the user in one transaction.
    pub fn signup(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        invite_code: &str,
        now: DateTime<Utc>,
    ) -> Result<SignupOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if let Some(rejected) = signup_rejection(&tx, email, invite_code)? {
                return Ok(rejected);
            }

            tx.execute(
                "INSERT INTO users (name, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![name, email, password_hash, now],
            )?;
            let user_id = tx.last_insert_rowid();

            let claimed = tx.execute(
                "UPDATE invite_codes SET used_at = ?1, used_by_email = ?2
                 WHERE code = ?3 AND used_at IS NULL",
                params![now, email, invite_code],
            )?;
            if claimed != 1 {
                return Ok(SignupOutcome::InviteUsed);
            }

            tx.commit()?;
            Ok(SignupOutcome::Created { user_id })
        })
    }

    /// Read-only version of the checks [`Database::signup`] makes, so callers
    /// can refuse a bad invite before doing expensive work.
    pub fn check_signup(&self, email: &str, invite_code: &str) -> Result<Option<SignupOutcome>> {
        self.with_conn(|conn| signup_rejection(conn, email, invite_code))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_email(conn, email))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
            Ok(conn.query_row(&sql, [id], user_from_row).optional()?)
        })
    }

    /// Promotes a user to admin. Returns false if no user has that email.
    pub fn make_admin(&self, email: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("UPDATE users SET is_admin = 1 WHERE email = ?1", [email])?;
            Ok(changed > 0)
        })
    }

    pub fn update_reader_settings(
        &self,
        user_id: i64,
        theme: &str,
        font_scale: f64,
        line_height: f64,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET reader_theme = ?1, reader_font_scale = ?2, reader_line_height = ?3
                 WHERE id = ?4",
                params![theme, font_scale, line_height, user_id],
            )?;
            Ok(())
        })
    }

    // -- Invites --

    /// Inserts an unused invite code. Returns false if the code already exists.
    pub fn create_invite(&self, code: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let added = conn.execute("INSERT OR IGNORE INTO invite_codes (code) VALUES (?1)", [code])?;
            Ok(added == 1)
        })
    }

    /// Inserts several codes, skipping blanks and codes that already exist.
    /// Returns how many were added.
    pub fn create_invites<'a, I>(&self, codes: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut added = 0;
            {
                let mut stmt = tx.prepare("INSERT OR IGNORE INTO invite_codes (code) VALUES (?1)")?;
                for code in codes.into_iter().map(str::trim).filter(|c| !c.is_empty()) {
                    added += stmt.execute([code])?;
                }
            }
            tx.commit()?;
            Ok(added)
        })
    }

    pub fn get_invite(&self, code: &str) -> Result<Option<InviteRow>> {
        self.with_conn(|conn| query_invite(conn, code))
    }

    /// All invite codes, unused first.
    pub fn list_invites(&self) -> Result<Vec<InviteRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT code, used_at, used_by_email FROM invite_codes
                 ORDER BY used_at IS NULL DESC, used_at DESC, code ASC",
            )?;
            let rows = stmt
                .query_map([], invite_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Sessions --

    /// Opens a session and returns its id.
    pub fn create_session(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
                params![id, user_id, now, expires_at],
            )?;
            Ok(())
        })?;
        Ok(id)
    }

    pub fn get_session(&self, id: &str) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, user_id, created_at, expires_at FROM sessions WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(SessionRow {
                            id: row.get(0)?,
                            user_id: row.get(1)?,
                            created_at: row.get(2)?,
                            expires_at: row.get(3)?,
                        })
                    },
                )
                .optional()?)
        })
    }

    pub fn delete_session(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM sessions WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    /// Drops a user's expired sessions. Returns how many were removed.
    pub fn prune_sessions(&self, user_id: i64, now: DateTime<Utc>) -> Result<usize> {
        self.with_conn(|conn| {
            let mut expired = Vec::new();
            {
                let mut stmt = conn.prepare("SELECT id, expires_at FROM sessions WHERE user_id = ?1")?;
                let rows = stmt.query_map([user_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, DateTime<Utc>>(1)?))
                })?;
                for row in rows {
                    let (id, expires_at) = row?;
                    if expires_at <= now {
                        expired.push(id);
                    }
                }
            }
            for id in &expired {
                conn.execute("DELETE FROM sessions WHERE id = ?1", [id])?;
            }
            Ok(expired.len())
        })
    }
}

fn signup_rejection(conn: &Connection, email: &str, invite_code: &str) -> Result<Option<SignupOutcome>> {
    let Some(invite) = query_invite(conn, invite_code)? else {
        return Ok(Some(SignupOutcome::InvalidInvite));
    };
    if invite.is_used() {
        return Ok(Some(SignupOutcome::InviteUsed));
    }
    if query_user_by_email(conn, email)?.is_some() {
        return Ok(Some(SignupOutcome::EmailTaken));
    }
    Ok(None)
}

fn query_user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");
    Ok(conn.query_row(&sql, [email], user_from_row).optional()?)
}

fn query_invite(conn: &Connection, code: &str) -> Result<Option<InviteRow>> {
    Ok(conn
        .query_row(
            "SELECT code, used_at, used_by_email FROM invite_codes WHERE code = ?1",
            [code],
            invite_from_row,
        )
        .optional()?)
}

pub(crate) fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        is_admin: row.get(4)?,
        created_at: row.get(5)?,
        reader_theme: row.get(6)?,
        reader_font_scale: row.get(7)?,
        reader_line_height: row.get(8)?,
    })
}

fn invite_from_row(row: &Row<'_>) -> rusqlite::Result<InviteRow> {
    Ok(InviteRow {
        code: row.get(0)?,
        used_at: row.get(1)?,
        used_by_email: row.get(2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn db_with_invite(code: &str) -> Database {
        let db = Database::open_in_memory().unwrap();
        assert!(db.create_invite(code).unwrap());
        db
    }

    #[test]
    fn signup_consumes_invite_once() {
        let db = db_with_invite("BETA-1");
        let now = Utc::now();

        let first = db.signup("Ann", "ann@example.com", "hash", "BETA-1", now).unwrap();
        let SignupOutcome::Created { user_id } = first else {
            panic!("expected created, got {first:?}");
        };

        let invite = db.get_invite("BETA-1").unwrap().unwrap();
        assert!(invite.is_used());
        assert_eq!(invite.used_by_email.as_deref(), Some("ann@example.com"));

        let again = db.signup("Bob", "bob@example.com", "hash", "BETA-1", now).unwrap();
        assert_eq!(again, SignupOutcome::InviteUsed);
        assert!(db.get_user_by_email("bob@example.com").unwrap().is_none());

        let user = db.get_user_by_id(user_id).unwrap().unwrap();
        assert_eq!(user.name, "Ann");
        assert!(!user.is_admin);
        assert_eq!(user.reader_theme, "paper");
    }

    #[test]
    fn signup_rejects_unknown_invite_and_taken_email() {
        let db = db_with_invite("A");
        db.create_invite("B").unwrap();
        let now = Utc::now();

        assert_eq!(
            db.signup("Ann", "ann@example.com", "h", "nope", now).unwrap(),
            SignupOutcome::InvalidInvite
        );
        db.signup("Ann", "ann@example.com", "h", "A", now).unwrap();
        assert_eq!(
            db.signup("Ann", "ann@example.com", "h", "B", now).unwrap(),
            SignupOutcome::EmailTaken
        );
        // The failed attempt must not burn the second code.
        assert!(!db.get_invite("B").unwrap().unwrap().is_used());
    }

    #[test]
    fn check_signup_reports_without_writing() {
        let db = db_with_invite("A");

        assert_eq!(db.check_signup("ann@example.com", "A").unwrap(), None);
        assert_eq!(
            db.check_signup("ann@example.com", "nope").unwrap(),
            Some(SignupOutcome::InvalidInvite)
        );
        assert!(!db.get_invite("A").unwrap().unwrap().is_used());

        db.signup("Ann", "ann@example.com", "h", "A", Utc::now()).unwrap();
        assert_eq!(
            db.check_signup("bob@example.com", "A").unwrap(),
            Some(SignupOutcome::InviteUsed)
        );
        db.create_invite("B").unwrap();
        assert_eq!(
            db.check_signup("ann@example.com", "B").unwrap(),
            Some(SignupOutcome::EmailTaken)
        );
    }

    #[test]
    fn create_invites_skips_blanks_and_duplicates() {
        let db = db_with_invite("X");
        let added = db.create_invites(["X", " ", "Y", "Z ", "Y"]).unwrap();
        assert_eq!(added, 2);
        assert!(!db.create_invite("Y").unwrap());
    }

    #[test]
    fn list_invites_puts_unused_first() {
        let db = db_with_invite("used");
        db.create_invite("fresh").unwrap();
        db.signup("Ann", "ann@example.com", "h", "used", Utc::now()).unwrap();

        let codes: Vec<String> = db.list_invites().unwrap().into_iter().map(|i| i.code).collect();
        assert_eq!(codes, vec!["fresh", "used"]);
    }

    #[test]
    fn sessions_round_trip_and_prune() {
        let db = db_with_invite("A");
        let now = Utc::now();
        let SignupOutcome::Created { user_id } =
            db.signup("Ann", "ann@example.com", "h", "A", now).unwrap()
        else {
            panic!("signup failed");
        };

        let live = db.create_session(user_id, now, now + Duration::days(1)).unwrap();
        let stale = db.create_session(user_id, now, now - Duration::minutes(1)).unwrap();

        let session = db.get_session(&live).unwrap().unwrap();
        assert_eq!(session.user_id, user_id);

        assert_eq!(db.prune_sessions(user_id, now).unwrap(), 1);
        assert!(db.get_session(&stale).unwrap().is_none());

        db.delete_session(&live).unwrap();
        assert!(db.get_session(&live).unwrap().is_none());
    }

    #[test]
    fn make_admin_requires_existing_user() {
        let db = db_with_invite("A");
        assert!(!db.make_admin("ghost@example.com").unwrap());
        db.signup("Ann", "ann@example.com", "h", "A", Utc::now()).unwrap();
        assert!(db.make_admin("ann@example.com").unwrap());
        assert!(db.get_user_by_email("ann@example.com").unwrap().unwrap().is_admin);
    }
}
