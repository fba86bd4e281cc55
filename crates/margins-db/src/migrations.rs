use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                name                TEXT NOT NULL,
                email               TEXT NOT NULL UNIQUE,
                password_hash       TEXT NOT NULL,
                is_admin            INTEGER NOT NULL DEFAULT 0,
                created_at          TEXT NOT NULL,
                reader_theme        TEXT NOT NULL DEFAULT 'paper',
                reader_font_scale   REAL NOT NULL DEFAULT 1.0,
                reader_line_height  REAL NOT NULL DEFAULT 1.65
            );

            CREATE TABLE invite_codes (
                code            TEXT PRIMARY KEY,
                used_at         TEXT,
                used_by_email   TEXT
            );

            CREATE TABLE sessions (
                id          TEXT PRIMARY KEY,
                user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL,
                expires_at  TEXT NOT NULL
            );

            CREATE INDEX idx_sessions_user ON sessions(user_id);

            CREATE TABLE listening_progress (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id             INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                chapter_id          TEXT NOT NULL,
                position_seconds    REAL NOT NULL DEFAULT 0,
                updated_at          TEXT NOT NULL,
                UNIQUE(user_id, chapter_id)
            );

            CREATE TABLE epub_progress (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
                cfi             TEXT NOT NULL,
                chapter_href    TEXT,
                chapter_title   TEXT,
                updated_at      TEXT NOT NULL
            );

            CREATE TABLE bookmarks (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id             INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                chapter_id          TEXT NOT NULL,
                position_seconds    REAL NOT NULL,
                label               TEXT,
                created_at          TEXT NOT NULL
            );

            CREATE INDEX idx_bookmarks_user ON bookmarks(user_id, chapter_id);

            CREATE TABLE notes (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id             INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                chapter_id          TEXT NOT NULL,
                position_seconds    REAL NOT NULL,
                note_type           TEXT,
                severity            TEXT,
                spoiler             INTEGER NOT NULL DEFAULT 0,
                text                TEXT NOT NULL,
                created_at          TEXT NOT NULL,
                updated_at          TEXT NOT NULL
            );

            CREATE INDEX idx_notes_user ON notes(user_id, chapter_id);

            CREATE TABLE epub_bookmarks (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                cfi             TEXT NOT NULL,
                chapter_href    TEXT,
                chapter_title   TEXT,
                label           TEXT,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_epub_bookmarks_user ON epub_bookmarks(user_id);

            CREATE TABLE epub_notes (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                cfi             TEXT NOT NULL,
                chapter_href    TEXT,
                chapter_title   TEXT,
                note_type       TEXT,
                severity        TEXT,
                spoiler         INTEGER NOT NULL DEFAULT 0,
                excerpt         TEXT,
                text            TEXT NOT NULL,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX idx_epub_notes_user ON epub_notes(user_id);

            CREATE TABLE feedback (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                scope           TEXT NOT NULL,
                chapter_id      TEXT,
                status          TEXT NOT NULL DEFAULT 'new',
                draft_version   TEXT,
                text            TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_feedback_user ON feedback(user_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
