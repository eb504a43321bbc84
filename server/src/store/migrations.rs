use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS subscribers (
            id              TEXT PRIMARY KEY,
            email           TEXT NOT NULL UNIQUE,
            name            TEXT,
            subscribed_at   TEXT NOT NULL,
            updated_at      TEXT NOT NULL,
            active          INTEGER NOT NULL DEFAULT 1,
            data            TEXT NOT NULL DEFAULT '{}'
        );

        CREATE TABLE IF NOT EXISTS form_submissions (
            id                  TEXT PRIMARY KEY,
            form_id             TEXT,
            submission_data     TEXT NOT NULL,
            received_at         TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_form_submissions_form
            ON form_submissions(form_id, received_at);
        ",
    )?;

    info!("database_migrations_complete");
    Ok(())
}
