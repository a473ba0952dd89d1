// Database migrations
use anyhow::Result;
use rusqlite::Connection;

pub fn run_migrations(conn: &Connection) -> Result<()> {
    // Favorites are keyed by the escaped catalog URL, which is canonical
    conn.execute(
        "CREATE TABLE IF NOT EXISTS favorites (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            href TEXT UNIQUE NOT NULL,
            date_added INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_favorites_date_added ON favorites(date_added)",
        [],
    )?;

    Ok(())
}
