use rusqlite::{params, OptionalExtension};

use crate::db::connection::DatabaseConnection;
use crate::db::models::Favorite;

/// Database operations for favorites
pub struct DbOperations;

impl DbOperations {
    /// Add a favorite; adding an existing href is a no-op.
    pub fn add_favorite(
        db: &DatabaseConnection,
        href: &str,
    ) -> Result<(), anyhow::Error> {
        let conn = db.get_connection();
        let conn = conn.lock();

        conn.execute(
            "INSERT OR IGNORE INTO favorites (href, date_added) VALUES (?1, ?2)",
            params![href, chrono::Utc::now().timestamp()],
        )?;

        Ok(())
    }

    pub fn remove_favorite(
        db: &DatabaseConnection,
        href: &str,
    ) -> Result<(), anyhow::Error> {
        let conn = db.get_connection();
        let conn = conn.lock();

        conn.execute("DELETE FROM favorites WHERE href = ?1", params![href])?;

        Ok(())
    }

    pub fn is_favorite(
        db: &DatabaseConnection,
        href: &str,
    ) -> Result<bool, anyhow::Error> {
        let conn = db.get_connection();
        let conn = conn.lock();

        let found = conn
            .query_row(
                "SELECT 1 FROM favorites WHERE href = ?1",
                params![href],
                |_| Ok(()),
            )
            .optional()?;

        Ok(found.is_some())
    }

    /// Flip favorite status. Returns whether `href` is a favorite afterwards.
    pub fn toggle_favorite(
        db: &DatabaseConnection,
        href: &str,
    ) -> Result<bool, anyhow::Error> {
        if Self::is_favorite(db, href)? {
            Self::remove_favorite(db, href)?;
            Ok(false)
        } else {
            Self::add_favorite(db, href)?;
            Ok(true)
        }
    }

    /// Get all favorites, oldest first
    pub fn get_all_favorites(
        db: &DatabaseConnection,
    ) -> Result<Vec<Favorite>, anyhow::Error> {
        let conn = db.get_connection();
        let conn = conn.lock();

        let mut stmt = conn.prepare(
            "SELECT id, href, date_added FROM favorites ORDER BY date_added ASC, id ASC"
        )?;

        let favorites = stmt.query_map([], |row| {
            Ok(Favorite {
                id: row.get(0)?,
                href: row.get(1)?,
                date_added: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

        Ok(favorites)
    }

    pub fn clear_favorites(db: &DatabaseConnection) -> Result<(), anyhow::Error> {
        let conn = db.get_connection();
        let conn = conn.lock();
        conn.execute("DELETE FROM favorites", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HREF: &str = "https://gifx.co/music/MOD/Purple%23Motion/2ND_PM.S3M";

    #[test]
    fn test_add_and_list() {
        let db = DatabaseConnection::open_in_memory().unwrap();
        DbOperations::add_favorite(&db, HREF).unwrap();
        DbOperations::add_favorite(&db, HREF).unwrap();
        DbOperations::add_favorite(&db, "https://gifx.co/music/XM/a.xm").unwrap();

        let all = DbOperations::get_all_favorites(&db).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].href, HREF);
    }

    #[test]
    fn test_toggle() {
        let db = DatabaseConnection::open_in_memory().unwrap();
        assert!(!DbOperations::is_favorite(&db, HREF).unwrap());
        assert!(DbOperations::toggle_favorite(&db, HREF).unwrap());
        assert!(DbOperations::is_favorite(&db, HREF).unwrap());
        assert!(!DbOperations::toggle_favorite(&db, HREF).unwrap());
        assert!(DbOperations::get_all_favorites(&db).unwrap().is_empty());
    }

    #[test]
    fn test_escaped_and_raw_hrefs_differ() {
        let db = DatabaseConnection::open_in_memory().unwrap();
        DbOperations::add_favorite(&db, HREF).unwrap();
        assert!(!DbOperations::is_favorite(&db, "https://gifx.co/music/MOD/Purple#Motion/2ND_PM.S3M").unwrap());
    }

    #[test]
    fn test_clear() {
        let db = DatabaseConnection::open_in_memory().unwrap();
        DbOperations::add_favorite(&db, HREF).unwrap();
        DbOperations::clear_favorites(&db).unwrap();
        assert!(DbOperations::get_all_favorites(&db).unwrap().is_empty());
    }
}
