//! Database schema migrations.
//!
//! The draw-history schema is intentionally flat: one row per draw with one
//! column per ball, so that generated read-only queries stay simple.

use rusqlite::Connection;
use tracing::info;

use tirage_core::error::TirageError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), TirageError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| TirageError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| TirageError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: draws");
    }

    Ok(())
}

/// Version 1: draws table.
fn apply_v1(conn: &Connection) -> Result<(), TirageError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS draws (
            draw_date   TEXT PRIMARY KEY NOT NULL,   -- YYYY-MM-DD
            weekday     TEXT NOT NULL,               -- monday .. sunday
            n1          INTEGER NOT NULL,
            n2          INTEGER NOT NULL,
            n3          INTEGER NOT NULL,
            n4          INTEGER NOT NULL,
            n5          INTEGER NOT NULL,
            s1          INTEGER NOT NULL,
            s2          INTEGER,
            created_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_draws_weekday ON draws(weekday);

        INSERT INTO schema_migrations (version, name) VALUES (1, 'draws');
        ",
    )
    .map_err(|e| TirageError::Storage(format!("Migration v1 failed: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let applied: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied, 1);
    }

    #[test]
    fn test_draws_table_columns() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let mut stmt = conn.prepare("PRAGMA table_info(draws)").unwrap();
        let columns: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .map(|c| c.unwrap())
            .collect();
        for expected in ["draw_date", "weekday", "n1", "n5", "s1", "s2"] {
            assert!(columns.iter().any(|c| c == expected), "missing {}", expected);
        }
    }
}
