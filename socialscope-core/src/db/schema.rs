//! Datastore schema
//!
//! The social dataset is owned by another system; socialscope only reads it.
//! This module describes the tables and columns the analyses depend on,
//! validates an opened datastore against them, and can install the same
//! layout into an empty connection for building fixture datasets.

use crate::error::{Error, Result};
use rusqlite::Connection;

/// Tables and the columns each analysis reads from them.
pub const REQUIRED_COLUMNS: &[(&str, &[&str])] = &[
    ("users", &["id", "username", "created_at"]),
    ("posts", &["id", "user_id", "content", "created_at"]),
    ("comments", &["id", "post_id", "user_id", "content", "created_at"]),
    ("reactions", &["id", "post_id", "user_id"]),
    ("follows", &["follower_id", "followed_id"]),
];

/// DDL for the social dataset layout.
const SCHEMA_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        username         TEXT NOT NULL,
        created_at       DATETIME
    );

    CREATE TABLE IF NOT EXISTS posts (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id          INTEGER NOT NULL REFERENCES users(id),
        content          TEXT NOT NULL DEFAULT '',
        created_at       DATETIME
    );

    CREATE TABLE IF NOT EXISTS comments (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        post_id          INTEGER NOT NULL REFERENCES posts(id),
        user_id          INTEGER NOT NULL REFERENCES users(id),
        content          TEXT NOT NULL DEFAULT '',
        created_at       DATETIME
    );

    CREATE TABLE IF NOT EXISTS reactions (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        post_id          INTEGER NOT NULL REFERENCES posts(id),
        user_id          INTEGER NOT NULL REFERENCES users(id),
        reaction_type    TEXT
    );

    CREATE TABLE IF NOT EXISTS follows (
        follower_id      INTEGER NOT NULL REFERENCES users(id),
        followed_id      INTEGER NOT NULL REFERENCES users(id),
        PRIMARY KEY (follower_id, followed_id)
    );

    CREATE INDEX IF NOT EXISTS idx_posts_user ON posts(user_id);
    CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id);
    CREATE INDEX IF NOT EXISTS idx_reactions_post ON reactions(post_id);
"#;

/// Create the dataset tables on a writable connection.
///
/// Used to build fixture datasets; the analyses never call this.
pub fn install(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// Column names of a table, in declaration order. Empty if the table is missing.
pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_identifier(table)))?;
    let columns = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

/// Check that every table and column in [`REQUIRED_COLUMNS`] exists.
pub fn validate(conn: &Connection) -> Result<()> {
    for (table, required) in REQUIRED_COLUMNS {
        let columns = table_columns(conn, table)?;
        if columns.is_empty() {
            return Err(Error::Schema(format!("missing table '{}'", table)));
        }
        for column in *required {
            if !columns.iter().any(|(name, _)| name.eq_ignore_ascii_case(column)) {
                return Err(Error::Schema(format!(
                    "table '{}' has no column '{}'",
                    table, column
                )));
            }
        }
    }

    tracing::debug!(tables = REQUIRED_COLUMNS.len(), "Datastore schema validated");
    Ok(())
}

/// Quote an SQL identifier taken from `sqlite_master`.
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_then_validate() {
        let conn = Connection::open_in_memory().unwrap();
        install(&conn).unwrap();
        validate(&conn).unwrap();

        // Installing twice is harmless
        install(&conn).unwrap();
    }

    #[test]
    fn test_validate_reports_missing_table() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE users (id INTEGER, username TEXT, created_at TEXT);")
            .unwrap();

        let err = validate(&conn).unwrap_err();
        assert_eq!(err.to_string(), "schema error: missing table 'posts'");
    }

    #[test]
    fn test_validate_reports_missing_column() {
        let conn = Connection::open_in_memory().unwrap();
        install(&conn).unwrap();
        conn.execute_batch(
            "DROP TABLE follows; CREATE TABLE follows (follower_id INTEGER, target INTEGER);",
        )
        .unwrap();

        let err = validate(&conn).unwrap_err();
        assert!(err.to_string().contains("'followed_id'"));
    }

    #[test]
    fn test_table_columns_in_order() {
        let conn = Connection::open_in_memory().unwrap();
        install(&conn).unwrap();

        let columns = table_columns(&conn, "reactions").unwrap();
        let names: Vec<_> = columns.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["id", "post_id", "user_id", "reaction_type"]);
        assert_eq!(columns[0].1, "INTEGER");
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("users"), "\"users\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }
}
