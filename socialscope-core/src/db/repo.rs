//! Datastore repository layer
//!
//! Read-only queries against the social dataset. Every query returns typed
//! rows from [`crate::types`]; nothing here writes to the datastore.

use crate::db::schema;
use crate::error::{Error, Result};
use crate::types::*;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags, Row};
use std::path::{Path, PathBuf};

/// Read-only handle on the social dataset.
///
/// The connection is released when the handle is dropped, so a caller that
/// scopes a `Datastore` to one analysis gets a guaranteed close on every exit
/// path.
#[derive(Debug)]
pub struct Datastore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Datastore {
    /// Open an existing dataset read-only and validate its schema.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Config(format!(
                "datastore not found at {}",
                path.display()
            )));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        let store = Self::guard(conn, Some(path.to_path_buf()))?;
        tracing::debug!(path = %path.display(), "Datastore opened");
        Ok(store)
    }

    /// Wrap an already-open connection (in-memory fixtures, tests).
    ///
    /// The connection is switched to `query_only` before use.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        Self::guard(conn, None)
    }

    fn guard(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch("PRAGMA query_only = ON;")?;
        schema::validate(&conn)?;
        Ok(Self { conn, path })
    }

    /// Path of the dataset file (None for in-memory datasets)
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    // ============================================
    // Schema inspection
    // ============================================

    /// Every user table with its columns and row count.
    pub fn list_tables(&self) -> Result<Vec<TableInfo>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT name FROM sqlite_master
            WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#,
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            let columns = schema::table_columns(&self.conn, &name)?
                .into_iter()
                .map(|(name, decl_type)| ColumnInfo { name, decl_type })
                .collect();
            let row_count: i64 = self.conn.query_row(
                &format!("SELECT COUNT(*) FROM {}", schema::quote_identifier(&name)),
                [],
                |row| row.get(0),
            )?;
            tables.push(TableInfo {
                name,
                columns,
                row_count,
            });
        }

        Ok(tables)
    }

    // ============================================
    // Growth
    // ============================================

    /// Users, posts and comments created per calendar month, oldest first.
    ///
    /// Numeric timestamps are read as unix seconds.
    pub fn monthly_activity(&self) -> Result<Vec<MonthlyCount>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT month, COUNT(*) AS count
            FROM (
                SELECT
                    CASE
                        WHEN typeof(created_at) IN ('integer', 'real')
                            THEN DATE(created_at, 'unixepoch', 'start of month')
                        ELSE DATE(created_at, 'start of month')
                    END AS month
                FROM (
                    SELECT created_at FROM users
                    UNION ALL
                    SELECT created_at FROM posts
                    UNION ALL
                    SELECT created_at FROM comments
                )
            )
            WHERE month IS NOT NULL
            GROUP BY month
            ORDER BY month
            "#,
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut months = Vec::with_capacity(rows.len());
        for (month, count) in rows {
            match NaiveDate::parse_from_str(&month, "%Y-%m-%d") {
                Ok(month) => months.push(MonthlyCount { month, count }),
                Err(e) => tracing::warn!(month, error = %e, "Skipping unparseable month bucket"),
            }
        }

        Ok(months)
    }

    // ============================================
    // Virality
    // ============================================

    /// Engagement counters for every post, including posts with no engagement.
    pub fn post_engagement(&self) -> Result<Vec<PostEngagement>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT
                p.id,
                p.user_id,
                u.username,
                p.content,
                p.created_at,
                COUNT(DISTINCT r.id) AS reaction_count,
                COUNT(DISTINCT c.id) AS comment_count,
                COUNT(DISTINCT c.user_id) AS unique_commenters,
                COALESCE(f.follower_count, 0) AS follower_count
            FROM posts p
            LEFT JOIN users u ON p.user_id = u.id
            LEFT JOIN reactions r ON p.id = r.post_id
            LEFT JOIN comments c ON p.id = c.post_id
            LEFT JOIN (
                SELECT followed_id, COUNT(*) AS follower_count
                FROM follows
                GROUP BY followed_id
            ) f ON f.followed_id = p.user_id
            GROUP BY p.id
            ORDER BY p.id
            "#,
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(PostEngagement {
                    post_id: row.get(0)?,
                    user_id: row.get(1)?,
                    username: row.get(2)?,
                    content: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    created_at: timestamp_column(row, 4)?,
                    reaction_count: row.get(5)?,
                    comment_count: row.get(6)?,
                    unique_commenters: row.get(7)?,
                    follower_count: row.get(8)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    // ============================================
    // Lifecycle
    // ============================================

    /// Every timestamped comment joined with its post's creation time.
    pub fn comment_timings(&self) -> Result<Vec<CommentTiming>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT p.id, p.created_at, c.created_at
            FROM posts p
            JOIN comments c ON p.id = c.post_id
            WHERE c.created_at IS NOT NULL
            ORDER BY p.id, c.id
            "#,
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(CommentTiming {
                    post_id: row.get(0)?,
                    post_created: timestamp_column(row, 1)?,
                    comment_created: timestamp_column(row, 2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    // ============================================
    // Engagement pairs
    // ============================================

    /// Comments left by one user on another user's posts, per ordered pair.
    ///
    /// Self-engagement is excluded. Both usernames are resolved here so the
    /// ranker never needs a follow-up lookup.
    pub fn comment_engagement(&self) -> Result<Vec<DirectionalCount>> {
        self.directional_counts(
            r#"
            SELECT c.user_id, p.user_id, u1.username, u2.username, COUNT(*)
            FROM comments c
            JOIN posts p ON c.post_id = p.id
            LEFT JOIN users u1 ON c.user_id = u1.id
            LEFT JOIN users u2 ON p.user_id = u2.id
            WHERE c.user_id != p.user_id
            GROUP BY c.user_id, p.user_id
            ORDER BY c.user_id, p.user_id
            "#,
        )
    }

    /// Reactions left by one user on another user's posts, per ordered pair.
    pub fn reaction_engagement(&self) -> Result<Vec<DirectionalCount>> {
        self.directional_counts(
            r#"
            SELECT r.user_id, p.user_id, u1.username, u2.username, COUNT(*)
            FROM reactions r
            JOIN posts p ON r.post_id = p.id
            LEFT JOIN users u1 ON r.user_id = u1.id
            LEFT JOIN users u2 ON p.user_id = u2.id
            WHERE r.user_id != p.user_id
            GROUP BY r.user_id, p.user_id
            ORDER BY r.user_id, p.user_id
            "#,
        )
    }

    fn directional_counts(&self, sql: &str) -> Result<Vec<DirectionalCount>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(DirectionalCount {
                    engager_id: row.get(0)?,
                    owner_id: row.get(1)?,
                    engager_name: row.get(2)?,
                    owner_name: row.get(3)?,
                    count: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ============================================
    // Platform overview
    // ============================================

    /// Total number of users.
    pub fn user_count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
    }

    /// Users with no posts, comments or reactions.
    pub fn lurker_count(&self) -> Result<i64> {
        Ok(self.conn.query_row(
            r#"
            SELECT COUNT(*) FROM users u
            WHERE u.id NOT IN (
                SELECT user_id FROM posts WHERE user_id IS NOT NULL
                UNION
                SELECT user_id FROM comments WHERE user_id IS NOT NULL
                UNION
                SELECT user_id FROM reactions WHERE user_id IS NOT NULL
            )
            "#,
            [],
            |row| row.get(0),
        )?)
    }

    /// Users whose posts received the most reactions plus comments.
    pub fn top_influencers(&self, limit: usize) -> Result<Vec<Influencer>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT
                u.id,
                u.username,
                COUNT(DISTINCT r.id) AS total_reactions,
                COUNT(DISTINCT c.id) AS total_comments
            FROM users u
            LEFT JOIN posts p ON u.id = p.user_id
            LEFT JOIN reactions r ON p.id = r.post_id
            LEFT JOIN comments c ON p.id = c.post_id
            GROUP BY u.id
            ORDER BY (COUNT(DISTINCT r.id) + COUNT(DISTINCT c.id)) DESC, u.id ASC
            LIMIT ?
            "#,
        )?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                let user_id: i64 = row.get(0)?;
                Ok(Influencer {
                    user_id,
                    username: row
                        .get::<_, Option<String>>(1)?
                        .unwrap_or_else(|| format!("user #{}", user_id)),
                    total_reactions: row.get(2)?,
                    total_comments: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    /// The same content posted `min_repeats` or more times by one user.
    pub fn repeated_content(&self, min_repeats: i64) -> Result<Vec<RepeatedContent>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT user_id, content, COUNT(*) AS repeat_count, 'post' AS source
            FROM posts
            GROUP BY user_id, content
            HAVING COUNT(*) >= ?1

            UNION ALL

            SELECT user_id, content, COUNT(*) AS repeat_count, 'comment' AS source
            FROM comments
            GROUP BY user_id, content
            HAVING COUNT(*) >= ?1

            ORDER BY 3 DESC, 1 ASC, 4 DESC
            "#,
        )?;

        let rows = stmt
            .query_map(params![min_repeats], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|(user_id, content, repeat_count, source)| {
                ContentSource::from_label(&source).map(|source| RepeatedContent {
                    user_id,
                    content,
                    repeat_count,
                    source,
                })
            })
            .collect())
    }
}

impl Drop for Datastore {
    fn drop(&mut self) {
        tracing::debug!(
            path = ?self.path.as_ref().map(|p| p.display().to_string()),
            "Datastore closed"
        );
    }
}

/// Read a timestamp column stored as text or as unix seconds.
///
/// Unparseable text yields `None`; the analysis decides how to count it.
fn timestamp_column(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => None,
        ValueRef::Text(bytes) => std::str::from_utf8(bytes).ok().and_then(parse_timestamp),
        ValueRef::Integer(secs) => DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc()),
        ValueRef::Real(secs) => {
            let whole = secs.floor();
            let nanos = (((secs - whole) * 1e9).round() as u32).min(999_999_999);
            DateTime::from_timestamp(whole as i64, nanos).map(|dt| dt.naive_utc())
        }
        ValueRef::Blob(_) => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Datastore {
        let conn = Connection::open_in_memory().unwrap();
        schema::install(&conn).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO users (id, username, created_at) VALUES
                (1, 'alice', '2024-01-01 00:00:00'),
                (2, 'bob', '2024-01-15 00:00:00'),
                (3, 'carol', '2024-02-01 00:00:00');
            INSERT INTO posts (id, user_id, content, created_at) VALUES
                (10, 1, 'first', '2024-01-02 09:00:00'),
                (11, 2, 'second', '2024-02-01 12:00:00');
            INSERT INTO comments (id, post_id, user_id, content, created_at) VALUES
                (100, 10, 2, 'nice', '2024-01-02 10:00:00'),
                (101, 10, 1, 'thanks', 'not a date'),
                (102, 11, 1, 'hi', NULL);
            INSERT INTO reactions (id, post_id, user_id) VALUES
                (1000, 10, 2),
                (1001, 10, 3);
            INSERT INTO follows (follower_id, followed_id) VALUES (2, 1), (3, 1);
            "#,
        )
        .unwrap();
        Datastore::from_connection(conn).unwrap()
    }

    #[test]
    fn test_datastore_is_query_only() {
        let store = fixture();
        let result = store
            .connection()
            .execute("DELETE FROM users WHERE id = 1", []);
        assert!(result.is_err(), "writes must be rejected");
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Datastore::open_read_only(&dir.path().join("nope.sqlite")).unwrap_err();
        assert!(err.to_string().contains("datastore not found"));
    }

    #[test]
    fn test_monthly_activity_buckets() {
        let store = fixture();
        let months = store.monthly_activity().unwrap();

        // Jan: 2 users + 1 post + 1 comment; Feb: 1 user + 1 post.
        // The unparseable and NULL comment timestamps produce no bucket.
        assert_eq!(
            months,
            vec![
                MonthlyCount {
                    month: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                    count: 4,
                },
                MonthlyCount {
                    month: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                    count: 2,
                },
            ]
        );
    }

    #[test]
    fn test_monthly_activity_unix_timestamps() {
        let conn = Connection::open_in_memory().unwrap();
        schema::install(&conn).unwrap();
        // 2024-01-31 23:00:00, 2024-02-01 12:00:00 and 2024-02-01 00:00:00.5 UTC
        conn.execute_batch(
            r#"
            INSERT INTO users (id, username, created_at) VALUES
                (1, 'alice', 1706742000),
                (2, 'bob', '2024-01-10 08:00:00');
            INSERT INTO posts (id, user_id, content, created_at) VALUES
                (10, 1, 'first', 1706788800),
                (11, 2, 'second', 1706745600.5);
            "#,
        )
        .unwrap();
        let store = Datastore::from_connection(conn).unwrap();

        let months = store.monthly_activity().unwrap();
        let counts: Vec<(NaiveDate, i64)> = months.iter().map(|m| (m.month, m.count)).collect();
        assert_eq!(
            counts,
            vec![
                (NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 2),
                (NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(), 2),
            ]
        );

        // Same month as the lifecycle reader sees for that row
        let posts = store.post_engagement().unwrap();
        let first = posts[0].created_at.unwrap();
        assert_eq!(first.date(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    }

    #[test]
    fn test_post_engagement_counts() {
        let store = fixture();
        let posts = store.post_engagement().unwrap();
        assert_eq!(posts.len(), 2);

        let first = &posts[0];
        assert_eq!(first.post_id, 10);
        assert_eq!(first.username.as_deref(), Some("alice"));
        assert_eq!(first.reaction_count, 2);
        assert_eq!(first.comment_count, 2);
        assert_eq!(first.unique_commenters, 2);
        assert_eq!(first.follower_count, 2);

        let second = &posts[1];
        assert_eq!(second.comment_count, 1);
        assert_eq!(second.reaction_count, 0);
        assert_eq!(second.follower_count, 0);
        assert!(second.created_at.is_some());
    }

    #[test]
    fn test_timestamp_column_variants() {
        use chrono::Timelike;

        let store = fixture();
        let conn = store.connection();

        let unix = conn
            .query_row("SELECT 1706788800", [], |row| timestamp_column(row, 0))
            .unwrap()
            .unwrap();
        assert_eq!(unix.to_string(), "2024-02-01 12:00:00");

        let fractional = conn
            .query_row("SELECT 1706788800.5", [], |row| timestamp_column(row, 0))
            .unwrap()
            .unwrap();
        assert_eq!(fractional.nanosecond(), 500_000_000);
        assert!(fractional > unix);

        let null = conn
            .query_row("SELECT NULL", [], |row| timestamp_column(row, 0))
            .unwrap();
        assert!(null.is_none());
    }

    #[test]
    fn test_comment_timings_skip_null() {
        let store = fixture();
        let timings = store.comment_timings().unwrap();

        assert_eq!(timings.len(), 2);
        assert!(timings[0].comment_created.is_some());
        assert!(timings[1].comment_created.is_none(), "garbage text parses to None");
    }

    #[test]
    fn test_directional_counts_exclude_self() {
        let store = fixture();

        let comments = store.comment_engagement().unwrap();
        // Comment 101 is alice on her own post and is excluded
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].engager_id, 1);
        assert_eq!(comments[0].owner_id, 2);
        assert_eq!(comments[1].engager_name.as_deref(), Some("bob"));
        assert_eq!(comments[1].owner_name.as_deref(), Some("alice"));

        let reactions = store.reaction_engagement().unwrap();
        assert_eq!(reactions.len(), 2);
        assert!(reactions.iter().all(|r| r.owner_id == 1 && r.count == 1));
    }

    #[test]
    fn test_overview_queries() {
        let store = fixture();
        assert_eq!(store.user_count().unwrap(), 3);
        // carol only reacted, so nobody lurks
        assert_eq!(store.lurker_count().unwrap(), 0);

        let influencers = store.top_influencers(5).unwrap();
        assert_eq!(influencers[0].username, "alice");
        assert_eq!(influencers[0].engagement_score(), 4);

        assert!(store.repeated_content(3).unwrap().is_empty());
    }

    #[test]
    fn test_list_tables() {
        let store = fixture();
        let tables = store.list_tables().unwrap();
        let names: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["comments", "follows", "posts", "reactions", "users"]
        );
        let users = tables.iter().find(|t| t.name == "users").unwrap();
        assert_eq!(users.row_count, 3);
        assert_eq!(users.columns.len(), 3);
    }
}
