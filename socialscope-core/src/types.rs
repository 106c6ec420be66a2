//! Typed rows returned by the datastore.
//!
//! Each query in [`crate::db::Datastore`] produces one of these structs.
//! Timestamps arrive as ISO-8601-like strings and are parsed here, at the
//! boundary, so analyses only ever see `NaiveDateTime` values (or `None`
//! when a value was missing or malformed).

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;

/// Timestamp layouts accepted in addition to RFC 3339.
const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse a datastore timestamp.
///
/// Accepts RFC 3339 (converted to UTC), `YYYY-MM-DD HH:MM:SS[.f]`,
/// `YYYY-MM-DDTHH:MM:SS[.f]` and a bare date (midnight).
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    for format in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Activity events created in one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthlyCount {
    /// First day of the month
    pub month: NaiveDate,
    /// Users, posts and comments created that month
    pub count: i64,
}

/// Raw engagement counters for one post.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostEngagement {
    pub post_id: i64,
    /// Owner of the post
    pub user_id: i64,
    /// Owner's username (None if the user row is missing)
    pub username: Option<String>,
    pub content: String,
    pub created_at: Option<NaiveDateTime>,
    /// Distinct reactions on the post
    pub reaction_count: i64,
    /// Distinct comments on the post
    pub comment_count: i64,
    /// Distinct users who commented
    pub unique_commenters: i64,
    /// Followers of the post owner
    pub follower_count: i64,
}

impl PostEngagement {
    /// Reactions plus comments.
    pub fn total_engagement(&self) -> i64 {
        self.reaction_count + self.comment_count
    }
}

/// One comment joined with the creation time of its post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentTiming {
    pub post_id: i64,
    pub post_created: Option<NaiveDateTime>,
    pub comment_created: Option<NaiveDateTime>,
}

/// Number of comments (or reactions) one user left on another user's posts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectionalCount {
    /// User who commented or reacted
    pub engager_id: i64,
    /// User who owns the post
    pub owner_id: i64,
    pub engager_name: Option<String>,
    pub owner_name: Option<String>,
    pub count: i64,
}

/// A column of a datastore table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Declared SQL type (may be empty)
    pub decl_type: String,
}

/// A datastore table with its columns and row count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub row_count: i64,
}

/// A user ranked by the engagement their posts received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Influencer {
    pub user_id: i64,
    pub username: String,
    pub total_reactions: i64,
    pub total_comments: i64,
}

impl Influencer {
    /// Reactions plus comments received.
    pub fn engagement_score(&self) -> i64 {
        self.total_reactions + self.total_comments
    }
}

/// Where repeated content was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentSource {
    Post,
    Comment,
}

impl ContentSource {
    /// Parse the source label used in queries.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "post" => Some(ContentSource::Post),
            "comment" => Some(ContentSource::Comment),
            _ => None,
        }
    }

    /// Label for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentSource::Post => "post",
            ContentSource::Comment => "comment",
        }
    }
}

/// The same text posted repeatedly by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepeatedContent {
    pub user_id: i64,
    pub content: String,
    pub repeat_count: i64,
    pub source: ContentSource,
}
