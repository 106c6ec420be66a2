//! Platform overview: schema, lurkers, influencers and repeated content.

use crate::chart::{BarSeries, ChartSet, Panel, PanelBody};
use crate::db::Datastore;
use crate::error::Result;
use crate::types::{Influencer, RepeatedContent, TableInfo};
use serde::Serialize;

/// Influencers listed in the overview.
pub const TOP_INFLUENCERS: usize = 5;

/// Minimum repeats for content to be flagged.
pub const REPEAT_THRESHOLD: i64 = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformOverview {
    pub tables: Vec<TableInfo>,
    pub total_users: i64,
    /// Users with no posts, comments or reactions
    pub lurker_count: i64,
    pub top_influencers: Vec<Influencer>,
    pub repeated_content: Vec<RepeatedContent>,
}

impl PlatformOverview {
    /// Share of users who never posted, commented or reacted.
    pub fn lurker_share(&self) -> Option<f64> {
        if self.total_users > 0 {
            Some(self.lurker_count as f64 / self.total_users as f64)
        } else {
            None
        }
    }

    pub fn chart(&self) -> ChartSet {
        ChartSet {
            file_stem: "platform_overview".to_string(),
            title: "Platform Overview".to_string(),
            panels: vec![Panel {
                title: format!("Top {} Influencers", self.top_influencers.len()),
                x_label: "User".to_string(),
                y_label: "Engagement received".to_string(),
                body: PanelBody::Bars {
                    labels: self
                        .top_influencers
                        .iter()
                        .map(|i| i.username.clone())
                        .collect(),
                    series: vec![
                        BarSeries {
                            name: "Reactions".to_string(),
                            values: self
                                .top_influencers
                                .iter()
                                .map(|i| i.total_reactions as f64)
                                .collect(),
                        },
                        BarSeries {
                            name: "Comments".to_string(),
                            values: self
                                .top_influencers
                                .iter()
                                .map(|i| i.total_comments as f64)
                                .collect(),
                        },
                    ],
                    highlight: 0,
                    threshold: None,
                },
            }],
        }
    }
}

/// Gather the overview from the datastore.
pub fn collect_overview(store: &Datastore) -> Result<PlatformOverview> {
    let overview = PlatformOverview {
        tables: store.list_tables()?,
        total_users: store.user_count()?,
        lurker_count: store.lurker_count()?,
        top_influencers: store.top_influencers(TOP_INFLUENCERS)?,
        repeated_content: store.repeated_content(REPEAT_THRESHOLD)?,
    };

    tracing::debug!(
        tables = overview.tables.len(),
        users = overview.total_users,
        lurkers = overview.lurker_count,
        repeated = overview.repeated_content.len(),
        "Collected platform overview"
    );

    Ok(overview)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use rusqlite::Connection;

    #[test]
    fn test_overview_of_small_dataset() {
        let conn = Connection::open_in_memory().unwrap();
        schema::install(&conn).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO users (id, username, created_at) VALUES
                (1, 'alice', '2024-01-01'), (2, 'bob', '2024-01-01'), (3, 'quiet', '2024-01-01');
            INSERT INTO posts (id, user_id, content, created_at) VALUES
                (1, 1, 'spam', '2024-01-02'), (2, 1, 'spam', '2024-01-03'), (3, 1, 'spam', '2024-01-04');
            INSERT INTO reactions (id, post_id, user_id) VALUES (1, 1, 2);
            "#,
        )
        .unwrap();
        let store = Datastore::from_connection(conn).unwrap();

        let overview = collect_overview(&store).unwrap();
        assert_eq!(overview.total_users, 3);
        assert_eq!(overview.lurker_count, 1);
        assert_eq!(overview.top_influencers[0].username, "alice");
        assert_eq!(overview.top_influencers[0].engagement_score(), 1);
        assert_eq!(overview.repeated_content.len(), 1);
        assert_eq!(overview.repeated_content[0].repeat_count, 3);
        assert!((overview.lurker_share().unwrap() - 1.0 / 3.0).abs() < 1e-9);

        let chart = overview.chart();
        assert_eq!(chart.panels.len(), 1);
    }
}
