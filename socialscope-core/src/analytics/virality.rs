//! Virality scoring
//!
//! Every post gets a composite score in [0, 1] blending three min-max
//! normalized signals:
//!
//! | Signal | Formula | Weight |
//! |--------|---------|--------|
//! | Total engagement | `reactions + comments` | 0.40 |
//! | Engagement rate | `total / (followers + 1)` | 0.40 |
//! | Comment ratio | `comments / (reactions + 1)` | 0.20 |

use super::stats::{mean, min_max_normalize};
use crate::chart::{BarSeries, ChartSet, LineSeries, Panel, PanelBody, SeriesStyle};
use crate::error::{Error, Result};
use crate::types::PostEngagement;
use serde::Serialize;

pub const TOTAL_ENGAGEMENT_WEIGHT: f64 = 0.40;
pub const ENGAGEMENT_RATE_WEIGHT: f64 = 0.40;
pub const COMMENT_RATIO_WEIGHT: f64 = 0.20;

/// Posts shown in the ranking chart.
pub const CHART_RANKING_LIMIT: usize = 20;

const ANALYSIS: &str = "virality";

/// A post with its derived metrics and composite score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredPost {
    #[serde(flatten)]
    pub post: PostEngagement,
    pub total_engagement: i64,
    pub engagement_rate: f64,
    pub comment_ratio: f64,
    pub norm_total_engagement: f64,
    pub norm_engagement_rate: f64,
    pub norm_comment_ratio: f64,
    pub virality_score: f64,
}

impl ScoredPost {
    /// Weighted contribution of each signal, in table order.
    pub fn weighted_components(&self) -> [f64; 3] {
        [
            self.norm_total_engagement * TOTAL_ENGAGEMENT_WEIGHT,
            self.norm_engagement_rate * ENGAGEMENT_RATE_WEIGHT,
            self.norm_comment_ratio * COMMENT_RATIO_WEIGHT,
        ]
    }

    fn label(&self) -> String {
        format!("Post {}", self.post.post_id)
    }
}

/// Dataset-wide averages per post.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EngagementAverages {
    pub reactions: f64,
    pub comments: f64,
    pub total_engagement: f64,
}

/// Full virality ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViralityReport {
    pub posts_analyzed: usize,
    pub averages: EngagementAverages,
    /// Score descending, ties by ascending post id
    pub ranking: Vec<ScoredPost>,
}

impl ViralityReport {
    /// The first `n` ranked posts (fewer when the ranking is shorter).
    pub fn top(&self, n: usize) -> &[ScoredPost] {
        &self.ranking[..n.min(self.ranking.len())]
    }

    /// How many times the average total engagement this post received.
    ///
    /// `None` when the average is zero.
    pub fn engagement_multiplier(&self, post: &ScoredPost) -> Option<f64> {
        if self.averages.total_engagement > 0.0 {
            Some(post.total_engagement as f64 / self.averages.total_engagement)
        } else {
            None
        }
    }

    /// Ranking, rate-vs-total scatter, component breakdown and raw counts.
    pub fn chart(&self, top_n: usize) -> ChartSet {
        let ranked = &self.ranking[..CHART_RANKING_LIMIT.min(self.ranking.len())];
        let top = self.top(top_n);
        let top_labels: Vec<String> = top.iter().map(ScoredPost::label).collect();

        let scatter = |posts: &[ScoredPost]| -> Vec<(f64, f64)> {
            posts
                .iter()
                .map(|p| (p.total_engagement as f64, p.engagement_rate))
                .collect()
        };

        let components: Vec<[f64; 3]> =
            top.iter().map(ScoredPost::weighted_components).collect();
        let component_series = [
            "Total engagement (40%)",
            "Engagement rate (40%)",
            "Comment ratio (20%)",
        ]
        .iter()
        .enumerate()
        .map(|(i, name)| BarSeries {
            name: name.to_string(),
            values: components.iter().map(|c| c[i]).collect(),
        })
        .collect();

        ChartSet {
            file_stem: "viral_posts_analysis".to_string(),
            title: "Viral Posts Analysis".to_string(),
            panels: vec![
                Panel {
                    title: format!("Top {} Posts by Virality Score", ranked.len()),
                    x_label: "Post".to_string(),
                    y_label: "Virality score".to_string(),
                    body: PanelBody::Bars {
                        labels: ranked.iter().map(ScoredPost::label).collect(),
                        series: vec![BarSeries {
                            name: "Virality score".to_string(),
                            values: ranked.iter().map(|p| p.virality_score).collect(),
                        }],
                        highlight: top.len(),
                        threshold: None,
                    },
                },
                Panel {
                    title: "Engagement Rate vs Total Engagement".to_string(),
                    x_label: "Total engagement".to_string(),
                    y_label: "Engagement rate".to_string(),
                    body: PanelBody::Lines {
                        series: vec![
                            LineSeries {
                                name: "All posts".to_string(),
                                points: scatter(&self.ranking),
                                style: SeriesStyle::Points,
                            },
                            LineSeries {
                                name: format!("Top {}", top.len()),
                                points: scatter(top),
                                style: SeriesStyle::Points,
                            },
                        ],
                    },
                },
                Panel {
                    title: "Virality Score Components".to_string(),
                    x_label: "Post".to_string(),
                    y_label: "Weighted contribution".to_string(),
                    body: PanelBody::Bars {
                        labels: top_labels.clone(),
                        series: component_series,
                        highlight: 0,
                        threshold: None,
                    },
                },
                Panel {
                    title: "Reactions vs Comments".to_string(),
                    x_label: "Post".to_string(),
                    y_label: "Count".to_string(),
                    body: PanelBody::Bars {
                        labels: top_labels,
                        series: vec![
                            BarSeries {
                                name: "Reactions".to_string(),
                                values: top.iter().map(|p| p.post.reaction_count as f64).collect(),
                            },
                            BarSeries {
                                name: "Comments".to_string(),
                                values: top.iter().map(|p| p.post.comment_count as f64).collect(),
                            },
                        ],
                        highlight: 0,
                        threshold: None,
                    },
                },
            ],
        }
    }
}

/// Score and rank every post.
pub fn score_posts(posts: Vec<PostEngagement>) -> Result<ViralityReport> {
    if posts.is_empty() {
        return Err(Error::insufficient(ANALYSIS, "no posts"));
    }

    let totals: Vec<f64> = posts.iter().map(|p| p.total_engagement() as f64).collect();
    let rates: Vec<f64> = posts
        .iter()
        .map(|p| p.total_engagement() as f64 / (p.follower_count + 1) as f64)
        .collect();
    let ratios: Vec<f64> = posts
        .iter()
        .map(|p| p.comment_count as f64 / (p.reaction_count + 1) as f64)
        .collect();

    let norm_totals = min_max_normalize(&totals);
    let norm_rates = min_max_normalize(&rates);
    let norm_ratios = min_max_normalize(&ratios);

    let reactions: Vec<f64> = posts.iter().map(|p| p.reaction_count as f64).collect();
    let comments: Vec<f64> = posts.iter().map(|p| p.comment_count as f64).collect();
    let averages = EngagementAverages {
        reactions: mean(&reactions).unwrap_or(0.0),
        comments: mean(&comments).unwrap_or(0.0),
        total_engagement: mean(&totals).unwrap_or(0.0),
    };

    let mut ranking: Vec<ScoredPost> = posts
        .into_iter()
        .enumerate()
        .map(|(i, post)| {
            let virality_score = TOTAL_ENGAGEMENT_WEIGHT * norm_totals[i]
                + ENGAGEMENT_RATE_WEIGHT * norm_rates[i]
                + COMMENT_RATIO_WEIGHT * norm_ratios[i];
            ScoredPost {
                total_engagement: post.total_engagement(),
                engagement_rate: rates[i],
                comment_ratio: ratios[i],
                norm_total_engagement: norm_totals[i],
                norm_engagement_rate: norm_rates[i],
                norm_comment_ratio: norm_ratios[i],
                virality_score,
                post,
            }
        })
        .collect();

    ranking.sort_by(|a, b| {
        b.virality_score
            .total_cmp(&a.virality_score)
            .then_with(|| a.post.post_id.cmp(&b.post.post_id))
    });

    tracing::debug!(
        posts = ranking.len(),
        avg_engagement = averages.total_engagement,
        "Scored posts for virality"
    );

    Ok(ViralityReport {
        posts_analyzed: ranking.len(),
        averages,
        ranking,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(post_id: i64, reactions: i64, comments: i64, followers: i64) -> PostEngagement {
        PostEngagement {
            post_id,
            user_id: post_id * 10,
            username: Some(format!("user{}", post_id)),
            content: format!("content of post {}", post_id),
            created_at: None,
            reaction_count: reactions,
            comment_count: comments,
            unique_commenters: comments.min(1),
            follower_count: followers,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_comment_heavy_post_outranks_reaction_heavy_post() {
        let report = score_posts(vec![post(1, 10, 0, 5), post(2, 2, 8, 1), post(3, 0, 0, 0)]).unwrap();

        let order: Vec<i64> = report.ranking.iter().map(|p| p.post.post_id).collect();
        assert_eq!(order, vec![2, 1, 3]);

        let p2 = &report.ranking[0];
        assert!(approx(p2.engagement_rate, 5.0));
        assert!(approx(p2.comment_ratio, 8.0 / 3.0));
        assert!(approx(p2.virality_score, 1.0));

        // 0.4 * 1 + 0.4 * (10/6) / 5
        let p1 = &report.ranking[1];
        assert!(approx(p1.virality_score, 0.4 + 0.4 / 3.0));

        assert_eq!(report.ranking[2].virality_score, 0.0);
    }

    #[test]
    fn test_scores_stay_in_unit_interval() {
        let posts = (1..=25)
            .map(|i| post(i, (i * 7) % 11, (i * 3) % 5, i % 4))
            .collect();
        let report = score_posts(posts).unwrap();

        for scored in &report.ranking {
            assert!((0.0..=1.0).contains(&scored.virality_score));
        }
        assert!(report
            .ranking
            .windows(2)
            .all(|w| w[0].virality_score >= w[1].virality_score));
    }

    #[test]
    fn test_ties_break_by_post_id() {
        let report = score_posts(vec![post(9, 1, 1, 0), post(4, 1, 1, 0), post(6, 0, 0, 0)]).unwrap();
        let order: Vec<i64> = report.ranking.iter().map(|p| p.post.post_id).collect();
        assert_eq!(order, vec![4, 9, 6]);
    }

    #[test]
    fn test_identical_posts_score_zero() {
        let report = score_posts(vec![post(1, 3, 3, 2), post(2, 3, 3, 2)]).unwrap();
        assert!(report.ranking.iter().all(|p| p.virality_score == 0.0));
    }

    #[test]
    fn test_averages_and_multiplier() {
        let report = score_posts(vec![post(1, 4, 2, 0), post(2, 0, 0, 0)]).unwrap();
        assert!(approx(report.averages.reactions, 2.0));
        assert!(approx(report.averages.comments, 1.0));
        assert!(approx(report.averages.total_engagement, 3.0));

        let top = &report.ranking[0];
        assert_eq!(report.engagement_multiplier(top), Some(2.0));

        let quiet = score_posts(vec![post(1, 0, 0, 0)]).unwrap();
        assert_eq!(quiet.engagement_multiplier(&quiet.ranking[0]), None);
    }

    #[test]
    fn test_top_never_exceeds_ranking() {
        let report = score_posts(vec![post(1, 1, 0, 0), post(2, 0, 1, 0)]).unwrap();
        assert_eq!(report.top(3).len(), 2);
        assert_eq!(report.top(1).len(), 1);
        assert!(report.top(0).is_empty());
    }

    #[test]
    fn test_no_posts_is_insufficient() {
        let err = score_posts(Vec::new()).unwrap_err();
        assert!(err.is_insufficient_data());
    }

    #[test]
    fn test_weighted_components_sum_to_score() {
        let report = score_posts(vec![post(1, 10, 0, 5), post(2, 2, 8, 1), post(3, 0, 0, 0)]).unwrap();
        for scored in &report.ranking {
            let sum: f64 = scored.weighted_components().iter().sum();
            assert!(approx(sum, scored.virality_score));
        }
    }

    #[test]
    fn test_chart_panels() {
        let report = score_posts(vec![post(1, 10, 0, 5), post(2, 2, 8, 1)]).unwrap();
        let chart = report.chart(3);
        assert_eq!(chart.panels.len(), 4);
        match &chart.panels[0].body {
            PanelBody::Bars { labels, highlight, .. } => {
                assert_eq!(labels, &vec!["Post 2".to_string(), "Post 1".to_string()]);
                assert_eq!(*highlight, 2);
            }
            other => panic!("unexpected panel body: {:?}", other),
        }
    }
}
