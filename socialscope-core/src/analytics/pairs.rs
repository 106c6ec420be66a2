//! Mutual engagement between user pairs
//!
//! Directional comment and reaction counts (who engaged with whose posts)
//! are weighted, merged per ordered pair, then folded into unordered pairs so
//! that `{A, B}` and `{B, A}` share one row. Each pair keeps both directional
//! breakdowns so the balance of the relationship can be reported.

use super::stats::{histogram, DistributionSummary};
use crate::chart::{BarSeries, ChartSet, Marker, Panel, PanelBody};
use crate::error::{Error, Result};
use crate::types::DirectionalCount;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// A comment is worth two reactions.
pub const COMMENT_WEIGHT: i64 = 2;
pub const REACTION_WEIGHT: i64 = 1;

/// Reciprocity at or above which a pair is highly balanced.
pub const HIGHLY_BALANCED: f64 = 0.80;
/// Reciprocity at or above which a pair is moderately balanced.
pub const MODERATELY_BALANCED: f64 = 0.60;

/// Pairs shown in the ranking and reciprocity charts.
pub const CHART_PAIR_LIMIT: usize = 10;

const SCORE_HISTOGRAM_BINS: usize = 20;
const ANALYSIS: &str = "pairs";

/// Comments and reactions in one direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DirectionalEngagement {
    pub comments: i64,
    pub reactions: i64,
}

impl DirectionalEngagement {
    pub fn comment_score(&self) -> i64 {
        self.comments * COMMENT_WEIGHT
    }

    pub fn reaction_score(&self) -> i64 {
        self.reactions * REACTION_WEIGHT
    }

    pub fn score(&self) -> i64 {
        self.comment_score() + self.reaction_score()
    }

    fn add(&mut self, other: DirectionalEngagement) {
        self.comments += other.comments;
        self.reactions += other.reactions;
    }
}

/// Unordered user pair, stored with the lower id first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PairKey {
    pub low: i64,
    pub high: i64,
}

impl PairKey {
    pub fn new(a: i64, b: i64) -> Self {
        Self {
            low: a.min(b),
            high: a.max(b),
        }
    }
}

/// Classification of how evenly a pair engages with each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Balance {
    HighlyBalanced,
    ModeratelyBalanced,
    Unbalanced,
}

impl Balance {
    pub fn from_reciprocity(reciprocity: f64) -> Self {
        if reciprocity >= HIGHLY_BALANCED {
            Balance::HighlyBalanced
        } else if reciprocity >= MODERATELY_BALANCED {
            Balance::ModeratelyBalanced
        } else {
            Balance::Unbalanced
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Balance::HighlyBalanced => "Highly balanced",
            Balance::ModeratelyBalanced => "Moderately balanced",
            Balance::Unbalanced => "Unbalanced",
        }
    }
}

/// `1 - |a - b| / (a + b)`; two silent directions count as balanced.
pub fn reciprocity(score_ab: i64, score_ba: i64) -> f64 {
    let total = score_ab + score_ba;
    if total <= 0 {
        return 1.0;
    }
    1.0 - (score_ab - score_ba).abs() as f64 / total as f64
}

/// Resolves user ids to display names.
#[derive(Debug, Default)]
pub struct UserDirectory {
    names: HashMap<i64, String>,
}

impl UserDirectory {
    /// Collect every name the directional queries resolved.
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a DirectionalCount>) -> Self {
        let mut names = HashMap::new();
        for row in rows {
            if let Some(name) = &row.engager_name {
                names.entry(row.engager_id).or_insert_with(|| name.clone());
            }
            if let Some(name) = &row.owner_name {
                names.entry(row.owner_id).or_insert_with(|| name.clone());
            }
        }
        Self { names }
    }

    /// Display name, or `user #<id>` when the id has no user row.
    pub fn name(&self, user_id: i64) -> String {
        match self.names.get(&user_id) {
            Some(name) => name.clone(),
            None => {
                tracing::warn!(user_id, "No username for user id, using placeholder");
                format!("user #{}", user_id)
            }
        }
    }
}

/// Ordered-pair engagement after merging the comment and reaction tables.
pub fn merge_directional(
    comments: &[DirectionalCount],
    reactions: &[DirectionalCount],
) -> BTreeMap<(i64, i64), DirectionalEngagement> {
    let mut merged: BTreeMap<(i64, i64), DirectionalEngagement> = BTreeMap::new();
    for row in comments {
        merged
            .entry((row.engager_id, row.owner_id))
            .or_default()
            .comments += row.count;
    }
    for row in reactions {
        merged
            .entry((row.engager_id, row.owner_id))
            .or_default()
            .reactions += row.count;
    }
    merged
}

/// Mutual engagement of one unordered pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngagementPair {
    pub key: PairKey,
    /// Name of `key.low`
    pub user_low: String,
    /// Name of `key.high`
    pub user_high: String,
    /// What the lower id did on the higher id's posts
    pub low_to_high: DirectionalEngagement,
    /// What the higher id did on the lower id's posts
    pub high_to_low: DirectionalEngagement,
    pub comment_count: i64,
    pub reaction_count: i64,
    pub combined_score: i64,
    pub reciprocity: f64,
    pub balance: Balance,
}

impl EngagementPair {
    fn new(
        key: PairKey,
        low_to_high: DirectionalEngagement,
        high_to_low: DirectionalEngagement,
        names: &UserDirectory,
    ) -> Self {
        let mut total = low_to_high;
        total.add(high_to_low);
        let reciprocity = reciprocity(low_to_high.score(), high_to_low.score());
        Self {
            key,
            user_low: names.name(key.low),
            user_high: names.name(key.high),
            low_to_high,
            high_to_low,
            comment_count: total.comments,
            reaction_count: total.reactions,
            combined_score: total.score(),
            reciprocity,
            balance: Balance::from_reciprocity(reciprocity),
        }
    }

    pub fn label(&self) -> String {
        format!("{} & {}", self.user_low, self.user_high)
    }

    pub fn comment_score(&self) -> i64 {
        self.comment_count * COMMENT_WEIGHT
    }

    pub fn reaction_score(&self) -> i64 {
        self.reaction_count * REACTION_WEIGHT
    }
}

/// Ranked user pairs with score distribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairReport {
    /// Ordered pairs with at least one comment
    pub comment_patterns: usize,
    /// Ordered pairs with at least one reaction
    pub reaction_patterns: usize,
    /// Ordered pairs after merging comments and reactions
    pub directional_engagements: usize,
    /// Combined score descending, ties by ascending pair key
    pub pairs: Vec<EngagementPair>,
    pub distribution: DistributionSummary,
}

impl PairReport {
    pub fn top(&self, n: usize) -> &[EngagementPair] {
        &self.pairs[..n.min(self.pairs.len())]
    }

    /// Pair score relative to the mean pair score.
    pub fn multiplier(&self, pair: &EngagementPair) -> Option<f64> {
        if self.distribution.mean > 0.0 {
            Some(pair.combined_score as f64 / self.distribution.mean)
        } else {
            None
        }
    }

    pub fn chart(&self, top_n: usize) -> ChartSet {
        let ranked = &self.pairs[..CHART_PAIR_LIMIT.min(self.pairs.len())];
        let top = self.top(top_n);
        let top_labels: Vec<String> = top.iter().map(EngagementPair::label).collect();

        let mut direction_labels = Vec::with_capacity(top.len() * 2);
        let mut direction_comments = Vec::with_capacity(top.len() * 2);
        let mut direction_reactions = Vec::with_capacity(top.len() * 2);
        for pair in top {
            for (from, to, side) in [
                (&pair.user_low, &pair.user_high, pair.low_to_high),
                (&pair.user_high, &pair.user_low, pair.high_to_low),
            ] {
                direction_labels.push(format!("{} -> {}", from, to));
                direction_comments.push(side.comments as f64);
                direction_reactions.push(side.reactions as f64);
            }
        }

        let scores: Vec<f64> = self.pairs.iter().map(|p| p.combined_score as f64).collect();

        ChartSet {
            file_stem: "engagement_pairs".to_string(),
            title: "Mutual Engagement Between User Pairs".to_string(),
            panels: vec![
                Panel {
                    title: format!("Top {} User Pairs by Engagement Score", ranked.len()),
                    x_label: "User pair".to_string(),
                    y_label: "Engagement score".to_string(),
                    body: PanelBody::Bars {
                        labels: ranked.iter().map(EngagementPair::label).collect(),
                        series: vec![BarSeries {
                            name: "Engagement score".to_string(),
                            values: ranked.iter().map(|p| p.combined_score as f64).collect(),
                        }],
                        highlight: top.len(),
                        threshold: None,
                    },
                },
                Panel {
                    title: "Directional Engagement (Top Pairs)".to_string(),
                    x_label: "Direction".to_string(),
                    y_label: "Count".to_string(),
                    body: PanelBody::Bars {
                        labels: direction_labels,
                        series: vec![
                            BarSeries {
                                name: "Comments".to_string(),
                                values: direction_comments,
                            },
                            BarSeries {
                                name: "Reactions".to_string(),
                                values: direction_reactions,
                            },
                        ],
                        highlight: 0,
                        threshold: None,
                    },
                },
                Panel {
                    title: "Distribution of Engagement Scores".to_string(),
                    x_label: "Engagement score".to_string(),
                    y_label: "Number of pairs".to_string(),
                    body: PanelBody::Histogram {
                        bins: histogram(&scores, SCORE_HISTOGRAM_BINS),
                        markers: vec![
                            Marker::new(
                                format!("Mean: {:.2}", self.distribution.mean),
                                self.distribution.mean,
                            ),
                            Marker::new(
                                format!("Median: {:.2}", self.distribution.median),
                                self.distribution.median,
                            ),
                        ],
                    },
                },
                Panel {
                    title: "Engagement Score Composition".to_string(),
                    x_label: "User pair".to_string(),
                    y_label: "Score".to_string(),
                    body: PanelBody::Bars {
                        labels: top_labels,
                        series: vec![
                            BarSeries {
                                name: "Comment score (x2)".to_string(),
                                values: top.iter().map(|p| p.comment_score() as f64).collect(),
                            },
                            BarSeries {
                                name: "Reaction score (x1)".to_string(),
                                values: top.iter().map(|p| p.reaction_score() as f64).collect(),
                            },
                        ],
                        highlight: 0,
                        threshold: None,
                    },
                },
                Panel {
                    title: "Engagement Reciprocity".to_string(),
                    x_label: "User pair".to_string(),
                    y_label: "Reciprocity".to_string(),
                    body: PanelBody::Bars {
                        labels: ranked.iter().map(EngagementPair::label).collect(),
                        series: vec![BarSeries {
                            name: "Reciprocity".to_string(),
                            values: ranked.iter().map(|p| p.reciprocity).collect(),
                        }],
                        highlight: 0,
                        threshold: Some(Marker::new("80% (highly balanced)", HIGHLY_BALANCED)),
                    },
                },
            ],
        }
    }
}

/// Fold directional engagement into ranked unordered pairs.
pub fn rank_pairs(
    comments: &[DirectionalCount],
    reactions: &[DirectionalCount],
) -> Result<PairReport> {
    let names = UserDirectory::from_rows(comments.iter().chain(reactions));
    let directional = merge_directional(comments, reactions);

    let mut sides: BTreeMap<PairKey, (DirectionalEngagement, DirectionalEngagement)> =
        BTreeMap::new();
    for (&(engager, owner), engagement) in &directional {
        if engager == owner {
            continue;
        }
        let key = PairKey::new(engager, owner);
        let entry = sides.entry(key).or_default();
        if engager == key.low {
            entry.0.add(*engagement);
        } else {
            entry.1.add(*engagement);
        }
    }

    let mut pairs: Vec<EngagementPair> = sides
        .into_iter()
        .map(|(key, (low_to_high, high_to_low))| {
            EngagementPair::new(key, low_to_high, high_to_low, &names)
        })
        .collect();

    pairs.sort_by(|a, b| {
        b.combined_score
            .cmp(&a.combined_score)
            .then_with(|| a.key.cmp(&b.key))
    });

    let scores: Vec<f64> = pairs.iter().map(|p| p.combined_score as f64).collect();
    let Some(distribution) = DistributionSummary::from_values(&scores) else {
        return Err(Error::insufficient(
            ANALYSIS,
            "no engagement between distinct users",
        ));
    };

    tracing::debug!(
        comment_patterns = comments.len(),
        reaction_patterns = reactions.len(),
        pairs = pairs.len(),
        "Ranked engagement pairs"
    );

    Ok(PairReport {
        comment_patterns: comments.len(),
        reaction_patterns: reactions.len(),
        directional_engagements: directional.len(),
        pairs,
        distribution,
    })
}
