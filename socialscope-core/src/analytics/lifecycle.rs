//! Content lifecycle timing
//!
//! For every post with at least one comment, measures how long after
//! publication the first and last comments arrived. Comments dated before
//! their post are dropped and reported as a data-quality warning, as are
//! rows whose timestamps could not be parsed.

use super::stats::{histogram, quantile, DistributionSummary};
use crate::chart::{BarSeries, ChartSet, LineSeries, Marker, Panel, PanelBody, SeriesStyle};
use crate::error::{DataQualityIssue, DataQualityWarning, Error, Result};
use crate::types::CommentTiming;
use chrono::Duration;
use serde::Serialize;
use std::collections::BTreeMap;

pub const SECONDS_PER_HOUR: f64 = 3600.0;
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Histogram buckets per engagement chart.
pub const HISTOGRAM_BINS: usize = 50;

/// Histograms drop the slowest 5% of posts so the bulk stays readable.
pub const HISTOGRAM_CAP_QUANTILE: f64 = 0.95;

/// Upper bound on points drawn in the first-vs-last scatter.
pub const SCATTER_SAMPLE_LIMIT: usize = 1000;

const ANALYSIS: &str = "lifecycle";

/// First and last comment timing for one post.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PostLifecycle {
    pub post_id: i64,
    /// Seconds from post creation to the first retained comment
    pub first_offset_secs: f64,
    /// Seconds from post creation to the last retained comment
    pub last_offset_secs: f64,
    pub engagement_count: usize,
}

impl PostLifecycle {
    pub fn duration_secs(&self) -> f64 {
        self.last_offset_secs - self.first_offset_secs
    }

    pub fn first_hours(&self) -> f64 {
        self.first_offset_secs / SECONDS_PER_HOUR
    }

    pub fn last_hours(&self) -> f64 {
        self.last_offset_secs / SECONDS_PER_HOUR
    }

    pub fn first_days(&self) -> f64 {
        self.first_offset_secs / SECONDS_PER_DAY
    }

    pub fn last_days(&self) -> f64 {
        self.last_offset_secs / SECONDS_PER_DAY
    }

    pub fn duration_days(&self) -> f64 {
        self.duration_secs() / SECONDS_PER_DAY
    }
}

/// Lifecycle statistics across posts. Summaries are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LifecycleReport {
    /// Comments retained after filtering
    pub events_analyzed: usize,
    /// One entry per post, ascending post id
    pub posts: Vec<PostLifecycle>,
    pub warnings: Vec<DataQualityWarning>,
    pub first_engagement: DistributionSummary,
    pub last_engagement: DistributionSummary,
    pub duration: DistributionSummary,
    /// Posts with exactly one retained comment
    pub single_engagement_posts: usize,
    /// Posts with two or more retained comments
    pub multi_engagement_posts: usize,
}

impl LifecycleReport {
    pub fn first_hours(&self) -> Vec<f64> {
        self.posts.iter().map(PostLifecycle::first_hours).collect()
    }

    pub fn last_hours(&self) -> Vec<f64> {
        self.posts.iter().map(PostLifecycle::last_hours).collect()
    }

    /// Evenly strided subset of at most `limit` posts.
    pub fn sample(&self, limit: usize) -> Vec<&PostLifecycle> {
        if self.posts.len() <= limit {
            return self.posts.iter().collect();
        }
        let stride = self.posts.len() as f64 / limit as f64;
        (0..limit)
            .map(|i| &self.posts[(i as f64 * stride) as usize])
            .collect()
    }

    /// Capped histograms, quartile comparison and first-vs-last scatter.
    pub fn chart(&self) -> ChartSet {
        let first = self.first_hours();
        let last = self.last_hours();
        let first_summary = self.first_engagement.scaled(SECONDS_PER_HOUR);
        let last_summary = self.last_engagement.scaled(SECONDS_PER_HOUR);

        let quartiles = |s: &DistributionSummary| vec![s.min, s.q1, s.median, s.q3, s.max];

        ChartSet {
            file_stem: "content_lifecycle".to_string(),
            title: "Content Lifecycle Analysis".to_string(),
            panels: vec![
                capped_histogram_panel("First Engagement", &first, &first_summary),
                capped_histogram_panel("Last Engagement", &last, &last_summary),
                Panel {
                    title: "Engagement Time Quartiles".to_string(),
                    x_label: "Statistic".to_string(),
                    y_label: "Hours after posting".to_string(),
                    body: PanelBody::Bars {
                        labels: ["Min", "25%", "Median", "75%", "Max"]
                            .iter()
                            .map(|s| s.to_string())
                            .collect(),
                        series: vec![
                            BarSeries {
                                name: "First engagement".to_string(),
                                values: quartiles(&first_summary),
                            },
                            BarSeries {
                                name: "Last engagement".to_string(),
                                values: quartiles(&last_summary),
                            },
                        ],
                        highlight: 0,
                        threshold: None,
                    },
                },
                Panel {
                    title: "First vs Last Engagement".to_string(),
                    x_label: "First engagement (hours)".to_string(),
                    y_label: "Last engagement (hours)".to_string(),
                    body: PanelBody::Lines {
                        series: vec![LineSeries {
                            name: "Posts".to_string(),
                            points: self
                                .sample(SCATTER_SAMPLE_LIMIT)
                                .into_iter()
                                .map(|p| (p.first_hours(), p.last_hours()))
                                .collect(),
                            style: SeriesStyle::Points,
                        }],
                    },
                },
            ],
        }
    }
}

fn capped_histogram_panel(title: &str, hours: &[f64], summary: &DistributionSummary) -> Panel {
    let cap = quantile(hours, HISTOGRAM_CAP_QUANTILE).unwrap_or(0.0);
    let capped: Vec<f64> = hours.iter().copied().filter(|h| *h <= cap).collect();

    Panel {
        title: format!("{} Time Distribution", title),
        x_label: "Hours after posting".to_string(),
        y_label: "Number of posts".to_string(),
        body: PanelBody::Histogram {
            bins: histogram(&capped, HISTOGRAM_BINS),
            markers: vec![
                Marker::new(format!("Mean: {:.1}h", summary.mean), summary.mean),
                Marker::new(format!("Median: {:.1}h", summary.median), summary.median),
            ],
        },
    }
}

/// Group comment offsets by post and summarize first/last engagement.
pub fn analyze_lifecycle(timings: &[CommentTiming]) -> Result<LifecycleReport> {
    let mut missing = 0usize;
    let mut negative = 0usize;
    let mut retained = 0usize;
    let mut by_post: BTreeMap<i64, PostLifecycle> = BTreeMap::new();

    for timing in timings {
        let (Some(posted), Some(commented)) = (timing.post_created, timing.comment_created) else {
            missing += 1;
            continue;
        };

        let delta = commented - posted;
        if delta < Duration::zero() {
            negative += 1;
            continue;
        }
        let offset = match delta.num_microseconds() {
            Some(micros) => micros as f64 / 1_000_000.0,
            None => delta.num_seconds() as f64,
        };

        retained += 1;
        by_post
            .entry(timing.post_id)
            .and_modify(|p| {
                p.first_offset_secs = p.first_offset_secs.min(offset);
                p.last_offset_secs = p.last_offset_secs.max(offset);
                p.engagement_count += 1;
            })
            .or_insert(PostLifecycle {
                post_id: timing.post_id,
                first_offset_secs: offset,
                last_offset_secs: offset,
                engagement_count: 1,
            });
    }

    let warnings: Vec<DataQualityWarning> = [
        DataQualityWarning::record(ANALYSIS, DataQualityIssue::MissingTimestamp, missing),
        DataQualityWarning::record(ANALYSIS, DataQualityIssue::NegativeOffset, negative),
    ]
    .into_iter()
    .flatten()
    .collect();

    let posts: Vec<PostLifecycle> = by_post.into_values().collect();

    let firsts: Vec<f64> = posts.iter().map(|p| p.first_offset_secs).collect();
    let lasts: Vec<f64> = posts.iter().map(|p| p.last_offset_secs).collect();
    let durations: Vec<f64> = posts.iter().map(PostLifecycle::duration_secs).collect();

    let (Some(first_engagement), Some(last_engagement), Some(duration)) = (
        DistributionSummary::from_values(&firsts),
        DistributionSummary::from_values(&lasts),
        DistributionSummary::from_values(&durations),
    ) else {
        return Err(Error::insufficient(
            ANALYSIS,
            format!(
                "no valid comment timings ({} rows, {} dropped)",
                timings.len(),
                missing + negative
            ),
        ));
    };

    let single_engagement_posts = posts.iter().filter(|p| p.engagement_count == 1).count();

    tracing::debug!(
        comments = retained,
        posts = posts.len(),
        dropped = missing + negative,
        "Computed content lifecycle"
    );

    Ok(LifecycleReport {
        events_analyzed: retained,
        single_engagement_posts,
        multi_engagement_posts: posts.len() - single_engagement_posts,
        posts,
        warnings,
        first_engagement,
        last_engagement,
        duration,
    })
}
