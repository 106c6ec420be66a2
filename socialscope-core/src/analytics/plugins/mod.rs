//! Built-in analyses
//!
//! Each analysis is a thin adapter: it runs the datastore queries it needs
//! and hands the typed rows to the matching computation module.
//!
//! | Name | Computation |
//! |------|-------------|
//! | `overview` | [`overview::collect_overview`](super::overview::collect_overview) |
//! | `growth` | [`growth::project_growth`](super::growth::project_growth) |
//! | `virality` | [`virality::score_posts`](super::virality::score_posts) |
//! | `lifecycle` | [`lifecycle::analyze_lifecycle`](super::lifecycle::analyze_lifecycle) |
//! | `pairs` | [`pairs::rank_pairs`](super::pairs::rank_pairs) |
//!
//! Use [`create_default_engine`] to get an engine with all of them registered.

use super::engine::{Analysis, AnalysisContext, AnalysisOutput, AnalyticsEngine};
use super::{growth, lifecycle, overview, pairs, virality};
use crate::db::Datastore;
use crate::error::Result;
use std::path::Path;

/// Tables, lurkers, influencers and repeated content.
pub struct OverviewAnalysis;

impl Analysis for OverviewAnalysis {
    fn name(&self) -> &str {
        "overview"
    }

    fn description(&self) -> &str {
        "Tables, lurkers, top influencers and repeated content"
    }

    fn run(&self, store: &Datastore, _ctx: &AnalysisContext) -> Result<AnalysisOutput> {
        overview::collect_overview(store).map(AnalysisOutput::Overview)
    }
}

/// Activity growth trend and server capacity plan.
pub struct GrowthAnalysis;

impl Analysis for GrowthAnalysis {
    fn name(&self) -> &str {
        "growth"
    }

    fn description(&self) -> &str {
        "Project activity three years ahead and size the server fleet"
    }

    fn run(&self, store: &Datastore, ctx: &AnalysisContext) -> Result<AnalysisOutput> {
        let monthly = store.monthly_activity()?;
        growth::project_growth(&monthly, ctx.current_servers).map(AnalysisOutput::Growth)
    }
}

/// Composite virality ranking of posts.
pub struct ViralityAnalysis;

impl Analysis for ViralityAnalysis {
    fn name(&self) -> &str {
        "virality"
    }

    fn description(&self) -> &str {
        "Rank posts by engagement, engagement rate and comment ratio"
    }

    fn run(&self, store: &Datastore, _ctx: &AnalysisContext) -> Result<AnalysisOutput> {
        let posts = store.post_engagement()?;
        virality::score_posts(posts).map(AnalysisOutput::Virality)
    }
}

/// First and last comment timing per post.
pub struct LifecycleAnalysis;

impl Analysis for LifecycleAnalysis {
    fn name(&self) -> &str {
        "lifecycle"
    }

    fn description(&self) -> &str {
        "Time from posting to first and last comment"
    }

    fn run(&self, store: &Datastore, _ctx: &AnalysisContext) -> Result<AnalysisOutput> {
        let timings = store.comment_timings()?;
        lifecycle::analyze_lifecycle(&timings).map(AnalysisOutput::Lifecycle)
    }
}

/// Mutual engagement ranking of user pairs.
pub struct PairsAnalysis;

impl Analysis for PairsAnalysis {
    fn name(&self) -> &str {
        "pairs"
    }

    fn description(&self) -> &str {
        "Rank user pairs by mutual comments and reactions"
    }

    fn run(&self, store: &Datastore, _ctx: &AnalysisContext) -> Result<AnalysisOutput> {
        let comments = store.comment_engagement()?;
        let reactions = store.reaction_engagement()?;
        pairs::rank_pairs(&comments, &reactions).map(AnalysisOutput::Pairs)
    }
}

/// Create an engine with all built-in analyses registered.
///
/// ```rust,ignore
/// use socialscope_core::analytics::create_default_engine;
///
/// let engine = create_default_engine(&config.datastore_path());
/// println!("Registered analyses: {:?}", engine.analysis_names());
/// ```
pub fn create_default_engine(datastore_path: &Path) -> AnalyticsEngine {
    let mut engine = AnalyticsEngine::new(datastore_path);
    engine.register(Box::new(OverviewAnalysis));
    engine.register(Box::new(GrowthAnalysis));
    engine.register(Box::new(ViralityAnalysis));
    engine.register(Box::new(LifecycleAnalysis));
    engine.register(Box::new(PairsAnalysis));
    engine
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_engine_has_analyses() {
        let engine = create_default_engine(Path::new("database.sqlite"));
        assert_eq!(
            engine.analysis_names(),
            vec!["overview", "growth", "virality", "lifecycle", "pairs"]
        );
    }
}
