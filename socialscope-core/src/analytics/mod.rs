//! Analytics for socialscope
//!
//! Four composite metrics plus a platform overview:
//! - Growth projection and capacity planning ([`growth`])
//! - Virality scoring ([`virality`])
//! - Content lifecycle timing ([`lifecycle`])
//! - Mutual engagement between user pairs ([`pairs`])
//! - Platform overview ([`overview`])
//!
//! Each computation module is pure: it takes typed datastore rows and returns
//! a report. The [`engine`] wires them to the datastore and [`plugins`] holds
//! the built-in analyses.

pub mod engine;
pub mod growth;
pub mod lifecycle;
pub mod overview;
pub mod pairs;
pub mod plugins;
pub mod stats;
pub mod virality;

// Engine exports
pub use engine::{
    Analysis, AnalysisContext, AnalysisOutput, AnalysisRun, AnalyticsEngine, RunStatus,
};
pub use plugins::create_default_engine;

// Report exports
pub use growth::{project_growth, CapacityPlan, GrowthProjection};
pub use lifecycle::{analyze_lifecycle, LifecycleReport, PostLifecycle};
pub use overview::{collect_overview, PlatformOverview};
pub use pairs::{rank_pairs, Balance, EngagementPair, PairKey, PairReport};
pub use stats::DistributionSummary;
pub use virality::{score_posts, ScoredPost, ViralityReport};
