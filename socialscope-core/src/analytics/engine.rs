//! Analysis engine
//!
//! Analyses are batch computations over the social dataset. Each one reads
//! typed rows from a [`Datastore`], derives its metrics and returns an
//! [`AnalysisOutput`] for the report and chart sinks.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       ANALYTICS ENGINE                          │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐             │
//! │  │ growth      │  │ virality    │  │ pairs       │  ...        │
//! │  └──────┬──────┘  └──────┬──────┘  └──────┬──────┘             │
//! │         │                │                │                     │
//! │         ▼                ▼                ▼                     │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │             AnalyticsEngine.run_analysis()              │   │
//! │  │  - Opens the datastore read-only                        │   │
//! │  │  - Calls analysis.run()                                 │   │
//! │  │  - Closes the datastore on every exit path              │   │
//! │  │  - Returns an AnalysisRun with status and timing        │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use socialscope_core::analytics::{create_default_engine, AnalysisContext};
//!
//! let engine = create_default_engine(&config.datastore_path());
//! for run in engine.run_all(&AnalysisContext::default()) {
//!     println!("{}: {}", run.name, run.status.as_str());
//! }
//! ```

use super::growth::GrowthProjection;
use super::lifecycle::LifecycleReport;
use super::overview::PlatformOverview;
use super::pairs::PairReport;
use super::virality::ViralityReport;
use crate::chart::ChartSet;
use crate::db::Datastore;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

// ============================================
// Context and outputs
// ============================================

/// Run-time parameters shared by all analyses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisContext {
    /// Servers currently serving the platform (growth projection input)
    pub current_servers: u32,
    /// Ranked rows shown in detail
    pub top_n: usize,
}

impl Default for AnalysisContext {
    fn default() -> Self {
        Self {
            current_servers: 16,
            top_n: 3,
        }
    }
}

/// Finished result of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum AnalysisOutput {
    Overview(PlatformOverview),
    Growth(GrowthProjection),
    Virality(ViralityReport),
    Lifecycle(LifecycleReport),
    Pairs(PairReport),
}

impl AnalysisOutput {
    /// Chart for this result; `top_n` controls highlighted rows.
    pub fn chart(&self, top_n: usize) -> ChartSet {
        match self {
            AnalysisOutput::Overview(overview) => overview.chart(),
            AnalysisOutput::Growth(projection) => projection.chart(),
            AnalysisOutput::Virality(report) => report.chart(top_n),
            AnalysisOutput::Lifecycle(report) => report.chart(),
            AnalysisOutput::Pairs(report) => report.chart(top_n),
        }
    }
}

// ============================================
// Run results
// ============================================

/// Status of an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Analysis produced a result
    Success,
    /// Dataset too small for the computation; nothing to report
    InsufficientData,
    /// Analysis failed
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::InsufficientData => "insufficient_data",
            RunStatus::Error => "error",
        }
    }
}

/// Outcome of running one analysis.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRun {
    /// Name of the analysis that was run
    pub name: String,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// How long the run took (milliseconds)
    pub duration_ms: i64,
    pub status: RunStatus,
    /// Error message if the run did not succeed
    pub error_message: Option<String>,
    /// Result, present only on success
    pub output: Option<AnalysisOutput>,
}

impl AnalysisRun {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}

// ============================================
// Analysis trait
// ============================================

/// A batch computation over the social dataset.
///
/// Analyses are stateless and deterministic: the same dataset and context
/// always produce the same output.
pub trait Analysis: Send + Sync {
    /// Unique name, also used as the CLI command name.
    fn name(&self) -> &str;

    /// One-line description for listings.
    fn description(&self) -> &str;

    /// Read rows from the datastore and compute the result.
    fn run(&self, store: &Datastore, ctx: &AnalysisContext) -> Result<AnalysisOutput>;
}

// ============================================
// Analytics engine
// ============================================

/// Runs registered analyses against one dataset file.
pub struct AnalyticsEngine {
    analyses: Vec<Box<dyn Analysis>>,
    datastore_path: PathBuf,
}

impl AnalyticsEngine {
    /// Create an empty engine for the dataset at `datastore_path`.
    pub fn new(datastore_path: &Path) -> Self {
        Self {
            analyses: Vec::new(),
            datastore_path: datastore_path.to_path_buf(),
        }
    }

    /// Register an analysis with the engine.
    pub fn register(&mut self, analysis: Box<dyn Analysis>) {
        tracing::debug!(analysis = analysis.name(), "Registered analysis");
        self.analyses.push(analysis);
    }

    /// Registered analysis names, in registration order.
    pub fn analysis_names(&self) -> Vec<&str> {
        self.analyses.iter().map(|a| a.name()).collect()
    }

    /// Registered analyses as `(name, description)`.
    pub fn descriptions(&self) -> Vec<(&str, &str)> {
        self.analyses
            .iter()
            .map(|a| (a.name(), a.description()))
            .collect()
    }

    pub fn has_analysis(&self, name: &str) -> bool {
        self.analyses.iter().any(|a| a.name() == name)
    }

    pub fn datastore_path(&self) -> &Path {
        &self.datastore_path
    }

    fn find(&self, name: &str) -> Result<&dyn Analysis> {
        self.analyses
            .iter()
            .find(|a| a.name() == name)
            .map(|a| &**a)
            .ok_or_else(|| Error::AnalysisNotFound(name.to_string()))
    }

    /// Run one analysis with its own read-only datastore connection.
    ///
    /// The connection is dropped before this returns. Failures to open the
    /// datastore are recorded in the run, not returned; only an unknown
    /// analysis name is an `Err`.
    pub fn run_analysis(&self, name: &str, ctx: &AnalysisContext) -> Result<AnalysisRun> {
        let analysis = self.find(name)?;
        let started_at = Utc::now();
        let start = Instant::now();

        let outcome = Datastore::open_read_only(&self.datastore_path)
            .and_then(|store| Self::execute(analysis, &store, ctx));

        Ok(Self::record(analysis.name(), started_at, start, outcome))
    }

    /// Run one analysis against an already-open datastore.
    pub fn run_with_store(
        &self,
        name: &str,
        store: &Datastore,
        ctx: &AnalysisContext,
    ) -> Result<AnalysisRun> {
        let analysis = self.find(name)?;
        let started_at = Utc::now();
        let start = Instant::now();
        let outcome = Self::execute(analysis, store, ctx);
        Ok(Self::record(analysis.name(), started_at, start, outcome))
    }

    fn execute(
        analysis: &dyn Analysis,
        store: &Datastore,
        ctx: &AnalysisContext,
    ) -> Result<AnalysisOutput> {
        tracing::debug!(
            analysis = analysis.name(),
            current_servers = ctx.current_servers,
            top_n = ctx.top_n,
            "Running analysis"
        );
        analysis.run(store, ctx)
    }

    fn record(
        name: &str,
        started_at: DateTime<Utc>,
        start: Instant,
        outcome: Result<AnalysisOutput>,
    ) -> AnalysisRun {
        let duration_ms = start.elapsed().as_millis() as i64;

        match outcome {
            Ok(output) => {
                tracing::info!(analysis = name, duration_ms, "Analysis completed successfully");
                AnalysisRun {
                    name: name.to_string(),
                    started_at,
                    duration_ms,
                    status: RunStatus::Success,
                    error_message: None,
                    output: Some(output),
                }
            }
            Err(e) if e.is_insufficient_data() => {
                tracing::info!(analysis = name, reason = %e, "Analysis skipped");
                AnalysisRun {
                    name: name.to_string(),
                    started_at,
                    duration_ms,
                    status: RunStatus::InsufficientData,
                    error_message: Some(e.to_string()),
                    output: None,
                }
            }
            Err(e) => {
                tracing::error!(analysis = name, error = %e, "Analysis failed");
                AnalysisRun {
                    name: name.to_string(),
                    started_at,
                    duration_ms,
                    status: RunStatus::Error,
                    error_message: Some(e.to_string()),
                    output: None,
                }
            }
        }
    }

    /// Run every registered analysis in registration order.
    ///
    /// A failed analysis does not stop the others.
    pub fn run_all(&self, ctx: &AnalysisContext) -> Vec<AnalysisRun> {
        self.analyses
            .iter()
            .filter_map(|a| self.run_analysis(a.name(), ctx).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::stats::DistributionSummary;
    use crate::db::schema;
    use rusqlite::Connection;
    use tempfile::TempDir;

    struct TestAnalysis {
        name: String,
        outcome: fn() -> Result<AnalysisOutput>,
    }

    impl TestAnalysis {
        fn new(name: &str, outcome: fn() -> Result<AnalysisOutput>) -> Self {
            Self {
                name: name.to_string(),
                outcome,
            }
        }
    }

    impl Analysis for TestAnalysis {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> &str {
            "test analysis"
        }

        fn run(&self, _store: &Datastore, _ctx: &AnalysisContext) -> Result<AnalysisOutput> {
            (self.outcome)()
        }
    }

    fn empty_pairs() -> Result<AnalysisOutput> {
        Ok(AnalysisOutput::Pairs(PairReport {
            comment_patterns: 0,
            reaction_patterns: 0,
            directional_engagements: 0,
            pairs: Vec::new(),
            distribution: DistributionSummary {
                min: 0.0,
                q1: 0.0,
                median: 0.0,
                q3: 0.0,
                max: 0.0,
                mean: 0.0,
            },
        }))
    }

    fn too_small() -> Result<AnalysisOutput> {
        Err(Error::insufficient("test", "nothing here"))
    }

    fn broken() -> Result<AnalysisOutput> {
        Err(Error::Config("Test failure".to_string()))
    }

    fn dataset_file(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("social.sqlite");
        let conn = Connection::open(&path).unwrap();
        schema::install(&conn).unwrap();
        path
    }

    #[test]
    fn test_engine_registration() {
        let mut engine = AnalyticsEngine::new(Path::new("unused.sqlite"));
        assert!(engine.analysis_names().is_empty());

        engine.register(Box::new(TestAnalysis::new("test.one", empty_pairs)));
        engine.register(Box::new(TestAnalysis::new("test.two", too_small)));

        assert_eq!(engine.analysis_names(), vec!["test.one", "test.two"]);
        assert!(engine.has_analysis("test.one"));
        assert!(!engine.has_analysis("test.nonexistent"));
        assert_eq!(engine.descriptions()[1], ("test.two", "test analysis"));
    }

    #[test]
    fn test_unknown_analysis_is_an_error() {
        let engine = AnalyticsEngine::new(Path::new("unused.sqlite"));
        let err = engine
            .run_analysis("missing", &AnalysisContext::default())
            .unwrap_err();
        assert!(matches!(err, Error::AnalysisNotFound(_)));
    }

    #[test]
    fn test_run_statuses() {
        let dir = TempDir::new().unwrap();
        let mut engine = AnalyticsEngine::new(&dataset_file(&dir));
        engine.register(Box::new(TestAnalysis::new("ok", empty_pairs)));
        engine.register(Box::new(TestAnalysis::new("small", too_small)));
        engine.register(Box::new(TestAnalysis::new("broken", broken)));

        let runs = engine.run_all(&AnalysisContext::default());
        assert_eq!(runs.len(), 3);

        assert_eq!(runs[0].status, RunStatus::Success);
        assert!(runs[0].output.is_some());
        assert!(runs[0].is_success());

        assert_eq!(runs[1].status, RunStatus::InsufficientData);
        assert!(runs[1]
            .error_message
            .as_deref()
            .unwrap_or_default()
            .contains("nothing here"));

        assert_eq!(runs[2].status, RunStatus::Error);
        assert!(runs[2].output.is_none());
    }

    #[test]
    fn test_missing_datastore_is_recorded_per_run() {
        let dir = TempDir::new().unwrap();
        let mut engine = AnalyticsEngine::new(&dir.path().join("absent.sqlite"));
        engine.register(Box::new(TestAnalysis::new("ok", empty_pairs)));

        let run = engine
            .run_analysis("ok", &AnalysisContext::default())
            .unwrap();
        assert_eq!(run.status, RunStatus::Error);
        assert!(run
            .error_message
            .as_deref()
            .unwrap_or_default()
            .contains("datastore not found"));
    }

    #[test]
    fn test_run_with_store() {
        let conn = Connection::open_in_memory().unwrap();
        schema::install(&conn).unwrap();
        let store = Datastore::from_connection(conn).unwrap();

        let mut engine = AnalyticsEngine::new(Path::new("unused.sqlite"));
        engine.register(Box::new(TestAnalysis::new("ok", empty_pairs)));

        let run = engine
            .run_with_store("ok", &store, &AnalysisContext::default())
            .unwrap();
        assert!(run.is_success());
        assert_eq!(RunStatus::InsufficientData.as_str(), "insufficient_data");
    }
}
