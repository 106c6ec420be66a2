//! # socialscope-core
//!
//! Core library for socialscope - analytics over a social-media dataset.
//!
//! This library provides:
//! - Read-only datastore access to a SQLite social dataset
//! - Growth, virality, lifecycle and mutual-engagement analyses
//! - Chart sinks (SVG and JSON)
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Every analysis is a batch computation:
//! - **Fetch:** typed rows from a read-only query ([`db::Datastore`])
//! - **Derive:** metrics computed in memory ([`analytics`])
//! - **Emit:** a report struct plus a [`chart::ChartSet`] for a sink
//!
//! ## Example
//!
//! ```rust,no_run
//! use socialscope_core::analytics::{create_default_engine, AnalysisContext};
//! use socialscope_core::Config;
//!
//! let config = Config::load().expect("failed to load config");
//! let engine = create_default_engine(&config.datastore_path());
//! let runs = engine.run_all(&AnalysisContext::default());
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::Datastore;
pub use error::{DataQualityIssue, DataQualityWarning, Error, Result};
pub use types::*;

// Public modules
pub mod analytics;
pub mod chart;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod logging;
pub mod types;
