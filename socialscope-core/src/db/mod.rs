//! Datastore layer for socialscope
//!
//! This module provides read-only access to the social dataset (SQLite) with:
//! - Schema validation at open time
//! - Typed queries per analysis

pub mod repo;
pub mod schema;

pub use repo::Datastore;
