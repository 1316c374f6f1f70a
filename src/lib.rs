//! tsquery - query analysis for a time series database
//!
//! This crate takes already parsed select and delete queries and works out
//! the time range they are bounded to and the columns each queried table
//! has to return, for use by the storage scan planner.

pub mod config;
pub mod metrics;
pub mod query;

pub use config::{AnalyzerConfig, Clock, FixedClock, SystemClock};
pub use query::{AnalysisRequest, QueryAnalysis, QueryAnalyzer, QueryError, QueryResult};
