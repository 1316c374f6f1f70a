//! Query analysis for tsquery
//! Extracts time bounds from WHERE clauses and resolves the columns each
//! queried table must expose.

pub mod analyzer;
pub mod ast;
pub mod columns;
pub mod error;
pub mod time;

pub use analyzer::{AnalysisRequest, QueryAnalysis, QueryAnalyzer};
pub use columns::{get_referenced_columns, ReferencedColumns, TableColumns};
pub use error::{QueryError, QueryResult};
