//! Analysis metrics for tsquery
//!
//! This module records counters and histograms through the `metrics` facade
//! and can install a Prometheus recorder to expose them.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::query::QueryError;

/// Install a Prometheus recorder and return a handle that renders its contents
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Record one analyzed query
pub fn record_analysis(kind: &'static str, duration_us: f64) {
    counter!("tsquery.analysis.queries", "kind" => kind).increment(1);
    histogram!("tsquery.analysis.duration_us", "kind" => kind).record(duration_us);
}

/// Record a failed analysis
pub fn record_analysis_error(error: &QueryError) {
    counter!("tsquery.analysis.errors", "kind" => error.kind()).increment(1);
}

/// Record a time bound taken from a WHERE clause
pub fn record_time_bound(bound: &'static str) {
    counter!("tsquery.time_bounds.consumed", "bound" => bound).increment(1);
}

/// Record dotted column names recovered from unmatched prefixes
pub fn record_dotted_fallback(columns: u64) {
    counter!("tsquery.columns.dotted_fallback").increment(columns);
}
