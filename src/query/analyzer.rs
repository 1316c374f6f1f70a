use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

use super::ast::{DeleteQuery, SelectDeleteCommonQuery, SelectQuery, WhereCondition};
use super::columns::{get_referenced_columns, ReferencedColumns};
use super::error::QueryResult;
use crate::config::{AnalyzerConfig, Clock, SystemClock};
use crate::metrics;

/// A query handed over for analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalysisRequest {
    Select(SelectQuery),
    Delete(DeleteQuery),
}

/// Everything the scan planner needs from a query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryAnalysis {
    pub start_time: DateTime<Utc>,
    pub start_time_set: bool,
    pub end_time: DateTime<Utc>,
    pub end_time_set: bool,
    /// WHERE clause left once the time bounds are taken out
    pub residual_condition: Option<Arc<WhereCondition>>,
    /// Only computed for select queries
    pub referenced_columns: Option<ReferencedColumns>,
    pub single_series: bool,
}

impl QueryAnalysis {
    fn from_common(common: &SelectDeleteCommonQuery) -> Self {
        let start = common.start_time_bound();
        let end = common.end_time_bound();
        Self {
            start_time: start.time,
            start_time_set: start.explicitly_set,
            end_time: end.time,
            end_time_set: end.explicitly_set,
            residual_condition: common.residual_condition().cloned(),
            referenced_columns: None,
            single_series: common.will_return_single_series(),
        }
    }
}

/// Resolves the time range and column references of parsed queries
pub struct QueryAnalyzer {
    config: AnalyzerConfig,
    clock: Arc<dyn Clock>,
}

impl QueryAnalyzer {
    /// Creates an analyzer with the default configuration and the system clock
    pub fn new() -> Self {
        Self::with_config(AnalyzerConfig::default())
    }

    pub fn with_config(config: AnalyzerConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock used for `now()` and for the default end time
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn analyze(&self, request: &mut AnalysisRequest) -> QueryResult<QueryAnalysis> {
        match request {
            AnalysisRequest::Select(query) => self.analyze_select(query),
            AnalysisRequest::Delete(query) => self.analyze_delete(query),
        }
    }

    /// Resolves the time range of `query` in place and computes its column references
    pub fn analyze_select(&self, query: &mut SelectQuery) -> QueryResult<QueryAnalysis> {
        let _span = debug_span!("analyze", kind = "select").entered();
        let started = Instant::now();

        self.resolve(&mut query.common)?;
        let mut analysis = QueryAnalysis::from_common(&query.common);
        let columns = get_referenced_columns(query, &self.config);
        debug!(?columns, "referenced columns");
        analysis.referenced_columns = Some(columns);

        metrics::record_analysis("select", started.elapsed().as_secs_f64() * 1e6);
        Ok(analysis)
    }

    /// Resolves the time range of `query` in place
    pub fn analyze_delete(&self, query: &mut DeleteQuery) -> QueryResult<QueryAnalysis> {
        let _span = debug_span!("analyze", kind = "delete").entered();
        let started = Instant::now();

        self.resolve(&mut query.common)?;
        let analysis = QueryAnalysis::from_common(&query.common);

        metrics::record_analysis("delete", started.elapsed().as_secs_f64() * 1e6);
        Ok(analysis)
    }

    fn resolve(&self, common: &mut SelectDeleteCommonQuery) -> QueryResult<()> {
        if let Err(err) = common.resolve_time_range(&self.config, self.clock.as_ref()) {
            metrics::record_analysis_error(&err);
            return Err(err);
        }

        let start = common.start_time_bound();
        let end = common.end_time_bound();
        if start.explicitly_set {
            metrics::record_time_bound("start");
        }
        if end.explicitly_set {
            metrics::record_time_bound("end");
        }
        debug!(
            start = %start.time,
            start_set = start.explicitly_set,
            end = %end.time,
            end_set = end.explicitly_set,
            "resolved time range"
        );
        Ok(())
    }
}

impl Default for QueryAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FixedClock;
    use crate::query::ast::{FromClause, Operator, TableSource, Value};
    use crate::query::error::QueryError;
    use crate::query::time::{timestamp_from_nanos, NANOS_PER_HOUR, ZERO_TIME};

    const NOW: i64 = 48 * NANOS_PER_HOUR;

    fn analyzer() -> QueryAnalyzer {
        QueryAnalyzer::new().with_clock(Arc::new(FixedClock(NOW)))
    }

    fn last_hour_on_srv1() -> Arc<WhereCondition> {
        WhereCondition::and(
            WhereCondition::leaf(Value::binary(
                Operator::Gt,
                Value::simple_name("time"),
                Value::binary(
                    Operator::Subtract,
                    Value::call("now", vec![]),
                    Value::duration("1h"),
                ),
            )),
            WhereCondition::leaf(Value::binary(
                Operator::Eq,
                Value::simple_name("host"),
                Value::string("srv1"),
            )),
        )
    }

    #[test]
    fn test_analyze_select() {
        let mut query = SelectQuery::new(
            SelectDeleteCommonQuery::new(
                "select value from cpu where time > now() - 1h and host = 'srv1'",
                FromClause::array(vec![TableSource::new(Value::simple_name("cpu"))]),
                Some(last_hour_on_srv1()),
            ),
            vec![Value::simple_name("value")],
        );

        let analysis = analyzer().analyze_select(&mut query).unwrap();
        assert_eq!(analysis.start_time, timestamp_from_nanos(NOW - NANOS_PER_HOUR));
        assert!(analysis.start_time_set);
        assert_eq!(analysis.end_time, timestamp_from_nanos(NOW));
        assert!(!analysis.end_time_set);
        assert!(analysis.single_series);
        assert_eq!(
            analysis.residual_condition.unwrap().to_string(),
            "(host = 'srv1')"
        );

        let columns = analysis.referenced_columns.unwrap();
        assert_eq!(columns.get_by_name("cpu").unwrap(), ["host", "time", "value"]);

        // the query remembers the resolved range
        assert_eq!(query.common.start_time(), timestamp_from_nanos(NOW - NANOS_PER_HOUR));
    }

    #[test]
    fn test_analyze_delete() {
        let mut query = DeleteQuery::new(SelectDeleteCommonQuery::new(
            "delete from cpu",
            FromClause::array(vec![TableSource::new(Value::simple_name("cpu"))]),
            None,
        ));

        let analysis = analyzer().analyze_delete(&mut query).unwrap();
        assert_eq!(analysis.start_time, ZERO_TIME);
        assert!(!analysis.start_time_set);
        assert!(analysis.referenced_columns.is_none());
        assert!(analysis.residual_condition.is_none());
    }

    #[test]
    fn test_analysis_error() {
        let condition = WhereCondition::leaf(Value::Int(1));
        let mut request = AnalysisRequest::Delete(DeleteQuery::new(SelectDeleteCommonQuery::new(
            "",
            FromClause::array(vec![TableSource::new(Value::simple_name("cpu"))]),
            Some(condition),
        )));
        assert!(matches!(
            analyzer().analyze(&mut request),
            Err(QueryError::InvalidWhereExpression(_))
        ));
    }

    #[test]
    fn test_request_from_json() {
        let json = r#"{
            "type": "select",
            "query_string": "select * from /cpu.*/ where time = '2009-11-10'",
            "from_clause": {"kind": "array", "tables": [{"name": {"kind": "regex", "value": "cpu.*"}}]},
            "where_condition": {"leaf": {"kind": "expression", "value": {
                "operator": "=",
                "left": {"kind": "simple_name", "value": "time"},
                "right": {"kind": "string", "value": "2009-11-10"}
            }}},
            "column_names": [{"kind": "wildcard"}]
        }"#;

        let mut request: AnalysisRequest = serde_json::from_str(json).unwrap();
        let analysis = analyzer().analyze(&mut request).unwrap();

        assert_eq!(analysis.start_time.timestamp(), 1_257_811_200);
        assert_eq!(analysis.start_time, analysis.end_time);
        assert!(analysis.start_time_set && analysis.end_time_set);
        assert!(!analysis.single_series);
        let columns = analysis.referenced_columns.unwrap();
        assert_eq!(columns.get_by_name("cpu.*").unwrap(), ["*", "time"]);

        let rendered = serde_json::to_value(&columns).unwrap();
        assert_eq!(rendered["entries"][0]["position"], 0);
    }
}
