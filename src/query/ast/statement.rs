use std::sync::Arc;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::condition::WhereCondition;
use super::from_clause::{FromClause, FromClauseKind};
use super::value::Value;
use crate::config::{AnalyzerConfig, Clock};
use crate::query::error::{QueryError, QueryResult};
use crate::query::time::{timestamp_from_nanos, TimeBoundExtractor, ZERO_TIME};

static INTO_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+into\s+").expect("into pattern is valid"));

/// A query bound, remembering whether the user wrote it or it was defaulted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryTime {
    pub time: DateTime<Utc>,
    pub explicitly_set: bool,
}

impl QueryTime {
    pub fn explicit(time: DateTime<Utc>) -> Self {
        Self {
            time,
            explicitly_set: true,
        }
    }

    pub fn defaulted(time: DateTime<Utc>) -> Self {
        Self {
            time,
            explicitly_set: false,
        }
    }
}

impl Default for QueryTime {
    fn default() -> Self {
        Self::defaulted(ZERO_TIME)
    }
}

/// The parts shared by select and delete queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectDeleteCommonQuery {
    #[serde(default)]
    pub query_string: String,
    pub from_clause: FromClause,
    #[serde(default)]
    pub where_condition: Option<Arc<WhereCondition>>,
    #[serde(skip)]
    start_time: QueryTime,
    #[serde(skip)]
    end_time: QueryTime,
    #[serde(skip)]
    residual_condition: Option<Arc<WhereCondition>>,
    #[serde(skip)]
    time_range_resolved: bool,
}

impl SelectDeleteCommonQuery {
    pub fn new(
        query_string: impl Into<String>,
        from_clause: FromClause,
        where_condition: Option<Arc<WhereCondition>>,
    ) -> Self {
        Self {
            query_string: query_string.into(),
            from_clause,
            where_condition,
            residual_condition: None,
            start_time: QueryTime::default(),
            end_time: QueryTime::default(),
            time_range_resolved: false,
        }
    }

    pub fn from_clause(&self) -> &FromClause {
        &self.from_clause
    }

    /// The condition as written, time clauses included
    pub fn where_condition(&self) -> Option<&Arc<WhereCondition>> {
        self.where_condition.as_ref()
    }

    /// The condition without the clauses consumed by `resolve_time_range`;
    /// `None` until the range is resolved
    pub fn residual_condition(&self) -> Option<&Arc<WhereCondition>> {
        self.residual_condition.as_ref()
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time.time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time.time
    }

    pub fn start_time_bound(&self) -> QueryTime {
        self.start_time
    }

    pub fn end_time_bound(&self) -> QueryTime {
        self.end_time
    }

    /// Extracts the start and end time from the WHERE clause.
    ///
    /// A missing start bound stays at `ZERO_TIME`, a missing end bound
    /// defaults to the clock's current time. Neither counts as explicitly set.
    /// A range whose start lies after its end is rejected either way.
    pub fn resolve_time_range(
        &mut self,
        config: &AnalyzerConfig,
        clock: &dyn Clock,
    ) -> QueryResult<()> {
        let range = TimeBoundExtractor::new(&config.time_column, clock)
            .extract_range(self.where_condition.as_ref())?;

        let start_time = if range.start == ZERO_TIME {
            QueryTime::default()
        } else {
            QueryTime::explicit(range.start)
        };
        let end_time = if range.end == ZERO_TIME {
            QueryTime::defaulted(timestamp_from_nanos(clock.now_nanos()))
        } else {
            QueryTime::explicit(range.end)
        };
        if start_time.time > end_time.time {
            return Err(QueryError::InvertedTimeRange {
                start: start_time.time,
                end: end_time.time,
            });
        }

        self.start_time = start_time;
        self.end_time = end_time;
        self.residual_condition = range.residual;
        self.time_range_resolved = true;
        Ok(())
    }

    /// Whether the result is guaranteed to come from exactly one series
    pub fn will_return_single_series(&self) -> bool {
        let from = &self.from_clause;
        from.kind == FromClauseKind::Array
            && from.tables.len() == 1
            && from.tables[0].name.compiled_regex().is_none()
    }

    /// Names the query uses to refer to the table `name`
    pub fn table_aliases(&self, name: &str) -> Vec<String> {
        let tables = &self.from_clause.tables;
        if tables.len() == 1 && tables[0].name.is_regex() {
            return vec![name.to_string()];
        }

        tables
            .iter()
            .filter(|table| table.name.table_key() == name)
            .map(|table| table.alias.clone().unwrap_or_else(|| name.to_string()))
            .collect()
    }

    /// Whether `resolve_time_range` has succeeded on this query
    pub fn is_time_range_resolved(&self) -> bool {
        self.time_range_resolved
    }

    /// The query text with an explicit end bound appended when none was given.
    /// Returned as is until the time range is resolved.
    pub fn query_string_with_time_condition(&self) -> String {
        if !self.time_range_resolved || self.end_time.explicitly_set {
            return self.query_string.clone();
        }

        let joiner = if self.where_condition.is_none() {
            " where"
        } else {
            " and"
        };
        format!(
            "{}{} time < {}u",
            self.query_string,
            joiner,
            self.end_time.time.timestamp_micros()
        )
    }

    /// The query text without its INTO target, restricted to `(start, end)`
    pub fn query_string_for_continuous_query(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> String {
        let query = self
            .query_string
            .strip_suffix(';')
            .unwrap_or(&self.query_string);
        let query = INTO_CLAUSE.splitn(query, 2).next().unwrap_or(query);

        let joiner = if self.where_condition.is_none() {
            "where"
        } else {
            "and"
        };

        if start == ZERO_TIME {
            format!("{} {} time < {}u", query, joiner, end.timestamp_micros())
        } else {
            format!(
                "{} {} time > {}u and time < {}u",
                query,
                joiner,
                start.timestamp_micros() - 1,
                end.timestamp_micros()
            )
        }
    }
}

/// A parsed `SELECT`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectQuery {
    #[serde(flatten)]
    pub common: SelectDeleteCommonQuery,
    #[serde(default)]
    pub column_names: Vec<Value>,
    #[serde(default)]
    pub group_by: Vec<Value>,
    /// Set when the query addresses exactly one point, which makes the
    /// WHERE and GROUP BY clauses irrelevant for column references
    #[serde(default)]
    pub single_point: bool,
}

impl SelectQuery {
    pub fn new(common: SelectDeleteCommonQuery, column_names: Vec<Value>) -> Self {
        Self {
            common,
            column_names,
            group_by: Vec::new(),
            single_point: false,
        }
    }

    pub fn with_group_by(mut self, group_by: Vec<Value>) -> Self {
        self.group_by = group_by;
        self
    }

    pub fn with_single_point(mut self, single_point: bool) -> Self {
        self.single_point = single_point;
        self
    }

    pub fn is_single_point_query(&self) -> bool {
        self.single_point
    }
}

/// A parsed `DELETE`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteQuery {
    #[serde(flatten)]
    pub common: SelectDeleteCommonQuery,
}

impl DeleteQuery {
    pub fn new(common: SelectDeleteCommonQuery) -> Self {
        Self { common }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FixedClock;
    use crate::query::ast::{Operator, TableSource};
    use crate::query::time::{NANOS_PER_HOUR, NANOS_PER_SECOND};

    const NOW: i64 = 1_000 * NANOS_PER_SECOND;

    fn from_cpu() -> FromClause {
        FromClause::array(vec![TableSource::new(Value::simple_name("cpu"))])
    }

    fn time_cmp(operator: Operator, seconds: i64) -> Arc<WhereCondition> {
        WhereCondition::leaf(Value::binary(
            operator,
            Value::simple_name("time"),
            Value::duration(format!("{}s", seconds)),
        ))
    }

    fn resolved(query: &str, condition: Option<Arc<WhereCondition>>) -> SelectDeleteCommonQuery {
        let mut common = SelectDeleteCommonQuery::new(query, from_cpu(), condition);
        common
            .resolve_time_range(&AnalyzerConfig::default(), &FixedClock(NOW))
            .unwrap();
        common
    }

    #[test]
    fn test_defaults_without_where() {
        let common = resolved("select value from cpu", None);
        assert_eq!(common.start_time(), ZERO_TIME);
        assert!(!common.start_time_bound().explicitly_set);
        assert_eq!(common.end_time(), timestamp_from_nanos(NOW));
        assert!(!common.end_time_bound().explicitly_set);
        assert!(common.residual_condition().is_none());
    }

    #[test]
    fn test_explicit_bounds_and_residual() {
        let host = WhereCondition::leaf(Value::binary(
            Operator::Eq,
            Value::simple_name("host"),
            Value::string("srv1"),
        ));
        let condition = WhereCondition::and(
            WhereCondition::and(time_cmp(Operator::Gt, 10), Arc::clone(&host)),
            time_cmp(Operator::Lt, 20),
        );
        let common = resolved("select value from cpu", Some(Arc::clone(&condition)));

        assert_eq!(
            common.start_time_bound(),
            QueryTime::explicit(timestamp_from_nanos(10 * NANOS_PER_SECOND))
        );
        assert_eq!(
            common.end_time_bound(),
            QueryTime::explicit(timestamp_from_nanos(20 * NANOS_PER_SECOND))
        );
        assert!(Arc::ptr_eq(common.residual_condition().unwrap(), &host));
        assert!(Arc::ptr_eq(common.where_condition().unwrap(), &condition));
    }

    #[test]
    fn test_resolution_errors_propagate() {
        let condition = WhereCondition::or(time_cmp(Operator::Gt, 10), time_cmp(Operator::Gt, 20));
        let mut common = SelectDeleteCommonQuery::new("", from_cpu(), Some(condition));
        assert_eq!(
            common.resolve_time_range(&AnalyzerConfig::default(), &FixedClock(NOW)),
            Err(QueryError::ConflictingOrTimeBounds)
        );
        assert!(!common.is_time_range_resolved());
    }

    #[test]
    fn test_start_after_default_end_rejected() {
        let condition = WhereCondition::leaf(Value::binary(
            Operator::Gt,
            Value::simple_name("time"),
            Value::binary(Operator::Add, Value::call("now", vec![]), Value::duration("1h")),
        ));
        let mut common = SelectDeleteCommonQuery::new("", from_cpu(), Some(condition));
        assert_eq!(
            common.resolve_time_range(&AnalyzerConfig::default(), &FixedClock(NOW)),
            Err(QueryError::InvertedTimeRange {
                start: timestamp_from_nanos(NOW + NANOS_PER_HOUR),
                end: timestamp_from_nanos(NOW),
            })
        );
        assert_eq!(common.start_time(), ZERO_TIME);
        assert!(!common.is_time_range_resolved());
    }

    #[test]
    fn test_single_series() {
        let common = SelectDeleteCommonQuery::new("", from_cpu(), None);
        assert!(common.will_return_single_series());

        let regex = FromClause::array(vec![TableSource::new(Value::regex("cpu.*").unwrap())]);
        assert!(!SelectDeleteCommonQuery::new("", regex, None).will_return_single_series());

        let two = FromClause::array(vec![
            TableSource::new(Value::simple_name("cpu")),
            TableSource::new(Value::simple_name("mem")),
        ]);
        assert!(!SelectDeleteCommonQuery::new("", two, None).will_return_single_series());

        let join = FromClause::inner_join(vec![TableSource::new(Value::simple_name("cpu"))]);
        assert!(!SelectDeleteCommonQuery::new("", join, None).will_return_single_series());
    }

    #[test]
    fn test_table_aliases() {
        let join = FromClause::inner_join(vec![
            TableSource::aliased(Value::simple_name("cpu"), "a"),
            TableSource::aliased(Value::simple_name("cpu"), "b"),
            TableSource::new(Value::simple_name("mem")),
        ]);
        let common = SelectDeleteCommonQuery::new("", join, None);
        assert_eq!(common.table_aliases("cpu"), vec!["a", "b"]);
        assert_eq!(common.table_aliases("mem"), vec!["mem"]);
        assert!(common.table_aliases("disk").is_empty());

        let regex = FromClause::array(vec![TableSource::new(Value::regex("cpu.*").unwrap())]);
        let common = SelectDeleteCommonQuery::new("", regex, None);
        assert_eq!(common.table_aliases("cpu.idle"), vec!["cpu.idle"]);
    }

    #[test]
    fn test_query_string_with_time_condition() {
        let unresolved = SelectDeleteCommonQuery::new("select value from cpu", from_cpu(), None);
        assert_eq!(
            unresolved.query_string_with_time_condition(),
            "select value from cpu"
        );

        let common = resolved("select value from cpu", None);
        assert_eq!(
            common.query_string_with_time_condition(),
            "select value from cpu where time < 1000000000u"
        );

        let host = WhereCondition::leaf(Value::binary(
            Operator::Eq,
            Value::simple_name("host"),
            Value::string("srv1"),
        ));
        let common = resolved("select value from cpu where host = 'srv1'", Some(host));
        assert_eq!(
            common.query_string_with_time_condition(),
            "select value from cpu where host = 'srv1' and time < 1000000000u"
        );

        let common = resolved(
            "select value from cpu where time < 5s",
            Some(time_cmp(Operator::Lt, 5)),
        );
        assert_eq!(
            common.query_string_with_time_condition(),
            "select value from cpu where time < 5s"
        );
    }

    #[test]
    fn test_query_string_for_continuous_query() {
        let common = SelectDeleteCommonQuery::new(
            "select mean(value) from cpu group by time(1m) INTO cpu.1m;",
            from_cpu(),
            None,
        );
        let start = timestamp_from_nanos(10 * NANOS_PER_SECOND);
        let end = timestamp_from_nanos(20 * NANOS_PER_SECOND);

        assert_eq!(
            common.query_string_for_continuous_query(start, end),
            "select mean(value) from cpu group by time(1m) \
             where time > 9999999u and time < 20000000u"
        );
        assert_eq!(
            common.query_string_for_continuous_query(ZERO_TIME, end),
            "select mean(value) from cpu group by time(1m) where time < 20000000u"
        );
    }
}
