use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::trace;

use super::expr::{eval_time_expr, timestamp_from_nanos, ZERO_TIME};
use crate::config::Clock;
use crate::query::ast::{LogicalOp, Operator, Value, WhereCondition};
use crate::query::error::{QueryError, QueryResult};

/// A rewritten condition (`None` once every clause was consumed) and the bound found in it
pub type Extraction = (Option<Arc<WhereCondition>>, DateTime<Utc>);

/// Start and end bounds of a condition plus what is left of it without them
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedTimeRange {
    /// `ZERO_TIME` when no start bound was found
    pub start: DateTime<Utc>,
    /// `ZERO_TIME` when no end bound was found
    pub end: DateTime<Utc>,
    pub residual: Option<Arc<WhereCondition>>,
}

/// Finds and strips `time OP value` clauses in a WHERE tree.
///
/// The input tree is never modified; rewritten trees share every unchanged
/// subtree with it, so the same tree can be handed to several extractions.
pub struct TimeBoundExtractor<'a> {
    time_column: &'a str,
    clock: &'a dyn Clock,
}

impl<'a> TimeBoundExtractor<'a> {
    pub fn new(time_column: &'a str, clock: &'a dyn Clock) -> Self {
        Self { time_column, clock }
    }

    /// Extracts the start bound (`want_start`) or the end bound of `condition`
    pub fn extract(
        &self,
        condition: Option<&Arc<WhereCondition>>,
        want_start: bool,
    ) -> QueryResult<Extraction> {
        match condition {
            None => Ok((None, ZERO_TIME)),
            Some(condition) => self.extract_node(condition, want_start),
        }
    }

    /// Extracts both bounds from the original condition, then strips both from the residual
    pub fn extract_range(
        &self,
        condition: Option<&Arc<WhereCondition>>,
    ) -> QueryResult<ExtractedTimeRange> {
        let (without_start, start) = self.extract(condition, true)?;
        let (_, end) = self.extract(condition, false)?;
        let (residual, _) = self.extract(without_start.as_ref(), false)?;

        if start != ZERO_TIME && end != ZERO_TIME && start > end {
            return Err(QueryError::InvertedTimeRange { start, end });
        }

        Ok(ExtractedTimeRange {
            start,
            end,
            residual,
        })
    }

    fn extract_node(
        &self,
        node: &Arc<WhereCondition>,
        want_start: bool,
    ) -> QueryResult<Extraction> {
        let (operation, left, right) = match node.as_ref() {
            WhereCondition::Leaf(expression) => {
                return self.extract_leaf(node, expression, want_start)
            }
            WhereCondition::Combined {
                operation,
                left,
                right,
            } => (*operation, left, right),
        };

        let (new_left, time_left) = self.extract_node(left, want_start)?;
        let (new_right, time_right) = self.extract_node(right, want_start)?;

        if operation == LogicalOp::Or && time_left != ZERO_TIME && time_right != ZERO_TIME {
            return Err(QueryError::ConflictingOrTimeBounds);
        }

        let rewritten = match (new_left, new_right) {
            (None, remaining) | (remaining, None) => remaining,
            (Some(l), Some(r)) if Arc::ptr_eq(&l, left) && Arc::ptr_eq(&r, right) => {
                Some(Arc::clone(node))
            }
            (Some(l), Some(r)) => Some(WhereCondition::combine(operation, l, r)),
        };

        Ok((rewritten, pick_bound(time_left, time_right, want_start)))
    }

    fn extract_leaf(
        &self,
        node: &Arc<WhereCondition>,
        expression: &Value,
        want_start: bool,
    ) -> QueryResult<Extraction> {
        let unchanged =
            || -> QueryResult<Extraction> { Ok((Some(Arc::clone(node)), ZERO_TIME)) };

        let (operator, left, right) = match expression {
            Value::Expression {
                operator,
                left,
                right,
            } => (*operator, left.as_ref(), right.as_ref()),
            Value::FunctionCall { .. } => return unchanged(),
            other => return Err(QueryError::InvalidWhereExpression(other.to_string())),
        };

        // When both sides are plain values, a literal on the right means the
        // left side is the time column; otherwise the right side is.
        let time_on_left = match (left.is_composite(), right.is_composite()) {
            (true, true) => return unchanged(),
            (false, true) => true,
            (true, false) => false,
            (false, false) => right.is_numeric_literal(),
        };

        let is_time = |value: &Value| value.is_identifier(self.time_column);
        if is_time(left) && is_time(right) {
            return Err(QueryError::InvalidTimeCondition(expression.to_string()));
        }

        let (time_side, operand) = if time_on_left {
            (left, right)
        } else {
            (right, left)
        };
        if !is_time(time_side) {
            return unchanged();
        }

        match operator {
            // time > x is a start bound, x > time an end bound
            Operator::Gt if want_start != time_on_left => return unchanged(),
            // time < x is an end bound, x < time a start bound
            Operator::Lt if want_start == time_on_left => return unchanged(),
            Operator::Gt | Operator::Lt | Operator::Eq => {}
            other => return Err(QueryError::InvalidTimeOperator(other.symbol().to_string())),
        }

        let bound = timestamp_from_nanos(eval_time_expr(operand, self.clock)?);
        trace!(clause = %expression, %bound, want_start, "consumed time clause");
        Ok((None, bound))
    }
}

/// Earliest of two start bounds, latest of two end bounds; `ZERO_TIME` means absent
fn pick_bound(left: DateTime<Utc>, right: DateTime<Utc>, want_start: bool) -> DateTime<Utc> {
    if left == ZERO_TIME {
        return right;
    }
    if right == ZERO_TIME {
        return left;
    }
    if want_start {
        left.min(right)
    } else {
        left.max(right)
    }
}

/// Extracts one bound using the `time` column
pub fn extract_time_bound(
    condition: Option<&Arc<WhereCondition>>,
    want_start: bool,
    clock: &dyn Clock,
) -> QueryResult<Extraction> {
    TimeBoundExtractor::new("time", clock).extract(condition, want_start)
}
