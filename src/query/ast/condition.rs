use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOp {
    And,
    Or,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOp::And => f.write_str("AND"),
            LogicalOp::Or => f.write_str("OR"),
        }
    }
}

/// A WHERE clause: comparisons combined by AND/OR.
///
/// Children are reference counted so a rewritten tree can share every
/// subtree it did not change with the tree it was derived from. Nodes are
/// never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhereCondition {
    Leaf(Value),
    Combined {
        operation: LogicalOp,
        left: Arc<WhereCondition>,
        right: Arc<WhereCondition>,
    },
}

impl WhereCondition {
    pub fn leaf(expression: Value) -> Arc<Self> {
        Arc::new(WhereCondition::Leaf(expression))
    }

    pub fn and(left: Arc<WhereCondition>, right: Arc<WhereCondition>) -> Arc<Self> {
        Self::combine(LogicalOp::And, left, right)
    }

    pub fn or(left: Arc<WhereCondition>, right: Arc<WhereCondition>) -> Arc<Self> {
        Self::combine(LogicalOp::Or, left, right)
    }

    pub fn combine(
        operation: LogicalOp,
        left: Arc<WhereCondition>,
        right: Arc<WhereCondition>,
    ) -> Arc<Self> {
        Arc::new(WhereCondition::Combined {
            operation,
            left,
            right,
        })
    }

    /// The boolean expression of a leaf
    pub fn bool_expression(&self) -> Option<&Value> {
        match self {
            WhereCondition::Leaf(expression) => Some(expression),
            WhereCondition::Combined { .. } => None,
        }
    }

    /// Visits every leaf expression from left to right
    pub fn for_each_leaf<'a>(&'a self, visit: &mut impl FnMut(&'a Value)) {
        match self {
            WhereCondition::Leaf(expression) => visit(expression),
            WhereCondition::Combined { left, right, .. } => {
                left.for_each_leaf(visit);
                right.for_each_leaf(visit);
            }
        }
    }
}

impl fmt::Display for WhereCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WhereCondition::Leaf(expression) => write!(f, "{}", expression),
            WhereCondition::Combined {
                operation,
                left,
                right,
            } => write!(f, "({} {} {})", left, operation, right),
        }
    }
}
