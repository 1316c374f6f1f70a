//! In-memory representation of an already parsed select or delete query

pub mod condition;
pub mod from_clause;
pub mod statement;
pub mod value;

pub use condition::{LogicalOp, WhereCondition};
pub use from_clause::{FromClause, FromClauseKind, TableSource};
pub use statement::{DeleteQuery, QueryTime, SelectDeleteCommonQuery, SelectQuery};
pub use value::{Operator, TablePattern, Value};
