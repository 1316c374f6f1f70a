use serde::{Deserialize, Serialize};

use super::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FromClauseKind {
    /// `FROM a, b, /c.*/`
    Array,
    /// `FROM a AS x INNER JOIN b AS y`
    InnerJoin,
}

/// One queried table, a literal name or a regex, with its optional alias
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSource {
    pub name: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl TableSource {
    pub fn new(name: Value) -> Self {
        Self { name, alias: None }
    }

    pub fn aliased(name: Value, alias: impl Into<String>) -> Self {
        Self {
            name,
            alias: Some(alias.into()),
        }
    }

    /// Name the rest of the query uses to refer to this table
    pub fn reference_name(&self) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None => self.name.table_key(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FromClause {
    pub kind: FromClauseKind,
    pub tables: Vec<TableSource>,
}

impl FromClause {
    pub fn array(tables: Vec<TableSource>) -> Self {
        Self {
            kind: FromClauseKind::Array,
            tables,
        }
    }

    pub fn inner_join(tables: Vec<TableSource>) -> Self {
        Self {
            kind: FromClauseKind::InnerJoin,
            tables,
        }
    }

    /// A single-table `Array` clause whose only table is a regex
    pub fn is_single_regex(&self) -> bool {
        self.kind == FromClauseKind::Array
            && self.tables.len() == 1
            && self.tables[0].name.is_regex()
    }
}
