//! Resolution of the columns each queried table has to expose.
//!
//! Unprefixed column names are attributed to every table of the query while
//! `prefix.column` names go to the table (or alias) named by the prefix. A
//! prefix that matches no table was really part of a column name containing
//! dots; such names are attached back, whole, to every table.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::AnalyzerConfig;
use crate::metrics;
use crate::query::ast::{FromClause, FromClauseKind, SelectQuery, Value};

/// Columns referenced through one from-clause entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableColumns {
    /// Index of the entry in the from clause
    pub position: usize,
    pub table: Value,
    pub columns: Vec<String>,
}

/// Per-table column references of a select query, in from-clause order.
///
/// Entries are keyed by the from-clause value itself, so two regex tables
/// with the same pattern still get an entry each.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReferencedColumns {
    entries: Vec<TableColumns>,
}

impl ReferencedColumns {
    pub fn entries(&self) -> &[TableColumns] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableColumns> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Columns of the first entry whose table value equals `table`
    pub fn get(&self, table: &Value) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|entry| &entry.table == table)
            .map(|entry| entry.columns.as_slice())
    }

    /// Columns of the first entry whose table name (or regex pattern) is `name`
    pub fn get_by_name(&self, name: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|entry| entry.table.table_key() == name)
            .map(|entry| entry.columns.as_slice())
    }

    /// Columns of the entry for the from-clause table at `position`
    pub fn at(&self, position: usize) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|entry| entry.position == position)
            .map(|entry| entry.columns.as_slice())
    }
}

type PrefixedColumns = BTreeMap<String, Vec<String>>;

fn uniq(columns: Vec<String>) -> Vec<String> {
    columns
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn is_wildcard_first(columns: &[String]) -> bool {
    columns.first().map(String::as_str) == Some("*")
}

/// Collects the unprefixed columns of `value`, recording `prefix.column`
/// names in `prefixed` instead
fn columns_from_value(value: &Value, prefixed: &mut PrefixedColumns) -> Vec<String> {
    match value {
        Value::SimpleName(name) | Value::TableName(name) => match name.rfind('.') {
            Some(idx) => {
                prefixed
                    .entry(name[..idx].to_string())
                    .or_default()
                    .push(name[idx + 1..].to_string());
                Vec::new()
            }
            None => vec![name.clone()],
        },
        Value::Wildcard => vec!["*".to_string()],
        Value::Expression { left, right, .. } => {
            columns_from_operands([left.as_ref(), right.as_ref()], prefixed)
        }
        Value::FunctionCall { args, .. } => columns_from_operands(args, prefixed),
        Value::Regex(_)
        | Value::String(_)
        | Value::Int(_)
        | Value::Float(_)
        | Value::Duration(_) => Vec::new(),
    }
}

// A wildcard operand, as in `count(*)`, selects no column of its own
fn columns_from_operands<'a>(
    operands: impl IntoIterator<Item = &'a Value>,
    prefixed: &mut PrefixedColumns,
) -> Vec<String> {
    let mut columns = Vec::new();
    for operand in operands {
        let mut operand_columns = columns_from_value(operand, prefixed);
        if is_wildcard_first(&operand_columns) {
            operand_columns.remove(0);
        }
        columns.extend(operand_columns);
    }
    columns
}

/// Re-keys columns recorded under a join alias to the aliased table's name
fn revert_alias(from_clause: &FromClause, prefixed: &mut PrefixedColumns) {
    if from_clause.kind != FromClauseKind::InnerJoin {
        return;
    }

    let mut columns: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for table in &from_clause.tables {
        if let Some(aliased) = prefixed.remove(&table.reference_name()) {
            columns
                .entry(table.name.table_key())
                .or_default()
                .extend(aliased);
        }
    }

    for (table, table_columns) in columns {
        prefixed.entry(table).or_default().extend(table_columns);
    }
}

/// Computes, for every from-clause table, the columns the query reads from it
pub fn get_referenced_columns(query: &SelectQuery, config: &AnalyzerConfig) -> ReferencedColumns {
    let mut prefixed = PrefixedColumns::new();
    let mut not_prefixed = Vec::new();

    for value in &query.column_names {
        let name = match value {
            Value::FunctionCall { name, .. } => Some(name.as_str()),
            other => other.identifier(),
        };
        if name.is_some_and(|name| config.is_skipped_projection(name)) {
            continue;
        }
        not_prefixed.extend(columns_from_value(value, &mut prefixed));
    }

    if !query.is_single_point_query() {
        if let Some(condition) = query.common.where_condition() {
            condition.for_each_leaf(&mut |expression| {
                not_prefixed.extend(columns_from_value(expression, &mut prefixed))
            });
        }
        for value in &query.group_by {
            not_prefixed.extend(columns_from_value(value, &mut prefixed));
        }
    }

    let not_prefixed = uniq(not_prefixed);
    let from_clause = query.common.from_clause();
    revert_alias(from_clause, &mut prefixed);

    let mut added_tables = HashSet::new();
    let mut entries = Vec::new();
    for (position, table) in from_clause.tables.iter().enumerate() {
        if table.name.is_regex() {
            // regex tables cannot be referenced by prefix
            entries.push(TableColumns {
                position,
                table: table.name.clone(),
                columns: not_prefixed.clone(),
            });
            continue;
        }

        let name = table.name.table_key();
        if !added_tables.insert(name.clone()) {
            continue;
        }

        let mut columns = prefixed.remove(&name).unwrap_or_default();
        columns.extend(not_prefixed.iter().cloned());
        let mut columns = uniq(columns);
        if columns.len() > 1 && is_wildcard_first(&columns) {
            columns.truncate(1);
        }
        entries.push(TableColumns {
            position,
            table: table.name.clone(),
            columns,
        });
    }

    if !prefixed.is_empty() {
        warn!(
            prefixes = ?prefixed.keys().collect::<Vec<_>>(),
            "treating unmatched column prefixes as part of dotted column names"
        );
        metrics::record_dotted_fallback(prefixed.values().map(Vec::len).sum::<usize>() as u64);

        for (prefix, column_names) in prefixed {
            for column in column_names {
                let dotted = format!("{}.{}", prefix, column);
                for entry in entries.iter_mut() {
                    if is_wildcard_first(&entry.columns) {
                        continue;
                    }
                    entry.columns.push(dotted.clone());
                }
            }
        }
        for entry in entries.iter_mut() {
            entry.columns = uniq(std::mem::take(&mut entry.columns));
        }
    }

    debug!(tables = entries.len(), "resolved referenced columns");
    ReferencedColumns { entries }
}
