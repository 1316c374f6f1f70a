use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Binary operators that can appear inside an expression value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "*")]
    Multiply,
    #[serde(rename = "/")]
    Divide,
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "<>")]
    NotEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    GtEq,
    #[serde(rename = "<=")]
    LtEq,
    #[serde(rename = "=~")]
    RegexMatch,
    #[serde(rename = "!~")]
    RegexNotMatch,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Multiply => "*",
            Operator::Divide => "/",
            Operator::Eq => "=",
            Operator::NotEq => "<>",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::GtEq => ">=",
            Operator::LtEq => "<=",
            Operator::RegexMatch => "=~",
            Operator::RegexNotMatch => "!~",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A regular expression naming a set of tables, compiled once when the value is built
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TablePattern {
    pattern: String,
    compiled: Regex,
}

impl TablePattern {
    pub fn new(pattern: impl Into<String>) -> Result<Self, regex::Error> {
        let pattern = pattern.into();
        let compiled = Regex::new(&pattern)?;
        Ok(Self { pattern, compiled })
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn regex(&self) -> &Regex {
        &self.compiled
    }

    /// Whether a concrete table name is selected by this pattern
    pub fn is_match(&self, table_name: &str) -> bool {
        self.compiled.is_match(table_name)
    }
}

impl PartialEq for TablePattern {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl fmt::Debug for TablePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/", self.pattern)
    }
}

impl TryFrom<String> for TablePattern {
    type Error = regex::Error;

    fn try_from(pattern: String) -> Result<Self, Self::Error> {
        Self::new(pattern)
    }
}

impl From<TablePattern> for String {
    fn from(pattern: TablePattern) -> Self {
        pattern.pattern
    }
}

/// A node of a scalar or identifier expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    SimpleName(String),
    TableName(String),
    Wildcard,
    Expression {
        operator: Operator,
        left: Box<Value>,
        right: Box<Value>,
    },
    FunctionCall {
        name: String,
        args: Vec<Value>,
    },
    Regex(TablePattern),
    String(String),
    Int(i64),
    Float(f64),
    Duration(String),
}

impl Value {
    pub fn simple_name(name: impl Into<String>) -> Self {
        Value::SimpleName(name.into())
    }

    pub fn table_name(name: impl Into<String>) -> Self {
        Value::TableName(name.into())
    }

    pub fn string(text: impl Into<String>) -> Self {
        Value::String(text.into())
    }

    pub fn duration(text: impl Into<String>) -> Self {
        Value::Duration(text.into())
    }

    pub fn regex(pattern: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Value::Regex(TablePattern::new(pattern)?))
    }

    pub fn binary(operator: Operator, left: Value, right: Value) -> Self {
        Value::Expression {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn call(name: impl Into<String>, args: Vec<Value>) -> Self {
        Value::FunctionCall {
            name: name.into(),
            args,
        }
    }

    /// Identifier text of a simple or table name
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Value::SimpleName(name) | Value::TableName(name) => Some(name),
            _ => None,
        }
    }

    /// Whether this is an identifier spelled exactly `name`
    pub fn is_identifier(&self, name: &str) -> bool {
        self.identifier() == Some(name)
    }

    /// Operator expressions and function calls; everything else is a leaf
    pub fn is_composite(&self) -> bool {
        matches!(self, Value::Expression { .. } | Value::FunctionCall { .. })
    }

    /// Literals that can only ever be the value side of a time comparison
    pub fn is_numeric_literal(&self) -> bool {
        matches!(
            self,
            Value::Duration(_) | Value::Float(_) | Value::Int(_) | Value::String(_)
        )
    }

    pub fn compiled_regex(&self) -> Option<&Regex> {
        match self {
            Value::Regex(pattern) => Some(pattern.regex()),
            _ => None,
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, Value::Regex(_))
    }

    /// Name used to key a from-clause entry: the identifier, or the pattern of a regex
    pub fn table_key(&self) -> String {
        match self {
            Value::Regex(pattern) => pattern.as_str().to_string(),
            Value::SimpleName(name) | Value::TableName(name) | Value::String(name) => {
                name.clone()
            }
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::SimpleName(name) | Value::TableName(name) => f.write_str(name),
            Value::Wildcard => f.write_str("*"),
            Value::Expression {
                operator,
                left,
                right,
            } => write!(f, "({} {} {})", left, operator, right),
            Value::FunctionCall { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
            Value::Regex(pattern) => write!(f, "/{}/", pattern.as_str()),
            Value::String(text) => write!(f, "'{}'", text),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Duration(text) => f.write_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_nested_expression() {
        let value = Value::binary(
            Operator::Gt,
            Value::simple_name("time"),
            Value::binary(
                Operator::Subtract,
                Value::call("now", vec![]),
                Value::duration("1h"),
            ),
        );
        assert_eq!(value.to_string(), "(time > (now() - 1h))");
    }

    #[test]
    fn test_classification() {
        assert!(Value::call("count", vec![Value::Wildcard]).is_composite());
        assert!(!Value::simple_name("time").is_composite());
        assert!(Value::string("2009-11-10").is_numeric_literal());
        assert!(Value::Int(5).is_numeric_literal());
        assert!(!Value::simple_name("value").is_numeric_literal());
        assert!(!Value::Wildcard.is_numeric_literal());
        assert!(Value::table_name("time").is_identifier("time"));
    }

    #[test]
    fn test_regex_table() {
        let value = Value::regex(".*cpu.*").unwrap();
        assert!(value.is_regex());
        let regex = value.compiled_regex().unwrap();
        assert!(regex.is_match("host.cpu.idle"));
        assert!(!regex.is_match("memory"));
        assert_eq!(value.table_key(), ".*cpu.*");
        assert!(Value::simple_name("cpu").compiled_regex().is_none());
    }

    #[test]
    fn test_invalid_regex_rejected() {
        assert!(Value::regex("(unclosed").is_err());
    }

    #[test]
    fn test_json_representation() {
        let value = Value::binary(
            Operator::Eq,
            Value::simple_name("host"),
            Value::string("srv1"),
        );
        let json = serde_json::to_string(&value).unwrap();
        let decoded: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, value);

        let regex: Value =
            serde_json::from_str(r#"{"kind":"regex","value":"^cpu\\..*"}"#).unwrap();
        assert!(regex.compiled_regex().unwrap().is_match("cpu.load"));
    }
}
