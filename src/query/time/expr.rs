use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::duration::parse_time_duration;
use crate::config::Clock;
use crate::query::ast::{Operator, Value};
use crate::query::error::{QueryError, QueryResult};

/// Sentinel for "no bound found"
pub const ZERO_TIME: DateTime<Utc> = DateTime::<Utc>::UNIX_EPOCH;

// YYYY-MM-DD [HH[:MM[:SS[.fraction]]]]
static TIME_STRING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<year>[0-9]{4}|[0-9]{2})-(?P<month>[0-9]{1,2})-(?P<day>[0-9]{1,2})(?: (?P<hour>[0-9]{1,2})(?::(?P<minute>[0-9]{1,2})(?::(?P<second>[0-9]{1,2})(?:\.(?P<fraction>[0-9]+))?)?)?)?$",
    )
    .expect("time string pattern is valid")
});

fn component(captures: &Captures<'_>, name: &str) -> u32 {
    captures
        .name(name)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

fn fraction_nanos(digits: &str) -> u32 {
    let mut padded: String = digits.chars().take(9).collect();
    while padded.len() < 9 {
        padded.push('0');
    }
    padded.parse().unwrap_or(0)
}

/// Parses an absolute UTC time of the form `YYYY-MM-DD [HH[:MM[:SS[.fraction]]]]`.
///
/// Omitted time-of-day components are zero. Two digit years follow the
/// `%y` convention: `69`-`99` are 1969-1999, everything else 2000-2068.
pub fn parse_time_string(text: &str) -> QueryResult<DateTime<Utc>> {
    let invalid = || QueryError::InvalidTimeString(text.to_string());
    let captures = TIME_STRING.captures(text).ok_or_else(invalid)?;

    let year_text = &captures["year"];
    let mut year: i32 = year_text.parse().map_err(|_| invalid())?;
    if year_text.len() == 2 {
        year += if year >= 69 { 1900 } else { 2000 };
    }

    let nanos = captures
        .name("fraction")
        .map(|m| fraction_nanos(m.as_str()))
        .unwrap_or(0);

    let naive = NaiveDate::from_ymd_opt(
        year,
        component(&captures, "month"),
        component(&captures, "day"),
    )
    .and_then(|date| {
        date.and_hms_nano_opt(
            component(&captures, "hour"),
            component(&captures, "minute"),
            component(&captures, "second"),
            nanos,
        )
    })
    .ok_or_else(invalid)?;

    Ok(Utc.from_utc_datetime(&naive))
}

/// Evaluates a time expression such as `now() - 1d` to nanoseconds since the epoch
pub fn eval_time_expr(value: &Value, clock: &dyn Clock) -> QueryResult<i64> {
    match value {
        Value::FunctionCall { name, .. } if name == "now" => Ok(clock.now_nanos()),
        Value::FunctionCall { name, .. } => {
            Err(QueryError::InvalidFunctionInTimeContext(name.clone()))
        }
        Value::String(text) => parse_time_string(text)?
            .timestamp_nanos_opt()
            .ok_or_else(|| QueryError::InvalidTimeString(text.clone())),
        Value::Expression {
            operator,
            left,
            right,
        } => match operator {
            Operator::Add => {
                Ok(eval_time_expr(left, clock)?.saturating_add(eval_time_expr(right, clock)?))
            }
            Operator::Subtract => {
                Ok(eval_time_expr(left, clock)?.saturating_sub(eval_time_expr(right, clock)?))
            }
            other => Err(QueryError::InvalidTimeOperator(other.symbol().to_string())),
        },
        Value::Int(nanos) => Ok(*nanos),
        Value::Float(nanos) if nanos.is_finite() => Ok(nanos.trunc() as i64),
        Value::Duration(text) => parse_time_duration(text),
        other => parse_time_duration(&other.to_string()),
    }
}

/// Converts nanoseconds since the epoch to a UTC timestamp
pub fn timestamp_from_nanos(nanos: i64) -> DateTime<Utc> {
    Utc.timestamp_nanos(nanos)
}
