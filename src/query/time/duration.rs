use crate::query::error::{QueryError, QueryResult};

pub const NANOS_PER_MICRO: i64 = 1_000;
pub const NANOS_PER_MILLI: i64 = 1_000_000;
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;
pub const NANOS_PER_MINUTE: i64 = 60 * NANOS_PER_SECOND;
pub const NANOS_PER_HOUR: i64 = 60 * NANOS_PER_MINUTE;
pub const NANOS_PER_DAY: i64 = 24 * NANOS_PER_HOUR;
pub const NANOS_PER_WEEK: i64 = 7 * NANOS_PER_DAY;
pub const NANOS_PER_YEAR: i64 = 365 * NANOS_PER_DAY;

fn unit_nanos(unit: &str) -> Option<i64> {
    let nanos = match unit {
        "" | "ns" => 1,
        "u" | "us" | "µs" => NANOS_PER_MICRO,
        "ms" => NANOS_PER_MILLI,
        "s" => NANOS_PER_SECOND,
        "m" => NANOS_PER_MINUTE,
        "h" => NANOS_PER_HOUR,
        "d" => NANOS_PER_DAY,
        "w" => NANOS_PER_WEEK,
        "y" => NANOS_PER_YEAR,
        _ => return None,
    };
    Some(nanos)
}

/// Parses a duration literal such as `5m`, `1.5h` or `1388534400s` into nanoseconds.
///
/// A number without a unit is taken as nanoseconds. Fractional values are
/// truncated toward zero after scaling.
pub fn parse_time_duration(text: &str) -> QueryResult<i64> {
    let invalid = || QueryError::InvalidDuration(text.to_string());

    let trimmed = text.trim();
    let split = trimmed
        .find(|c: char| c.is_alphabetic())
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    if number.is_empty() || number.ends_with('.') {
        return Err(invalid());
    }
    let multiplier = unit_nanos(unit).ok_or_else(invalid)?;

    if let Ok(whole) = number.parse::<i64>() {
        return whole.checked_mul(multiplier).ok_or_else(invalid);
    }

    let fractional: f64 = number.parse().map_err(|_| invalid())?;
    let scaled = fractional * multiplier as f64;
    if !scaled.is_finite() || scaled >= i64::MAX as f64 || scaled <= i64::MIN as f64 {
        return Err(invalid());
    }
    Ok(scaled as i64)
}
