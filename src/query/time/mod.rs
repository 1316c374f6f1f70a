//! Time bounds of a query: duration literals, time expressions and the
//! extraction of `time OP value` clauses from a WHERE tree.

pub mod bounds;
pub mod duration;
pub mod expr;

pub use bounds::{extract_time_bound, ExtractedTimeRange, Extraction, TimeBoundExtractor};
pub use duration::{
    parse_time_duration, NANOS_PER_DAY, NANOS_PER_HOUR, NANOS_PER_MICRO, NANOS_PER_MILLI,
    NANOS_PER_MINUTE, NANOS_PER_SECOND, NANOS_PER_WEEK, NANOS_PER_YEAR,
};
pub use expr::{eval_time_expr, parse_time_string, timestamp_from_nanos, ZERO_TIME};
