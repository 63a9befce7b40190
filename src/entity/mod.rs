pub mod device;
pub mod reading;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serializer;

/// Current wall clock as epoch milliseconds, the unit every timestamp column uses.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Render an epoch-millis column as `2024-05-01T10:00:00.000Z`.
pub fn serialize_millis<S: Serializer>(millis: &i64, serializer: S) -> Result<S::Ok, S::Error> {
    match DateTime::<Utc>::from_timestamp_millis(*millis) {
        Some(ts) => serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
        None => serializer.serialize_i64(*millis),
    }
}
