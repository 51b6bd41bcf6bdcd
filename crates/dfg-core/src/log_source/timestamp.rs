//! Leading-timestamp parsing for database log lines.

use chrono::{DateTime, NaiveDateTime, Utc};
use dfg_config::TimestampFormat;

use super::LogError;

const POSTGRES_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
/// `%#z` takes `+01`, `-0500` and `+05:30`.
const POSTGRES_OFFSET_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f %#z";

/// Parse the timestamp a log line starts with.
///
/// Continuation lines of multi-line statements carry no timestamp and fail
/// here, which makes sessions skip them.
///
/// PostgreSQL lines must carry `UTC`, `GMT` or a numeric offset after the
/// time. Zone abbreviations like `EST` are ambiguous and rejected.
pub fn parse_timestamp(line: &str, format: TimestampFormat) -> Result<DateTime<Utc>, LogError> {
    let mut fields = line.split_whitespace();
    match format {
        TimestampFormat::Rfc3339 => {
            let value = fields.next().ok_or(LogError::MissingTimestamp)?;
            DateTime::parse_from_rfc3339(value)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|source| LogError::InvalidTimestamp {
                    value: value.to_string(),
                    source,
                })
        }
        TimestampFormat::Postgres => {
            let (Some(date), Some(time)) = (fields.next(), fields.next()) else {
                return Err(LogError::MissingTimestamp);
            };
            let zone = fields.next().unwrap_or_default();
            let parsed = if matches!(zone, "UTC" | "GMT") {
                NaiveDateTime::parse_from_str(&format!("{date} {time}"), POSTGRES_FORMAT)
                    .map(|ts| ts.and_utc())
            } else {
                DateTime::parse_from_str(&format!("{date} {time} {zone}"), POSTGRES_OFFSET_FORMAT)
                    .map(|ts| ts.with_timezone(&Utc))
            };
            parsed.map_err(|source| LogError::InvalidTimestamp {
                value: format!("{date} {time} {zone}").trim_end().to_string(),
                source,
            })
        }
    }
}
