//! Date-range filtering of entity records

use crate::entity::DateRange;
use crate::error::{AnalysisError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;
use tracing::debug;

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parsed record timestamp, normalized to UTC
fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    parse_date(text).map(|d| d.and_time(NaiveTime::MIN))
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

/// Resolved inclusive bounds
#[derive(Debug, Clone, Copy)]
struct Bounds {
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
}

impl Bounds {
    /// A date-only end bound covers the whole day
    fn resolve(range: &DateRange) -> Result<Self> {
        let start = range
            .start
            .as_deref()
            .map(|s| parse_timestamp(s).ok_or_else(|| invalid_bound("start", s)))
            .transpose()?;

        let end = range
            .end
            .as_deref()
            .map(|s| {
                let s = s.trim();
                match parse_date(s) {
                    Some(day) => day
                        .succ_opt()
                        .map(|next| next.and_time(NaiveTime::MIN) - chrono::Duration::nanoseconds(1))
                        .ok_or_else(|| invalid_bound("end", s)),
                    None => parse_timestamp(s).ok_or_else(|| invalid_bound("end", s)),
                }
            })
            .transpose()?;

        Ok(Self { start, end })
    }

    fn contains(&self, at: NaiveDateTime) -> bool {
        self.start.is_none_or(|start| at >= start) && self.end.is_none_or(|end| at <= end)
    }
}

fn invalid_bound(which: &str, value: &str) -> AnalysisError {
    AnalysisError::validation(
        format!("Invalid {which} date '{value}'. Use YYYY-MM-DD or an ISO 8601 timestamp"),
        value,
    )
}

/// Keep records whose date field lies inside the range
///
/// Records with a missing or unparsable date are dropped.
pub fn filter_records(items: Vec<Value>, range: &DateRange) -> Result<Vec<Value>> {
    let bounds = Bounds::resolve(range)?;
    let before = items.len();

    let kept: Vec<Value> = items
        .into_iter()
        .filter(|item| {
            item.get(&range.field)
                .and_then(Value::as_str)
                .and_then(parse_timestamp)
                .is_some_and(|at| bounds.contains(at))
        })
        .collect();

    debug!(field = %range.field, before, after = kept.len(), "Applied date filter");
    Ok(kept)
}

/// Filter a payload: arrays directly, objects per array-valued field
///
/// Other shapes pass through unchanged.
pub fn filter_payload(payload: Value, range: &DateRange) -> Result<Value> {
    match payload {
        Value::Array(items) => Ok(Value::Array(filter_records(items, range)?)),
        Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| match value {
                Value::Array(items) => Ok((key, Value::Array(filter_records(items, range)?))),
                other => Ok((key, other)),
            })
            .collect::<Result<serde_json::Map<_, _>>>()
            .map(Value::Object),
        other => Ok(other),
    }
}
