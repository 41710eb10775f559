//! Temporal field normalization for write bodies
//!
//! Each router declares which payload fields carry timestamps; normalization
//! touches only those. Declared fields are canonicalized to RFC 3339 UTC:
//! RFC 3339 strings are re-zoned, `YYYY-MM-DD` dates become midnight UTC,
//! and integer values are read as epoch milliseconds. Undeclared fields are
//! never inspected.

use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::error::Error;

/// Normalize the declared temporal fields of a write body in place.
///
/// Absent and `null` fields are left untouched. A declared field whose value
/// cannot be interpreted as a timestamp fails validation.
pub fn normalize_temporal_fields(
    fields: &mut Map<String, Value>,
    temporal: &[String],
) -> Result<(), Error> {
    for name in temporal {
        let Some(value) = fields.get(name) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let canonical = canonicalize(value).ok_or_else(|| {
            Error::validation(format!("field '{name}' is not a recognizable timestamp"))
        })?;
        fields.insert(name.clone(), Value::String(canonical));
    }
    Ok(())
}

fn canonicalize(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
                return Some(to_canonical(parsed.with_timezone(&Utc)));
            }
            let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
            let midnight = date.and_hms_opt(0, 0, 0)?;
            Some(to_canonical(Utc.from_utc_datetime(&midnight)))
        }
        Value::Number(number) => {
            let millis = number.as_i64()?;
            let parsed = Utc.timestamp_millis_opt(millis).single()?;
            Some(to_canonical(parsed))
        }
        _ => None,
    }
}

fn to_canonical(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}
