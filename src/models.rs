use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One normalized job posting, shared by the CSV and API ingestion paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: Option<i64>,
    pub internal_job_id: Option<i64>,
    pub absolute_url: Option<String>,
    pub title: Option<String>,
    pub department: Option<String>,
    pub location: Option<String>,
    pub company_name: String,
    pub open_date: Option<NaiveDate>,
    pub close_date: Option<NaiveDate>,
}

/// Column order of every sink table.
pub const COLUMNS: [&str; 9] = [
    "job_id",
    "internal_job_id",
    "absolute_url",
    "title",
    "department",
    "location",
    "company_name",
    "open_date",
    "close_date",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
// Offsets written without a colon ("+0000") fall outside RFC 3339
const OFFSET_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

// 2^63; i64::MAX itself is not representable as f64
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Coerce a date or timestamp string to a calendar date.
///
/// Timestamps carrying an offset keep the date as written in that offset.
/// Anything unparseable yields `None`, never an error.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.date_naive());
    }

    for fmt in OFFSET_DATETIME_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(s, fmt) {
            return Some(ts.date_naive());
        }
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts.date());
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Coerce an identifier string to a 64-bit integer.
///
/// Integral float literals ("123.0") are accepted; empty, fractional,
/// non-numeric and out-of-range values yield `None`.
pub fn parse_id(raw: &str) -> Option<i64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(id) = s.parse::<i64>() {
        return Some(id);
    }

    let value = s.parse::<f64>().ok()?;
    if value.is_finite() && value.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(&value) {
        Some(value as i64)
    } else {
        None
    }
}
