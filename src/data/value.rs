// Canonical value encoding
// Every value that reaches the database goes through one of these encoders, and
// every literal that reaches SQL text goes through quote().

use std::fmt;

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};

use crate::constants::{
    BOOLEAN_FALSE, BOOLEAN_TRUE, DATE_TIME_DATABASE_FORMAT, MAX_UTC_OFFSET_HOURS,
    MIN_UTC_OFFSET_HOURS, UTC_OFFSET_GRANULARITY_MINUTES,
};
use crate::error::{Result, TimelapseError};

/// A typed cell value held by a row.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    DateTimeUtc(DateTime<Utc>),
    UtcOffset(Duration),
}

impl FieldValue {
    /// Canonical database string. Null encodes as the empty string.
    pub fn to_database_string(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Bool(b) => bool_to_database(*b).to_string(),
            FieldValue::Int(i) => i.to_string(),
            FieldValue::Float(f) => f.to_string(),
            FieldValue::Text(s) => s.clone(),
            FieldValue::DateTimeUtc(dt) => date_time_to_database(dt),
            FieldValue::UtcOffset(offset) => utc_offset_hours_string(*offset),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            FieldValue::Text(s) => parse_database_bool(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            FieldValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_date_time(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::DateTimeUtc(dt) => Some(*dt),
            FieldValue::Text(s) => parse_database_date_time(s),
            _ => None,
        }
    }

    pub fn as_utc_offset(&self) -> Option<Duration> {
        match self {
            FieldValue::UtcOffset(offset) => Some(*offset),
            FieldValue::Text(s) => parse_utc_offset(s).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_database_string())
    }
}

pub fn bool_to_database(value: bool) -> &'static str {
    if value {
        BOOLEAN_TRUE
    } else {
        BOOLEAN_FALSE
    }
}

/// Case-insensitive parse of the canonical boolean tokens.
pub fn parse_database_bool(value: &str) -> Option<bool> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case(BOOLEAN_TRUE) {
        Some(true)
    } else if trimmed.eq_ignore_ascii_case(BOOLEAN_FALSE) {
        Some(false)
    } else {
        None
    }
}

pub fn date_time_to_database(value: &DateTime<Utc>) -> String {
    value.format(DATE_TIME_DATABASE_FORMAT).to_string()
}

/// Require a UTC instant. Values carrying any other offset are rejected rather
/// than converted.
pub fn require_utc<Tz: TimeZone>(value: &DateTime<Tz>) -> Result<DateTime<Utc>> {
    use chrono::Offset;
    let seconds_east = value.offset().fix().local_minus_utc();
    if seconds_east != 0 {
        return Err(TimelapseError::InvalidArgument(format!(
            "date time must be UTC, found offset of {} seconds",
            seconds_east
        )));
    }
    Ok(value.with_timezone(&Utc))
}

pub fn parse_database_date_time(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, DATE_TIME_DATABASE_FORMAT) {
        return Some(Utc.from_utc_datetime(&naive));
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .filter(|dt| dt.offset().local_minus_utc() == 0)
        .map(|dt| dt.with_timezone(&Utc))
}

/// Reject offsets outside [-12h, +14h] or off the 15 minute grid.
pub fn validate_utc_offset(offset: Duration) -> Result<()> {
    let granularity = Duration::minutes(UTC_OFFSET_GRANULARITY_MINUTES);
    if offset < Duration::hours(MIN_UTC_OFFSET_HOURS) || offset > Duration::hours(MAX_UTC_OFFSET_HOURS) {
        return Err(TimelapseError::InvalidArgument(format!(
            "UTC offset of {} minutes is outside [{}h, +{}h]",
            offset.num_minutes(),
            MIN_UTC_OFFSET_HOURS,
            MAX_UTC_OFFSET_HOURS
        )));
    }
    let whole_seconds = Duration::seconds(offset.num_seconds());
    if offset != whole_seconds || offset.num_seconds() % granularity.num_seconds() != 0 {
        return Err(TimelapseError::InvalidArgument(format!(
            "UTC offset of {} seconds is not a multiple of {} minutes",
            offset.num_seconds(),
            UTC_OFFSET_GRANULARITY_MINUTES
        )));
    }
    Ok(())
}

/// Decimal hours with two decimals, e.g. 5h15m -> "5.25".
pub fn utc_offset_hours_string(offset: Duration) -> String {
    let hours = offset.num_minutes() as f64 / 60.0;
    format!("{:.2}", hours)
}

pub fn utc_offset_to_database(offset: Duration) -> Result<String> {
    validate_utc_offset(offset)?;
    Ok(utc_offset_hours_string(offset))
}

/// Inverse of utc_offset_to_database. The decoded offset is validated too.
pub fn parse_utc_offset(value: &str) -> Result<Duration> {
    let hours: f64 = value.trim().parse().map_err(|_| {
        TimelapseError::InvalidArgument(format!("'{}' is not a decimal hour offset", value))
    })?;
    if !hours.is_finite() {
        return Err(TimelapseError::InvalidArgument(format!("'{}' is not finite", value)));
    }
    let offset = Duration::minutes((hours * 60.0).round() as i64);
    validate_utc_offset(offset)?;
    Ok(offset)
}

/// SQL string literal. Embedded single quotes are doubled so the value can
/// never close the literal early.
pub fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            quoted.push('\'');
        }
        quoted.push(ch);
    }
    quoted.push('\'');
    quoted
}

/// A value destined for the literal position of a SQL fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SqlLiteral(String);

impl SqlLiteral {
    pub fn new(value: impl Into<String>) -> Self {
        SqlLiteral(value.into())
    }

    /// The unquoted value.
    pub fn raw(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SqlLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&quote(&self.0))
    }
}
