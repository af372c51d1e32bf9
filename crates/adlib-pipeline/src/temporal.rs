//! Delivery timestamps and the elapsed-duration signal.

use adlib_core::value_text;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;

static DAYS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d+)\s*day").expect("valid days regex"));
static HOURS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d+)\s*hr").expect("valid hours regex"));
static MINUTES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)\s*min").expect("valid minutes regex"));

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%d %H:%M%z",
];

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M %p",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Permissive date/time parse. Naive values are taken as UTC.
pub fn parse_datetime_text(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }

    let zulu = text
        .strip_suffix('Z')
        .or_else(|| text.strip_suffix('z'))
        .map(|head| format!("{head}+0000"));
    let offset_candidate = zulu.as_deref().unwrap_or(text);
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(offset_candidate, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(naive.and_utc());
        }
    }

    DATE_FORMATS.iter().find_map(|fmt| {
        NaiveDate::parse_from_str(text, fmt)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    })
}

/// Parse a raw timestamp field; null, empty, or unparseable values yield `None`.
pub fn to_dt(value: &JsonValue) -> Option<DateTime<Utc>> {
    let parsed = value_text(value).as_deref().and_then(parse_datetime_text);
    if parsed.is_none() && !value.is_null() {
        tracing::debug!(raw = %value, "unparseable delivery timestamp");
    }
    parsed
}

fn first_count(re: &Regex, text: &str) -> f64 {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Hours described by phrases like "running for 2 days 3 hrs"; `None` unless positive.
pub fn parse_runtime_hours(text: &str) -> Option<f64> {
    if text.is_empty() {
        return None;
    }
    let days = first_count(&DAYS_RE, text);
    let hours = first_count(&HOURS_RE, text);
    let minutes = first_count(&MINUTES_RE, text);
    let total = days * 24.0 + hours + minutes / 60.0;
    (total > 0.0).then_some(total)
}

/// Elapsed delivery hours. Without a start instant the free-text runtime phrase is used.
pub fn compute_duration_hours(
    start: Option<DateTime<Utc>>,
    stop: Option<DateTime<Utc>>,
    fallback_text: &str,
    now: DateTime<Utc>,
) -> Option<f64> {
    match start {
        Some(start) => {
            let stop = stop.unwrap_or(now);
            let seconds = (stop - start).num_milliseconds() as f64 / 1000.0;
            Some((seconds / 3600.0).max(0.0))
        }
        None => parse_runtime_hours(fallback_text),
    }
}
