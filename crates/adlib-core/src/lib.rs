//! Canonical ad record model and the fixed lookup tables shared by loaders and the pipeline.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

pub const CRATE_NAME: &str = "adlib-core";

/// One input row keyed by whatever field names the export used.
pub type RawRecord = Map<String, JsonValue>;

/// Source field name -> canonical field name, in declaration order.
pub const FIELD_ALIASES: &[(&str, &str)] = &[
    ("ad_archive_id", "id"),
    ("ad_id", "id"),
    ("id", "id"),
    ("page_name", "page_name"),
    ("pageName", "page_name"),
    ("ad_creative_body", "ad_creative_body"),
    ("ad_creative_bodies", "ad_creative_bodies"),
    ("adText", "ad_creative_body"),
    ("ad_snapshot_url", "ad_snapshot_url"),
    ("adSnapshotURL", "ad_snapshot_url"),
    ("ad_delivery_start_time", "ad_delivery_start_time"),
    ("startDate", "ad_delivery_start_time"),
    ("ad_delivery_stop_time", "ad_delivery_stop_time"),
    ("endDate", "ad_delivery_stop_time"),
    ("ad_reached_countries", "ad_reached_countries"),
    ("countries", "ad_reached_countries"),
    ("delivery_by_region", "delivery_by_region"),
    ("ad_creative_link_url", "ad_creative_link_url"),
    ("impressions", "impressions"),
    ("spend", "spend"),
    ("currency", "currency"),
    ("languages", "languages"),
    ("language", "languages"),
    ("publisher_platforms", "publisher_platforms"),
    ("demographic_distribution", "demographic_distribution"),
];

/// Canonical fields every normalized record carries, in output column order.
pub const REQUIRED_FIELDS: &[&str] = &[
    "id",
    "page_name",
    "ad_creative_body",
    "ad_creative_bodies",
    "ad_snapshot_url",
    "ad_delivery_start_time",
    "ad_delivery_stop_time",
    "ad_reached_countries",
    "ad_creative_link_url",
    "impressions",
    "spend",
    "currency",
    "languages",
    "publisher_platforms",
    "delivery_by_region",
    "demographic_distribution",
];

/// Fields that exports sometimes ship as JSON serialized into a string cell.
pub const JSON_ENCODED_FIELDS: &[&str] = &[
    "delivery_by_region",
    "demographic_distribution",
    "languages",
    "publisher_platforms",
    "impressions",
    "spend",
    "ad_creative_bodies",
];

/// Derived columns appended after [`REQUIRED_FIELDS`] in tabular outputs.
pub const DERIVED_FIELDS: &[&str] = &[
    "ad_delivery_start_time_dt",
    "ad_delivery_stop_time_dt",
    "duration_hours",
    "media_mix",
    "language",
    "is_usa",
    "proxy_score",
];

/// Upper-cased U.S. state and territory names plus the usual D.C. spellings.
pub const US_REGIONS: &[&str] = &[
    "ALABAMA",
    "ALASKA",
    "ARIZONA",
    "ARKANSAS",
    "CALIFORNIA",
    "COLORADO",
    "CONNECTICUT",
    "DELAWARE",
    "FLORIDA",
    "GEORGIA",
    "HAWAII",
    "IDAHO",
    "ILLINOIS",
    "INDIANA",
    "IOWA",
    "KANSAS",
    "KENTUCKY",
    "LOUISIANA",
    "MAINE",
    "MARYLAND",
    "MASSACHUSETTS",
    "MICHIGAN",
    "MINNESOTA",
    "MISSISSIPPI",
    "MISSOURI",
    "MONTANA",
    "NEBRASKA",
    "NEVADA",
    "NEW HAMPSHIRE",
    "NEW JERSEY",
    "NEW MEXICO",
    "NEW YORK",
    "NORTH CAROLINA",
    "NORTH DAKOTA",
    "OHIO",
    "OKLAHOMA",
    "OREGON",
    "PENNSYLVANIA",
    "RHODE ISLAND",
    "SOUTH CAROLINA",
    "SOUTH DAKOTA",
    "TENNESSEE",
    "TEXAS",
    "UTAH",
    "VERMONT",
    "VIRGINIA",
    "WASHINGTON",
    "WEST VIRGINIA",
    "WISCONSIN",
    "WYOMING",
    "DISTRICT OF COLUMBIA",
    "WASHINGTON DC",
    "D.C.",
    "DC",
    "PUERTO RICO",
];

pub fn alias_target(source_field: &str) -> Option<&'static str> {
    FIELD_ALIASES
        .iter()
        .find(|(source, _)| *source == source_field)
        .map(|(_, canonical)| *canonical)
}

/// Source aliases of `canonical`, in declaration order.
pub fn aliases_of(canonical: &str) -> impl Iterator<Item = &'static str> + '_ {
    FIELD_ALIASES
        .iter()
        .filter(move |(_, target)| *target == canonical)
        .map(|(source, _)| *source)
}

/// Expects an already upper-cased name.
pub fn is_us_region(upper: &str) -> bool {
    US_REGIONS.iter().any(|region| *region == upper)
}

/// Decode `value` as JSON when it is a string holding JSON; otherwise hand it back unchanged.
pub fn try_json(value: JsonValue) -> JsonValue {
    let JsonValue::String(text) = &value else {
        return value;
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return value;
    }
    serde_json::from_str(trimmed).unwrap_or(value)
}

/// Plain-text rendering of a value; `None` only for null.
pub fn value_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// The handful of shapes a loosely typed export field can take.
///
/// Strings that hold a serialized JSON array or object are decoded into
/// [`FieldShape::List`] / [`FieldShape::Record`]; anything unparseable stays text.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldShape {
    Missing,
    Text(String),
    List(Vec<JsonValue>),
    Record(Map<String, JsonValue>),
    Scalar(JsonValue),
}

impl FieldShape {
    pub fn of(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Missing,
            JsonValue::Array(items) => Self::List(items.clone()),
            JsonValue::Object(map) => Self::Record(map.clone()),
            JsonValue::String(text) => Self::from_text(text),
            other => Self::Scalar(other.clone()),
        }
    }

    fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        let looks_like_array = trimmed.starts_with('[') && trimmed.ends_with(']');
        let looks_like_object = trimmed.starts_with('{') && trimmed.ends_with('}');
        if looks_like_array || looks_like_object {
            match serde_json::from_str::<JsonValue>(trimmed) {
                Ok(JsonValue::Array(items)) => return Self::List(items),
                Ok(JsonValue::Object(map)) => return Self::Record(map),
                _ => {}
            }
        }
        Self::Text(text.to_string())
    }

    pub fn is_present(&self) -> bool {
        !matches!(self, Self::Missing)
    }

    /// Case-sensitive substring test over the value's textual form.
    pub fn mentions(&self, needle: &str) -> bool {
        match self {
            Self::Missing => false,
            Self::Text(text) => text.contains(needle),
            Self::List(items) => JsonValue::Array(items.clone()).to_string().contains(needle),
            Self::Record(map) => JsonValue::Object(map.clone()).to_string().contains(needle),
            Self::Scalar(value) => value.to_string().contains(needle),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MediaMix {
    #[serde(rename = "both")]
    Both,
    #[serde(rename = "video-only")]
    VideoOnly,
    #[serde(rename = "image-only")]
    ImageOnly,
    #[serde(rename = "none")]
    None,
}

impl MediaMix {
    pub const ALL: [MediaMix; 4] = [Self::Both, Self::VideoOnly, Self::ImageOnly, Self::None];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Both => "both",
            Self::VideoOnly => "video-only",
            Self::ImageOnly => "image-only",
            Self::None => "none",
        }
    }

    pub fn from_signals(has_video: bool, has_image: bool) -> Self {
        match (has_video, has_image) {
            (true, true) => Self::Both,
            (true, false) => Self::VideoOnly,
            (false, true) => Self::ImageOnly,
            (false, false) => Self::None,
        }
    }
}

impl fmt::Display for MediaMix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signals computed by the enrichment stages; never read from the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedSignals {
    pub ad_delivery_start_time_dt: Option<DateTime<Utc>>,
    pub ad_delivery_stop_time_dt: Option<DateTime<Utc>>,
    pub duration_hours: Option<f64>,
    pub media_mix: MediaMix,
    pub language: String,
    pub is_usa: bool,
    pub proxy_score: f64,
}

/// Canonical projection of one ad plus its derived signals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdRecord {
    #[serde(flatten)]
    pub fields: RawRecord,
    #[serde(flatten)]
    pub signals: DerivedSignals,
}

impl AdRecord {
    pub fn id(&self) -> &str {
        self.fields.get("id").and_then(JsonValue::as_str).unwrap_or_default()
    }

    pub fn field(&self, name: &str) -> &JsonValue {
        self.fields.get(name).unwrap_or(&JsonValue::Null)
    }

    pub fn creative_body(&self) -> &str {
        self.fields
            .get("ad_creative_body")
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
    }
}
