//! Schema normalization: alias renaming, required-field defaults, JSON cell decoding.

use adlib_core::{
    alias_target, aliases_of, try_json, value_text, RawRecord, FIELD_ALIASES, JSON_ENCODED_FIELDS,
    REQUIRED_FIELDS,
};
use serde_json::Value as JsonValue;

/// A raw row split into its canonical projection and the unmapped leftovers.
///
/// `canonical` always holds every entry of [`REQUIRED_FIELDS`]. `hints` keeps the
/// fields the alias table does not know about; only the media classifier reads them.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub canonical: RawRecord,
    pub hints: RawRecord,
}

impl NormalizedRecord {
    pub fn get(&self, field: &str) -> &JsonValue {
        self.canonical.get(field).unwrap_or(&JsonValue::Null)
    }

    pub fn id(&self) -> &str {
        self.get("id").as_str().unwrap_or_default()
    }

    /// Every field name/value pair of the row, canonical names first.
    pub fn all_fields(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.canonical.iter().chain(self.hints.iter())
    }
}

pub fn normalize_record(raw: &RawRecord) -> NormalizedRecord {
    let mut canonical = RawRecord::new();

    // Later aliases overwrite earlier ones, but a null never clobbers a value.
    for (source, target) in FIELD_ALIASES {
        let Some(value) = raw.get(*source) else {
            continue;
        };
        let occupied = canonical.get(*target).is_some_and(|v| !v.is_null());
        if value.is_null() && occupied {
            continue;
        }
        canonical.insert((*target).to_string(), value.clone());
    }

    canonical.insert("id".to_string(), resolve_id(raw));

    for field in REQUIRED_FIELDS {
        canonical
            .entry((*field).to_string())
            .or_insert(JsonValue::Null);
    }

    for field in JSON_ENCODED_FIELDS {
        if let Some(value) = canonical.get_mut(*field) {
            *value = try_json(value.take());
        }
    }

    let hints = raw
        .iter()
        .filter(|(key, _)| alias_target(key).is_none())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    NormalizedRecord { canonical, hints }
}

/// First non-null, non-blank id alias, rendered as text.
fn resolve_id(raw: &RawRecord) -> JsonValue {
    aliases_of("id")
        .filter_map(|alias| raw.get(alias))
        .filter_map(value_text)
        .map(|text| text.trim().to_string())
        .find(|text| !text.is_empty())
        .map(JsonValue::String)
        .unwrap_or(JsonValue::Null)
}
