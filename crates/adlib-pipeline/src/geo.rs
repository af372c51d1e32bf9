//! U.S. targeting detection over country and region fields.

use adlib_core::{is_us_region, value_text, FieldShape, RawRecord, US_REGIONS};
use serde_json::Value as JsonValue;

fn is_us_entry(entry: &JsonValue) -> bool {
    let name = match entry {
        JsonValue::Object(map) => map.get("region").and_then(value_text),
        JsonValue::String(text) => Some(text.clone()),
        _ => None,
    };
    name.map(|name| name.trim().to_uppercase())
        .is_some_and(|upper| upper == "US" || is_us_region(&upper))
}

/// Lists match on exact region names; free text matches on substrings.
pub fn has_us(value: &JsonValue) -> bool {
    match FieldShape::of(value) {
        FieldShape::List(entries) => entries.iter().any(is_us_entry),
        FieldShape::Text(text) => {
            let upper = text.to_uppercase();
            upper.contains("US") || US_REGIONS.iter().any(|region| upper.contains(*region))
        }
        _ => false,
    }
}

pub fn is_usa(canonical: &RawRecord) -> bool {
    let field = |name: &str| canonical.get(name).unwrap_or(&JsonValue::Null);
    has_us(field("ad_reached_countries")) || has_us(field("delivery_by_region"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn recognizes_us_targeting() {
        assert!(has_us(&json!("US")));
        assert!(has_us(&json!(["US"])));
        assert!(has_us(&json!([{"region": "California"}])));
        assert!(has_us(&json!("Targeting: Texas residents")));
        assert!(has_us(&json!([" puerto rico "])));
        assert!(has_us(&json!("[{\"region\": \"District of Columbia\", \"percentage\": 1}]")));
    }

    #[test]
    fn rejects_other_targeting() {
        assert!(!has_us(&json!("Canada")));
        assert!(!has_us(&json!([])));
        assert!(!has_us(&JsonValue::Null));
        assert!(!has_us(&json!(["CA", "MX"])));
        assert!(!has_us(&json!([{"region": "Ontario"}, {"country": "US"}])));
        assert!(!has_us(&json!({"region": "Texas"})));
        assert!(!has_us(&json!(1)));
    }

    #[test]
    fn either_field_marks_the_record() {
        let by_region = json!({"ad_reached_countries": ["GB"], "delivery_by_region": [{"region": "Ohio"}]});
        assert!(is_usa(by_region.as_object().unwrap()));
        let neither = json!({"ad_reached_countries": ["GB"], "delivery_by_region": null});
        assert!(!is_usa(neither.as_object().unwrap()));
        assert!(!is_usa(&RawRecord::new()));
    }
}
