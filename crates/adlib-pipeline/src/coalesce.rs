//! Creative body resolution from the body field or its alternates.

use serde_json::Value as JsonValue;

fn non_empty_trimmed(value: &JsonValue) -> Option<String> {
    let text = value.as_str()?.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn first_non_empty(items: &[JsonValue]) -> Option<String> {
    items.iter().find_map(non_empty_trimmed)
}

/// Always returns a string, empty when neither field carries usable text.
pub fn coalesce_creative_body(body: &JsonValue, alternates: &JsonValue) -> String {
    if let Some(text) = non_empty_trimmed(body) {
        return text;
    }

    match alternates {
        JsonValue::Array(items) => first_non_empty(items).unwrap_or_default(),
        JsonValue::String(raw) => {
            let text = raw.trim();
            if text.is_empty() {
                return String::new();
            }
            if text.starts_with('[') && text.ends_with(']') {
                if let Ok(JsonValue::Array(items)) = serde_json::from_str::<JsonValue>(text) {
                    if let Some(found) = first_non_empty(&items) {
                        return found;
                    }
                }
            }
            text.to_string()
        }
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn body_field_wins_when_it_has_text() {
        assert_eq!(
            coalesce_creative_body(&json!("  Shop now  "), &json!(["ignored"])),
            "Shop now"
        );
    }

    #[test]
    fn falls_back_to_first_non_empty_alternate() {
        assert_eq!(
            coalesce_creative_body(&json!("   "), &json!(["", "  ", "Second copy", "Third"])),
            "Second copy"
        );
        assert_eq!(coalesce_creative_body(&JsonValue::Null, &json!([1, "text"])), "text");
    }

    #[test]
    fn json_encoded_alternates_are_decoded() {
        assert_eq!(
            coalesce_creative_body(&JsonValue::Null, &json!("[\"\", \"Encoded copy\"]")),
            "Encoded copy"
        );
    }

    #[test]
    fn plain_or_undecodable_alternates_are_used_verbatim() {
        assert_eq!(coalesce_creative_body(&JsonValue::Null, &json!(" Only copy ")), "Only copy");
        assert_eq!(coalesce_creative_body(&JsonValue::Null, &json!("[not json]")), "[not json]");
    }

    #[test]
    fn nothing_usable_yields_empty_string() {
        assert_eq!(coalesce_creative_body(&JsonValue::Null, &JsonValue::Null), "");
        assert_eq!(coalesce_creative_body(&json!(12), &json!(["", " "])), "");
        assert_eq!(coalesce_creative_body(&JsonValue::Null, &json!({"a": "b"})), "");
    }
}
