//! Two-letter language resolution from metadata, with content detection as fallback.

use adlib_core::{value_text, FieldShape};
use serde_json::Value as JsonValue;
use tracing::debug;

pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// ISO 639-3 codes reported by the detector mapped to ISO 639-1.
const ISO639_3_TO_1: &[(&str, &str)] = &[
    ("afr", "af"),
    ("aka", "ak"),
    ("amh", "am"),
    ("ara", "ar"),
    ("aze", "az"),
    ("bel", "be"),
    ("ben", "bn"),
    ("bul", "bg"),
    ("cat", "ca"),
    ("ces", "cs"),
    ("cmn", "zh"),
    ("dan", "da"),
    ("deu", "de"),
    ("ell", "el"),
    ("eng", "en"),
    ("epo", "eo"),
    ("est", "et"),
    ("fin", "fi"),
    ("fra", "fr"),
    ("guj", "gu"),
    ("heb", "he"),
    ("hin", "hi"),
    ("hrv", "hr"),
    ("hun", "hu"),
    ("hye", "hy"),
    ("ind", "id"),
    ("ita", "it"),
    ("jav", "jv"),
    ("jpn", "ja"),
    ("kan", "kn"),
    ("kat", "ka"),
    ("khm", "km"),
    ("kor", "ko"),
    ("lat", "la"),
    ("lav", "lv"),
    ("lit", "lt"),
    ("mal", "ml"),
    ("mar", "mr"),
    ("mkd", "mk"),
    ("mya", "my"),
    ("nep", "ne"),
    ("nld", "nl"),
    ("nob", "nb"),
    ("ori", "or"),
    ("pan", "pa"),
    ("pes", "fa"),
    ("pol", "pl"),
    ("por", "pt"),
    ("ron", "ro"),
    ("rus", "ru"),
    ("sin", "si"),
    ("slk", "sk"),
    ("slv", "sl"),
    ("sna", "sn"),
    ("spa", "es"),
    ("srp", "sr"),
    ("swe", "sv"),
    ("tam", "ta"),
    ("tel", "te"),
    ("tgl", "tl"),
    ("tha", "th"),
    ("tuk", "tk"),
    ("tur", "tr"),
    ("ukr", "uk"),
    ("urd", "ur"),
    ("uzb", "uz"),
    ("vie", "vi"),
    ("yid", "yi"),
    ("zul", "zu"),
];

/// Reduce a loosely formatted language field to a lower-case two-letter code.
///
/// Lists contribute their first non-empty string element; JSON-encoded lists are
/// decoded first. Locale tags (`en_US`, `pt-BR`) and comma-separated values keep
/// their leading language only.
pub fn normalize_lang_code(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::Array(items) => first_string_code(items),
        JsonValue::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return None;
            }
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                if let FieldShape::List(items) = FieldShape::of(value) {
                    return first_string_code(&items);
                }
            }
            code_from_text(trimmed)
        }
        other => value_text(other).and_then(|text| code_from_text(text.trim())),
    }
}

fn first_string_code(items: &[JsonValue]) -> Option<String> {
    items
        .iter()
        .find(|item| item.as_str().is_some_and(|text| !text.trim().is_empty()))
        .and_then(normalize_lang_code)
}

fn code_from_text(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    let lowered = text.trim_matches(|c| c == '"' || c == '\'').to_lowercase();
    let mut head = lowered.as_str();
    if let Some((first, _)) = head.split_once(',') {
        head = first.trim();
    }
    let head = head.split('_').next().unwrap_or_default();
    let head = head.split('-').next().unwrap_or_default();

    if head.len() == 2 && head.bytes().all(|b| b.is_ascii_lowercase()) {
        return Some(head.to_string());
    }
    // checked against the whole value, not the locale head
    if lowered.contains("english") {
        return Some("en".to_string());
    }
    None
}

/// Best-effort content detection; `None` for blank text or an unsupported language.
pub fn detect_language(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let Some(info) = whatlang::detect(text) else {
        debug!(chars = text.chars().count(), "language detection found no match");
        return None;
    };
    let code = info.lang().code();
    let mapped = ISO639_3_TO_1
        .iter()
        .find(|(long, _)| *long == code)
        .map(|(_, short)| (*short).to_string());
    if mapped.is_none() {
        debug!(code, "detected language has no two-letter code");
    }
    mapped
}

/// Metadata first, then the creative body; never empty.
pub fn resolve_language(languages: &JsonValue, creative_body: &str) -> String {
    normalize_lang_code(languages)
        .or_else(|| detect_language(creative_body))
        .map(|code| code.to_lowercase())
        .unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_the_shapes_exports_use() {
        assert_eq!(normalize_lang_code(&json!("en")), Some("en".into()));
        assert_eq!(normalize_lang_code(&json!(" EN_us ")), Some("en".into()));
        assert_eq!(normalize_lang_code(&json!("pt-BR")), Some("pt".into()));
        assert_eq!(normalize_lang_code(&json!("'es, en'")), Some("es".into()));
        assert_eq!(normalize_lang_code(&json!(["", "  ", "fr"])), Some("fr".into()));
        assert_eq!(normalize_lang_code(&json!("[\"de\", \"en\"]")), Some("de".into()));
        assert_eq!(normalize_lang_code(&json!("English (US)")), Some("en".into()));
    }

    #[test]
    fn unusable_values_are_undefined() {
        assert_eq!(normalize_lang_code(&JsonValue::Null), None);
        assert_eq!(normalize_lang_code(&json!("")), None);
        assert_eq!(normalize_lang_code(&json!([])), None);
        assert_eq!(normalize_lang_code(&json!([1, 2])), None);
        assert_eq!(normalize_lang_code(&json!("spanish")), None);
        assert_eq!(normalize_lang_code(&json!(42)), None);
    }

    #[test]
    fn normalized_codes_are_fixed_points() {
        for input in [
            json!("en_US"),
            json!(["pt-BR"]),
            json!("\"fr\""),
            json!("[\"uk\"]"),
            json!("english"),
            json!("ZH-Hant"),
        ] {
            let code = normalize_lang_code(&input).expect("defined code");
            assert_eq!(normalize_lang_code(&json!(code.clone())), Some(code));
        }
    }

    #[test]
    fn metadata_beats_detection() {
        let body = "Das ist ein ziemlich langer deutscher Satz über unsere neuen Produkte.";
        assert_eq!(resolve_language(&json!("es"), body), "es");
    }

    #[test]
    fn falls_back_to_detection_then_unknown() {
        let body = "Discover the best deals on running shoes this weekend only at our store.";
        assert_eq!(resolve_language(&JsonValue::Null, body), "en");
        assert_eq!(resolve_language(&JsonValue::Null, ""), UNKNOWN_LANGUAGE);
        assert_eq!(resolve_language(&json!("???"), "   "), UNKNOWN_LANGUAGE);
    }
}
