//! Batch-level operations: deduplication, USA ranking, summary statistics.

use std::collections::{BTreeMap, HashMap, HashSet};

use adlib_core::{AdRecord, MediaMix};
use serde::Serialize;

use crate::language::UNKNOWN_LANGUAGE;

/// Keep the first record for each key, preserving input order.
pub fn dedup_first_seen<T, F>(items: Vec<T>, mut key: F) -> Vec<T>
where
    F: FnMut(&T) -> String,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(key(item)))
        .collect()
}

/// USA records by descending score; equal scores keep batch order.
pub fn top_usa(records: &[AdRecord], n: usize) -> Vec<&AdRecord> {
    let mut usa = records
        .iter()
        .filter(|record| record.signals.is_usa)
        .collect::<Vec<_>>();
    usa.sort_by(|a, b| b.signals.proxy_score.total_cmp(&a.signals.proxy_score));
    usa.truncate(n);
    usa
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchStats {
    pub total: usize,
    pub usa: usize,
    /// Every media mix label, including zero counts.
    pub media_mix: BTreeMap<MediaMix, usize>,
    /// Most frequent known languages, highest count first.
    pub top_languages: Vec<(String, usize)>,
}

pub fn summarize(records: &[AdRecord], top_languages: usize) -> BatchStats {
    let mut media_mix = MediaMix::ALL
        .iter()
        .map(|mix| (*mix, 0usize))
        .collect::<BTreeMap<_, _>>();
    let mut languages: HashMap<&str, usize> = HashMap::new();

    for record in records {
        *media_mix.entry(record.signals.media_mix).or_default() += 1;
        if record.signals.language != UNKNOWN_LANGUAGE {
            *languages.entry(record.signals.language.as_str()).or_default() += 1;
        }
    }

    let mut ranked = languages
        .into_iter()
        .map(|(code, count)| (code.to_string(), count))
        .collect::<Vec<_>>();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(top_languages);

    BatchStats {
        total: records.len(),
        usa: records.iter().filter(|record| record.signals.is_usa).count(),
        media_mix,
        top_languages: ranked,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adlib_core::DerivedSignals;
    use serde_json::json;

    fn record(id: &str, score: f64, is_usa: bool, language: &str, mix: MediaMix) -> AdRecord {
        AdRecord {
            fields: json!({"id": id}).as_object().cloned().unwrap(),
            signals: DerivedSignals {
                ad_delivery_start_time_dt: None,
                ad_delivery_stop_time_dt: None,
                duration_hours: None,
                media_mix: mix,
                language: language.to_string(),
                is_usa,
                proxy_score: score,
            },
        }
    }

    #[test]
    fn dedup_keeps_first_encountered() {
        let items = vec![("a", 1), ("b", 2), ("a", 3), ("", 4), ("", 5)];
        let unique = dedup_first_seen(items, |(id, _)| id.to_string());
        assert_eq!(unique, vec![("a", 1), ("b", 2), ("", 4)]);
    }

    #[test]
    fn top_ten_of_fifteen_usa_records() {
        let records = (0..15u32)
            .map(|i| record(&format!("ad-{i}"), f64::from(i) / 20.0, true, "en", MediaMix::None))
            .chain([record("foreign", 0.99, false, "en", MediaMix::None)])
            .collect::<Vec<_>>();
        let top = top_usa(&records, 10);

        assert_eq!(top.len(), 10);
        let ids = top.iter().map(|r| r.id()).collect::<Vec<_>>();
        let expected = (5..15).rev().map(|i| format!("ad-{i}")).collect::<Vec<_>>();
        assert_eq!(ids, expected);
        assert!(top
            .windows(2)
            .all(|pair| pair[0].signals.proxy_score > pair[1].signals.proxy_score));
    }

    #[test]
    fn ties_keep_batch_order() {
        let records = vec![
            record("first", 0.4, true, "en", MediaMix::None),
            record("second", 0.4, true, "en", MediaMix::None),
            record("best", 0.9, true, "en", MediaMix::None),
        ];
        let ids = top_usa(&records, 10).iter().map(|r| r.id()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["best", "first", "second"]);
    }

    #[test]
    fn summary_counts_mixes_and_known_languages() {
        let records = vec![
            record("1", 0.1, true, "en", MediaMix::Both),
            record("2", 0.1, false, "es", MediaMix::Both),
            record("3", 0.1, true, "en", MediaMix::ImageOnly),
            record("4", 0.1, false, "unknown", MediaMix::None),
            record("5", 0.1, false, "unknown", MediaMix::None),
            record("6", 0.1, false, "de", MediaMix::None),
        ];
        let stats = summarize(&records, 2);

        assert_eq!(stats.total, 6);
        assert_eq!(stats.usa, 2);
        assert_eq!(stats.media_mix[&MediaMix::Both], 2);
        assert_eq!(stats.media_mix[&MediaMix::VideoOnly], 0);
        assert_eq!(stats.media_mix[&MediaMix::None], 3);
        assert_eq!(
            stats.top_languages,
            vec![("en".to_string(), 2), ("de".to_string(), 1)]
        );
    }
}
