//! Per-record enrichment and the batch entry point.

use adlib_core::{AdRecord, DerivedSignals, RawRecord};
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::coalesce::coalesce_creative_body;
use crate::geo::is_usa;
use crate::language::resolve_language;
use crate::media::infer_media_mix;
use crate::normalize::{normalize_record, NormalizedRecord};
use crate::rank::{dedup_first_seen, top_usa};
use crate::scoring::proxy_score;
use crate::temporal::{compute_duration_hours, to_dt};

/// Raw row to enriched record. Never fails; malformed fields fall back to defaults.
pub fn enrich_record(raw: &RawRecord, now: DateTime<Utc>) -> AdRecord {
    enrich_normalized(normalize_record(raw), now)
}

pub fn enrich_normalized(normalized: NormalizedRecord, now: DateTime<Utc>) -> AdRecord {
    let body = coalesce_creative_body(
        normalized.get("ad_creative_body"),
        normalized.get("ad_creative_bodies"),
    );

    let start = to_dt(normalized.get("ad_delivery_start_time"));
    let stop = to_dt(normalized.get("ad_delivery_stop_time"));
    let duration_hours = compute_duration_hours(start, stop, &body, now);
    let media_mix = infer_media_mix(&normalized);
    let language = resolve_language(normalized.get("languages"), &body);
    let is_usa = is_usa(&normalized.canonical);
    let proxy_score = proxy_score(duration_hours, body.chars().count(), is_usa, media_mix);

    let mut fields = normalized.canonical;
    fields.insert("ad_creative_body".to_string(), JsonValue::String(body));

    AdRecord {
        fields,
        signals: DerivedSignals {
            ad_delivery_start_time_dt: start,
            ad_delivery_stop_time_dt: stop,
            duration_hours,
            media_mix,
            language,
            is_usa,
            proxy_score,
        },
    }
}

#[derive(Debug, Clone)]
pub struct EnrichedBatch {
    /// Every unique record in input order.
    pub records: Vec<AdRecord>,
    /// USA records by descending score, at most `top_n`.
    pub top_usa: Vec<AdRecord>,
    pub duplicates_dropped: usize,
}

/// Normalize, deduplicate by id (first seen wins), enrich, and rank a batch.
pub fn process_batch(raw: &[RawRecord], now: DateTime<Utc>, top_n: usize) -> EnrichedBatch {
    let normalized = raw.iter().map(normalize_record).collect::<Vec<_>>();
    let input_rows = normalized.len();
    let unique = dedup_first_seen(normalized, |record| record.id().to_string());
    let duplicates_dropped = input_rows - unique.len();
    if duplicates_dropped > 0 {
        debug!(duplicates_dropped, "collapsed duplicate ids");
    }

    let records = unique
        .into_iter()
        .map(|record| enrich_normalized(record, now))
        .collect::<Vec<_>>();
    let top_usa = top_usa(&records, top_n).into_iter().cloned().collect();

    EnrichedBatch {
        records,
        top_usa,
        duplicates_dropped,
    }
}
