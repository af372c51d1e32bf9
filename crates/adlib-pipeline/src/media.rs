//! Media mix heuristics over field names, values, and snapshot URLs.

use adlib_core::{value_text, FieldShape, MediaMix};

use crate::normalize::NormalizedRecord;

const IMAGE_NAME_MARKERS: &[&str] = &["image", "thumbnail", "picture"];
const SNAPSHOT_FIELDS: &[&str] = &["ad_snapshot_url", "snapshot_url", "ad_creative_link_url"];
const SNAPSHOT_VIDEO_MARKERS: &[&str] = &["video", ".mp4"];
const SNAPSHOT_IMAGE_MARKERS: &[&str] = &["image", ".jpg", ".jpeg", ".png", ".webp"];

pub fn infer_media_mix(record: &NormalizedRecord) -> MediaMix {
    let mut has_video = false;
    let mut has_image = false;

    for (name, value) in record.all_fields() {
        let name = name.to_lowercase();
        let shape = FieldShape::of(value);
        if (name.contains("video") && shape.is_present()) || shape.mentions("mp4") {
            has_video = true;
        }
        if IMAGE_NAME_MARKERS.iter().any(|marker| name.contains(marker)) && shape.is_present() {
            has_image = true;
        }
    }

    let snapshot = snapshot_text(record);
    if SNAPSHOT_VIDEO_MARKERS.iter().any(|marker| snapshot.contains(marker)) {
        has_video = true;
    }
    if SNAPSHOT_IMAGE_MARKERS.iter().any(|marker| snapshot.contains(marker)) {
        has_image = true;
    }

    MediaMix::from_signals(has_video, has_image)
}

/// Lower-cased, space-joined snapshot and landing URLs.
fn snapshot_text(record: &NormalizedRecord) -> String {
    SNAPSHOT_FIELDS
        .iter()
        .map(|field| {
            let value = record
                .canonical
                .get(*field)
                .or_else(|| record.hints.get(*field));
            value.and_then(value_text).unwrap_or_default()
        })
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
