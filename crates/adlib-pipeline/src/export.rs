//! Run artifacts: canonical and top-N CSVs, the Markdown run report, a Parquet
//! snapshot, and a manifest of content digests.

use std::path::Path;
use std::sync::Arc;

use adlib_core::{AdRecord, DERIVED_FIELDS, REQUIRED_FIELDS};
use adlib_storage::{ArtifactStore, StoredArtifact};
use anyhow::{anyhow, Context, Result};
use arrow_array::{BooleanArray, Float64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field as ArrowField, Schema};
use parquet::arrow::ArrowWriter;
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::enrich::EnrichedBatch;
use crate::rank::BatchStats;
use crate::scoring::{
    DURATION_SATURATION_HOURS, DURATION_WEIGHT, TEXT_SATURATION_CHARS, TEXT_WEIGHT, USA_BONUS,
};

pub const CANONICAL_CSV: &str = "ad_library_canonical_output.csv";
pub const TOP_USA_CSV: &str = "top10_usa_ads.csv";
pub const RUN_REPORT: &str = "README_RUN.md";
pub const PARQUET_SNAPSHOT: &str = "snapshots/ads.parquet";
pub const MANIFEST: &str = "manifest.json";

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactManifest {
    pub schema_version: u32,
    pub run_id: Uuid,
    pub files: Vec<ManifestFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestFile {
    pub name: String,
    pub path: String,
    pub sha256: String,
    pub bytes: u64,
}

impl From<&StoredArtifact> for ManifestFile {
    fn from(artifact: &StoredArtifact) -> Self {
        Self {
            name: artifact.name.clone(),
            path: artifact.relative_path.display().to_string(),
            sha256: artifact.content_hash.clone(),
            bytes: artifact.byte_size as u64,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunArtifacts {
    pub files: Vec<StoredArtifact>,
    pub manifest: StoredArtifact,
}

/// Header order shared by both CSV outputs.
pub fn output_columns() -> impl Iterator<Item = &'static str> {
    REQUIRED_FIELDS.iter().chain(DERIVED_FIELDS).copied()
}

/// Structured values become compact JSON; null becomes an empty cell.
fn cell_text(value: Option<&JsonValue>) -> String {
    match value {
        None | Some(JsonValue::Null) => String::new(),
        Some(JsonValue::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

pub fn render_records_csv<'a>(records: impl IntoIterator<Item = &'a AdRecord>) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(output_columns())
        .context("writing csv header")?;
    for record in records {
        let row = serde_json::to_value(record)
            .with_context(|| format!("serializing record {}", record.id()))?;
        writer
            .write_record(output_columns().map(|column| cell_text(row.get(column))))
            .with_context(|| format!("writing csv row for {}", record.id()))?;
    }
    writer
        .into_inner()
        .map_err(|err| anyhow!("flushing csv buffer: {}", err.error()))
}

pub struct ReportContext<'a> {
    pub source_name: &'a str,
    pub stats: &'a BatchStats,
    pub top_n: usize,
    pub parquet_enabled: bool,
}

pub fn render_run_report(ctx: &ReportContext<'_>) -> String {
    let media_lines = ctx
        .stats
        .media_mix
        .iter()
        .map(|(mix, count)| format!("- `{mix}`: {count}"))
        .collect::<Vec<_>>()
        .join("\n");
    let language_lines = if ctx.stats.top_languages.is_empty() {
        "- no language could be resolved".to_string()
    } else {
        ctx.stats
            .top_languages
            .iter()
            .map(|(code, count)| format!("- `{code}`: {count}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let mut outputs = vec![
        format!("- `{CANONICAL_CSV}`: every unique ad with its derived signals"),
        format!("- `{TOP_USA_CSV}`: top {} USA-targeted ads by `proxy_score`", ctx.top_n),
    ];
    if ctx.parquet_enabled {
        outputs.push(format!("- `{PARQUET_SNAPSHOT}`: columnar snapshot of the scored batch"));
    }
    outputs.push(format!("- `{MANIFEST}`: SHA-256 digest and size of each artifact"));

    format!(
        "# Ad Library Offline Run Report\n\n\
         **Source file**: `{source}`\n\n\
         ## Statistics\n\
         - Total ads: **{total}**\n\
         - USA ads: **{usa}**\n\n\
         ## Media mix\n\
         {media_lines}\n\n\
         > Ad Library exports rarely state the creative type. `media_mix` is inferred from\n\
         > column names, `.mp4`/image URLs and snapshot links; rows without such hints report `none`.\n\n\
         ## Top languages\n\
         {language_lines}\n\n\
         ## Ranking\n\
         Every ad gets a proxy performance score in [0, 1]. USA-targeted ads are ranked by\n\
         descending score and the top {top_n} are kept; ties keep input order.\n\n\
         ```\n\
         proxy_score = {dw} * tanh(duration_hours / {dsat})\n\
         \x20           + {tw} * tanh(len(ad_creative_body) / {tsat})\n\
         \x20           + {bonus} if USA targeting\n\
         \x20           + media_bonus (both 0.10, video-only 0.07, image-only 0.05, none 0.0)\n\
         ```\n\n\
         Why these ads rank highly:\n\
         - a longer delivery window points to sustained budget\n\
         - fuller ad copy carries more of the message\n\
         - USA targeting is the selection criterion\n\
         - video and mixed creatives usually draw more engagement\n\n\
         ## Output files\n\
         {outputs}\n",
        source = ctx.source_name,
        total = ctx.stats.total,
        usa = ctx.stats.usa,
        top_n = ctx.top_n,
        dw = DURATION_WEIGHT,
        dsat = DURATION_SATURATION_HOURS,
        tw = TEXT_WEIGHT,
        tsat = TEXT_SATURATION_CHARS,
        bonus = USA_BONUS,
        outputs = outputs.join("\n"),
    )
}

pub fn render_parquet_snapshot(records: &[AdRecord]) -> Result<Vec<u8>> {
    let schema = Arc::new(Schema::new(vec![
        ArrowField::new("id", DataType::Utf8, false),
        ArrowField::new("page_name", DataType::Utf8, true),
        ArrowField::new("duration_hours", DataType::Float64, true),
        ArrowField::new("media_mix", DataType::Utf8, false),
        ArrowField::new("language", DataType::Utf8, false),
        ArrowField::new("is_usa", DataType::Boolean, false),
        ArrowField::new("proxy_score", DataType::Float64, false),
    ]));

    let ids = StringArray::from(records.iter().map(|r| Some(r.id())).collect::<Vec<_>>());
    let page_names = StringArray::from(
        records
            .iter()
            .map(|r| r.field("page_name").as_str())
            .collect::<Vec<_>>(),
    );
    let durations = Float64Array::from(
        records
            .iter()
            .map(|r| r.signals.duration_hours)
            .collect::<Vec<_>>(),
    );
    let mixes = StringArray::from(
        records
            .iter()
            .map(|r| Some(r.signals.media_mix.as_str()))
            .collect::<Vec<_>>(),
    );
    let languages = StringArray::from(
        records
            .iter()
            .map(|r| Some(r.signals.language.as_str()))
            .collect::<Vec<_>>(),
    );
    let usa = BooleanArray::from(records.iter().map(|r| r.signals.is_usa).collect::<Vec<_>>());
    let scores = Float64Array::from(
        records
            .iter()
            .map(|r| r.signals.proxy_score)
            .collect::<Vec<_>>(),
    );

    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(ids),
            Arc::new(page_names),
            Arc::new(durations),
            Arc::new(mixes),
            Arc::new(languages),
            Arc::new(usa),
            Arc::new(scores),
        ],
    )
    .context("building ads record batch")?;

    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), None)
        .context("opening parquet writer")?;
    writer.write(&batch).context("writing ads record batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(buffer)
}

/// Write every artifact of a run, then the manifest describing them.
pub fn write_run_artifacts(
    store: &ArtifactStore,
    run_id: Uuid,
    batch: &EnrichedBatch,
    ctx: &ReportContext<'_>,
) -> Result<RunArtifacts> {
    let mut files = Vec::new();

    let canonical = render_records_csv(&batch.records)?;
    files.push(store.write_artifact("canonical_output", CANONICAL_CSV, &canonical)?);

    let top = render_records_csv(&batch.top_usa)?;
    files.push(store.write_artifact("top_usa", TOP_USA_CSV, &top)?);

    let report = render_run_report(ctx);
    files.push(store.write_artifact("run_report", RUN_REPORT, report.as_bytes())?);

    if ctx.parquet_enabled {
        let snapshot = render_parquet_snapshot(&batch.records)?;
        files.push(store.write_artifact("ads_snapshot", Path::new(PARQUET_SNAPSHOT), &snapshot)?);
    }

    let manifest = ArtifactManifest {
        schema_version: 1,
        run_id,
        files: files.iter().map(ManifestFile::from).collect(),
    };
    let bytes = serde_json::to_vec_pretty(&manifest).context("serializing artifact manifest")?;
    let manifest = store.write_artifact("manifest", MANIFEST, &bytes)?;

    Ok(RunArtifacts { files, manifest })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::process_batch;
    use crate::rank::summarize;
    use adlib_core::RawRecord;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use tempfile::tempdir;

    fn sample_batch() -> EnrichedBatch {
        let rows = [
            json!({
                "id": "1",
                "page_name": "Acme",
                "ad_creative_body": "Spring sale, everything must go",
                "ad_reached_countries": ["US"],
                "publisher_platforms": "[\"facebook\", \"instagram\"]",
                "ad_delivery_start_time": "2024-01-01"
            }),
            json!({"id": "2", "page_name": null, "ad_reached_countries": "CA"}),
        ]
        .into_iter()
        .map(|row| row.as_object().cloned().unwrap())
        .collect::<Vec<RawRecord>>();
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).single().unwrap();
        process_batch(&rows, now, 10)
    }

    #[test]
    fn csv_has_fixed_header_and_json_cells() {
        let batch = sample_batch();
        let bytes = render_records_csv(&batch.records).unwrap();
        let mut reader = csv::Reader::from_reader(bytes.as_slice());

        let header = reader.headers().unwrap().iter().map(str::to_string).collect::<Vec<_>>();
        assert_eq!(header, output_columns().map(str::to_string).collect::<Vec<_>>());

        let rows = reader.records().collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(rows.len(), 2);
        let column = |name: &str| header.iter().position(|h| h == name).unwrap();
        assert_eq!(&rows[0][column("publisher_platforms")], "[\"facebook\",\"instagram\"]");
        assert_eq!(&rows[0][column("duration_hours")], "24.0");
        assert_eq!(&rows[0][column("is_usa")], "true");
        assert_eq!(&rows[1][column("page_name")], "");
        assert_eq!(&rows[1][column("media_mix")], "none");
    }

    #[test]
    fn report_mentions_counts_and_outputs() {
        let batch = sample_batch();
        let stats = summarize(&batch.records, 5);
        let report = render_run_report(&ReportContext {
            source_name: "export.csv",
            stats: &stats,
            top_n: 10,
            parquet_enabled: false,
        });
        assert!(report.contains("**Source file**: `export.csv`"));
        assert!(report.contains("- Total ads: **2**"));
        assert!(report.contains("- USA ads: **1**"));
        assert!(report.contains("- `none`: 2"));
        assert!(report.contains(TOP_USA_CSV));
        assert!(!report.contains(PARQUET_SNAPSHOT));
    }

    #[test]
    fn manifest_lists_every_artifact_with_digest() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let batch = sample_batch();
        let stats = summarize(&batch.records, 5);
        let ctx = ReportContext {
            source_name: "export.csv",
            stats: &stats,
            top_n: 10,
            parquet_enabled: true,
        };
        let run_id = Uuid::new_v4();
        let artifacts = write_run_artifacts(&store, run_id, &batch, &ctx).unwrap();

        assert_eq!(artifacts.files.len(), 4);
        let manifest: JsonValue =
            serde_json::from_slice(&std::fs::read(&artifacts.manifest.absolute_path).unwrap()).unwrap();
        assert_eq!(manifest["run_id"], json!(run_id.to_string()));
        let listed = manifest["files"].as_array().unwrap();
        assert_eq!(listed.len(), 4);
        for (entry, stored) in listed.iter().zip(&artifacts.files) {
            let on_disk = std::fs::read(&stored.absolute_path).unwrap();
            assert_eq!(entry["sha256"], json!(ArtifactStore::sha256_hex(&on_disk)));
            assert_eq!(entry["bytes"], json!(on_disk.len()));
        }

        let parquet = std::fs::read(dir.path().join(PARQUET_SNAPSHOT)).unwrap();
        assert_eq!(&parquet[..4], b"PAR1");
    }
}
