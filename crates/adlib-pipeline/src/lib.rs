//! Ad Library batch pipeline: normalize, enrich, score, rank, and export one export file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use adlib_adapters::{find_latest_input, load_any};
use adlib_core::{AdRecord, MediaMix};
use adlib_storage::ArtifactStore;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, info_span};
use uuid::Uuid;

pub mod coalesce;
pub mod config;
pub mod enrich;
pub mod export;
pub mod geo;
pub mod language;
pub mod media;
pub mod normalize;
pub mod rank;
pub mod scoring;
pub mod temporal;

pub use config::{ConfigOverlay, PipelineConfig};
pub use enrich::{enrich_record, process_batch, EnrichedBatch};
pub use rank::{summarize, top_usa, BatchStats};

pub const CRATE_NAME: &str = "adlib-pipeline";

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub source_file: String,
    pub input_rows: usize,
    pub total: usize,
    pub usa: usize,
    pub duplicates_dropped: usize,
    pub top_usa: usize,
    pub media_mix: BTreeMap<MediaMix, usize>,
    pub top_languages: Vec<(String, usize)>,
    pub output_dir: String,
    pub manifest: String,
}

pub struct Pipeline {
    config: PipelineConfig,
    store: ArtifactStore,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let store = ArtifactStore::new(config.output_dir.clone());
        Self { config, store }
    }

    fn resolve_input(&self) -> Result<PathBuf> {
        match &self.config.input_file {
            Some(path) => Ok(path.clone()),
            None => find_latest_input(&self.config.input_dir).with_context(|| {
                format!("locating input export in {}", self.config.input_dir.display())
            }),
        }
    }

    pub fn run_once(&self) -> Result<RunSummary> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline_run", %run_id);
        let _guard = span.enter();

        let input = self.resolve_input()?;
        let source_file = input
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| input.display().to_string());
        info!(input = %input.display(), "loading export");

        let raw = load_any(&input).with_context(|| format!("loading {}", input.display()))?;
        let batch = process_batch(&raw, started_at, self.config.top_n);
        let stats = summarize(&batch.records, self.config.top_languages);
        info!(
            rows = raw.len(),
            unique = stats.total,
            usa = stats.usa,
            duplicates = batch.duplicates_dropped,
            "batch enriched"
        );

        let ctx = export::ReportContext {
            source_name: &source_file,
            stats: &stats,
            top_n: self.config.top_n,
            parquet_enabled: self.config.parquet_enabled,
        };
        let artifacts = export::write_run_artifacts(&self.store, run_id, &batch, &ctx)?;
        info!(
            files = artifacts.files.len(),
            manifest = %artifacts.manifest.absolute_path.display(),
            "artifacts written"
        );

        Ok(RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            source_file,
            input_rows: raw.len(),
            total: stats.total,
            usa: stats.usa,
            duplicates_dropped: batch.duplicates_dropped,
            top_usa: batch.top_usa.len(),
            media_mix: stats.media_mix,
            top_languages: stats.top_languages,
            output_dir: self.store.root().display().to_string(),
            manifest: artifacts.manifest.absolute_path.display().to_string(),
        })
    }
}

/// Enrich every row of `path` without deduplicating or writing anything.
pub fn inspect_file(path: &Path, now: DateTime<Utc>) -> Result<Vec<AdRecord>> {
    let raw = load_any(path).with_context(|| format!("loading {}", path.display()))?;
    Ok(raw.iter().map(|row| enrich_record(row, now)).collect())
}
