use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "adlib.yaml";

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Explicit input; when unset the newest export in `input_dir` is used.
    pub input_file: Option<PathBuf>,
    pub top_n: usize,
    pub top_languages: usize,
    pub parquet_enabled: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("input"),
            output_dir: PathBuf::from("outputs"),
            input_file: None,
            top_n: 10,
            top_languages: 5,
            parquet_enabled: true,
        }
    }
}

/// Optional YAML settings; every key may be omitted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverlay {
    pub input_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub input_file: Option<PathBuf>,
    pub top_n: Option<usize>,
    pub top_languages: Option<usize>,
    pub parquet_enabled: Option<bool>,
}

impl ConfigOverlay {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "True" | "yes")
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Defaults, then the YAML overlay (`ADLIB_CONFIG` or `adlib.yaml` when present),
    /// then environment variables.
    pub fn load() -> Result<Self> {
        let mut config = Self::default();
        let explicit = std::env::var("ADLIB_CONFIG").ok().map(PathBuf::from);
        let overlay_path = match explicit {
            Some(path) => Some(path),
            None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|path| path.is_file()),
        };
        if let Some(path) = overlay_path {
            tracing::debug!(path = %path.display(), "applying config overlay");
            config.apply_overlay(ConfigOverlay::from_path(&path)?);
        }
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        if let Some(dir) = overlay.input_dir {
            self.input_dir = dir;
        }
        if let Some(dir) = overlay.output_dir {
            self.output_dir = dir;
        }
        if overlay.input_file.is_some() {
            self.input_file = overlay.input_file;
        }
        if let Some(n) = overlay.top_n {
            self.top_n = n;
        }
        if let Some(k) = overlay.top_languages {
            self.top_languages = k;
        }
        if let Some(enabled) = overlay.parquet_enabled {
            self.parquet_enabled = enabled;
        }
    }

    /// Unset or unparseable variables leave the current value alone.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("ADLIB_INPUT_DIR") {
            self.input_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("ADLIB_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(n) = lookup("ADLIB_TOP_N").and_then(|v| v.parse().ok()) {
            self.top_n = n;
        }
        if let Some(k) = lookup("ADLIB_TOP_LANGUAGES").and_then(|v| v.parse().ok()) {
            self.top_languages = k;
        }
        if let Some(flag) = lookup("ADLIB_PARQUET_ENABLED") {
            self.parquet_enabled = parse_flag(&flag);
        }
    }
}
