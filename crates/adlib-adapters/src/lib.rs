//! Batch loaders for Ad Library exports (CSV, JSON document, JSONL) and input discovery.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use adlib_core::{alias_target, RawRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, info};

pub const CRATE_NAME: &str = "adlib-adapters";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceFormat {
    Csv,
    Json,
    Jsonl,
}

impl SourceFormat {
    pub const ALL: [SourceFormat; 3] = [Self::Csv, Self::Json, Self::Jsonl];

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Jsonl => "jsonl",
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        Self::ALL.into_iter().find(|f| f.extension() == ext)
    }
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("unsupported file type: {path}")]
    UnsupportedFormat { path: String },
    #[error("no .csv/.json/.jsonl files in {dir}; put an Ad Library export there")]
    NoInputFiles { dir: String },
    #[error("reading {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing csv {path}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("parsing json {path}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0}")]
    UnexpectedShape(String),
}

/// Turns one export file into raw records, whatever the file format.
pub trait SourceAdapter {
    fn format(&self) -> SourceFormat;

    fn load_batch(&self, path: &Path) -> Result<Vec<RawRecord>, AdapterError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvAdapter;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDocumentAdapter;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLinesAdapter;

fn read_text(path: &Path) -> Result<String, AdapterError> {
    let text = fs::read_to_string(path).map_err(|source| AdapterError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(text.trim_start_matches('\u{feff}').to_string())
}

impl SourceAdapter for CsvAdapter {
    fn format(&self) -> SourceFormat {
        SourceFormat::Csv
    }

    fn load_batch(&self, path: &Path) -> Result<Vec<RawRecord>, AdapterError> {
        let text = read_text(path)?;
        let csv_err = |source| AdapterError::Csv {
            path: path.display().to_string(),
            source,
        };
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.as_bytes());
        let headers = reader.headers().map_err(csv_err)?.clone();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(csv_err)?;
            let row = headers
                .iter()
                .zip(record.iter())
                .map(|(name, cell)| (name.to_string(), csv_cell(cell)))
                .collect::<RawRecord>();
            rows.push(row);
        }
        Ok(rows)
    }
}

/// Empty cells are missing values, not empty strings.
fn csv_cell(cell: &str) -> JsonValue {
    if cell.is_empty() {
        JsonValue::Null
    } else {
        JsonValue::String(cell.to_string())
    }
}

impl SourceAdapter for JsonDocumentAdapter {
    fn format(&self) -> SourceFormat {
        SourceFormat::Json
    }

    fn load_batch(&self, path: &Path) -> Result<Vec<RawRecord>, AdapterError> {
        let text = read_text(path)?;
        let mut document: JsonValue = serde_json::from_str(&text).map_err(|source| AdapterError::Json {
            path: path.display().to_string(),
            source,
        })?;
        if let Some(data) = document.as_object_mut().and_then(|obj| obj.remove("data")) {
            document = data;
        }

        match document {
            JsonValue::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(idx, item)| match item {
                    JsonValue::Object(obj) => Ok(flatten_row(obj)),
                    other => Err(AdapterError::UnexpectedShape(format!(
                        "{}: element {idx} is {} rather than an object",
                        path.display(),
                        json_kind(&other)
                    ))),
                })
                .collect(),
            JsonValue::Object(obj) => Ok(vec![flatten_row(obj)]),
            other => Err(AdapterError::UnexpectedShape(format!(
                "{}: top-level {} is not a record list",
                path.display(),
                json_kind(&other)
            ))),
        }
    }
}

impl SourceAdapter for JsonLinesAdapter {
    fn format(&self) -> SourceFormat {
        SourceFormat::Jsonl
    }

    fn load_batch(&self, path: &Path) -> Result<Vec<RawRecord>, AdapterError> {
        let text = read_text(path)?;
        let mut rows = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let value: JsonValue = serde_json::from_str(line).map_err(|source| AdapterError::Json {
                path: format!("{}:{}", path.display(), line_no + 1),
                source,
            })?;
            match value {
                JsonValue::Object(obj) => rows.push(flatten_row(obj)),
                other => {
                    return Err(AdapterError::UnexpectedShape(format!(
                        "{}:{}: line holds {} rather than an object",
                        path.display(),
                        line_no + 1,
                        json_kind(&other)
                    )))
                }
            }
        }
        Ok(rows)
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

/// Nested objects become dotted keys (`snapshot.videos`) unless the top-level key
/// is a known alias, whose structure the pipeline reads directly.
pub fn flatten_row(obj: RawRecord) -> RawRecord {
    let mut out = RawRecord::new();
    for (key, value) in obj {
        match value {
            JsonValue::Object(nested) if alias_target(&key).is_none() && !nested.is_empty() => {
                flatten_into(&mut out, &key, nested);
            }
            other => {
                out.insert(key, other);
            }
        }
    }
    out
}

fn flatten_into(out: &mut RawRecord, prefix: &str, obj: RawRecord) {
    for (key, value) in obj {
        let dotted = format!("{prefix}.{key}");
        match value {
            JsonValue::Object(nested) if !nested.is_empty() => flatten_into(out, &dotted, nested),
            other => {
                out.insert(dotted, other);
            }
        }
    }
}

pub fn adapter_for_format(format: SourceFormat) -> Box<dyn SourceAdapter> {
    match format {
        SourceFormat::Csv => Box::new(CsvAdapter),
        SourceFormat::Json => Box::new(JsonDocumentAdapter),
        SourceFormat::Jsonl => Box::new(JsonLinesAdapter),
    }
}

pub fn adapter_for_path(path: &Path) -> Option<Box<dyn SourceAdapter>> {
    SourceFormat::from_path(path).map(adapter_for_format)
}

/// Load any supported export; an unknown extension is the one fatal input error.
pub fn load_any(path: impl AsRef<Path>) -> Result<Vec<RawRecord>, AdapterError> {
    let path = path.as_ref();
    let adapter = adapter_for_path(path).ok_or_else(|| AdapterError::UnsupportedFormat {
        path: path.display().to_string(),
    })?;
    let rows = adapter.load_batch(path)?;
    info!(
        path = %path.display(),
        format = adapter.format().extension(),
        rows = rows.len(),
        "loaded export batch"
    );
    Ok(rows)
}

/// Most recently modified supported export in `dir`.
pub fn find_latest_input(dir: impl AsRef<Path>) -> Result<PathBuf, AdapterError> {
    let dir = dir.as_ref();
    let io_err = |source| AdapterError::Io {
        path: dir.display().to_string(),
        source,
    };
    let mut candidates = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let path = entry.path();
        if !path.is_file() || SourceFormat::from_path(&path).is_none() {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        debug!(path = %path.display(), "input candidate");
        candidates.push((modified, path));
    }
    candidates.sort();
    candidates
        .pop()
        .map(|(_, path)| path)
        .ok_or_else(|| AdapterError::NoInputFiles {
            dir: dir.display().to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).expect("write fixture");
        path
    }

    #[test]
    fn csv_rows_map_empty_cells_to_null() {
        let dir = tempdir().expect("tempdir");
        let path = write(
            dir.path(),
            "export.csv",
            "\u{feff}ad_archive_id,page_name,languages\n111,Acme,\"[\"\"en\"\"]\"\n222,,es\n",
        );
        let rows = load_any(&path).expect("csv loads");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["ad_archive_id"], json!("111"));
        assert_eq!(rows[0]["languages"], json!("[\"en\"]"));
        assert_eq!(rows[1]["page_name"], JsonValue::Null);
    }

    #[test]
    fn json_document_unwraps_data_envelope() {
        let dir = tempdir().expect("tempdir");
        let path = write(
            dir.path(),
            "export.json",
            r#"{"data": [{"id": "1", "page_name": "A"}, {"id": "2"}], "paging": {"next": null}}"#,
        );
        let rows = load_any(&path).expect("json loads");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["id"], json!("2"));
    }

    #[test]
    fn json_document_accepts_bare_array_and_single_object() {
        let dir = tempdir().expect("tempdir");
        let array = write(dir.path(), "a.json", r#"[{"id": "1"}]"#);
        let single = write(dir.path(), "b.json", r#"{"id": "9", "page_name": "Solo"}"#);
        assert_eq!(load_any(&array).unwrap().len(), 1);
        assert_eq!(load_any(&single).unwrap()[0]["page_name"], json!("Solo"));
    }

    #[test]
    fn jsonl_skips_blank_lines_and_flattens_unknown_objects() {
        let dir = tempdir().expect("tempdir");
        let path = write(
            dir.path(),
            "export.jsonl",
            "{\"id\": \"1\", \"snapshot\": {\"videos\": [{\"url\": \"v.mp4\"}]}}\n\n{\"id\": \"2\", \"delivery_by_region\": {\"Texas\": 0.4}}\n",
        );
        let rows = load_any(&path).expect("jsonl loads");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["snapshot.videos"], json!([{"url": "v.mp4"}]));
        assert!(rows[0].get("snapshot").is_none());
        assert_eq!(rows[1]["delivery_by_region"], json!({"Texas": 0.4}));
    }

    #[test]
    fn jsonl_reports_offending_line() {
        let dir = tempdir().expect("tempdir");
        let path = write(dir.path(), "bad.jsonl", "{\"id\": \"1\"}\n[1, 2]\n");
        let err = load_any(&path).unwrap_err();
        assert!(matches!(err, AdapterError::UnexpectedShape(ref msg) if msg.contains(":2:")));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let path = write(dir.path(), "export.xlsx", "binary");
        assert!(matches!(load_any(&path), Err(AdapterError::UnsupportedFormat { .. })));
        assert!(adapter_for_path(Path::new("upper.JSONL")).is_some());
    }

    #[test]
    fn latest_input_prefers_newest_supported_file() {
        let dir = tempdir().expect("tempdir");
        let older = write(dir.path(), "older.csv", "id\n1\n");
        std::thread::sleep(Duration::from_millis(20));
        let newer = write(dir.path(), "newer.jsonl", "{\"id\": \"1\"}\n");
        std::thread::sleep(Duration::from_millis(20));
        write(dir.path(), "notes.txt", "ignored");

        let picked = find_latest_input(dir.path()).expect("input found");
        assert_eq!(picked, newer);
        assert_ne!(picked, older);
    }

    #[test]
    fn empty_input_dir_is_an_error() {
        let dir = tempdir().expect("tempdir");
        assert!(matches!(
            find_latest_input(dir.path()),
            Err(AdapterError::NoInputFiles { .. })
        ));
    }
}
