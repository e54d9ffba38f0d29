//! CSV file adapter
//!
//! Reads a header-delimited UTF-8 file. Every call re-scans the file from the
//! top and skips data rows with index `< offset`, so a resumed run never sees
//! rows an earlier run already settled. A row that is not valid UTF-8 is
//! handed back as malformed instead of failing the file.

use super::{ExtractRequest, Extraction, MalformedItem, SourceAdapter};
use crate::config::CsvSourceConfig;
use crate::domain::{MarketflowError, Result, SourceError, SourceKind};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Rows read from the file
#[derive(Debug, Clone, PartialEq)]
pub struct CsvRows {
    pub headers: Vec<String>,
    pub rows: Vec<Value>,
    pub malformed: Vec<MalformedItem>,
    /// Data rows in the file
    pub total_rows: u64,
}

/// Adapter for the local CSV source
#[derive(Debug, Clone)]
pub struct CsvFileAdapter {
    path: PathBuf,
    delimiter: u8,
}

impl CsvFileAdapter {
    pub fn new(config: &CsvSourceConfig) -> Self {
        Self {
            path: PathBuf::from(&config.path),
            delimiter: config.delimiter as u8,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn file_error(path: &Path, err: impl std::fmt::Display) -> MarketflowError {
    SourceError::FileRead {
        path: path.display().to_string(),
        message: err.to_string(),
    }
    .into()
}

/// Reads data rows with index `>= offset` as JSON objects keyed by header
pub fn read_rows(path: &Path, delimiter: u8, offset: u64) -> Result<CsvRows> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|e| file_error(path, e))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| file_error(path, e))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    let mut malformed = Vec::new();
    let mut total_rows = 0u64;

    for (index, record) in reader.byte_records().enumerate() {
        let record = record.map_err(|e| file_error(path, e))?;
        total_rows += 1;
        if (index as u64) < offset {
            continue;
        }

        let mut object = Map::with_capacity(headers.len());
        let mut decodable = true;
        for (header, value) in headers.iter().zip(record.iter()) {
            let text = match std::str::from_utf8(value) {
                Ok(text) => text.to_string(),
                Err(_) => {
                    decodable = false;
                    String::from_utf8_lossy(value).into_owned()
                }
            };
            object.insert(header.clone(), Value::String(text));
        }

        if decodable {
            rows.push(Value::Object(object));
        } else {
            let line = record.position().map(|pos| pos.line()).unwrap_or(index as u64 + 2);
            tracing::warn!(path = %path.display(), line, "Skipping CSV row that is not valid UTF-8");
            malformed.push(MalformedItem {
                payload: Value::Object(object),
                reason: format!("line {line} is not valid UTF-8"),
            });
        }
    }

    Ok(CsvRows {
        headers,
        rows,
        malformed,
        total_rows,
    })
}

#[async_trait]
impl SourceAdapter for CsvFileAdapter {
    fn source(&self) -> SourceKind {
        SourceKind::Csv
    }

    async fn extract(&self, request: &ExtractRequest) -> Result<Extraction> {
        let path = self.path.clone();
        let delimiter = self.delimiter;
        let offset = request.offset;

        let read = tokio::task::spawn_blocking(move || read_rows(&path, delimiter, offset))
            .await
            .map_err(|e| file_error(&self.path, format!("reader task failed: {e}")))??;

        tracing::info!(
            source = %SourceKind::Csv,
            path = %self.path.display(),
            offset,
            rows = read.rows.len(),
            malformed = read.malformed.len(),
            total_rows = read.total_rows,
            "Extracted CSV rows"
        );

        Ok(Extraction {
            source: SourceKind::Csv,
            items: read.rows,
            headers: Some(read.headers),
            start_offset: offset,
            // Never move backwards, even if the file shrank
            next_offset: read.total_rows.max(offset),
            from_cache: false,
            fallback_reason: None,
            malformed: read.malformed,
        })
    }
}
