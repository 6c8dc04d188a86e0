//! Record sources: CSV and JSON-lines files

use crate::template::{Record, Value};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line}: {message}")]
    Json { line: usize, message: String },

    #[error("unsupported source format: {0}")]
    UnsupportedFormat(String),
}

pub type SourceResult<T> = Result<T, SourceError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    JsonLines,
}

impl SourceFormat {
    /// Pick a format from the file extension
    pub fn from_path(path: &Path) -> SourceResult<Self> {
        match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
            Some("csv") => Ok(SourceFormat::Csv),
            Some("jsonl") | Some("ndjson") | Some("json") => Ok(SourceFormat::JsonLines),
            other => Err(SourceError::UnsupportedFormat(
                other.unwrap_or("(none)").to_string(),
            )),
        }
    }
}

/// Name bound to `$file`: the file stem
pub fn source_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "data".to_string())
}

/// Read all records from a file, format chosen by extension
pub fn read_records(path: &Path) -> SourceResult<Vec<Record>> {
    let file = File::open(path)?;
    match SourceFormat::from_path(path)? {
        SourceFormat::Csv => read_csv(file),
        SourceFormat::JsonLines => read_json_lines(BufReader::new(file)),
    }
}

/// Header row gives the keys; every value is a string
pub fn read_csv<R: Read>(reader: R) -> SourceResult<Vec<Record>> {
    let mut csv = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers: Vec<String> = csv.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut records = Vec::new();
    for row in csv.records() {
        let row = row?;
        let record: Record = headers
            .iter()
            .zip(row.iter())
            .map(|(k, v)| (k.clone(), Value::str(v)))
            .collect();
        records.push(record);
    }
    Ok(records)
}

/// One JSON object per line; blank lines are ignored
pub fn read_json_lines<R: BufRead>(reader: R) -> SourceResult<Vec<Record>> {
    let mut records = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let json: serde_json::Value = serde_json::from_str(&line).map_err(|e| SourceError::Json {
            line: i + 1,
            message: e.to_string(),
        })?;
        match Value::from(json) {
            Value::Map(map) => records.push(map),
            other => {
                return Err(SourceError::Json {
                    line: i + 1,
                    message: format!("expected an object, found {:?}", other),
                })
            }
        }
    }
    Ok(records)
}
