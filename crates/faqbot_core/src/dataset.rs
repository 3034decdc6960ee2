use std::path::Path;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info};

use crate::error::{DatasetError, LoadError, SchemaError};
use crate::model::FaqEntry;

pub const QUESTION_COLUMN: &str = "Question";
pub const ANSWER_COLUMN: &str = "Answer";
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// A loaded dataset: ordered entries plus where they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Corpus {
    pub location: String,
    pub entries: Vec<FaqEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    Csv,
    JsonLines,
}

impl DatasetFormat {
    pub fn from_location(location: &str) -> Self {
        let path = location.split(['?', '#']).next().unwrap_or(location);
        match Path::new(path).extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("jsonl") => DatasetFormat::JsonLines,
            _ => DatasetFormat::Csv,
        }
    }
}

pub fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Retrieves and parses a dataset from a local path or an http(s) URL.
pub fn load(location: &str) -> Result<Corpus, DatasetError> {
    let text = fetch(location)?;
    let entries = parse(location, &text, DatasetFormat::from_location(location))?;
    info!(location, entries = entries.len(), "dataset loaded");
    Ok(Corpus {
        location: location.to_string(),
        entries,
    })
}

pub fn parse(
    location: &str,
    text: &str,
    format: DatasetFormat,
) -> Result<Vec<FaqEntry>, DatasetError> {
    match format {
        DatasetFormat::Csv => parse_csv(location, text),
        DatasetFormat::JsonLines => parse_jsonl(location, text),
    }
}

fn fetch(location: &str) -> Result<String, LoadError> {
    if !is_remote(location) {
        return std::fs::read_to_string(location).map_err(|source| LoadError::Io {
            location: location.to_string(),
            source,
        });
    }

    debug!(location, "fetching remote dataset");
    let fetch_err = |source: reqwest::Error| LoadError::Fetch {
        location: location.to_string(),
        source,
    };
    let client = reqwest::blocking::Client::builder()
        .timeout(DEFAULT_FETCH_TIMEOUT)
        .build()
        .map_err(fetch_err)?;
    let resp = client.get(location).send().map_err(fetch_err)?;

    let status = resp.status();
    if !status.is_success() {
        return Err(LoadError::Status {
            location: location.to_string(),
            status: status.as_u16(),
        });
    }
    resp.text().map_err(fetch_err)
}

fn header_matches(header: &str, column: &str) -> bool {
    header.trim_start_matches('\u{feff}').trim() == column
}

fn require_columns<T>(
    location: &str,
    question: Option<T>,
    answer: Option<T>,
) -> Result<(T, T), SchemaError> {
    match (question, answer) {
        (Some(q), Some(a)) => Ok((q, a)),
        (q, a) => {
            let mut missing = Vec::new();
            if q.is_none() {
                missing.push(QUESTION_COLUMN);
            }
            if a.is_none() {
                missing.push(ANSWER_COLUMN);
            }
            Err(SchemaError {
                location: location.to_string(),
                missing,
            })
        }
    }
}

/// Parses CSV with a header row. Extra columns are ignored and short rows
/// yield empty cells.
pub fn parse_csv(location: &str, text: &str) -> Result<Vec<FaqEntry>, DatasetError> {
    let csv_err = |source: csv::Error| LoadError::Csv {
        location: location.to_string(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers().map_err(csv_err)?.clone();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(LoadError::Empty {
            location: location.to_string(),
        }
        .into());
    }

    let position = |column| headers.iter().position(|h| header_matches(h, column));
    let (q_idx, a_idx) =
        require_columns(location, position(QUESTION_COLUMN), position(ANSWER_COLUMN))?;

    let mut entries = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        entries.push(FaqEntry::normalized(record.get(q_idx), record.get(a_idx)));
    }
    Ok(entries)
}

fn cell_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Parses JSON Lines, one object per row. A column counts as present when
/// any row carries the key.
pub fn parse_jsonl(location: &str, text: &str) -> Result<Vec<FaqEntry>, DatasetError> {
    let mut rows = Vec::new();

    for (i, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line).map_err(|source| LoadError::Json {
            location: location.to_string(),
            line: i + 1,
            source,
        })?;
        match value {
            Value::Object(map) => rows.push(map),
            _ => {
                return Err(LoadError::NotAnObject {
                    location: location.to_string(),
                    line: i + 1,
                }
                .into())
            }
        }
    }

    if rows.is_empty() {
        return Err(LoadError::Empty {
            location: location.to_string(),
        }
        .into());
    }

    let has = |column: &str| rows.iter().any(|r| r.contains_key(column)).then_some(());
    require_columns(location, has(QUESTION_COLUMN), has(ANSWER_COLUMN))?;

    Ok(rows
        .iter()
        .map(|r| {
            let question = cell_text(r.get(QUESTION_COLUMN));
            let answer = cell_text(r.get(ANSWER_COLUMN));
            FaqEntry::normalized(question.as_deref(), answer.as_deref())
        })
        .collect())
}
