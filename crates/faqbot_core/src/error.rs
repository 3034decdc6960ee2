use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// The dataset could not be retrieved or parsed.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read {location}")]
    Io {
        location: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to fetch {location}")]
    Fetch {
        location: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("fetching {location} returned HTTP {status}")]
    Status { location: String, status: u16 },

    #[error("{location} is empty")]
    Empty { location: String },

    #[error("malformed CSV in {location}")]
    Csv {
        location: String,
        #[source]
        source: csv::Error,
    },

    #[error("malformed JSON in {location} at line {line}")]
    Json {
        location: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("{location} line {line}: expected a JSON object")]
    NotAnObject { location: String, line: usize },
}

/// The dataset parsed but lacks a required column.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{location} is missing required column(s): {}", .missing.join(", "))]
pub struct SchemaError {
    pub location: String,
    pub missing: Vec<&'static str>,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("the corpus is empty")]
pub struct EmptyCorpusError;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("no dataset is active; queries are refused until a dataset loads")]
pub struct NoActiveDataset;

/// The generative fallback could not produce an answer.
#[derive(Error, Debug)]
pub enum FallbackError {
    #[error("fallback unavailable: {0}")]
    NotConfigured(String),

    #[error("fallback timed out after {0:?}")]
    Timeout(Duration),

    #[error("fallback request failed")]
    Http(#[from] reqwest::Error),

    #[error("fallback returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("fallback returned a malformed response: {0}")]
    Malformed(String),
}

/// Dataset activation failure.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Per-query resolution failure.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error(transparent)]
    NoActiveDataset(#[from] NoActiveDataset),

    #[error(transparent)]
    EmptyCorpus(#[from] EmptyCorpusError),

    #[error(transparent)]
    Fallback(#[from] FallbackError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid fallback timeout '{value}'")]
    Timeout {
        value: String,
        #[source]
        source: humantime::DurationError,
    },

    #[error("threshold must be within [0, 1], got {0}")]
    Threshold(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_lists_missing_columns() {
        let err = SchemaError {
            location: "faq.csv".to_string(),
            missing: vec!["Question", "Answer"],
        };
        assert_eq!(
            err.to_string(),
            "faq.csv is missing required column(s): Question, Answer"
        );
    }

    #[test]
    fn resolve_error_is_transparent() {
        let err = ResolveError::from(FallbackError::NotConfigured("no key".into()));
        assert_eq!(err.to_string(), "fallback unavailable: no key");
    }
}
