use serde::{Deserialize, Serialize};
use std::fmt;

/// One question/answer pair, identified by its position in the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
}

impl FaqEntry {
    /// Builds an entry from raw cells. Missing cells become empty text and
    /// both fields are lower-cased.
    pub fn normalized(question: Option<&str>, answer: Option<&str>) -> Self {
        Self {
            question: question.unwrap_or_default().to_lowercase(),
            answer: answer.unwrap_or_default().to_lowercase(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Hit,
    Miss,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub entry: Option<usize>,
    pub answer: Option<String>,
    pub score: f64,
    pub decision: Decision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

/// Terminal outcome of a single chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    CorpusHit,
    FallbackHit,
    FallbackError,
    EmptyCorpus,
}

impl Outcome {
    pub fn is_error(self) -> bool {
        matches!(self, Outcome::FallbackError | Outcome::EmptyCorpus)
    }
}
