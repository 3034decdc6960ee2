use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::EmptyCorpusError;
use crate::model::{Decision, MatchResult};
use crate::retrieval::CorpusIndex;

pub const DEFAULT_REQUIRED_PASS_RATE: f64 = 0.85;

/// What a case expects the corpus to do with its question.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Expectation {
    /// Answered from the corpus, optionally by a given entry or answer text.
    Hit {
        entry: Option<usize>,
        answer: Option<String>,
    },
    /// Handed over to the fallback.
    Miss,
}

impl Expectation {
    /// First way `result` falls short of this expectation, if any.
    pub fn check(&self, result: &MatchResult) -> Option<Mismatch> {
        match self {
            Expectation::Miss => (result.decision != Decision::Miss).then_some(Mismatch::Decision {
                expected: Decision::Miss,
            }),
            Expectation::Hit { entry, answer } => {
                if result.decision != Decision::Hit {
                    return Some(Mismatch::Decision {
                        expected: Decision::Hit,
                    });
                }
                if let Some(expected) = *entry {
                    if result.entry != Some(expected) {
                        return Some(Mismatch::Entry { expected });
                    }
                }
                match answer {
                    Some(expected) if result.answer.as_deref() != Some(expected.as_str()) => {
                        Some(Mismatch::Answer {
                            expected: expected.clone(),
                        })
                    }
                    _ => None,
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mismatch {
    Decision { expected: Decision },
    Entry { expected: usize },
    Answer { expected: String },
    Score { minimum: f64 },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::Decision { expected } => write!(f, "expected a {expected:?}"),
            Mismatch::Entry { expected } => write!(f, "expected entry {expected}"),
            Mismatch::Answer { expected } => write!(f, "expected answer {expected:?}"),
            Mismatch::Score { minimum } => write!(f, "score below {minimum}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalCase {
    pub case_id: String,
    pub question: String,
    pub expect: Expectation,
    pub min_similarity: Option<f64>,
}

/// On-disk case. `expected_answer` may be a string (a hit with that answer)
/// or null (a miss); `expected_decision` states the decision outright.
#[derive(Debug, Deserialize)]
struct RawEvalCase {
    case_id: String,
    question: String,
    expected_decision: Option<Decision>,
    expected_entry: Option<usize>,
    min_similarity: Option<f64>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl RawEvalCase {
    fn into_eval_case(self) -> Result<EvalCase, String> {
        let id = &self.case_id;
        // Absent and null differ: null expects a miss.
        let answer = match self.rest.get("expected_answer") {
            None => None,
            Some(Value::Null) => Some(None),
            Some(Value::String(s)) => Some(Some(s.to_lowercase())),
            Some(other) => {
                return Err(format!(
                    "case {id}: 'expected_answer' must be a string or null, got {other}"
                ))
            }
        };

        let expect = match (self.expected_decision, answer) {
            (Some(Decision::Miss), Some(Some(_))) | (Some(Decision::Hit), Some(None)) => {
                return Err(format!(
                    "case {id}: 'expected_decision' contradicts 'expected_answer'"
                ))
            }
            (Some(Decision::Miss), _) | (None, Some(None)) => Expectation::Miss,
            (Some(Decision::Hit), answer) | (None, answer @ Some(Some(_))) => Expectation::Hit {
                entry: self.expected_entry,
                answer: answer.flatten(),
            },
            (None, None) => {
                return Err(format!(
                    "case {id}: needs 'expected_decision' or 'expected_answer'"
                ))
            }
        };

        Ok(EvalCase {
            case_id: self.case_id,
            question: self.question,
            expect,
            min_similarity: self.min_similarity,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CasesError {
    #[error("failed to read cases {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid cases JSON in {path}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Invalid(String),
}

pub fn parse_cases(text: &str, path: &str) -> Result<Vec<EvalCase>, CasesError> {
    let raw: Vec<RawEvalCase> = serde_json::from_str(text).map_err(|source| CasesError::Parse {
        path: path.to_string(),
        source,
    })?;
    raw.into_iter()
        .map(|c| c.into_eval_case().map_err(CasesError::Invalid))
        .collect()
}

pub fn read_cases_json(path: &Path) -> Result<Vec<EvalCase>, CasesError> {
    let display = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|source| CasesError::Read {
        path: display.clone(),
        source,
    })?;
    parse_cases(&text, &display)
}

#[derive(Debug, Clone, Serialize)]
pub struct EvalOutcome {
    pub case_id: String,
    #[serde(flatten)]
    pub result: MatchResult,
    pub mismatch: Option<Mismatch>,
}

impl EvalOutcome {
    pub fn passed(&self) -> bool {
        self.mismatch.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EvalSummary {
    pub total: usize,
    pub passed: usize,
    pub pass_rate: f64,
    pub outcomes: Vec<EvalOutcome>,
}

impl EvalSummary {
    fn from_outcomes(outcomes: Vec<EvalOutcome>) -> Self {
        let total = outcomes.len();
        let passed = outcomes.iter().filter(|o| o.passed()).count();
        // An empty case file proves nothing.
        let pass_rate = match total {
            0 => 0.0,
            n => passed as f64 / n as f64,
        };
        Self {
            total,
            passed,
            pass_rate,
            outcomes,
        }
    }

    pub fn failed(&self) -> usize {
        self.total - self.passed
    }

    pub fn meets(&self, required_pass_rate: f64) -> bool {
        self.pass_rate >= required_pass_rate
    }
}

/// Replays cases against the index with the given threshold. The fallback
/// is never consulted.
pub fn evaluate_cases(
    index: &CorpusIndex,
    cases: &[EvalCase],
    threshold: f64,
) -> Result<EvalSummary, EmptyCorpusError> {
    let outcomes = cases
        .iter()
        .map(|case| -> Result<EvalOutcome, EmptyCorpusError> {
            let result = index.decide(&case.question, threshold)?;
            let mismatch = case.expect.check(&result).or_else(|| {
                case.min_similarity
                    .filter(|&minimum| result.score < minimum)
                    .map(|minimum| Mismatch::Score { minimum })
            });
            Ok(EvalOutcome {
                case_id: case.case_id.clone(),
                result,
                mismatch,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(EvalSummary::from_outcomes(outcomes))
}
