use tracing::{debug, info, warn};

use crate::dataset::{self, Corpus};
use crate::error::{DatasetError, NoActiveDataset, ResolveError};
use crate::fallback::GenerativeFallback;
use crate::model::{Outcome, Role};
use crate::retrieval::{is_confident, CorpusIndex};
use crate::session::Transcript;

/// Scores strictly above this return the stored answer; anything else goes
/// to the fallback.
pub const CONFIDENCE_THRESHOLD: f64 = 0.3;

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    CorpusHit {
        entry: usize,
        score: f64,
        answer: String,
    },
    FallbackHit {
        score: f64,
        text: String,
    },
}

impl Resolution {
    pub fn text(&self) -> &str {
        match self {
            Resolution::CorpusHit { answer, .. } => answer,
            Resolution::FallbackHit { text, .. } => text,
        }
    }

    pub fn score(&self) -> f64 {
        match self {
            Resolution::CorpusHit { score, .. } | Resolution::FallbackHit { score, .. } => *score,
        }
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            Resolution::CorpusHit { .. } => Outcome::CorpusHit,
            Resolution::FallbackHit { .. } => Outcome::FallbackHit,
        }
    }
}

/// What one chat turn produced: the assistant's reply as appended to the
/// transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReport {
    pub outcome: Outcome,
    pub reply: String,
}

#[derive(Debug)]
pub struct ActiveDataset {
    name: String,
    index: CorpusIndex,
}

impl ActiveDataset {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> &CorpusIndex {
        &self.index
    }
}

/// Answers questions from the active corpus, deferring to the fallback
/// when the best match is not confident.
///
/// Selecting a dataset takes `&mut self` and installs the new index only
/// after it is fully built, so no query is ever served against a partial
/// index. A failed selection leaves no dataset active.
pub struct Resolver<F> {
    fallback: F,
    threshold: f64,
    active: Option<ActiveDataset>,
}

impl<F: GenerativeFallback> Resolver<F> {
    pub fn new(fallback: F) -> Self {
        Self {
            fallback,
            threshold: CONFIDENCE_THRESHOLD,
            active: None,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn active(&self) -> Option<&ActiveDataset> {
        self.active.as_ref()
    }

    /// Loads `location` and rebuilds the index from scratch.
    pub fn select_dataset(
        &mut self,
        name: &str,
        location: &str,
    ) -> Result<&ActiveDataset, DatasetError> {
        self.active = None;
        match dataset::load(location) {
            Ok(corpus) => Ok(self.activate(name, corpus)),
            Err(err) => {
                warn!(name, location, error = %err, "dataset activation failed");
                Err(err)
            }
        }
    }

    /// Installs an already-loaded corpus.
    pub fn activate(&mut self, name: &str, corpus: Corpus) -> &ActiveDataset {
        let index = CorpusIndex::build(corpus);
        info!(
            name,
            location = index.location(),
            entries = index.len(),
            "dataset active"
        );
        self.active.insert(ActiveDataset {
            name: name.to_string(),
            index,
        })
    }

    fn index(&self) -> Result<&CorpusIndex, NoActiveDataset> {
        self.active.as_ref().map(|a| &a.index).ok_or(NoActiveDataset)
    }

    pub fn search(&self, query: &str) -> Result<(usize, f64), ResolveError> {
        Ok(self.index()?.search(query)?)
    }

    /// Resolves one query to a corpus answer or a fallback response. The
    /// fallback receives the query exactly as typed and is never retried.
    pub fn resolve(&self, query: &str) -> Result<Resolution, ResolveError> {
        let index = self.index()?;
        let (entry, score) = index.search(query)?;
        debug!(entry, score, threshold = self.threshold, "best corpus match");

        if is_confident(score, self.threshold) {
            return Ok(Resolution::CorpusHit {
                entry,
                score,
                answer: index.entries()[entry].answer.clone(),
            });
        }

        match self.fallback.generate(query) {
            Ok(text) => Ok(Resolution::FallbackHit { score, text }),
            Err(err) => {
                warn!(error = %err, "fallback failed");
                Err(err.into())
            }
        }
    }

    /// Runs one chat turn. The user turn is appended before resolution and
    /// exactly one assistant turn after it: the answer, or an error notice
    /// when resolution failed. Without an active dataset nothing is
    /// appended.
    pub fn handle_turn<T: Transcript + ?Sized>(
        &self,
        transcript: &mut T,
        query: &str,
    ) -> Result<TurnReport, NoActiveDataset> {
        self.index()?;
        transcript.append_turn(Role::User, query);

        let report = match self.resolve(query) {
            Ok(resolution) => TurnReport {
                outcome: resolution.outcome(),
                reply: resolution.text().to_string(),
            },
            Err(ResolveError::NoActiveDataset(e)) => return Err(e),
            Err(err) => TurnReport {
                outcome: match &err {
                    ResolveError::EmptyCorpus(_) => Outcome::EmptyCorpus,
                    _ => Outcome::FallbackError,
                },
                reply: error_notice(&err),
            },
        };

        transcript.append_turn(Role::Assistant, &report.reply);
        info!(outcome = ?report.outcome, "turn resolved");
        Ok(report)
    }
}

pub fn error_notice(err: &ResolveError) -> String {
    format!("Sorry, I could not answer that ({err}).")
}
