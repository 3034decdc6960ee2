use tracing::debug;

use crate::dataset::Corpus;
use crate::error::EmptyCorpusError;
use crate::model::{Decision, FaqEntry, MatchResult};
use crate::tfidf::TfidfVectorizer;

pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let (dot, na, nb) = a
        .iter()
        .zip(b.iter())
        .fold((0.0f64, 0.0f64, 0.0f64), |(d, aa, bb), (x, y)| {
            (d + (x * y), aa + (x * x), bb + (y * y))
        });

    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na.sqrt() * nb.sqrt())
    }
}

/// Strict comparison: a score equal to the threshold is not confident.
pub fn is_confident(score: f64, threshold: f64) -> bool {
    score > threshold
}

/// Read-only TF-IDF index over the questions of one corpus.
///
/// `vectors[i]` always belongs to `entries[i]`; a changed corpus means a new
/// index.
#[derive(Debug, Clone)]
pub struct CorpusIndex {
    location: String,
    entries: Vec<FaqEntry>,
    vectorizer: TfidfVectorizer,
    vectors: Vec<Vec<f64>>,
}

impl CorpusIndex {
    pub fn build(corpus: Corpus) -> Self {
        let Corpus { location, entries } = corpus;
        let questions: Vec<&str> = entries.iter().map(|e| e.question.as_str()).collect();
        let vectorizer = TfidfVectorizer::fit(&questions);
        let vectors = questions.iter().map(|q| vectorizer.transform(q)).collect();

        debug!(
            location,
            entries = entries.len(),
            vocabulary = vectorizer.dim(),
            "built corpus index"
        );

        Self {
            location,
            entries,
            vectorizer,
            vectors,
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[FaqEntry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&FaqEntry> {
        self.entries.get(index)
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vectorizer.dim()
    }

    fn scores(&self, query: &str) -> Vec<f64> {
        let q = self.vectorizer.transform(query);
        self.vectors
            .iter()
            .map(|v| cosine_similarity(&q, v))
            .collect()
    }

    /// Best-matching entry position and its cosine score. The earliest
    /// entry wins ties.
    pub fn search(&self, query: &str) -> Result<(usize, f64), EmptyCorpusError> {
        let mut best: Option<(usize, f64)> = None;
        for (i, score) in self.scores(query).into_iter().enumerate() {
            match best {
                Some((_, s)) if score <= s => {}
                _ => best = Some((i, score)),
            }
        }
        best.ok_or(EmptyCorpusError)
    }

    pub fn top_k(&self, query: &str, k: usize) -> Vec<(usize, f64)> {
        let mut scored: Vec<(usize, f64)> = self.scores(query).into_iter().enumerate().collect();

        // Stable sort keeps corpus order among equal scores.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.into_iter().take(k).collect()
    }

    /// Hit/miss verdict for a scored entry. Only a hit carries the answer.
    pub fn judge(&self, entry: usize, score: f64, threshold: f64) -> MatchResult {
        let hit = is_confident(score, threshold);
        MatchResult {
            entry: Some(entry),
            answer: hit.then(|| self.entries[entry].answer.clone()),
            score,
            decision: if hit { Decision::Hit } else { Decision::Miss },
        }
    }

    pub fn decide(&self, query: &str, threshold: f64) -> Result<MatchResult, EmptyCorpusError> {
        let (entry, score) = self.search(query)?;
        Ok(self.judge(entry, score, threshold))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn svecw_corpus() -> Corpus {
        Corpus {
            location: "memory".to_string(),
            entries: vec![
                FaqEntry::normalized(Some("what is svecw?"), Some("svecw is a college.")),
                FaqEntry::normalized(Some("what are library hours?"), Some("9am to 5pm.")),
            ],
        }
    }

    #[test]
    fn cosine_works_for_unit_vectors() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        let c = vec![0.0, 1.0, 0.0];

        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&a, &c) - 0.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&a, &[1.0]), 0.0);
    }

    #[test]
    fn exact_question_scores_one_regardless_of_case() {
        let index = CorpusIndex::build(svecw_corpus());
        let (entry, score) = index.search("What is SVECW?").expect("search");

        assert_eq!(entry, 0);
        assert!((score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn every_question_matches_itself() {
        let index = CorpusIndex::build(svecw_corpus());
        for (i, e) in index.entries().iter().enumerate() {
            let (entry, score) = index.search(&e.question.to_uppercase()).expect("search");
            assert_eq!(entry, i);
            assert!((score - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn no_overlap_scores_zero_and_picks_first_entry() {
        let index = CorpusIndex::build(svecw_corpus());
        let (entry, score) = index.search("tell me a joke").expect("search");

        assert_eq!(entry, 0);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn ties_resolve_to_first_occurrence() {
        let corpus = Corpus {
            location: "memory".to_string(),
            entries: vec![
                FaqEntry::normalized(Some("hostel fees"), Some("first")),
                FaqEntry::normalized(Some("hostel fees"), Some("second")),
            ],
        };
        let index = CorpusIndex::build(corpus);

        assert_eq!(index.search("hostel fees").expect("search").0, 0);
        let top = index.top_k("hostel fees", 2);
        assert_eq!(top[0].0, 0);
        assert_eq!(top[1].0, 1);
    }

    #[test]
    fn partial_overlap_ranks_best_entry_first() {
        let index = CorpusIndex::build(svecw_corpus());
        let top = index.top_k("library opening hours", 5);

        assert_eq!(top.len(), 2);
        assert_eq!(top[0].0, 1);
        assert!(top[0].1 > 0.3 && top[0].1 < 1.0);
        assert_eq!(top[1].1, 0.0);
    }

    #[test]
    fn empty_corpus_is_an_error() {
        let index = CorpusIndex::build(Corpus {
            location: "memory".to_string(),
            entries: Vec::new(),
        });
        assert_eq!(index.search("anything"), Err(EmptyCorpusError));
        assert!(index.top_k("anything", 3).is_empty());
    }

    #[test]
    fn search_is_idempotent_and_rebuild_invariant() {
        let queries = ["what is svecw", "library", "hours of the library", "joke"];
        let first = CorpusIndex::build(svecw_corpus());
        let second = CorpusIndex::build(svecw_corpus());

        for q in queries {
            let a = first.search(q).expect("search");
            assert_eq!(a, first.search(q).expect("search"));
            assert_eq!(a, second.search(q).expect("search"));
        }
    }

    #[test]
    fn decide_applies_threshold() {
        let index = CorpusIndex::build(svecw_corpus());

        let hit = index.decide("what is svecw", 0.3).expect("decide");
        assert_eq!(hit.decision, Decision::Hit);
        assert_eq!(hit.answer.as_deref(), Some("svecw is a college."));

        let miss = index.decide("tell me a joke", 0.3).expect("decide");
        assert_eq!(miss.decision, Decision::Miss);
        assert_eq!(miss.answer, None);
        assert_eq!(miss.entry, Some(0));
    }

    #[test]
    fn threshold_is_strict() {
        assert!(!is_confident(0.3, 0.3));
        assert!(is_confident(0.30001, 0.3));
        assert!(!is_confident(0.0, 0.3));
        // Below f32 resolution around 0.3, still above the threshold.
        assert!(is_confident(0.300_000_005, 0.3));
    }

    #[test]
    fn judge_attaches_answer_only_to_hits() {
        let index = CorpusIndex::build(svecw_corpus());

        let hit = index.judge(1, 0.9, 0.3);
        assert_eq!(hit.decision, Decision::Hit);
        assert_eq!(hit.entry, Some(1));
        assert_eq!(hit.answer.as_deref(), Some("9am to 5pm."));

        let miss = index.judge(1, 0.3, 0.3);
        assert_eq!(miss.decision, Decision::Miss);
        assert_eq!(miss.entry, Some(1));
        assert_eq!(miss.answer, None);
    }
}
