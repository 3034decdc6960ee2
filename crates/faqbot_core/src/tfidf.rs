use std::collections::{BTreeSet, HashMap};

/// Splits lower-cased text into word tokens of at least two characters.
/// A word character is alphanumeric or `_`.
pub fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().nth(1).is_some())
}

/// Term-frequency/inverse-document-frequency weighting with a vocabulary
/// fixed at fit time.
///
/// idf is smoothed as `ln((1 + n) / (1 + df)) + 1` and every vector is
/// L2-normalized, so two texts with the same term counts project onto the
/// same unit vector.
#[derive(Debug, Clone, Default)]
pub struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    pub fn fit<S: AsRef<str>>(documents: &[S]) -> Self {
        let tokenized: Vec<BTreeSet<String>> = documents
            .iter()
            .map(|d| tokenize(&d.as_ref().to_lowercase()).map(str::to_owned).collect())
            .collect();

        // Sorted so term ids do not depend on hash order.
        let terms: BTreeSet<&String> = tokenized.iter().flatten().collect();
        let vocabulary: HashMap<String, usize> = terms
            .into_iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();

        let mut df = vec![0u32; vocabulary.len()];
        for doc in &tokenized {
            for term in doc {
                df[vocabulary[term]] += 1;
            }
        }

        let n = documents.len() as f64;
        let idf = df
            .into_iter()
            .map(|d| ((1.0 + n) / (1.0 + d as f64)).ln() + 1.0)
            .collect();

        Self { vocabulary, idf }
    }

    pub fn dim(&self) -> usize {
        self.idf.len()
    }

    pub fn contains(&self, term: &str) -> bool {
        self.vocabulary.contains_key(term)
    }

    /// Projects text into the fitted space. Out-of-vocabulary terms are
    /// dropped; text with no known terms maps to the zero vector.
    pub fn transform(&self, text: &str) -> Vec<f64> {
        let mut v = vec![0.0f64; self.dim()];

        for token in tokenize(&text.to_lowercase()) {
            if let Some(&idx) = self.vocabulary.get(token) {
                v[idx] += 1.0;
            }
        }
        for (x, idf) in v.iter_mut().zip(&self.idf) {
            *x *= idf;
        }

        let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }

        v
    }
}
