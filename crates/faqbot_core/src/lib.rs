pub mod config;
pub mod dataset;
pub mod error;
pub mod eval;
pub mod fallback;
pub mod model;
pub mod resolver;
pub mod retrieval;
pub mod session;
pub mod tfidf;

#[cfg(test)]
mod test_http;

pub use config::{Config, FallbackConfig, Provider};
pub use dataset::{load, Corpus, DatasetFormat};
pub use error::{
    ConfigError, DatasetError, EmptyCorpusError, FallbackError, LoadError, NoActiveDataset,
    ResolveError, SchemaError,
};
pub use eval::{
    evaluate_cases, read_cases_json, EvalCase, EvalOutcome, EvalSummary, Expectation, Mismatch,
};
pub use fallback::{GeminiClient, GenerativeFallback, OpenAiCompatClient, UnconfiguredFallback};
pub use model::{Decision, FaqEntry, MatchResult, Outcome, Role, Turn};
pub use resolver::{error_notice, Resolution, Resolver, TurnReport, CONFIDENCE_THRESHOLD};
pub use retrieval::{cosine_similarity, is_confident, CorpusIndex};
pub use session::{Session, Transcript};
pub use tfidf::TfidfVectorizer;
