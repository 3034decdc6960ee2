use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;
use crate::fallback::{
    DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_KEY_ENV, DEFAULT_GEMINI_MODEL,
    DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_KEY_ENV, DEFAULT_OPENAI_MODEL,
};
use crate::resolver::CONFIDENCE_THRESHOLD;

pub const DEFAULT_DATASET: &str = "college_faq";

const BUILTIN_DATASETS: &[(&str, &str)] = &[
    (
        "college_faq",
        "https://raw.githubusercontent.com/sukanya3970/CHATBOT/main/college_faq.csv",
    ),
    (
        "svcew_details",
        "https://raw.githubusercontent.com/sukanya3970/CHATBOT/main/svcew_details.csv",
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub provider: Provider,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key_env: Option<String>,
    /// humantime duration, e.g. "30s".
    pub timeout: Option<String>,
}

impl FallbackConfig {
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(match self.provider {
            Provider::Gemini => DEFAULT_GEMINI_MODEL,
            Provider::OpenAi => DEFAULT_OPENAI_MODEL,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(match self.provider {
            Provider::Gemini => DEFAULT_GEMINI_BASE_URL,
            Provider::OpenAi => DEFAULT_OPENAI_BASE_URL,
        })
    }

    pub fn api_key_env(&self) -> &str {
        self.api_key_env.as_deref().unwrap_or(match self.provider {
            Provider::Gemini => DEFAULT_GEMINI_KEY_ENV,
            Provider::OpenAi => DEFAULT_OPENAI_KEY_ENV,
        })
    }

    /// `None` when unset; validated by [`Config::validate`].
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
            .as_deref()
            .and_then(|t| humantime::parse_duration(t).ok())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub threshold: f64,
    pub default_dataset: String,
    pub datasets: BTreeMap<String, String>,
    pub fallback: FallbackConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threshold: CONFIDENCE_THRESHOLD,
            default_dataset: DEFAULT_DATASET.to_string(),
            datasets: BUILTIN_DATASETS
                .iter()
                .map(|(name, url)| (name.to_string(), url.to_string()))
                .collect(),
            fallback: FallbackConfig::default(),
        }
    }
}

/// `$XDG_CONFIG_HOME/faqbot/config.toml` or the platform equivalent.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("faqbot").join("config.toml"))
}

impl Config {
    /// Loads an explicit config file, or the default one when `path` is
    /// `None`. Only a missing default file falls back to built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match default_config_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        let config = Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        config.validate()?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::Threshold(self.threshold));
        }
        if let Some(value) = &self.fallback.timeout {
            humantime::parse_duration(value).map_err(|source| ConfigError::Timeout {
                value: value.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Maps a configured dataset name to its location. Anything else is
    /// taken to be a path or URL and named after its last segment.
    pub fn resolve_dataset(&self, name_or_location: &str) -> (String, String) {
        if let Some(location) = self.datasets.get(name_or_location) {
            return (name_or_location.to_string(), location.clone());
        }
        let name = name_or_location
            .trim_end_matches('/')
            .rsplit(['/', '\\'])
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(name_or_location);
        (name.to_string(), name_or_location.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_carry_builtin_datasets() {
        let cfg = Config::default();
        assert_eq!(cfg.threshold, 0.3);
        assert_eq!(cfg.default_dataset, "college_faq");
        assert!(cfg.datasets.contains_key("svcew_details"));
        assert_eq!(cfg.fallback.provider, Provider::Gemini);
        assert_eq!(cfg.fallback.model(), "gemini-1.5-flash");
        assert_eq!(cfg.fallback.api_key_env(), "GEMINI_API_KEY");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = Config::from_toml(
            r#"
threshold = 0.45

[fallback]
provider = "openai"
base_url = "http://localhost:1234/v1"
timeout = "5s"
"#,
        )
        .expect("parse");

        assert_eq!(cfg.threshold, 0.45);
        assert_eq!(cfg.default_dataset, "college_faq");
        assert_eq!(cfg.fallback.provider, Provider::OpenAi);
        assert_eq!(cfg.fallback.model(), "gpt-4o-mini");
        assert_eq!(cfg.fallback.base_url(), "http://localhost:1234/v1");
        assert_eq!(cfg.fallback.timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let cfg = Config {
            threshold: 1.5,
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Threshold(_))));

        let cfg = Config::from_toml("[fallback]\ntimeout = \"soon\"\n").expect("parse");
        assert!(matches!(cfg.validate(), Err(ConfigError::Timeout { .. })));
    }

    #[test]
    fn resolve_dataset_prefers_configured_names() {
        let cfg = Config::default();
        let (name, location) = cfg.resolve_dataset("college_faq");
        assert_eq!(name, "college_faq");
        assert!(location.ends_with("college_faq.csv"));

        let (name, location) = cfg.resolve_dataset("data/extra_faq.csv");
        assert_eq!(name, "extra_faq.csv");
        assert_eq!(location, "data/extra_faq.csv");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = Config::load(Some(Path::new("/no/such/faqbot.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn load_reads_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_dataset = \"local\"").unwrap();
        writeln!(file, "[datasets]").unwrap();
        writeln!(file, "local = \"faq.csv\"").unwrap();

        let cfg = Config::load(Some(file.path())).expect("load");
        assert_eq!(cfg.default_dataset, "local");
        assert_eq!(cfg.datasets.len(), 1);
        assert_eq!(cfg.resolve_dataset("local").1, "faq.csv");
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "threshold = [").unwrap();
        let err = Config::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
