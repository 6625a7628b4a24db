//! Layered configuration and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`__` separates nested keys, e.g.
//! `APP_FUSION__VECTOR_WEIGHT=0.7`). Provides helpers to expand `~` and
//! `${VAR}` and to resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::SearchError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub default_top_k: usize,
    pub max_top_k: usize,
    pub default_table: String,
    pub overfetch_factor: usize,
    pub vector_timeout_ms: u64,
    pub lexical_timeout_ms: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_top_k: 10,
            max_top_k: 100,
            default_table: "documents".to_string(),
            overfetch_factor: 3,
            vector_timeout_ms: 3_000,
            lexical_timeout_ms: 3_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordSettings {
    pub max_keywords: usize,
    pub min_term_chars: usize,
}

impl Default for KeywordSettings {
    fn default() -> Self {
        Self { max_keywords: 12, min_term_chars: 2 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionSettings {
    pub vector_weight: f32,
    pub lexical_weight: f32,
    pub score_precision: usize,
}

impl Default for FusionSettings {
    fn default() -> Self {
        Self { vector_weight: 0.5, lexical_weight: 0.5, score_precision: 4 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub meeting_note_labels: Vec<String>,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self { meeting_note_labels: vec!["meeting-notes".to_string(), "議事録".to_string()] }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { enabled: true, ttl_secs: 300, max_entries: 1024 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub chunks_file: String,
    pub tantivy_index_dir: String,
    pub lancedb_dir: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            chunks_file: "../dev_data/chunks.jsonl".to_string(),
            tantivy_index_dir: "../dev_data/indexes/tantivy".to_string(),
            lancedb_dir: "../dev_data/indexes/lancedb".to_string(),
        }
    }
}

/// Typed view over every configuration section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub search: SearchSettings,
    pub keywords: KeywordSettings,
    pub fusion: FusionSettings,
    pub filter: FilterSettings,
    pub cache: CacheSettings,
    pub data: DataSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<(), SearchError> {
        let s = &self.search;
        if s.max_top_k == 0 || s.default_top_k == 0 || s.default_top_k > s.max_top_k {
            return Err(SearchError::InvalidConfig(format!(
                "search.default_top_k must be within 1..={} (got {})",
                s.max_top_k, s.default_top_k
            )));
        }
        if s.overfetch_factor == 0 {
            return Err(SearchError::InvalidConfig("search.overfetch_factor must be at least 1".into()));
        }
        if self.keywords.max_keywords == 0 {
            return Err(SearchError::InvalidConfig("keywords.max_keywords must be at least 1".into()));
        }
        let f = &self.fusion;
        let weights_ok = f.vector_weight.is_finite()
            && f.lexical_weight.is_finite()
            && f.vector_weight >= 0.0
            && f.lexical_weight >= 0.0
            && f.vector_weight + f.lexical_weight > 0.0;
        if !weights_ok {
            return Err(SearchError::InvalidConfig(format!(
                "fusion weights must be non-negative and not both zero (vector={}, lexical={})",
                f.vector_weight, f.lexical_weight
            )));
        }
        Ok(())
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        let config = Self { figment: Self::figment_for(&env_name) };
        config.settings()?;
        Ok(config)
    }

    fn figment_for(env_name: &str) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment.merge(Env::prefixed("APP_").split("__"))
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract and validate the full settings tree.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
