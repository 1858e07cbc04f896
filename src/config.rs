//! TOML configuration.
//!
//! Every section is optional. A missing file at the default location falls
//! back to [`Config::default`]; an explicitly broken file is an error.

use anyhow::{bail, Context, Result};
use faqsense_core::fuzzy::FuzzyParams;
use faqsense_core::semantic::SemanticParams;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeConfig {
    /// Directory holding `<tenant>/faqs.csv` tables.
    #[serde(default = "default_knowledge_root")]
    pub root: PathBuf,
    /// Tenants kept in the table cache.
    #[serde(default = "default_table_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            root: default_knowledge_root(),
            cache_capacity: default_table_cache_capacity(),
        }
    }
}

fn default_knowledge_root() -> PathBuf {
    PathBuf::from("./data/chatbots")
}
fn default_table_cache_capacity() -> usize {
    256
}

#[derive(Debug, Deserialize, Clone)]
pub struct MatchingConfig {
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
    #[serde(default = "default_fuzzy_high_confidence")]
    pub fuzzy_high_confidence: f64,
    #[serde(default = "default_min_keyword_overlap")]
    pub min_keyword_overlap: usize,
    #[serde(default = "default_semantic_threshold")]
    pub semantic_threshold: f32,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    #[serde(default = "default_ambiguity_threshold")]
    pub ambiguity_threshold: f32,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Reply shown by the CLI when nothing matches.
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: default_fuzzy_threshold(),
            fuzzy_high_confidence: default_fuzzy_high_confidence(),
            min_keyword_overlap: default_min_keyword_overlap(),
            semantic_threshold: default_semantic_threshold(),
            confidence_threshold: default_confidence_threshold(),
            ambiguity_threshold: default_ambiguity_threshold(),
            top_k: default_top_k(),
            fallback_message: default_fallback_message(),
        }
    }
}

fn default_fuzzy_threshold() -> f64 {
    80.0
}
fn default_fuzzy_high_confidence() -> f64 {
    faqsense_core::fuzzy::DEFAULT_HIGH_CONFIDENCE
}
fn default_min_keyword_overlap() -> usize {
    1
}
fn default_semantic_threshold() -> f32 {
    0.70
}
fn default_confidence_threshold() -> f32 {
    0.85
}
fn default_ambiguity_threshold() -> f32 {
    0.05
}
fn default_top_k() -> usize {
    5
}
fn default_fallback_message() -> String {
    "I did not understand that! Please try to rephrase your question or register your query with us."
        .to_string()
}

impl MatchingConfig {
    pub fn fuzzy_params(&self) -> FuzzyParams {
        FuzzyParams {
            threshold: self.fuzzy_threshold,
            high_confidence: self.fuzzy_high_confidence,
            min_overlap: self.min_keyword_overlap,
        }
    }

    pub fn semantic_params(&self) -> SemanticParams {
        SemanticParams {
            semantic_threshold: self.semantic_threshold,
            confidence_threshold: self.confidence_threshold,
            ambiguity_threshold: self.ambiguity_threshold,
            min_overlap: self.min_keyword_overlap,
            top_k: self.top_k,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `disabled`, `hashed`, `local`, `openai`, or `ollama`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Corpus snapshots kept in the embedding cache.
    #[serde(default = "default_embedding_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            cache_capacity: default_embedding_cache_capacity(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    2
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_embedding_cache_capacity() -> usize {
    512
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

/// Read, parse, and validate a configuration file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config = parse_config(&content)
        .with_context(|| format!("Invalid config file: {}", path.display()))?;
    Ok(config)
}

/// Like [`load_config`], but a missing file yields the defaults.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::default())
    }
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse config")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.knowledge.cache_capacity == 0 {
        bail!("knowledge.cache_capacity must be >= 1");
    }

    let m = &config.matching;
    for (name, value) in [
        ("fuzzy_threshold", m.fuzzy_threshold),
        ("fuzzy_high_confidence", m.fuzzy_high_confidence),
    ] {
        if !(0.0..=100.0).contains(&value) {
            bail!("matching.{} must be in [0, 100]", name);
        }
    }
    for (name, value) in [
        ("semantic_threshold", m.semantic_threshold),
        ("confidence_threshold", m.confidence_threshold),
    ] {
        if !(-1.0..=1.0).contains(&value) {
            bail!("matching.{} must be in [-1.0, 1.0]", name);
        }
    }
    if m.ambiguity_threshold.is_nan() || m.ambiguity_threshold < 0.0 {
        bail!("matching.ambiguity_threshold must be >= 0.0");
    }
    if m.top_k == 0 {
        bail!("matching.top_k must be >= 1");
    }

    let e = &config.embedding;
    if e.cache_capacity == 0 {
        bail!("embedding.cache_capacity must be >= 1");
    }
    if e.batch_size == 0 {
        bail!("embedding.batch_size must be >= 1");
    }
    match e.provider.as_str() {
        "disabled" | "local" => {}
        "hashed" | "openai" | "ollama" => {
            if e.dims.is_none() || e.dims == Some(0) {
                bail!("embedding.dims must be > 0 when provider is '{}'", e.provider);
            }
            if e.provider != "hashed" && e.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    e.provider
                );
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, hashed, local, openai, or ollama.",
            other
        ),
    }

    Ok(())
}
