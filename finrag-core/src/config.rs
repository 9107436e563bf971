//! Configuration for finrag.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! workspace config file -> environment. API keys are never read from config
//! files; each client section names the environment variable that holds its key.

use crate::rag::chunk::ChunkingStrategy;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinragConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
    #[serde(default)]
    pub rerank: RerankConfig,
    #[serde(default)]
    pub chunking: ChunkingStrategy,
    #[serde(default)]
    pub datastore: DatastoreConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

/// Chat-completion provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_llm_model(),
            api_key_env: default_openai_key_env(),
            temperature: 0.0,
            max_tokens: None,
        }
    }
}

/// Which embedding backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderKind {
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    /// Offline feature-hashing embedder.
    Local,
}

/// Embedding provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProviderKind,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,
    /// Vector size for the local provider.
    #[serde(default = "default_local_dimensions")]
    pub dimensions: usize,
    /// Texts sent per embedding request when indexing.
    #[serde(default = "default_embedding_batch")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::default(),
            base_url: default_openai_base_url(),
            model: default_embedding_model(),
            api_key_env: default_openai_key_env(),
            dimensions: default_local_dimensions(),
            batch_size: default_embedding_batch(),
        }
    }
}

/// Which reranking backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerankProviderKind {
    #[default]
    Cohere,
    /// Keep datastore order.
    None,
}

/// Reranking and retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    #[serde(default)]
    pub provider: RerankProviderKind,
    #[serde(default = "default_cohere_base_url")]
    pub base_url: String,
    #[serde(default = "default_rerank_model")]
    pub model: String,
    #[serde(default = "default_cohere_key_env")]
    pub api_key_env: String,
    /// Passages returned per query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Candidates fetched from the datastore per returned passage.
    #[serde(default = "default_overfetch")]
    pub overfetch_factor: usize,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            provider: RerankProviderKind::default(),
            base_url: default_cohere_base_url(),
            model: default_rerank_model(),
            api_key_env: default_cohere_key_env(),
            top_k: default_top_k(),
            overfetch_factor: default_overfetch(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Fixed-delay retry policy for rate-limited calls.
///
/// Before the first attempt the caller waits `warmup_delay_ms` once. Every
/// attempt is preceded by `pre_attempt_delay_ms`. After the n-th rate-limited
/// attempt the caller waits `backoff_base_ms * n`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_warmup_delay")]
    pub warmup_delay_ms: u64,
    #[serde(default = "default_pre_attempt_delay")]
    pub pre_attempt_delay_ms: u64,
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            warmup_delay_ms: default_warmup_delay(),
            pre_attempt_delay_ms: default_pre_attempt_delay(),
            backoff_base_ms: default_backoff_base(),
        }
    }
}

impl RetryPolicy {
    /// Same attempt budget, no waiting.
    pub fn immediate() -> Self {
        Self {
            warmup_delay_ms: 0,
            pre_attempt_delay_ms: 0,
            backoff_base_ms: 0,
            ..Self::default()
        }
    }

    /// Backoff after the given 1-based attempt was rate limited.
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        self.backoff_base_ms.saturating_mul(u64::from(attempt))
    }
}

/// Datastore configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatastoreConfig {
    /// SQLite file. `None` keeps everything in memory.
    #[serde(default = "default_datastore_path")]
    pub path: Option<PathBuf>,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            path: default_datastore_path(),
        }
    }
}

/// How answers are judged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgeKind {
    /// Literal ratio with embedding fallback.
    #[default]
    Similarity,
    /// Ask the chat model for a verdict.
    Llm,
}

/// Evaluation harness configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    #[serde(default)]
    pub judge: JudgeKind,
    #[serde(default = "default_literal_threshold")]
    pub literal_threshold: f64,
    #[serde(default = "default_semantic_threshold")]
    pub semantic_threshold: f64,
    #[serde(default = "default_grounding_threshold")]
    pub grounding_threshold: f64,
    /// Pause before each evaluated question.
    #[serde(default = "default_question_delay")]
    pub question_delay_ms: u64,
    /// Pause before each embedding comparison.
    #[serde(default = "default_semantic_delay")]
    pub semantic_delay_ms: u64,
    #[serde(default = "default_summary_path")]
    pub summary_path: PathBuf,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            judge: JudgeKind::default(),
            literal_threshold: default_literal_threshold(),
            semantic_threshold: default_semantic_threshold(),
            grounding_threshold: default_grounding_threshold(),
            question_delay_ms: default_question_delay(),
            semantic_delay_ms: default_semantic_delay(),
            summary_path: default_summary_path(),
        }
    }
}

impl EvaluationConfig {
    /// Same thresholds, no pacing delays.
    pub fn without_delays(mut self) -> Self {
        self.question_delay_ms = 0;
        self.semantic_delay_ms = 0;
        self
    }
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_local_dimensions() -> usize {
    384
}

fn default_embedding_batch() -> usize {
    64
}

fn default_cohere_base_url() -> String {
    "https://api.cohere.com/v2".to_string()
}

fn default_rerank_model() -> String {
    "rerank-multilingual-v3.5".to_string()
}

fn default_cohere_key_env() -> String {
    "CO_API_KEY".to_string()
}

fn default_top_k() -> usize {
    10
}

fn default_overfetch() -> usize {
    3
}

fn default_max_attempts() -> u32 {
    5
}

fn default_warmup_delay() -> u64 {
    6_000
}

fn default_pre_attempt_delay() -> u64 {
    10_000
}

fn default_backoff_base() -> u64 {
    10_000
}

fn default_datastore_path() -> Option<PathBuf> {
    Some(PathBuf::from(".finrag/datastore.db"))
}

fn default_literal_threshold() -> f64 {
    0.75
}

fn default_semantic_threshold() -> f64 {
    0.80
}

fn default_grounding_threshold() -> f64 {
    0.15
}

fn default_question_delay() -> u64 {
    6_000
}

fn default_semantic_delay() -> u64 {
    1_500
}

fn default_summary_path() -> PathBuf {
    PathBuf::from("results/evaluation_summary.json")
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `FINRAG_`, nested with `__`)
/// 2. Explicit config file, or `finrag.toml` in the workspace
/// 3. User config (`~/.config/finrag/config.toml`)
/// 4. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<FinragConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(FinragConfig::default()));

    if let Some(dirs) = directories::ProjectDirs::from("dev", "finrag", "finrag") {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    match explicit {
        Some(path) => figment = figment.merge(Toml::file(path)),
        None => {
            if let Some(ws) = workspace {
                let ws_config = ws.join("finrag.toml");
                if ws_config.exists() {
                    figment = figment.merge(Toml::file(&ws_config));
                }
            }
        }
    }

    // FINRAG_LLM__MODEL, FINRAG_RERANK__TOP_K, ...
    figment = figment.merge(Env::prefixed("FINRAG_").split("__"));

    figment.extract().map_err(Box::new)
}
