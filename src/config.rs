//! Layered configuration for the context engine
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML file,
//! then `CONTEXT_ENGINE__<SECTION>__<FIELD>` environment variables. A `.env`
//! file is read before the environment is consulted.

use crate::error::{ContextError, Result};
use crate::summarization::SummarizationStrategy;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment prefix for overrides
pub const ENV_PREFIX: &str = "CONTEXT_ENGINE";

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub topic_shift: TopicShiftConfig,
    #[serde(default)]
    pub branching: BranchConfig,
    #[serde(default)]
    pub summarization: SummarizationConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from `.env`, an optional file and the environment
    pub fn load(path: Option<&str>) -> Result<Self> {
        // A missing .env is the common case
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject inconsistent settings
    pub fn validate(&self) -> Result<()> {
        self.window.validate()?;
        self.topic_shift.validate()?;
        self.branching.validate()?;
        self.summarization.validate()?;
        Ok(())
    }
}

/// Estimator backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EstimatorKind {
    #[default]
    Heuristic,
    Tiktoken,
}

/// Context window limits and retention policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Maximum live messages before optimization
    #[serde(default = "default_max_window_size")]
    pub max_window_size: usize,

    /// Maximum estimated tokens a window may occupy
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Tokens reserved for the model's response
    #[serde(default = "default_token_buffer")]
    pub token_buffer: usize,

    /// Messages above this importance are never summarized
    #[serde(default = "default_importance_threshold")]
    pub importance_threshold: f32,

    /// Fraction of the window kept verbatim when selecting summarization candidates
    #[serde(default = "default_summarize_ratio")]
    pub summarize_ratio: f32,

    /// Fraction of the window kept when pruning by importance
    #[serde(default = "default_prune_ratio")]
    pub prune_ratio: f32,

    /// Most recent messages always kept by pruning
    #[serde(default = "default_recency_floor")]
    pub recency_floor: usize,

    /// Tool results younger than this are not summarized
    #[serde(default = "default_tool_result_protection")]
    pub tool_result_protection_secs: u64,

    /// Half-life of message importance
    #[serde(default = "default_importance_half_life")]
    pub importance_half_life_hours: f64,

    #[serde(default)]
    pub estimator: EstimatorKind,
}

fn default_max_window_size() -> usize {
    50
}

fn default_max_tokens() -> usize {
    8000
}

fn default_token_buffer() -> usize {
    1000
}

fn default_importance_threshold() -> f32 {
    0.8
}

fn default_summarize_ratio() -> f32 {
    0.6
}

fn default_prune_ratio() -> f32 {
    0.8
}

fn default_recency_floor() -> usize {
    5
}

fn default_tool_result_protection() -> u64 {
    3600
}

fn default_importance_half_life() -> f64 {
    24.0
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            max_window_size: default_max_window_size(),
            max_tokens: default_max_tokens(),
            token_buffer: default_token_buffer(),
            importance_threshold: default_importance_threshold(),
            summarize_ratio: default_summarize_ratio(),
            prune_ratio: default_prune_ratio(),
            recency_floor: default_recency_floor(),
            tool_result_protection_secs: default_tool_result_protection(),
            importance_half_life_hours: default_importance_half_life(),
            estimator: EstimatorKind::default(),
        }
    }
}

impl WindowConfig {
    /// Token budget available to the conversation itself
    pub fn usable_tokens(&self) -> usize {
        self.max_tokens.saturating_sub(self.token_buffer)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_window_size == 0 {
            return Err(ContextError::Configuration(
                "window.max_window_size must be greater than zero".to_string(),
            ));
        }
        if self.token_buffer >= self.max_tokens {
            return Err(ContextError::Configuration(format!(
                "window.token_buffer ({}) must be smaller than window.max_tokens ({})",
                self.token_buffer, self.max_tokens
            )));
        }
        check_ratio("window.summarize_ratio", self.summarize_ratio)?;
        check_ratio("window.prune_ratio", self.prune_ratio)?;
        check_ratio("window.importance_threshold", self.importance_threshold)?;
        Ok(())
    }
}

/// Topic shift detection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicShiftConfig {
    #[serde(default = "default_shift_enabled")]
    pub enabled: bool,

    /// Confidence above which a shift counts as detected
    #[serde(default = "default_shift_threshold")]
    pub threshold: f32,

    /// Number of recent messages compared against
    #[serde(default = "default_shift_history")]
    pub history_window: usize,
}

fn default_shift_enabled() -> bool {
    true
}

fn default_shift_threshold() -> f32 {
    0.65
}

fn default_shift_history() -> usize {
    5
}

impl Default for TopicShiftConfig {
    fn default() -> Self {
        Self {
            enabled: default_shift_enabled(),
            threshold: default_shift_threshold(),
            history_window: default_shift_history(),
        }
    }
}

impl TopicShiftConfig {
    pub fn validate(&self) -> Result<()> {
        check_ratio("topic_shift.threshold", self.threshold)
    }
}

/// Branch tree limits and merge policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchConfig {
    #[serde(default = "default_max_branches")]
    pub max_branches: usize,

    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Minutes after a branch is created during which no new branch is suggested
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: i64,

    /// Largest source branch merged message-for-message
    #[serde(default = "default_full_merge_max_messages")]
    pub full_merge_max_messages: usize,

    #[serde(default = "default_merge_quality_threshold")]
    pub merge_quality_threshold: f32,

    #[serde(default = "default_max_merge_candidates")]
    pub max_merge_candidates: usize,

    /// Branches at the same depth created within this window are related
    #[serde(default = "default_related_window_hours")]
    pub related_window_hours: i64,

    /// Selective merges keep source messages above this importance
    #[serde(default = "default_selective_threshold")]
    pub selective_importance_threshold: f32,
}

fn default_max_branches() -> usize {
    10
}

fn default_max_depth() -> usize {
    3
}

fn default_cooldown_minutes() -> i64 {
    5
}

fn default_full_merge_max_messages() -> usize {
    20
}

fn default_merge_quality_threshold() -> f32 {
    0.6
}

fn default_max_merge_candidates() -> usize {
    5
}

fn default_related_window_hours() -> i64 {
    2
}

fn default_selective_threshold() -> f32 {
    0.6
}

impl Default for BranchConfig {
    fn default() -> Self {
        Self {
            max_branches: default_max_branches(),
            max_depth: default_max_depth(),
            cooldown_minutes: default_cooldown_minutes(),
            full_merge_max_messages: default_full_merge_max_messages(),
            merge_quality_threshold: default_merge_quality_threshold(),
            max_merge_candidates: default_max_merge_candidates(),
            related_window_hours: default_related_window_hours(),
            selective_importance_threshold: default_selective_threshold(),
        }
    }
}

impl BranchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_branches == 0 {
            return Err(ContextError::Configuration(
                "branching.max_branches must be greater than zero".to_string(),
            ));
        }
        check_ratio("branching.merge_quality_threshold", self.merge_quality_threshold)
    }
}

/// Summarization settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizationConfig {
    #[serde(default)]
    pub strategy: SummarizationStrategy,

    #[serde(default = "default_max_summary_tokens")]
    pub max_summary_tokens: usize,

    /// Clusters and messages above this importance are preserved verbatim
    #[serde(default = "default_preserve_threshold")]
    pub preserve_threshold: f32,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Inputs longer than this are summarized in chunks
    #[serde(default = "default_iterative_threshold")]
    pub iterative_threshold: usize,

    #[serde(default = "default_model_timeout_ms")]
    pub model_timeout_ms: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Topic overlap below which a new cluster starts
    #[serde(default = "default_cluster_overlap")]
    pub cluster_overlap: f32,

    /// Gap after which a new cluster starts
    #[serde(default = "default_cluster_gap_minutes")]
    pub cluster_gap_minutes: i64,

    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
}

fn default_max_summary_tokens() -> usize {
    500
}

fn default_preserve_threshold() -> f32 {
    0.7
}

fn default_chunk_size() -> usize {
    20
}

fn default_iterative_threshold() -> usize {
    40
}

fn default_model_timeout_ms() -> u64 {
    10_000
}

fn default_temperature() -> f32 {
    0.3
}

fn default_cluster_overlap() -> f32 {
    0.3
}

fn default_cluster_gap_minutes() -> i64 {
    30
}

fn default_cache_capacity() -> u64 {
    256
}

impl Default for SummarizationConfig {
    fn default() -> Self {
        Self {
            strategy: SummarizationStrategy::default(),
            max_summary_tokens: default_max_summary_tokens(),
            preserve_threshold: default_preserve_threshold(),
            chunk_size: default_chunk_size(),
            iterative_threshold: default_iterative_threshold(),
            model_timeout_ms: default_model_timeout_ms(),
            temperature: default_temperature(),
            cluster_overlap: default_cluster_overlap(),
            cluster_gap_minutes: default_cluster_gap_minutes(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl SummarizationConfig {
    pub fn model_timeout(&self) -> Duration {
        Duration::from_millis(self.model_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size < 2 {
            return Err(ContextError::Configuration(
                "summarization.chunk_size must be at least 2".to_string(),
            ));
        }
        check_ratio("summarization.preserve_threshold", self.preserve_threshold)
    }
}

/// OpenAI-compatible model endpoint used for abstractive summaries
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// Without a model, abstractive summaries fall back to extractive
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// API key; falls back to `OPENAI_API_KEY`
    #[serde(default)]
    pub api_key: Option<SecretString>,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_llm_max_retries")]
    pub max_retries: usize,
}

fn default_llm_endpoint() -> String {
    "http://localhost:8080/v1/chat/completions".to_string()
}

fn default_llm_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    30
}

fn default_llm_max_retries() -> usize {
    3
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_llm_endpoint(),
            api_key: None,
            model: default_llm_model(),
            timeout_secs: default_llm_timeout_secs(),
            max_retries: default_llm_max_retries(),
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Configured key, or the conventional environment variable
    pub fn resolve_api_key(&self) -> Option<SecretString> {
        self.api_key.clone().or_else(|| {
            std::env::var("OPENAI_API_KEY")
                .ok()
                .map(SecretString::new)
        })
    }
}

/// Persistence backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceBackend {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub backend: PersistenceBackend,

    #[serde(default = "default_persistence_dir")]
    pub directory: PathBuf,

    /// Pending writes beyond this are dropped with a warning
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_persistence_dir() -> PathBuf {
    PathBuf::from("./data/contexts")
}

fn default_queue_capacity() -> usize {
    128
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: PersistenceBackend::default(),
            directory: default_persistence_dir(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Conversations unused this long are dropped from memory; 0 keeps them
    #[serde(default = "default_idle_eviction_secs")]
    pub idle_eviction_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8081
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_idle_eviction_secs() -> u64 {
    1800
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
            idle_eviction_secs: default_idle_eviction_secs(),
        }
    }
}

fn check_ratio(name: &str, value: f32) -> Result<()> {
    if !(value > 0.0 && value <= 1.0) {
        return Err(ContextError::Configuration(format!(
            "{name} must be in (0, 1], got {value}"
        )));
    }
    Ok(())
}
