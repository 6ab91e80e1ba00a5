//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Vector store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Language model configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Canonical fact store configuration
    #[serde(default)]
    pub canonical: CanonicalConfig,

    /// Semantic mesh configuration
    #[serde(default)]
    pub mesh: MeshConfig,

    /// Self-healing layer configuration
    #[serde(default)]
    pub healing: HealingConfig,

    /// Domain engine configuration
    #[serde(default)]
    pub domain: DomainEngineConfig,

    /// Memory enforcer configuration
    #[serde(default)]
    pub enforcer: EnforcerConfig,

    /// Meta-learning cortex configuration
    #[serde(default)]
    pub cortex: CortexConfig,

    /// Self-optimizing layer configuration
    #[serde(default)]
    pub optimizer: OptimizerConfig,

    /// Snapshot file locations
    #[serde(default)]
    pub snapshots: SnapshotPaths,
}

/// Vector store (Qdrant) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Qdrant endpoint
    #[serde(default = "default_qdrant_endpoint")]
    pub endpoint: String,

    /// API key (optional)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Collection holding canonical facts
    #[serde(default = "default_facts_collection")]
    pub facts_collection: String,

    /// Collection holding conversational chunks
    #[serde(default = "default_chunks_collection")]
    pub chunks_collection: String,
}

fn default_qdrant_endpoint() -> String {
    "http://localhost:6334".to_string()
}

fn default_facts_collection() -> String {
    "mnemo_facts".to_string()
}

fn default_chunks_collection() -> String {
    "mnemo_chunks".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: default_qdrant_endpoint(),
            api_key: None,
            facts_collection: default_facts_collection(),
            chunks_collection: default_chunks_collection(),
        }
    }
}

/// Embedding service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding API endpoint
    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,

    /// Model name
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension; must match the vector collections
    #[serde(default = "default_embedding_dim")]
    pub dimension: usize,

    /// Content-hash cache capacity
    #[serde(default = "default_embedding_cache")]
    pub cache_capacity: usize,
}

fn default_embedding_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_embedding_model() -> String {
    "qwen3-embedding:0.6b".to_string()
}

fn default_embedding_dim() -> usize {
    1024
}

fn default_embedding_cache() -> usize {
    2048
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: default_embedding_endpoint(),
            model: default_embedding_model(),
            dimension: default_embedding_dim(),
            cache_capacity: default_embedding_cache(),
        }
    }
}

/// Language model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Chat API endpoint
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// Model name
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// API key (optional)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Temperature when memory protection is active
    #[serde(default = "default_protection_temperature")]
    pub protection_temperature: f32,

    /// Temperature for exploratory generation
    #[serde(default = "default_exploration_temperature")]
    pub exploration_temperature: f32,

    /// Maximum tokens per generation
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: usize,

    /// Per-call timeout in seconds
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum retry attempts for transient failures
    #[serde(default = "default_llm_retries")]
    pub max_retries: u32,

    /// Initial backoff in milliseconds, doubled per retry
    #[serde(default = "default_llm_backoff_ms")]
    pub initial_backoff_ms: u64,
}

fn default_llm_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_llm_model() -> String {
    "qwen3:4b-instruct-2507-q4_K_M".to_string()
}

fn default_protection_temperature() -> f32 {
    0.3
}

fn default_exploration_temperature() -> f32 {
    0.8
}

fn default_llm_max_tokens() -> usize {
    512
}

fn default_llm_timeout_secs() -> u64 {
    30
}

fn default_llm_retries() -> u32 {
    3
}

fn default_llm_backoff_ms() -> u64 {
    100
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            api_key: None,
            protection_temperature: default_protection_temperature(),
            exploration_temperature: default_exploration_temperature(),
            max_tokens: default_llm_max_tokens(),
            timeout_secs: default_llm_timeout_secs(),
            max_retries: default_llm_retries(),
            initial_backoff_ms: default_llm_backoff_ms(),
        }
    }
}

/// Canonical fact store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalConfig {
    /// Hard cap on total facts
    #[serde(default = "default_max_total_facts")]
    pub max_total_facts: usize,

    /// Hard cap on facts per domain
    #[serde(default = "default_max_facts_per_domain")]
    pub max_facts_per_domain: usize,

    /// Maximum fact value length in characters
    #[serde(default = "default_max_fact_length")]
    pub max_fact_length: usize,

    /// Facts below this confidence are rejected
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Unknown domain usages before auto-creation
    #[serde(default = "default_creation_threshold")]
    pub creation_threshold: u32,

    /// Unknown key usages before auto-learning
    #[serde(default = "default_key_learning_threshold")]
    pub key_learning_threshold: u32,

    /// Normalized similarity cutoff for fuzzy key matching
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_similarity_threshold: f64,

    /// Cap on auto-created domains
    #[serde(default = "default_max_dynamic_domains")]
    pub max_dynamic_domains: usize,

    /// Domains present from the start
    #[serde(default = "default_core_domains")]
    pub core_domains: Vec<String>,
}

fn default_max_total_facts() -> usize {
    1000
}

fn default_max_facts_per_domain() -> usize {
    100
}

fn default_max_fact_length() -> usize {
    500
}

fn default_min_confidence() -> f64 {
    0.6
}

fn default_creation_threshold() -> u32 {
    3
}

fn default_key_learning_threshold() -> u32 {
    3
}

fn default_fuzzy_threshold() -> f64 {
    0.85
}

fn default_max_dynamic_domains() -> usize {
    50
}

fn default_core_domains() -> Vec<String> {
    vec![
        "identity".to_string(),
        "family".to_string(),
        "preferences".to_string(),
        "professional".to_string(),
        "assistant".to_string(),
    ]
}

impl Default for CanonicalConfig {
    fn default() -> Self {
        Self {
            max_total_facts: default_max_total_facts(),
            max_facts_per_domain: default_max_facts_per_domain(),
            max_fact_length: default_max_fact_length(),
            min_confidence: default_min_confidence(),
            creation_threshold: default_creation_threshold(),
            key_learning_threshold: default_key_learning_threshold(),
            fuzzy_similarity_threshold: default_fuzzy_threshold(),
            max_dynamic_domains: default_max_dynamic_domains(),
            core_domains: default_core_domains(),
        }
    }
}

/// Semantic mesh configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshConfig {
    /// Sessions idle longer than this are pruned
    #[serde(default = "default_prune_days")]
    pub prune_days: i64,

    /// Daily relevance multiplier
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,

    /// Chunks below this relevance are dropped
    #[serde(default = "default_min_relevance")]
    pub min_relevance: f64,

    /// Multiplier applied to chunks below the usage threshold
    #[serde(default = "default_usage_decay_factor")]
    pub usage_decay_factor: f64,

    /// Capacity before eviction starts
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,

    /// Default similarity threshold for context search
    #[serde(default = "default_search_threshold")]
    pub search_threshold: f64,

    /// Default top-k for context search
    #[serde(default = "default_search_top_k")]
    pub search_top_k: usize,
}

fn default_prune_days() -> i64 {
    30
}

fn default_decay_rate() -> f64 {
    0.95
}

fn default_min_relevance() -> f64 {
    0.1
}

fn default_usage_decay_factor() -> f64 {
    0.8
}

fn default_max_chunks() -> usize {
    5000
}

fn default_search_threshold() -> f64 {
    0.35
}

fn default_search_top_k() -> usize {
    5
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            prune_days: default_prune_days(),
            decay_rate: default_decay_rate(),
            min_relevance: default_min_relevance(),
            usage_decay_factor: default_usage_decay_factor(),
            max_chunks: default_max_chunks(),
            search_threshold: default_search_threshold(),
            search_top_k: default_search_top_k(),
        }
    }
}

/// Self-healing layer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealingConfig {
    /// Unused facts older than this slide one status down
    #[serde(default = "default_temporal_decay_days")]
    pub temporal_decay_days: i64,

    /// Supporting observations needed to promote ACTIVE facts to STABLE
    #[serde(default = "default_promotion_threshold")]
    pub promotion_threshold: u32,
}

fn default_temporal_decay_days() -> i64 {
    90
}

fn default_promotion_threshold() -> u32 {
    3
}

impl Default for HealingConfig {
    fn default() -> Self {
        Self {
            temporal_decay_days: default_temporal_decay_days(),
            promotion_threshold: default_promotion_threshold(),
        }
    }
}

/// Domain engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEngineConfig {
    /// Below this combined score the signal is `unknown`
    #[serde(default = "default_domain_confidence_threshold")]
    pub confidence_threshold: f64,

    /// LRU capacity for exemplar embedding sets
    #[serde(default = "default_exemplar_cache_capacity")]
    pub exemplar_cache_capacity: usize,

    /// Rolling window of recent turns feeding the meta-prior
    #[serde(default = "default_recent_window")]
    pub recent_window: usize,

    /// Texts shorter than this many tokens skip the entropy signal
    #[serde(default = "default_min_entropy_tokens")]
    pub min_entropy_tokens: usize,
}

fn default_domain_confidence_threshold() -> f64 {
    0.7
}

fn default_exemplar_cache_capacity() -> usize {
    20
}

fn default_recent_window() -> usize {
    20
}

fn default_min_entropy_tokens() -> usize {
    10
}

impl Default for DomainEngineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_domain_confidence_threshold(),
            exemplar_cache_capacity: default_exemplar_cache_capacity(),
            recent_window: default_recent_window(),
            min_entropy_tokens: default_min_entropy_tokens(),
        }
    }
}

/// Memory enforcer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnforcerConfig {
    /// Strictness for domains not listed in `domain_strictness`
    #[serde(default = "default_base_strictness")]
    pub default_strictness: f64,

    /// Per-domain strictness multipliers
    #[serde(default = "default_domain_strictness")]
    pub domain_strictness: HashMap<String, f64>,

    /// Below full strictness, contradictions only override above this
    /// fact confidence
    #[serde(default = "default_override_confidence")]
    pub override_confidence_threshold: f64,
}

fn default_base_strictness() -> f64 {
    0.6
}

fn default_domain_strictness() -> HashMap<String, f64> {
    let mut strictness = HashMap::new();
    strictness.insert("identity".to_string(), 1.0);
    strictness.insert("family".to_string(), 1.0);
    strictness
}

fn default_override_confidence() -> f64 {
    0.7
}

impl Default for EnforcerConfig {
    fn default() -> Self {
        Self {
            default_strictness: default_base_strictness(),
            domain_strictness: default_domain_strictness(),
            override_confidence_threshold: default_override_confidence(),
        }
    }
}

/// Meta-learning cortex configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CortexConfig {
    /// Distinct domains with positive observations before a pattern is
    /// marked universal
    #[serde(default = "default_cross_domain_threshold")]
    pub cross_domain_threshold: usize,

    /// Relevance bonus for universal patterns in new domains
    #[serde(default = "default_universal_bonus")]
    pub universal_bonus: f64,

    /// Pattern observations per domain before collapse is considered
    #[serde(default = "default_collapse_threshold")]
    pub collapse_threshold: usize,
}

fn default_cross_domain_threshold() -> usize {
    3
}

fn default_universal_bonus() -> f64 {
    2.0
}

fn default_collapse_threshold() -> usize {
    50
}

impl Default for CortexConfig {
    fn default() -> Self {
        Self {
            cross_domain_threshold: default_cross_domain_threshold(),
            universal_bonus: default_universal_bonus(),
            collapse_threshold: default_collapse_threshold(),
        }
    }
}

/// Self-optimizing layer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Optimization cycle period in hours
    #[serde(default = "default_cycle_hours")]
    pub optimization_cycle_hours: u64,

    /// Hours to wait before judging an adjustment
    #[serde(default = "default_evaluation_window_hours")]
    pub evaluation_window_hours: u64,

    /// Maximum relative change per parameter per cycle
    #[serde(default = "default_max_adjustment_ratio")]
    pub max_adjustment_ratio: f64,

    /// Relative improvement/degradation that anchors or reverts
    #[serde(default = "default_anchor_threshold")]
    pub anchor_threshold: f64,

    /// Ring buffer capacity per metric
    #[serde(default = "default_metric_capacity")]
    pub metric_buffer_capacity: usize,
}

fn default_cycle_hours() -> u64 {
    1
}

fn default_evaluation_window_hours() -> u64 {
    24
}

fn default_max_adjustment_ratio() -> f64 {
    0.2
}

fn default_anchor_threshold() -> f64 {
    0.05
}

fn default_metric_capacity() -> usize {
    256
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            optimization_cycle_hours: default_cycle_hours(),
            evaluation_window_hours: default_evaluation_window_hours(),
            max_adjustment_ratio: default_max_adjustment_ratio(),
            anchor_threshold: default_anchor_threshold(),
            metric_buffer_capacity: default_metric_capacity(),
        }
    }
}

/// Locations of the atomically rewritten JSON snapshot files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotPaths {
    #[serde(default = "default_schema_path")]
    pub schema: String,

    #[serde(default = "default_patterns_path")]
    pub patterns: String,

    #[serde(default = "default_optimizer_path")]
    pub optimizer: String,
}

fn default_schema_path() -> String {
    "state/schema.json".to_string()
}

fn default_patterns_path() -> String {
    "state/patterns.json".to_string()
}

fn default_optimizer_path() -> String {
    "state/optimizer.json".to_string()
}

impl Default for SnapshotPaths {
    fn default() -> Self {
        Self {
            schema: default_schema_path(),
            patterns: default_patterns_path(),
            optimizer: default_optimizer_path(),
        }
    }
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings before constructing services
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding.dimension == 0 {
            return Err(ConfigError::Invalid(
                "embedding.dimension must be non-zero".to_string(),
            ));
        }

        if self.canonical.max_total_facts == 0 || self.canonical.max_facts_per_domain == 0 {
            return Err(ConfigError::Invalid(
                "canonical fact caps must be non-zero".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.canonical.min_confidence) {
            return Err(ConfigError::Invalid(
                "canonical.min_confidence must be within [0, 1]".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.canonical.fuzzy_similarity_threshold) {
            return Err(ConfigError::Invalid(
                "canonical.fuzzy_similarity_threshold must be within [0, 1]".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.mesh.decay_rate)
            || !(0.0..=1.0).contains(&self.mesh.min_relevance)
            || !(0.0..=1.0).contains(&self.mesh.usage_decay_factor)
        {
            return Err(ConfigError::Invalid(
                "mesh decay parameters must be within [0, 1]".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.domain.confidence_threshold) {
            return Err(ConfigError::Invalid(
                "domain.confidence_threshold must be within [0, 1]".to_string(),
            ));
        }

        if self.domain.exemplar_cache_capacity == 0 {
            return Err(ConfigError::Invalid(
                "domain.exemplar_cache_capacity must be non-zero".to_string(),
            ));
        }

        for (domain, strictness) in &self.enforcer.domain_strictness {
            if !(0.0..=1.0).contains(strictness) {
                return Err(ConfigError::Invalid(format!(
                    "enforcer strictness for '{}' must be within [0, 1]",
                    domain
                )));
            }
        }

        if self.optimizer.max_adjustment_ratio <= 0.0 || self.optimizer.max_adjustment_ratio > 1.0 {
            return Err(ConfigError::Invalid(
                "optimizer.max_adjustment_ratio must be within (0, 1]".to_string(),
            ));
        }

        if self.optimizer.optimization_cycle_hours == 0 {
            return Err(ConfigError::Invalid(
                "optimizer.optimization_cycle_hours must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Load settings from an optional TOML file plus MNEMO_* env overrides
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        builder = builder.add_source(File::from(path));
    }

    let config = builder
        .add_source(Environment::with_prefix("MNEMO").separator("__"))
        .build()
        .map_err(|e| ConfigError::Parse(e.to_string()))?;

    let settings: Settings = config
        .try_deserialize()
        .map_err(|e| ConfigError::Parse(e.to_string()))?;

    settings.validate()?;
    Ok(settings)
}
