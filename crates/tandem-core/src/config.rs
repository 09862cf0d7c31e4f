//! Hybrid search configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Result fusion algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionStrategy {
    /// Reciprocal Rank Fusion with k=60.
    ReciprocalRank,
    /// Weighted score combination (normalize per list, scale by weight).
    Weighted,
    /// Linear combination with rank-position decay.
    Linear,
}

/// Immutable configuration snapshot for one orchestrator instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridConfig {
    /// Weight for the vector/semantic backend in fusion.
    pub semantic_weight: f64,
    /// Weight for the graph backend in fusion.
    pub graph_weight: f64,
    /// Minimum similarity for semantic search hits.
    pub similarity_threshold: f64,
    /// Maximum graph traversal depth.
    pub max_hops: usize,
    /// Cap on the final fused result list.
    pub max_results: usize,
    /// Whether results are cached.
    pub enable_caching: bool,
    /// Fusion algorithm to apply after retrieval.
    pub fusion_strategy: FusionStrategy,
    /// TTL for cached search results.
    #[serde(skip)]
    pub cache_ttl: Duration,
    /// Deadline applied to every backend call.
    #[serde(skip)]
    pub backend_timeout: Duration,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            semantic_weight: 0.5,
            graph_weight: 0.5,
            similarity_threshold: 0.7,
            max_hops: 2,
            max_results: 50,
            enable_caching: true,
            fusion_strategy: FusionStrategy::ReciprocalRank,
            cache_ttl: Duration::from_secs(3600),
            backend_timeout: Duration::from_secs(30),
        }
    }
}

impl HybridConfig {
    /// Create configuration from environment variables with defaults.
    ///
    /// Recognized: `TANDEM_SIMILARITY_THRESHOLD`, `TANDEM_MAX_HOPS`,
    /// `TANDEM_MAX_RESULTS`, `TANDEM_CACHE_TTL_SECS`, `TANDEM_DISABLE_CACHE`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_parse::<f64>("TANDEM_SIMILARITY_THRESHOLD") {
            config.similarity_threshold = v;
        }
        if let Some(v) = env_parse::<usize>("TANDEM_MAX_HOPS") {
            config.max_hops = v;
        }
        if let Some(v) = env_parse::<usize>("TANDEM_MAX_RESULTS") {
            config.max_results = v;
        }
        if let Some(v) = env_parse::<u64>("TANDEM_CACHE_TTL_SECS") {
            config.cache_ttl = Duration::from_secs(v);
        }
        if std::env::var("TANDEM_DISABLE_CACHE").is_ok() {
            config.enable_caching = false;
        }

        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HybridConfig::default();
        assert_eq!(config.similarity_threshold, 0.7);
        assert_eq!(config.max_hops, 2);
        assert_eq!(config.max_results, 50);
        assert!(config.enable_caching);
        assert_eq!(config.fusion_strategy, FusionStrategy::ReciprocalRank);
    }

    #[test]
    fn test_fusion_strategy_serde() {
        let json = serde_json::to_string(&FusionStrategy::ReciprocalRank).unwrap();
        assert_eq!(json, "\"reciprocal_rank\"");
    }
}
