//! The hybrid search entry point: cache, dispatch, fuse, score.

use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tracing::{error, info, instrument, warn};

use tandem_core::{Error, HybridConfig};
use tandem_store::{GraphStore, VectorStore};

use crate::cache::{cache_key, SearchCache};
use crate::fusion;
use crate::strategies::{strategy_for, StrategyContext};
use crate::types::{RawResults, SearchOptions, SearchResult, SearchStrategy};

/// Per-strategy dampening applied to the confidence score. Strategies that
/// skip one backend entirely report slightly lower confidence than those
/// that consult both.
fn strategy_multiplier(strategy: SearchStrategy) -> f64 {
    match strategy {
        SearchStrategy::SemanticFirst => 0.9,
        SearchStrategy::GraphFirst => 0.85,
        SearchStrategy::Balanced => 1.0,
        SearchStrategy::MultiStep => 0.95,
    }
}

/// Confidence in `[0, 1]` from result volume (saturating at 10 results) and
/// average native score, dampened per strategy. Empty results score 0.
fn confidence_score(results: &[tandem_core::RankedItem], strategy: SearchStrategy) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let volume = (results.len() as f64 / 10.0).min(1.0);
    let avg_score = results.iter().map(|r| r.score).sum::<f64>() / results.len() as f64;
    (volume * avg_score * strategy_multiplier(strategy)).min(1.0)
}

/// Coordinates the vector and graph backends behind one `search` call.
///
/// `search` is total: backend failures and timeouts surface as an empty
/// result set with `metadata["error"]` set and confidence 0, never as an
/// error to the caller.
pub struct HybridSearchOrchestrator {
    ctx: StrategyContext,
    cache: SearchCache,
}

impl HybridSearchOrchestrator {
    pub fn new(
        vector: Arc<dyn VectorStore>,
        graph: Arc<dyn GraphStore>,
        config: HybridConfig,
    ) -> Self {
        let cache = SearchCache::new(config.cache_ttl, SearchCache::DEFAULT_MAX_ENTRIES);
        Self {
            ctx: StrategyContext {
                vector,
                graph,
                config,
            },
            cache,
        }
    }

    pub fn config(&self) -> &HybridConfig {
        &self.ctx.config
    }

    /// Drop all cached results.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Run one hybrid search.
    #[instrument(skip(self, filters, options), fields(%strategy))]
    pub async fn search(
        &self,
        query: &str,
        strategy: SearchStrategy,
        context_domains: Option<&[String]>,
        filters: Option<&serde_json::Value>,
        options: &SearchOptions,
    ) -> SearchResult {
        let start = Instant::now();
        let key = cache_key(query, strategy, context_domains, filters);

        if self.ctx.config.enable_caching {
            if let Some(hit) = self.cache.get(&key) {
                info!("cache hit");
                return hit;
            }
        }

        let dispatch = strategy_for(strategy).run(&self.ctx, query, context_domains, filters, options);
        let outcome = tokio::time::timeout(self.ctx.config.backend_timeout, dispatch).await;

        let result = match outcome {
            Ok(Ok(raw)) => {
                let result = self.finish(query, strategy, raw, start);
                // Best-effort: failed searches are never cached, completed
                // ones always are.
                if self.ctx.config.enable_caching {
                    self.cache.put(key, result.clone());
                }
                result
            }
            Ok(Err(err)) => {
                error!(error = %err, "search failed");
                self.failure(query, strategy, &err.to_string(), start)
            }
            Err(_) => {
                error!(timeout = ?self.ctx.config.backend_timeout, "search timed out");
                let err = Error::Search(format!(
                    "timed out after {:?}",
                    self.ctx.config.backend_timeout
                ));
                self.failure(query, strategy, &err.to_string(), start)
            }
        };

        info!(
            results = result.results.len(),
            confidence = result.confidence_score,
            elapsed_ms = result.execution_time.as_millis() as u64,
            "search complete"
        );
        result
    }

    fn finish(
        &self,
        query: &str,
        strategy: SearchStrategy,
        raw: RawResults,
        start: Instant,
    ) -> SearchResult {
        let results = match raw.prefused {
            Some(prefused) => prefused,
            None => fusion::fuse(
                &raw.vector_results,
                &raw.graph_results,
                &raw.weights,
                self.ctx.config.fusion_strategy,
                self.ctx.config.max_results,
            ),
        };
        let confidence = confidence_score(&results, strategy);
        SearchResult {
            query: query.to_string(),
            strategy,
            results,
            sources: raw.sources,
            metadata: raw.metadata,
            execution_time: start.elapsed(),
            confidence_score: confidence,
        }
    }

    fn failure(
        &self,
        query: &str,
        strategy: SearchStrategy,
        message: &str,
        start: Instant,
    ) -> SearchResult {
        let mut metadata = serde_json::Map::new();
        metadata.insert("error".into(), json!(message));
        SearchResult {
            query: query.to_string(),
            strategy,
            results: Vec::new(),
            sources: Default::default(),
            metadata,
            execution_time: start.elapsed(),
            confidence_score: 0.0,
        }
    }

    /// Close both backends. Idempotent.
    pub async fn shutdown(&self) {
        if let Err(err) = self.ctx.vector.close().await {
            warn!(error = %err, "vector store close failed");
        }
        if let Err(err) = self.ctx.graph.close().await {
            warn!(error = %err, "graph store close failed");
        }
    }
}
