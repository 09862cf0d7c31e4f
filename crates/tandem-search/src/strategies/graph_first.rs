//! Entity-driven graph traversal first, then vector refinement of its hits.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use tandem_core::Result;

use crate::types::{FusionWeights, RawResults, SearchOptions};

use super::{Strategy, StrategyContext};

const DEFAULT_GRAPH_LIMIT: usize = 30;

/// Extracts entities from the query, traverses the graph from them, then
/// reranks the traversal content semantically. Fusion leans 80/20 toward the
/// graph backend.
pub struct GraphFirst;

#[async_trait]
impl Strategy for GraphFirst {
    async fn run(
        &self,
        ctx: &StrategyContext,
        query: &str,
        _context_domains: Option<&[String]>,
        _filters: Option<&Value>,
        options: &SearchOptions,
    ) -> Result<RawResults> {
        let entities = ctx.graph.extract_entities_from_query(query).await?;
        debug!(count = entities.len(), "entities identified in query");

        let limit = options.graph_limit.unwrap_or(DEFAULT_GRAPH_LIMIT);
        let max_hops = options.max_hops.unwrap_or(ctx.config.max_hops);
        let graph_results = ctx
            .graph
            .graph_search(&entities, query, max_hops, limit)
            .await?;

        // Rerank traversal content against the query. Refinement hits carry
        // positional ids, so they never merge with graph hits during fusion.
        let vector_results = if graph_results.is_empty() {
            Vec::new()
        } else {
            let candidates: Vec<String> = graph_results
                .iter()
                .map(|item| item.content.clone())
                .collect();
            match ctx
                .vector
                .refine_results(query, &candidates, ctx.config.similarity_threshold)
                .await
            {
                Ok(refined) => refined,
                Err(err) => {
                    warn!(error = %err, "semantic refinement failed, keeping graph order");
                    Vec::new()
                }
            }
        };

        let mut raw = RawResults::new(FusionWeights::new(0.2, 0.8));
        raw.sources.insert("graph".into(), graph_results.len());
        raw.sources.insert("vector".into(), vector_results.len());
        raw.metadata
            .insert("strategy_details".into(), json!("graph_first"));
        raw.metadata
            .insert("identified_entities".into(), json!(entities));
        raw.vector_results = vector_results;
        raw.graph_results = graph_results;
        Ok(raw)
    }
}
