//! Vector search first, then graph expansion from the hit ids.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use tandem_core::Result;

use crate::types::{FusionWeights, RawResults, SearchOptions};

use super::{Strategy, StrategyContext};

const DEFAULT_SEMANTIC_LIMIT: usize = 20;

/// Leads with the semantic index and uses the graph only to enrich its hits,
/// so fusion leans 70/30 toward the vector backend.
pub struct SemanticFirst;

#[async_trait]
impl Strategy for SemanticFirst {
    async fn run(
        &self,
        ctx: &StrategyContext,
        query: &str,
        _context_domains: Option<&[String]>,
        filters: Option<&Value>,
        options: &SearchOptions,
    ) -> Result<RawResults> {
        let limit = options.semantic_limit.unwrap_or(DEFAULT_SEMANTIC_LIMIT);
        let vector_results = ctx
            .vector
            .semantic_search(query, limit, ctx.config.similarity_threshold, filters)
            .await?;
        debug!(hits = vector_results.len(), "semantic pass complete");

        let entity_ids: Vec<String> = vector_results
            .iter()
            .filter(|item| !item.id.is_empty())
            .map(|item| item.id.clone())
            .collect();

        // Expansion is an enrichment pass; losing it degrades the result set
        // but must not fail the query.
        let max_hops = options.max_hops.unwrap_or(ctx.config.max_hops);
        let graph_results = if entity_ids.is_empty() {
            Vec::new()
        } else {
            match ctx
                .graph
                .expand_from_entities(&entity_ids, max_hops, options.relationship_types.as_deref())
                .await
            {
                Ok(expanded) => expanded,
                Err(err) => {
                    warn!(error = %err, "graph expansion failed, continuing without it");
                    Vec::new()
                }
            }
        };

        let mut raw = RawResults::new(FusionWeights::new(0.7, 0.3));
        raw.sources.insert("vector".into(), vector_results.len());
        raw.sources.insert("graph".into(), graph_results.len());
        raw.metadata
            .insert("strategy_details".into(), json!("semantic_first"));
        raw.metadata.insert(
            "fusion_method".into(),
            serde_json::to_value(ctx.config.fusion_strategy)?,
        );
        raw.vector_results = vector_results;
        raw.graph_results = graph_results;
        Ok(raw)
    }
}
