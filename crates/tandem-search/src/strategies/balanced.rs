//! Both backends concurrently, fused with query-adaptive weights.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use tandem_core::{RankedItem, Result};

use crate::types::{FusionWeights, RawResults, SearchOptions};

use super::{Strategy, StrategyContext};

const DEFAULT_LIMIT: usize = 25;
const GRAPH_VECTOR_WEIGHT: f64 = 0.6;
const GRAPH_FULLTEXT_WEIGHT: f64 = 0.4;

/// Cue words suggesting the query is about structure and relationships.
const GRAPH_KEYWORDS: &[&str] = &[
    "relationship",
    "connected",
    "related",
    "impact",
    "cause",
    "effect",
    "network",
];

/// Cue words suggesting the query is about meaning and similarity.
const SEMANTIC_KEYWORDS: &[&str] = &["similar", "like", "meaning", "concept", "understanding"];

/// Queries both backends in parallel and picks fusion weights from the query
/// wording and the relative strength of each result set.
pub struct Balanced;

#[async_trait]
impl Strategy for Balanced {
    async fn run(
        &self,
        ctx: &StrategyContext,
        query: &str,
        context_domains: Option<&[String]>,
        filters: Option<&Value>,
        options: &SearchOptions,
    ) -> Result<RawResults> {
        let limit = options.limit.unwrap_or(DEFAULT_LIMIT);

        let (vector_outcome, graph_outcome) = tokio::join!(
            ctx.vector
                .semantic_search(query, limit, ctx.config.similarity_threshold, filters),
            ctx.graph.hybrid_search(
                query,
                context_domains,
                limit,
                GRAPH_VECTOR_WEIGHT,
                GRAPH_FULLTEXT_WEIGHT,
            ),
        );

        // One failing backend degrades to the other; both failing is fatal.
        let (vector_results, graph_results) = match (vector_outcome, graph_outcome) {
            (Ok(v), Ok(g)) => (v, g),
            (Ok(v), Err(err)) => {
                warn!(error = %err, "graph leg failed, proceeding with vector only");
                (v, Vec::new())
            }
            (Err(err), Ok(g)) => {
                warn!(error = %err, "vector leg failed, proceeding with graph only");
                (Vec::new(), g)
            }
            (Err(err), Err(_)) => return Err(err),
        };

        let weights = determine_fusion_weights(query, &vector_results, &graph_results);
        debug!(
            semantic = weights.semantic,
            graph = weights.graph,
            "adaptive weights selected"
        );

        let total = vector_results.len() + graph_results.len();
        let mut raw = RawResults::new(weights);
        raw.sources.insert("vector".into(), vector_results.len());
        raw.sources.insert("graph".into(), graph_results.len());
        raw.metadata
            .insert("strategy_details".into(), json!("balanced_parallel"));
        raw.metadata
            .insert("fusion_weights".into(), serde_json::to_value(weights)?);
        raw.metadata.insert("total_candidates".into(), json!(total));
        raw.vector_results = vector_results;
        raw.graph_results = graph_results;
        Ok(raw)
    }
}

/// Tilt toward a backend only when both its keyword signal count and its
/// average native score dominate; everything else stays neutral.
pub(crate) fn determine_fusion_weights(
    query: &str,
    vector_results: &[RankedItem],
    graph_results: &[RankedItem],
) -> FusionWeights {
    let lowered = query.to_lowercase();
    let graph_signals = GRAPH_KEYWORDS.iter().filter(|kw| lowered.contains(*kw)).count();
    let semantic_signals = SEMANTIC_KEYWORDS
        .iter()
        .filter(|kw| lowered.contains(*kw))
        .count();

    let vector_avg = average_score(vector_results);
    let graph_avg = average_score(graph_results);

    if graph_signals > semantic_signals && graph_avg > vector_avg {
        FusionWeights::new(0.3, 0.7)
    } else if semantic_signals > graph_signals && vector_avg > graph_avg {
        FusionWeights::new(0.7, 0.3)
    } else {
        FusionWeights::new(0.5, 0.5)
    }
}

fn average_score(items: &[RankedItem]) -> f64 {
    if items.is_empty() {
        return 0.0;
    }
    items.iter().map(|i| i.score).sum::<f64>() / items.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::ResultSource;

    fn items(scores: &[f64], source: ResultSource) -> Vec<RankedItem> {
        scores
            .iter()
            .enumerate()
            .map(|(i, &s)| RankedItem::new(format!("{source}_{i}"), "c", "t", s, source))
            .collect()
    }

    #[test]
    fn graph_signal_and_score_dominance_tilt_toward_graph() {
        let weights = determine_fusion_weights(
            "how are these services related",
            &items(&[0.5], ResultSource::Vector),
            &items(&[0.8], ResultSource::Graph),
        );
        assert_eq!(weights, FusionWeights::new(0.3, 0.7));
    }

    #[test]
    fn semantic_signal_and_score_dominance_tilt_toward_vector() {
        let weights = determine_fusion_weights(
            "find documents similar to this report",
            &items(&[0.9], ResultSource::Vector),
            &items(&[0.4], ResultSource::Graph),
        );
        assert_eq!(weights, FusionWeights::new(0.7, 0.3));
    }

    #[test]
    fn keyword_without_score_dominance_stays_neutral() {
        let weights = determine_fusion_weights(
            "how are these services related",
            &items(&[0.9], ResultSource::Vector),
            &items(&[0.2], ResultSource::Graph),
        );
        assert_eq!(weights, FusionWeights::new(0.5, 0.5));
    }

    #[test]
    fn score_dominance_without_keywords_stays_neutral() {
        let weights = determine_fusion_weights(
            "deployment runbook",
            &items(&[0.9, 0.7], ResultSource::Vector),
            &items(&[0.4, 0.2], ResultSource::Graph),
        );
        assert_eq!(weights, FusionWeights::new(0.5, 0.5));
    }

    #[test]
    fn empty_result_sets_stay_neutral() {
        let weights = determine_fusion_weights("how are these related", &[], &[]);
        assert_eq!(weights, FusionWeights::new(0.5, 0.5));
    }
}
