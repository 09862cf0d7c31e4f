//! Request and response types for hybrid search.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use tandem_core::RankedItem;

/// How a query is routed across the vector and graph backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    /// Vector search first, then graph expansion from the hits.
    SemanticFirst,
    /// Entity-driven graph traversal first, then vector refinement.
    GraphFirst,
    /// Both backends concurrently with adaptive fusion weights.
    Balanced,
    /// Iterative broad-then-context search over several steps.
    MultiStep,
}

impl fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SearchStrategy::SemanticFirst => "semantic_first",
            SearchStrategy::GraphFirst => "graph_first",
            SearchStrategy::Balanced => "balanced",
            SearchStrategy::MultiStep => "multi_step",
        };
        f.write_str(name)
    }
}

/// Per-query overrides for strategy parameters. Every field falls back to a
/// strategy-specific default when unset.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchOptions {
    /// Candidate count for the initial vector pass (semantic-first).
    pub semantic_limit: Option<usize>,
    /// Candidate count for graph traversal (graph-first).
    pub graph_limit: Option<usize>,
    /// Per-backend candidate count for the balanced strategy.
    pub limit: Option<usize>,
    /// Traversal depth override; defaults to the configured `max_hops`.
    pub max_hops: Option<usize>,
    /// Step count for the multi-step strategy.
    pub max_steps: Option<usize>,
    /// Restrict graph expansion to these relationship types.
    pub relationship_types: Option<Vec<String>>,
}

/// Relative weight of each backend when fusing ranked lists.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub semantic: f64,
    pub graph: f64,
}

impl FusionWeights {
    pub fn new(semantic: f64, graph: f64) -> Self {
        Self { semantic, graph }
    }
}

/// What a single strategy run produced, before fusion and scoring.
#[derive(Debug, Clone)]
pub struct RawResults {
    /// Hits from the vector backend, in native rank order.
    pub vector_results: Vec<RankedItem>,
    /// Hits from the graph backend, in native rank order.
    pub graph_results: Vec<RankedItem>,
    /// Weights the strategy chose for fusion.
    pub weights: FusionWeights,
    /// Per-backend candidate counts reported to the caller.
    pub sources: HashMap<String, usize>,
    /// Strategy-specific diagnostics merged into the response metadata.
    pub metadata: Map<String, Value>,
    /// A strategy may rank its own output, bypassing fusion entirely.
    pub prefused: Option<Vec<RankedItem>>,
}

impl RawResults {
    pub fn new(weights: FusionWeights) -> Self {
        Self {
            vector_results: Vec::new(),
            graph_results: Vec::new(),
            weights,
            sources: HashMap::new(),
            metadata: Map::new(),
            prefused: None,
        }
    }
}

/// The response envelope for a hybrid search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub query: String,
    pub strategy: SearchStrategy,
    pub results: Vec<RankedItem>,
    /// How many candidates each backend contributed.
    pub sources: HashMap<String, usize>,
    pub metadata: Map<String, Value>,
    pub execution_time: Duration,
    /// In `[0.0, 1.0]`; 0.0 for empty or failed searches.
    pub confidence_score: f64,
}

impl SearchResult {
    /// One-line description suitable for logs and CLIs.
    pub fn summary(&self) -> String {
        format!(
            "{} results for '{}' via {} (confidence {:.2}, {}ms)",
            self.results.len(),
            self.query,
            self.strategy,
            self.confidence_score,
            self.execution_time.as_millis()
        )
    }
}
