//! The four search strategies behind the orchestrator.
//!
//! Each strategy decides how the vector and graph backends are consulted and
//! which fusion weights apply; fusion itself happens in the orchestrator
//! unless the strategy ranks its own output (`RawResults::prefused`).

mod balanced;
mod graph_first;
mod multi_step;
mod semantic_first;

use std::sync::Arc;

use async_trait::async_trait;

use tandem_core::{HybridConfig, Result};
use tandem_store::{GraphStore, VectorStore};

use crate::types::{RawResults, SearchOptions, SearchStrategy};

pub use balanced::Balanced;
pub use graph_first::GraphFirst;
pub use multi_step::MultiStep;
pub use semantic_first::SemanticFirst;

/// Backends and configuration handed to a strategy run.
pub struct StrategyContext {
    pub vector: Arc<dyn VectorStore>,
    pub graph: Arc<dyn GraphStore>,
    pub config: HybridConfig,
}

/// One way of routing a query across the two backends.
#[async_trait]
pub trait Strategy: Send + Sync {
    async fn run(
        &self,
        ctx: &StrategyContext,
        query: &str,
        context_domains: Option<&[String]>,
        filters: Option<&serde_json::Value>,
        options: &SearchOptions,
    ) -> Result<RawResults>;
}

/// Static dispatch table from the strategy selector to its implementation.
pub fn strategy_for(strategy: SearchStrategy) -> &'static dyn Strategy {
    match strategy {
        SearchStrategy::SemanticFirst => &SemanticFirst,
        SearchStrategy::GraphFirst => &GraphFirst,
        SearchStrategy::Balanced => &Balanced,
        SearchStrategy::MultiStep => &MultiStep,
    }
}
