//! Tandem Search: hybrid retrieval over a vector index and a property graph.
//!
//! [`HybridSearchOrchestrator`] is the single entry point: it checks the
//! result cache, dispatches the query to one of four [`SearchStrategy`]
//! implementations, fuses the backend result lists, and attaches a
//! confidence score. Backend failures never escape `search`; they come back
//! as an empty [`SearchResult`] carrying the error in its metadata.

pub mod cache;
pub mod fusion;
pub mod orchestrator;
pub mod strategies;
pub mod types;

pub use cache::{cache_key, SearchCache};
pub use orchestrator::HybridSearchOrchestrator;
pub use types::{
    FusionWeights, RawResults, SearchOptions, SearchResult, SearchStrategy,
};
