//! Tandem Store: collaborator traits and in-memory reference backends.
//!
//! The orchestrator and the ingestion pipeline only see the `VectorStore`,
//! `GraphStore`, and `Embedder` traits. Production deployments plug in real
//! engine clients behind these seams; the `Memory*` backends here implement
//! the same contracts locally so the whole system runs and tests without
//! external services.

pub mod embedding;
pub mod graph;
mod score;
pub mod types;
pub mod vector;

pub use embedding::{cosine_similarity, Embedder, HashEmbedder, ModelInfo, NoopEmbedder};
pub use graph::{GraphStore, MemoryGraphStore};
pub use types::{
    ChunkNode, ContextEntry, ContextRecord, DatabaseStats, EntityRef, HealthStatus, RecordNode,
    VectorDocument,
};
pub use vector::{MemoryVectorStore, VectorStore};
