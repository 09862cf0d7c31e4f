//! Data types crossing the store trait boundaries.

use std::collections::HashMap;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// A document handed to the vector store for indexing.
#[derive(Debug, Clone, Default)]
pub struct VectorDocument {
    pub content: String,
    pub title: String,
    /// Stable external id; when present, writes are upserts keyed by it.
    pub entity_id: Option<String>,
    pub source: String,
    pub document_type: String,
    pub domain: String,
    pub metadata: Option<serde_json::Value>,
}

/// A chunk upserted into the graph store, linked to a synthetic parent
/// document node via a PART_OF relationship.
#[derive(Debug, Clone)]
pub struct ChunkNode {
    pub id: String,
    pub content: String,
    pub title: String,
    pub chunk_index: usize,
    pub parent_document_id: String,
    pub document_type: String,
    pub source: String,
    pub domain: String,
    pub embedding: Option<Array1<f32>>,
    pub metadata: Option<serde_json::Value>,
}

/// A structured record written to the graph store, optionally with
/// extracted entity references (MENTIONS edges).
#[derive(Debug, Clone)]
pub struct RecordNode {
    pub id: String,
    pub content: String,
    pub domain: String,
    pub embedding: Option<Array1<f32>>,
    pub metadata: Option<serde_json::Value>,
    pub entities: Vec<EntityRef>,
}

/// A candidate entity derived from a structured record field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub name: String,
    pub entity_type: String,
}

/// One relationship in an entity's direct context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEntry {
    pub relationship: String,
    pub related_entity: String,
    pub related_content: String,
    pub related_type: String,
}

/// Contextual information around one entity, used by multi-step search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRecord {
    pub id: String,
    pub name: String,
    pub content: String,
    pub direct_context: Vec<ContextEntry>,
}

/// Vector store readiness/liveness probe result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HealthStatus {
    pub ready: bool,
    pub live: bool,
}

/// Graph store statistics for observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub nodes_by_label: HashMap<String, usize>,
}
