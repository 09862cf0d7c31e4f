//! Graph store trait and in-memory petgraph backend.
//!
//! The memory backend keeps chunks, parent documents, structured records,
//! and entities as nodes in a `DiGraph`. Traversal is undirected (edges are
//! followed both ways), matching how the production graph engines answer
//! `-[*1..h]-` patterns.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ndarray::Array1;
use parking_lot::RwLock;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use tracing::debug;

use tandem_core::{RankedItem, Result, ResultSource};

use crate::embedding::{cosine_similarity, Embedder};
use crate::score::keyword_overlap;
use crate::types::{ChunkNode, ContextEntry, ContextRecord, DatabaseStats, RecordNode};

/// Flat per-edge decay used by plain entity expansion.
const EXPANSION_DECAY: f64 = 0.8;

/// Relevance floor below which graph search hits are dropped.
const GRAPH_SEARCH_FLOOR: f64 = 0.3;

/// Per-relationship-type decay for intent-aware graph search.
fn relationship_decay(relationship: &str) -> f64 {
    match relationship {
        "RELATES_TO" => 0.9,
        "PART_OF" => 0.8,
        "SIMILAR_TO" => 0.7,
        _ => 0.6,
    }
}

/// Relationship/entity index capability consumed by the orchestrator and
/// the pipeline.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Open the connection. Fatal on failure.
    async fn connect(&self) -> Result<()>;

    /// Release the connection. Idempotent.
    async fn close(&self) -> Result<()>;

    /// Create a vector index over node embeddings. Returns whether created.
    async fn create_vector_index(
        &self,
        name: &str,
        label: &str,
        property: &str,
        dimensions: usize,
    ) -> Result<bool>;

    /// Create a full-text index over the given labels/properties.
    async fn create_fulltext_index(
        &self,
        name: &str,
        labels: &[String],
        properties: &[String],
    ) -> Result<bool>;

    /// Cosine search over node embeddings.
    async fn vector_search(
        &self,
        query_vector: &Array1<f32>,
        index_name: &str,
        limit: usize,
        score_threshold: f64,
    ) -> Result<Vec<RankedItem>>;

    /// Native blended vector + full-text search, optionally scoped to
    /// `context_domains`.
    async fn hybrid_search(
        &self,
        query: &str,
        context_domains: Option<&[String]>,
        limit: usize,
        vector_weight: f64,
        fulltext_weight: f64,
    ) -> Result<Vec<RankedItem>>;

    /// Multi-hop expansion seeded by node ids. Path score decays by a flat
    /// 0.8 per traversed edge.
    async fn expand_from_entities(
        &self,
        entity_ids: &[String],
        max_hops: usize,
        relationship_types: Option<&[String]>,
    ) -> Result<Vec<RankedItem>>;

    /// Intent-aware search from entity names: per-relationship-type path
    /// decay blended 40/60 with intent-embedding similarity, floored at 0.3.
    async fn graph_search(
        &self,
        entities: &[String],
        query_intent: &str,
        max_hops: usize,
        limit: usize,
    ) -> Result<Vec<RankedItem>>;

    /// Entity names from the graph mentioned by the query text.
    async fn extract_entities_from_query(&self, query: &str) -> Result<Vec<String>>;

    /// Direct-relationship context for the given node ids.
    async fn get_context_for_entities(&self, entity_ids: &[String])
        -> Result<Vec<ContextRecord>>;

    /// Upsert a chunk node linked PART_OF to its synthetic parent document.
    async fn upsert_chunk(&self, chunk: ChunkNode) -> Result<()>;

    /// Create a record node, plus MENTIONS edges to its extracted entities.
    async fn add_record(&self, record: RecordNode) -> Result<()>;

    /// Node/edge counts for observability.
    async fn database_stats(&self) -> Result<DatabaseStats>;
}

/// A node in the memory graph.
#[derive(Debug, Clone)]
struct GraphNodeData {
    id: String,
    /// Entity name; empty for chunk/record nodes.
    name: String,
    title: String,
    content: String,
    label: String,
    domain: String,
    embedding: Option<Array1<f32>>,
    metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
struct GraphEdgeData {
    relationship: String,
}

#[derive(Debug, Clone)]
struct Reached {
    score: f64,
    hops: usize,
    path: Vec<String>,
}

struct GraphInner {
    graph: DiGraph<GraphNodeData, GraphEdgeData>,
    node_index: HashMap<String, NodeIndex>,
    indexes: Vec<String>,
}

/// In-memory graph backend over petgraph.
pub struct MemoryGraphStore {
    inner: RwLock<GraphInner>,
    embedder: Arc<dyn Embedder>,
}

impl MemoryGraphStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            inner: RwLock::new(GraphInner {
                graph: DiGraph::new(),
                node_index: HashMap::new(),
                indexes: Vec::new(),
            }),
            embedder,
        }
    }

    fn upsert_node(inner: &mut GraphInner, node: GraphNodeData) -> NodeIndex {
        if let Some(&idx) = inner.node_index.get(&node.id) {
            inner.graph[idx] = node;
            idx
        } else {
            let id = node.id.clone();
            let idx = inner.graph.add_node(node);
            inner.node_index.insert(id, idx);
            idx
        }
    }

    fn ensure_edge(inner: &mut GraphInner, from: NodeIndex, to: NodeIndex, relationship: &str) {
        let exists = inner
            .graph
            .edges(from)
            .any(|e| e.target() == to && e.weight().relationship == relationship);
        if !exists {
            inner.graph.add_edge(
                from,
                to,
                GraphEdgeData {
                    relationship: relationship.to_string(),
                },
            );
        }
    }

    /// Undirected neighbors with the connecting relationship type.
    fn neighbors(inner: &GraphInner, node: NodeIndex) -> Vec<(NodeIndex, String)> {
        let mut out = Vec::new();
        for dir in [Direction::Outgoing, Direction::Incoming] {
            for edge in inner.graph.edges_directed(node, dir) {
                let other = if dir == Direction::Outgoing {
                    edge.target()
                } else {
                    edge.source()
                };
                out.push((other, edge.weight().relationship.clone()));
            }
        }
        out
    }

    /// Bounded relaxation from `seeds`: per reached node, keep the best
    /// decayed path score within `max_hops` edges.
    fn traverse(
        inner: &GraphInner,
        seeds: &[NodeIndex],
        max_hops: usize,
        relationship_types: Option<&[String]>,
        decay: &dyn Fn(&str) -> f64,
    ) -> HashMap<NodeIndex, Reached> {
        let mut best: HashMap<NodeIndex, Reached> = HashMap::new();
        let mut frontier: HashMap<NodeIndex, Reached> = seeds
            .iter()
            .map(|&s| {
                (
                    s,
                    Reached {
                        score: 1.0,
                        hops: 0,
                        path: Vec::new(),
                    },
                )
            })
            .collect();

        for _ in 0..max_hops {
            let mut next: HashMap<NodeIndex, Reached> = HashMap::new();
            for (node, reached) in &frontier {
                for (neighbor, relationship) in Self::neighbors(inner, *node) {
                    if let Some(allowed) = relationship_types {
                        if !allowed.iter().any(|r| r == &relationship) {
                            continue;
                        }
                    }
                    let score = reached.score * decay(&relationship);
                    let mut path = reached.path.clone();
                    path.push(relationship);
                    let candidate = Reached {
                        score,
                        hops: reached.hops + 1,
                        path,
                    };
                    let improves = |existing: &Reached| candidate.score > existing.score;
                    if !seeds.contains(&neighbor)
                        && best.get(&neighbor).map(&improves).unwrap_or(true)
                    {
                        best.insert(neighbor, candidate.clone());
                    }
                    if next.get(&neighbor).map(&improves).unwrap_or(true) {
                        next.insert(neighbor, candidate);
                    }
                }
            }
            frontier = next;
            if frontier.is_empty() {
                break;
            }
        }

        best
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    async fn create_vector_index(
        &self,
        name: &str,
        _label: &str,
        _property: &str,
        dimensions: usize,
    ) -> Result<bool> {
        let mut inner = self.inner.write();
        if inner.indexes.iter().any(|i| i == name) {
            return Ok(false);
        }
        debug!(name, dimensions, "created vector index");
        inner.indexes.push(name.to_string());
        Ok(true)
    }

    async fn create_fulltext_index(
        &self,
        name: &str,
        _labels: &[String],
        _properties: &[String],
    ) -> Result<bool> {
        let mut inner = self.inner.write();
        if inner.indexes.iter().any(|i| i == name) {
            return Ok(false);
        }
        inner.indexes.push(name.to_string());
        Ok(true)
    }

    async fn vector_search(
        &self,
        query_vector: &Array1<f32>,
        _index_name: &str,
        limit: usize,
        score_threshold: f64,
    ) -> Result<Vec<RankedItem>> {
        let inner = self.inner.read();
        let mut hits: Vec<RankedItem> = inner
            .graph
            .node_weights()
            .filter_map(|node| {
                let embedding = node.embedding.as_ref()?;
                let score = cosine_similarity(query_vector, embedding);
                (score >= score_threshold).then(|| {
                    let mut item = RankedItem::new(
                        node.id.clone(),
                        node.content.clone(),
                        node.title.clone(),
                        score,
                        ResultSource::Graph,
                    );
                    item.metadata = node.metadata.clone();
                    item
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn hybrid_search(
        &self,
        query: &str,
        context_domains: Option<&[String]>,
        limit: usize,
        vector_weight: f64,
        fulltext_weight: f64,
    ) -> Result<Vec<RankedItem>> {
        let query_vec = self.embedder.embed(query).await?;
        let inner = self.inner.read();

        let mut hits: Vec<RankedItem> = inner
            .graph
            .node_weights()
            .filter(|node| !node.content.is_empty())
            .filter(|node| {
                context_domains
                    .map(|domains| domains.iter().any(|d| d == &node.domain))
                    .unwrap_or(true)
            })
            .filter_map(|node| {
                let vec_score = node
                    .embedding
                    .as_ref()
                    .map(|e| cosine_similarity(&query_vec, e))
                    .unwrap_or(0.0);
                let text = format!("{} {}", node.title, node.content);
                let ft_score = keyword_overlap(query, &text);
                let score = vector_weight * vec_score + fulltext_weight * ft_score;
                (score > 0.0).then(|| {
                    let mut item = RankedItem::new(
                        node.id.clone(),
                        node.content.clone(),
                        node.title.clone(),
                        score,
                        ResultSource::Graph,
                    );
                    item.metadata = node.metadata.clone();
                    item
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn expand_from_entities(
        &self,
        entity_ids: &[String],
        max_hops: usize,
        relationship_types: Option<&[String]>,
    ) -> Result<Vec<RankedItem>> {
        let inner = self.inner.read();
        let seeds: Vec<NodeIndex> = entity_ids
            .iter()
            .filter_map(|id| inner.node_index.get(id).copied())
            .collect();
        if seeds.is_empty() {
            return Ok(Vec::new());
        }

        let reached = Self::traverse(&inner, &seeds, max_hops, relationship_types, &|_| {
            EXPANSION_DECAY
        });

        let mut hits: Vec<RankedItem> = reached
            .into_iter()
            .map(|(idx, r)| {
                let node = &inner.graph[idx];
                let mut item = RankedItem::new(
                    node.id.clone(),
                    node.content.clone(),
                    node.title.clone(),
                    r.score,
                    ResultSource::Graph,
                );
                item.metadata = node.metadata.clone();
                item.hops = Some(r.hops);
                item.relationship_path = Some(r.path);
                item
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(50);
        debug!(seeds = seeds.len(), hits = hits.len(), "entity expansion");
        Ok(hits)
    }

    async fn graph_search(
        &self,
        entities: &[String],
        query_intent: &str,
        max_hops: usize,
        limit: usize,
    ) -> Result<Vec<RankedItem>> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }
        let intent_vec = self.embedder.embed(query_intent).await?;
        let inner = self.inner.read();

        let seeds: Vec<NodeIndex> = inner
            .graph
            .node_indices()
            .filter(|&idx| {
                let node = &inner.graph[idx];
                entities.iter().any(|e| {
                    let e = e.to_lowercase();
                    (!node.name.is_empty() && node.name.to_lowercase().contains(&e))
                        || (!node.title.is_empty() && node.title.to_lowercase().contains(&e))
                })
            })
            .collect();
        if seeds.is_empty() {
            return Ok(Vec::new());
        }

        let reached = Self::traverse(&inner, &seeds, max_hops, None, &relationship_decay);

        let mut hits: Vec<RankedItem> = reached
            .into_iter()
            .filter_map(|(idx, r)| {
                let node = &inner.graph[idx];
                if node.content.is_empty() {
                    return None;
                }
                let content_similarity = node
                    .embedding
                    .as_ref()
                    .map(|e| cosine_similarity(&intent_vec, e))
                    .unwrap_or(0.0);
                let score = r.score * 0.4 + content_similarity * 0.6;
                if score <= GRAPH_SEARCH_FLOOR {
                    return None;
                }
                let mut item = RankedItem::new(
                    node.id.clone(),
                    node.content.clone(),
                    node.title.clone(),
                    score,
                    ResultSource::Graph,
                );
                item.metadata = node.metadata.clone();
                item.hops = Some(r.hops);
                item.path_relevance = Some(r.score);
                item.content_similarity = Some(content_similarity);
                Some(item)
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn extract_entities_from_query(&self, query: &str) -> Result<Vec<String>> {
        let words: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            .filter(|w| !w.is_empty())
            .collect();

        let inner = self.inner.read();
        let mut matches: Vec<(String, usize)> = inner
            .graph
            .node_weights()
            .filter(|node| !node.name.is_empty())
            .filter_map(|node| {
                let name = node.name.to_lowercase();
                let count = words.iter().filter(|w| name.contains(w.as_str())).count();
                (count > 0).then(|| (node.name.clone(), count))
            })
            .collect();

        matches.sort_by(|a, b| b.1.cmp(&a.1));
        matches.truncate(10);
        Ok(matches.into_iter().map(|(name, _)| name).collect())
    }

    async fn get_context_for_entities(
        &self,
        entity_ids: &[String],
    ) -> Result<Vec<ContextRecord>> {
        let inner = self.inner.read();
        let mut records = Vec::new();

        for id in entity_ids {
            let Some(&idx) = inner.node_index.get(id) else {
                continue;
            };
            let node = &inner.graph[idx];
            let direct_context: Vec<ContextEntry> = Self::neighbors(&inner, idx)
                .into_iter()
                .filter_map(|(other, relationship)| {
                    let related = &inner.graph[other];
                    if related.content.is_empty() {
                        return None;
                    }
                    Some(ContextEntry {
                        relationship,
                        related_entity: related.name.clone(),
                        related_content: related.content.clone(),
                        related_type: related.label.clone(),
                    })
                })
                .collect();

            records.push(ContextRecord {
                id: node.id.clone(),
                name: node.name.clone(),
                content: node.content.clone(),
                direct_context,
            });
        }

        Ok(records)
    }

    async fn upsert_chunk(&self, chunk: ChunkNode) -> Result<()> {
        let mut inner = self.inner.write();

        let chunk_idx = Self::upsert_node(
            &mut inner,
            GraphNodeData {
                id: chunk.id.clone(),
                name: String::new(),
                title: chunk.title.clone(),
                content: chunk.content,
                label: "Document".to_string(),
                domain: chunk.domain.clone(),
                embedding: chunk.embedding,
                metadata: chunk.metadata,
            },
        );

        // Synthetic parent node; never overwrite an existing one so earlier
        // chunks' parent link targets stay stable.
        let parent_idx = match inner.node_index.get(&chunk.parent_document_id).copied() {
            Some(idx) => idx,
            None => Self::upsert_node(
                &mut inner,
                GraphNodeData {
                    id: chunk.parent_document_id.clone(),
                    name: String::new(),
                    title: chunk.title,
                    content: String::new(),
                    label: "Document".to_string(),
                    domain: chunk.domain,
                    embedding: None,
                    metadata: Some(serde_json::json!({
                        "is_parent": true,
                        "document_type": chunk.document_type,
                        "source": chunk.source,
                    })),
                },
            ),
        };

        Self::ensure_edge(&mut inner, chunk_idx, parent_idx, "PART_OF");
        Ok(())
    }

    async fn add_record(&self, record: RecordNode) -> Result<()> {
        let mut inner = self.inner.write();

        let record_idx = Self::upsert_node(
            &mut inner,
            GraphNodeData {
                id: record.id.clone(),
                name: String::new(),
                title: String::new(),
                content: record.content,
                label: "Record".to_string(),
                domain: record.domain,
                embedding: record.embedding,
                metadata: record.metadata,
            },
        );

        for entity in record.entities {
            let entity_id = format!(
                "entity:{}:{}",
                entity.entity_type.to_lowercase(),
                entity.name.to_lowercase()
            );
            // MERGE by name + type
            let entity_idx = match inner.node_index.get(&entity_id).copied() {
                Some(idx) => idx,
                None => Self::upsert_node(
                    &mut inner,
                    GraphNodeData {
                        id: entity_id,
                        name: entity.name,
                        title: String::new(),
                        content: String::new(),
                        label: "Entity".to_string(),
                        domain: String::new(),
                        embedding: None,
                        metadata: Some(serde_json::json!({"type": entity.entity_type})),
                    },
                ),
            };
            Self::ensure_edge(&mut inner, record_idx, entity_idx, "MENTIONS");
        }

        Ok(())
    }

    async fn database_stats(&self) -> Result<DatabaseStats> {
        let inner = self.inner.read();
        let mut nodes_by_label: HashMap<String, usize> = HashMap::new();
        for node in inner.graph.node_weights() {
            *nodes_by_label.entry(node.label.clone()).or_default() += 1;
        }
        Ok(DatabaseStats {
            node_count: inner.graph.node_count(),
            edge_count: inner.graph.edge_count(),
            nodes_by_label,
        })
    }
}
