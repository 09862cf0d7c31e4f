//! Vector store trait and in-memory backend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use ndarray::Array1;
use tracing::debug;

use tandem_core::{RankedItem, Result, ResultSource};

use crate::embedding::{cosine_similarity, Embedder};
use crate::score::keyword_overlap;
use crate::types::{HealthStatus, VectorDocument};

/// Semantic index capability consumed by the orchestrator and the pipeline.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Open the connection. Fatal on failure; there is no degraded mode
    /// without a working backend.
    async fn connect(&self) -> Result<()>;

    /// Release the connection. Idempotent.
    async fn close(&self) -> Result<()>;

    /// Create the document schema if missing. Returns whether it was created.
    async fn create_schema(&self) -> Result<bool>;

    /// Vector similarity search, filtered by `threshold` post-hoc. `filters`
    /// is an object of metadata key/value equality constraints.
    async fn semantic_search(
        &self,
        query: &str,
        limit: usize,
        threshold: f64,
        filters: Option<&serde_json::Value>,
    ) -> Result<Vec<RankedItem>>;

    /// Blended vector + keyword search. `alpha` = 0 is pure keyword,
    /// 1 is pure vector.
    async fn hybrid_search(
        &self,
        query: &str,
        keywords: &[String],
        limit: usize,
        alpha: f64,
    ) -> Result<Vec<RankedItem>>;

    /// Rerank arbitrary text snippets against the query. Results carry
    /// positional ids, so they never collide with stored document ids.
    async fn refine_results(
        &self,
        query: &str,
        candidates: &[String],
        threshold: f64,
    ) -> Result<Vec<RankedItem>>;

    /// Index one document. Returns its id. Upsert when `entity_id` is set.
    async fn add_document(&self, doc: VectorDocument) -> Result<String>;

    /// Index documents in batches of `batch_size`. Returns ids in order.
    async fn batch_add_documents(
        &self,
        docs: Vec<VectorDocument>,
        batch_size: usize,
    ) -> Result<Vec<String>>;

    /// Total indexed documents.
    async fn document_count(&self) -> Result<u64>;

    /// Readiness/liveness probe.
    async fn health_check(&self) -> Result<HealthStatus>;
}

struct StoredDocument {
    doc: VectorDocument,
    embedding: Array1<f32>,
}

/// In-memory vector backend: a concurrent map of documents with embeddings
/// computed at insert time.
pub struct MemoryVectorStore {
    docs: DashMap<String, StoredDocument>,
    embedder: Arc<dyn Embedder>,
    next_id: AtomicU64,
}

impl MemoryVectorStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            docs: DashMap::new(),
            embedder,
            next_id: AtomicU64::new(0),
        }
    }

    fn matches_filters(doc: &VectorDocument, filters: Option<&serde_json::Value>) -> bool {
        let Some(serde_json::Value::Object(map)) = filters else {
            return true;
        };
        map.iter().all(|(key, expected)| match key.as_str() {
            "domain" => doc.domain == expected.as_str().unwrap_or_default(),
            "document_type" => doc.document_type == expected.as_str().unwrap_or_default(),
            "source" => doc.source == expected.as_str().unwrap_or_default(),
            _ => doc
                .metadata
                .as_ref()
                .and_then(|m| m.get(key))
                .map(|v| v == expected)
                .unwrap_or(false),
        })
    }

    fn to_item(id: &str, stored: &StoredDocument, score: f64) -> RankedItem {
        let mut item = RankedItem::new(
            id,
            stored.doc.content.clone(),
            stored.doc.title.clone(),
            score,
            ResultSource::Vector,
        );
        item.metadata = stored.doc.metadata.clone();
        item
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    async fn create_schema(&self) -> Result<bool> {
        Ok(true)
    }

    async fn semantic_search(
        &self,
        query: &str,
        limit: usize,
        threshold: f64,
        filters: Option<&serde_json::Value>,
    ) -> Result<Vec<RankedItem>> {
        let query_vec = self.embedder.embed(query).await?;

        let mut hits: Vec<RankedItem> = self
            .docs
            .iter()
            .filter(|entry| Self::matches_filters(&entry.value().doc, filters))
            .filter_map(|entry| {
                let score = cosine_similarity(&query_vec, &entry.value().embedding);
                (score >= threshold).then(|| Self::to_item(entry.key(), entry.value(), score))
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        debug!(query, hits = hits.len(), "semantic search");
        Ok(hits)
    }

    async fn hybrid_search(
        &self,
        query: &str,
        keywords: &[String],
        limit: usize,
        alpha: f64,
    ) -> Result<Vec<RankedItem>> {
        let query_vec = self.embedder.embed(query).await?;
        let keyword_text = if keywords.is_empty() {
            query.to_string()
        } else {
            keywords.join(" ")
        };

        let mut hits: Vec<RankedItem> = self
            .docs
            .iter()
            .filter_map(|entry| {
                let vec_score = cosine_similarity(&query_vec, &entry.value().embedding);
                let kw_score = keyword_overlap(&keyword_text, &entry.value().doc.content);
                let score = alpha * vec_score + (1.0 - alpha) * kw_score;
                (score > 0.0).then(|| Self::to_item(entry.key(), entry.value(), score))
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn refine_results(
        &self,
        query: &str,
        candidates: &[String],
        threshold: f64,
    ) -> Result<Vec<RankedItem>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = self.embedder.embed(query).await?;
        let candidate_vecs = self.embedder.embed_batch(candidates).await?;

        let mut hits: Vec<RankedItem> = candidates
            .iter()
            .zip(candidate_vecs.iter())
            .enumerate()
            .filter_map(|(i, (text, vec))| {
                let score = cosine_similarity(&query_vec, vec);
                (score >= threshold).then(|| {
                    RankedItem::new(
                        format!("refined_{i}"),
                        text.clone(),
                        String::new(),
                        score,
                        ResultSource::Vector,
                    )
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(hits)
    }

    async fn add_document(&self, doc: VectorDocument) -> Result<String> {
        let id = doc.entity_id.clone().unwrap_or_else(|| {
            format!("vec_{}", self.next_id.fetch_add(1, Ordering::Relaxed))
        });
        let embedding = self.embedder.embed(&doc.content).await?;
        self.docs.insert(id.clone(), StoredDocument { doc, embedding });
        Ok(id)
    }

    async fn batch_add_documents(
        &self,
        docs: Vec<VectorDocument>,
        batch_size: usize,
    ) -> Result<Vec<String>> {
        let mut ids = Vec::with_capacity(docs.len());
        for batch in docs.chunks(batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|d| d.content.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;
            for (doc, embedding) in batch.iter().cloned().zip(embeddings) {
                let id = doc.entity_id.clone().unwrap_or_else(|| {
                    format!("vec_{}", self.next_id.fetch_add(1, Ordering::Relaxed))
                });
                self.docs.insert(id.clone(), StoredDocument { doc, embedding });
                ids.push(id);
            }
        }
        debug!(count = ids.len(), "batch indexed documents");
        Ok(ids)
    }

    async fn document_count(&self) -> Result<u64> {
        Ok(self.docs.len() as u64)
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        Ok(HealthStatus { ready: true, live: true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;

    fn store() -> MemoryVectorStore {
        MemoryVectorStore::new(Arc::new(HashEmbedder::new(256)))
    }

    fn doc(content: &str, domain: &str) -> VectorDocument {
        VectorDocument {
            content: content.to_string(),
            title: content.split_whitespace().next().unwrap_or("").to_string(),
            domain: domain.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_semantic_search_ranks_by_similarity() {
        let store = store();
        store.add_document(doc("rust async runtime scheduling", "eng")).await.unwrap();
        store.add_document(doc("gardening tips for spring", "home")).await.unwrap();

        let hits = store
            .semantic_search("async runtime for rust", 10, 0.0, None)
            .await
            .unwrap();
        assert!(!hits.is_empty());
        assert!(hits[0].content.contains("rust"));
    }

    #[tokio::test]
    async fn test_semantic_search_threshold_filters() {
        let store = store();
        store.add_document(doc("completely unrelated text", "x")).await.unwrap();
        let hits = store
            .semantic_search("quantum chromodynamics lattice", 10, 0.9, None)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_domain_filter() {
        let store = store();
        store.add_document(doc("shared topic words here", "a")).await.unwrap();
        store.add_document(doc("shared topic words here too", "b")).await.unwrap();

        let filters = serde_json::json!({"domain": "a"});
        let hits = store
            .semantic_search("shared topic words", 10, 0.0, Some(&filters))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_by_entity_id() {
        let store = store();
        let mut d = doc("first version", "x");
        d.entity_id = Some("doc_0".to_string());
        store.add_document(d).await.unwrap();

        let mut d2 = doc("second version", "x");
        d2.entity_id = Some("doc_0".to_string());
        store.add_document(d2).await.unwrap();

        assert_eq!(store.document_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_refine_results_positional_ids() {
        let store = store();
        let candidates = vec![
            "rust memory safety".to_string(),
            "cooking pasta at home".to_string(),
        ];
        let hits = store
            .refine_results("rust memory model", &candidates, 0.0)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.id.starts_with("refined_")));
        assert!(hits[0].content.contains("rust"));
    }

    #[tokio::test]
    async fn test_health_check() {
        let store = store();
        let health = store.health_check().await.unwrap();
        assert!(health.ready && health.live);
    }

    #[tokio::test]
    async fn test_hybrid_search_alpha_extremes() {
        let store = store();
        store.add_document(doc("alpha beta gamma", "x")).await.unwrap();

        // Pure keyword: exact token overlap wins
        let kw = store
            .hybrid_search("alpha beta", &[], 10, 0.0)
            .await
            .unwrap();
        assert!(!kw.is_empty());
        assert!((kw[0].score - 1.0).abs() < 1e-9);
    }
}
