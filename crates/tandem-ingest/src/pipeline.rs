//! Dual-write ingestion pipeline: source → chunks → embeddings → both stores.
//!
//! Every failure below the public methods is recovered into
//! `ProcessingStats.errors`; only `initialize` may surface a fatal error,
//! since there is no degraded mode without working backend connections.
//!
//! The vector-store batch write and the per-chunk graph upserts are not a
//! transaction. A crash between them leaves the stores inconsistent,
//! observable only as mismatched document counts.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info};

use tandem_core::{Error, Result};
use tandem_store::{
    ChunkNode, DatabaseStats, Embedder, EntityRef, GraphStore, ModelInfo, RecordNode,
    VectorDocument, VectorStore,
};

use crate::chunking::{ChunkStrategy, Chunker};
use crate::file;

/// Index names created at bootstrap.
const VECTOR_INDEX: &str = "document_embeddings";
const FULLTEXT_INDEX: &str = "document_fulltext";

/// A bounded span of a parent document, written once to both stores.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentChunk {
    pub content: String,
    pub title: String,
    pub chunk_index: usize,
    pub parent_document_id: String,
    pub document_type: String,
    pub source: String,
    pub metadata: serde_json::Value,
}

impl DocumentChunk {
    /// Stable chunk id: parent id + position.
    pub fn id(&self) -> String {
        format!("{}_{}", self.parent_document_id, self.chunk_index)
    }
}

/// Accumulator for one ingestion run. Returned by value from each call,
/// never shared across concurrent invocations.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessingStats {
    pub documents_processed: usize,
    pub chunks_created: usize,
    pub entities_extracted: usize,
    pub relationships_created: usize,
    pub embeddings_generated: usize,
    pub errors: Vec<String>,
}

/// Read-only aggregation for observability.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionStats {
    pub processing: ProcessingStats,
    pub vector_document_count: u64,
    pub graph_stats: DatabaseStats,
    pub embedding_model: ModelInfo,
    pub timestamp: chrono::DateTime<Utc>,
}

/// Turns raw sources into chunks, generates embeddings, and writes to both
/// stores best-effort.
pub struct IngestionPipeline {
    vector: Arc<dyn VectorStore>,
    graph: Arc<dyn GraphStore>,
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
}

impl IngestionPipeline {
    pub fn new(
        vector: Arc<dyn VectorStore>,
        graph: Arc<dyn GraphStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            vector,
            graph,
            embedder,
            chunker: Chunker::default(),
        }
    }

    pub fn with_chunker(mut self, chunker: Chunker) -> Self {
        self.chunker = chunker;
        self
    }

    /// Connect both stores and bootstrap schema plus indexes. Fatal on
    /// failure. Idempotent: index creation reports false when already
    /// present.
    pub async fn initialize(&self) -> Result<()> {
        info!("initializing ingestion pipeline");
        self.vector.connect().await?;
        self.graph.connect().await?;

        self.vector.create_schema().await?;
        self.graph
            .create_vector_index(
                VECTOR_INDEX,
                "Document",
                "embedding",
                self.embedder.dimension(),
            )
            .await?;
        self.graph
            .create_fulltext_index(
                FULLTEXT_INDEX,
                &[
                    "Document".to_string(),
                    "Entity".to_string(),
                    "Concept".to_string(),
                ],
                &[
                    "content".to_string(),
                    "title".to_string(),
                    "description".to_string(),
                ],
            )
            .await?;

        info!("pipeline initialized");
        Ok(())
    }

    /// Release both store connections. Idempotent; callers must invoke this
    /// on all exit paths.
    pub async fn cleanup(&self) -> Result<()> {
        self.vector.close().await?;
        self.graph.close().await?;
        Ok(())
    }

    /// Ingest a file or a directory tree of supported files.
    ///
    /// A failure processing one file is recorded in `errors` and does not
    /// abort the run. Chunk batches are flushed once they reach
    /// `batch_size`, plus a final flush for the remainder.
    pub async fn ingest_documents(
        &self,
        source_path: &Path,
        chunk_strategy: ChunkStrategy,
        domain: Option<&str>,
        metadata: Option<&serde_json::Value>,
        batch_size: usize,
    ) -> Result<ProcessingStats> {
        info!(path = %source_path.display(), "starting document ingestion");
        if !source_path.exists() {
            return Err(Error::NotFound(format!(
                "source path not found: {}",
                source_path.display()
            )));
        }

        let mut stats = ProcessingStats::default();
        let files = file::discover_files(source_path)?;
        info!(files = files.len(), "discovered files");

        let batch_size = batch_size.max(1);
        let mut chunk_batch: Vec<DocumentChunk> = Vec::new();

        for file_path in &files {
            match self
                .process_document(file_path, chunk_strategy, domain, metadata)
                .await
            {
                Ok(chunks) => {
                    chunk_batch.extend(chunks);
                    stats.documents_processed += 1;
                    if chunk_batch.len() >= batch_size {
                        let batch = std::mem::take(&mut chunk_batch);
                        self.flush_batch(batch, &mut stats).await;
                    }
                }
                Err(e) => {
                    let msg = format!("failed to process {}: {e}", file_path.display());
                    error!("{msg}");
                    stats.errors.push(msg);
                }
            }
        }

        if !chunk_batch.is_empty() {
            self.flush_batch(chunk_batch, &mut stats).await;
        }

        info!(
            documents = stats.documents_processed,
            chunks = stats.chunks_created,
            errors = stats.errors.len(),
            "document ingestion completed"
        );
        Ok(stats)
    }

    /// Extract, chunk, and wrap one source file.
    async fn process_document(
        &self,
        file_path: &Path,
        chunk_strategy: ChunkStrategy,
        domain: Option<&str>,
        base_metadata: Option<&serde_json::Value>,
    ) -> Result<Vec<DocumentChunk>> {
        debug!(file = %file_path.display(), "processing document");

        let content = file::extract_text(file_path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let parent_id = document_id(file_path);
        let chunks = self
            .chunker
            .chunk(&content, chunk_strategy, &self.embedder)
            .await?;
        let total = chunks.len();

        let title = file_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();
        let document_type = file_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string();
        let file_size = std::fs::metadata(file_path).map(|m| m.len()).unwrap_or(0);

        let document_chunks = chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk_content)| {
                let mut metadata = base_metadata
                    .and_then(|m| m.as_object().cloned())
                    .unwrap_or_default();
                metadata.insert(
                    "file_path".to_string(),
                    serde_json::json!(file_path.display().to_string()),
                );
                metadata.insert("file_size".to_string(), serde_json::json!(file_size));
                metadata.insert(
                    "processed_at".to_string(),
                    serde_json::json!(Utc::now().to_rfc3339()),
                );
                metadata.insert("total_chunks".to_string(), serde_json::json!(total));
                if let Some(domain) = domain {
                    metadata.insert("domain".to_string(), serde_json::json!(domain));
                }

                DocumentChunk {
                    content: chunk_content,
                    title: title.clone(),
                    chunk_index: i,
                    parent_document_id: parent_id.clone(),
                    document_type: document_type.clone(),
                    source: file_path.display().to_string(),
                    metadata: serde_json::Value::Object(metadata),
                }
            })
            .collect::<Vec<_>>();

        debug!(
            file = %file_path.display(),
            chunks = document_chunks.len(),
            "created chunks"
        );
        Ok(document_chunks)
    }

    /// Embed one batch and dual-write it: a single batched vector-store
    /// write, then one graph upsert per chunk. Either side failing is
    /// recorded and the run continues.
    async fn flush_batch(&self, chunks: Vec<DocumentChunk>, stats: &mut ProcessingStats) {
        debug!(batch = chunks.len(), "flushing chunk batch");

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = match self.embedder.embed_batch(&texts).await {
            Ok(e) => e,
            Err(e) => {
                let msg = format!("embedding batch failed: {e}");
                error!("{msg}");
                stats.errors.push(msg);
                return;
            }
        };

        let domain_of = |chunk: &DocumentChunk| {
            chunk
                .metadata
                .get("domain")
                .and_then(|d| d.as_str())
                .unwrap_or("")
                .to_string()
        };

        let vector_docs: Vec<VectorDocument> = chunks
            .iter()
            .map(|chunk| VectorDocument {
                content: chunk.content.clone(),
                title: chunk.title.clone(),
                entity_id: Some(chunk.id()),
                source: chunk.source.clone(),
                document_type: chunk.document_type.clone(),
                domain: domain_of(chunk),
                metadata: Some(chunk.metadata.clone()),
            })
            .collect();

        if let Err(e) = self
            .vector
            .batch_add_documents(vector_docs, chunks.len())
            .await
        {
            let msg = format!("vector store batch write failed: {e}");
            error!("{msg}");
            stats.errors.push(msg);
        }

        for (chunk, embedding) in chunks.iter().zip(embeddings.into_iter()) {
            let node = ChunkNode {
                id: chunk.id(),
                content: chunk.content.clone(),
                title: chunk.title.clone(),
                chunk_index: chunk.chunk_index,
                parent_document_id: chunk.parent_document_id.clone(),
                document_type: chunk.document_type.clone(),
                source: chunk.source.clone(),
                domain: domain_of(chunk),
                embedding: Some(embedding),
                metadata: Some(chunk.metadata.clone()),
            };
            if let Err(e) = self.graph.upsert_chunk(node).await {
                let msg = format!("graph insertion error for {}: {e}", chunk.id());
                error!("{msg}");
                stats.errors.push(msg);
            }
        }

        stats.chunks_created += chunks.len();
        stats.embeddings_generated += chunks.len();
    }

    /// Ingest structured records: each is flattened to searchable text,
    /// embedded, written to the vector store, and written to the graph
    /// store as a record node, with MENTIONS edges to heuristically
    /// derived entities when `extract_relationships` is set. One record's
    /// failure is recorded and does not abort the batch.
    pub async fn ingest_structured_data(
        &self,
        records: &[serde_json::Value],
        source_name: &str,
        extract_relationships: bool,
        domain: Option<&str>,
    ) -> Result<ProcessingStats> {
        info!(source = source_name, records = records.len(), "ingesting structured data");
        let mut stats = ProcessingStats::default();

        for (i, record) in records.iter().enumerate() {
            let record_id = format!("{source_name}_{i}");
            if let Err(e) = self
                .process_structured_record(
                    record,
                    &record_id,
                    extract_relationships,
                    domain,
                    &mut stats,
                )
                .await
            {
                let msg = format!("failed to process record {i}: {e}");
                error!("{msg}");
                stats.errors.push(msg);
            } else {
                stats.documents_processed += 1;
            }
        }

        info!(
            records = stats.documents_processed,
            errors = stats.errors.len(),
            "structured data ingestion completed"
        );
        Ok(stats)
    }

    async fn process_structured_record(
        &self,
        record: &serde_json::Value,
        record_id: &str,
        extract_relationships: bool,
        domain: Option<&str>,
        stats: &mut ProcessingStats,
    ) -> Result<()> {
        let object = record
            .as_object()
            .ok_or_else(|| Error::Validation("structured record must be an object".to_string()))?;

        let content = record_to_text(object);
        if content.trim().is_empty() {
            return Err(Error::Validation("record flattened to empty text".to_string()));
        }

        let embedding = self.embedder.embed(&content).await?;

        let title = object
            .get("title")
            .and_then(|t| t.as_str())
            .unwrap_or(record_id)
            .to_string();

        self.vector
            .add_document(VectorDocument {
                content: content.clone(),
                title,
                entity_id: Some(record_id.to_string()),
                source: "structured_data".to_string(),
                document_type: "record".to_string(),
                domain: domain.unwrap_or("").to_string(),
                metadata: Some(serde_json::json!({
                    "source": "structured_data",
                    "original_record": record,
                    "processed_at": Utc::now().to_rfc3339(),
                })),
            })
            .await?;

        let entities = if extract_relationships {
            extract_entity_candidates(object)
        } else {
            Vec::new()
        };
        let entity_count = entities.len();

        self.graph
            .add_record(RecordNode {
                id: record_id.to_string(),
                content,
                domain: domain.unwrap_or("").to_string(),
                embedding: Some(embedding),
                metadata: Some(record.clone()),
                entities,
            })
            .await?;

        stats.chunks_created += 1;
        stats.embeddings_generated += 1;
        stats.entities_extracted += entity_count;
        stats.relationships_created += entity_count;
        Ok(())
    }

    /// Read-only aggregation of the latest run plus live store counters.
    pub async fn ingestion_stats(&self, processing: &ProcessingStats) -> Result<IngestionStats> {
        let graph_stats = self.graph.database_stats().await?;
        let vector_document_count = self.vector.document_count().await?;
        Ok(IngestionStats {
            processing: processing.clone(),
            vector_document_count,
            graph_stats,
            embedding_model: self.embedder.model_info(),
            timestamp: Utc::now(),
        })
    }
}

/// Stable parent document id: hash of the source path.
fn document_id(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.display().to_string().as_bytes());
    hex::encode(&hasher.finalize()[..16])
}

/// Flatten a structured record into searchable text: title-like fields
/// first, then content-like fields, then remaining scalars as `key: value`
/// lines.
fn record_to_text(record: &serde_json::Map<String, serde_json::Value>) -> String {
    const TITLE_FIELDS: [&str; 4] = ["title", "name", "subject", "heading"];
    const CONTENT_FIELDS: [&str; 4] = ["description", "content", "summary", "body"];

    let mut parts = Vec::new();

    for field in TITLE_FIELDS {
        if let Some(value) = record.get(field).and_then(|v| v.as_str()) {
            parts.push(format!("{}: {value}", capitalize(field)));
        }
    }
    for field in CONTENT_FIELDS {
        if let Some(value) = record.get(field) {
            parts.push(scalar_to_string(value));
        }
    }
    for (key, value) in record {
        if TITLE_FIELDS.contains(&key.as_str()) || CONTENT_FIELDS.contains(&key.as_str()) {
            continue;
        }
        if value.is_string() || value.is_number() || value.is_boolean() {
            parts.push(format!("{key}: {}", scalar_to_string(value)));
        }
    }

    parts.join("\n")
}

/// String-valued fields of at most five words are treated as candidate
/// entity names; the field name becomes the entity type.
fn extract_entity_candidates(
    record: &serde_json::Map<String, serde_json::Value>,
) -> Vec<EntityRef> {
    record
        .iter()
        .filter_map(|(key, value)| {
            let text = value.as_str()?;
            (!text.trim().is_empty() && text.split_whitespace().count() <= 5).then(|| EntityRef {
                name: text.to_string(),
                entity_type: key.clone(),
            })
        })
        .collect()
}

fn scalar_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
