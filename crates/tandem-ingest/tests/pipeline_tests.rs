//! End-to-end pipeline tests over the in-memory backends.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tandem_ingest::{ChunkStrategy, Chunker, IngestionPipeline};
use tandem_store::{
    Embedder, GraphStore, HashEmbedder, MemoryGraphStore, MemoryVectorStore, NoopEmbedder,
    VectorStore,
};

fn pipeline() -> (IngestionPipeline, Arc<MemoryVectorStore>, Arc<MemoryGraphStore>) {
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(128));
    let vector = Arc::new(MemoryVectorStore::new(embedder.clone()));
    let graph = Arc::new(MemoryGraphStore::new(embedder.clone()));
    let pipeline = IngestionPipeline::new(vector.clone(), graph.clone(), embedder)
        .with_chunker(Chunker::new(50, 10));
    (pipeline, vector, graph)
}

fn write_corpus(dir: &Path, n: usize) {
    for i in 0..n {
        fs::write(
            dir.join(format!("doc{i}.txt")),
            format!("Document number {i}. It talks about retrieval systems and ranking."),
        )
        .unwrap();
    }
}

#[tokio::test]
async fn ingest_missing_path_is_not_found() {
    let (pipeline, _, _) = pipeline();
    let err = pipeline
        .ingest_documents(Path::new("/no/such/dir"), ChunkStrategy::Fixed, None, None, 10)
        .await
        .unwrap_err();
    assert!(matches!(err, tandem_core::Error::NotFound(_)));
}

#[tokio::test]
async fn ingest_continues_past_failing_file() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path(), 3);
    // .docx has no extractor; processing it fails per-file
    fs::write(dir.path().join("broken.docx"), b"PK\x03\x04").unwrap();

    let (pipeline, vector, _) = pipeline();
    pipeline.initialize().await.unwrap();
    let stats = pipeline
        .ingest_documents(dir.path(), ChunkStrategy::Fixed, None, None, 10)
        .await
        .unwrap();
    pipeline.cleanup().await.unwrap();

    assert_eq!(stats.documents_processed, 3);
    assert_eq!(stats.errors.len(), 1);
    assert!(stats.errors[0].contains("broken.docx"));
    assert!(vector.document_count().await.unwrap() > 0);
}

#[tokio::test]
async fn ingest_populates_both_stores() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path(), 2);

    let (pipeline, vector, graph) = pipeline();
    pipeline.initialize().await.unwrap();
    let stats = pipeline
        .ingest_documents(dir.path(), ChunkStrategy::Paragraph, Some("eng"), None, 10)
        .await
        .unwrap();

    assert_eq!(stats.documents_processed, 2);
    assert!(stats.chunks_created >= 2);
    assert_eq!(stats.embeddings_generated, stats.chunks_created);
    assert_eq!(
        vector.document_count().await.unwrap(),
        stats.chunks_created as u64
    );
    // Graph holds each chunk plus one parent node per document
    let graph_stats = graph.database_stats().await.unwrap();
    assert_eq!(graph_stats.node_count, stats.chunks_created + 2);
}

#[tokio::test]
async fn chunk_indexes_are_contiguous_per_document() {
    let dir = tempfile::tempdir().unwrap();
    let body: String = (0..200)
        .map(|i| format!("word{i}"))
        .collect::<Vec<_>>()
        .join(" ");
    fs::write(dir.path().join("long.txt"), &body).unwrap();

    let (pipeline, _, graph) = pipeline();
    let stats = pipeline
        .ingest_documents(dir.path(), ChunkStrategy::Fixed, None, None, 100)
        .await
        .unwrap();
    assert!(stats.chunks_created > 1);

    // Every chunk node is one PART_OF hop from the same parent
    let graph_stats = graph.database_stats().await.unwrap();
    assert_eq!(graph_stats.node_count, stats.chunks_created + 1);
    assert_eq!(graph_stats.edge_count, stats.chunks_created);
}

#[tokio::test]
async fn reingest_overwrites_instead_of_duplicating() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("doc.txt"), "stable content for upsert check").unwrap();

    let (pipeline, vector, graph) = pipeline();
    pipeline
        .ingest_documents(dir.path(), ChunkStrategy::Fixed, None, None, 10)
        .await
        .unwrap();
    let first_vec = vector.document_count().await.unwrap();
    let first_graph = graph.database_stats().await.unwrap().node_count;

    pipeline
        .ingest_documents(dir.path(), ChunkStrategy::Fixed, None, None, 10)
        .await
        .unwrap();
    assert_eq!(vector.document_count().await.unwrap(), first_vec);
    assert_eq!(graph.database_stats().await.unwrap().node_count, first_graph);
}

#[tokio::test]
async fn structured_data_with_relationships() {
    let (pipeline, vector, graph) = pipeline();

    let records = vec![
        serde_json::json!({
            "name": "Jordan Park",
            "employer": "Globex",
            "description": "Operations lead coordinating the logistics network",
        }),
        serde_json::json!({
            "name": "Sam Reyes",
            "employer": "Globex",
            "description": "Data analyst focused on supply metrics",
        }),
    ];

    let stats = pipeline
        .ingest_structured_data(&records, "personas", true, Some("org"))
        .await
        .unwrap();

    assert_eq!(stats.documents_processed, 2);
    assert_eq!(stats.chunks_created, 2);
    assert!(stats.entities_extracted >= 2);
    assert_eq!(stats.relationships_created, stats.entities_extracted);
    assert_eq!(vector.document_count().await.unwrap(), 2);

    // Shared employer entity is merged into one node
    let graph_stats = graph.database_stats().await.unwrap();
    assert_eq!(graph_stats.nodes_by_label.get("Record"), Some(&2));
    let entities = graph_stats.nodes_by_label.get("Entity").copied().unwrap_or(0);
    assert!(entities < 4, "shared entity names must merge");
}

#[tokio::test]
async fn structured_data_records_failures_per_item() {
    let (pipeline, _, _) = pipeline();
    let records = vec![
        serde_json::json!({"name": "ok record", "description": "fine"}),
        serde_json::json!("not an object"),
    ];

    let stats = pipeline
        .ingest_structured_data(&records, "mixed", false, None)
        .await
        .unwrap();
    assert_eq!(stats.documents_processed, 1);
    assert_eq!(stats.errors.len(), 1);
    assert!(stats.errors[0].contains("record 1"));
}

#[tokio::test]
async fn embedder_failure_is_recovered_not_raised() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path(), 1);

    let embedder: Arc<dyn Embedder> = Arc::new(NoopEmbedder::new(128));
    let vector = Arc::new(MemoryVectorStore::new(embedder.clone()));
    let graph = Arc::new(MemoryGraphStore::new(embedder.clone()));
    let pipeline = IngestionPipeline::new(vector, graph, embedder);

    let stats = pipeline
        .ingest_documents(dir.path(), ChunkStrategy::Fixed, None, None, 10)
        .await
        .unwrap();
    assert_eq!(stats.chunks_created, 0);
    assert!(!stats.errors.is_empty());
}

#[tokio::test]
async fn ingestion_stats_aggregates_stores() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path(), 1);

    let (pipeline, _, _) = pipeline();
    let stats = pipeline
        .ingest_documents(dir.path(), ChunkStrategy::Fixed, None, None, 10)
        .await
        .unwrap();

    let agg = pipeline.ingestion_stats(&stats).await.unwrap();
    assert_eq!(agg.processing.documents_processed, 1);
    assert_eq!(agg.vector_document_count, stats.chunks_created as u64);
    assert!(agg.graph_stats.node_count > 0);
    assert_eq!(agg.embedding_model.dimension, 128);
}
