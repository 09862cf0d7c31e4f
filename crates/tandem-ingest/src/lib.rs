//! Tandem Ingest: text chunking, file extraction, dual-write pipeline.

pub mod chunking;
pub mod file;
pub mod pipeline;

pub use chunking::{split_sentences, ChunkStrategy, Chunker};
pub use file::{discover_files, extract_text};
pub use pipeline::{DocumentChunk, IngestionPipeline, IngestionStats, ProcessingStats};
