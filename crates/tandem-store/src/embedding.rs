//! Embedder trait and local implementations.
//!
//! `HashEmbedder` is a deterministic feature-hashing embedder: no model
//! files, stable output for a given input, good enough for the memory
//! backends and for tests. `NoopEmbedder` always fails, for exercising the
//! degraded paths.

use async_trait::async_trait;
use ndarray::Array1;
use serde::Serialize;

use tandem_core::{Error, Result};

/// Descriptive information about the embedding model in use.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub dimension: usize,
}

/// Text-to-vector capability consumed by the stores and the pipeline.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Array1<f32>>;

    /// Embed a batch of texts, preserving order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Array1<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Embedding dimension.
    fn dimension(&self) -> usize;

    /// Model name and dimension for stats reporting.
    fn model_info(&self) -> ModelInfo;
}

/// Cosine similarity between two vectors. Returns 0.0 for zero vectors or
/// mismatched dimensions.
pub fn cosine_similarity(a: &Array1<f32>, b: &Array1<f32>) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.dot(b);
    let norm_a = a.dot(a).sqrt();
    let norm_b = b.dot(b).sqrt();
    if norm_a < 1e-9 || norm_b < 1e-9 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}

/// Deterministic feature-hashing embedder.
///
/// Tokens are lowercased, FNV-1a hashed into `dim` buckets, and the bucket
/// counts are L2-normalized. Two texts sharing vocabulary land near each
/// other, which is all the memory backends need.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn embed_sync(&self, text: &str) -> Array1<f32> {
        let mut buckets = vec![0.0f32; self.dim];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let h = fnv1a(token.to_lowercase().as_bytes());
            buckets[(h % self.dim as u64) as usize] += 1.0;
        }
        let mut v = Array1::from_vec(buckets);
        let norm = v.dot(&v).sqrt();
        if norm > 1e-9 {
            v.mapv_inplace(|x| x / norm);
        }
        v
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Array1<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            name: "feature-hash".to_string(),
            dimension: self.dim,
        }
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Embedder that is never available. Used to exercise recovery paths.
pub struct NoopEmbedder {
    dim: usize,
}

impl NoopEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

#[async_trait]
impl Embedder for NoopEmbedder {
    async fn embed(&self, _text: &str) -> Result<Array1<f32>> {
        Err(Error::Backend("embedder unavailable".to_string()))
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            name: "noop".to_string(),
            dimension: self.dim,
        }
    }
}
