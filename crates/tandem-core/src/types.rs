//! Shared result types exchanged between the stores and the orchestrator.

use serde::{Deserialize, Serialize};

/// Which backend produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    /// Vector/semantic index.
    Vector,
    /// Property-graph index.
    Graph,
}

impl std::fmt::Display for ResultSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultSource::Vector => write!(f, "vector"),
            ResultSource::Graph => write!(f, "graph"),
        }
    }
}

/// One ranked hit from either backend.
///
/// `score` is the backend-native relevance; `fusion_score` is assigned by
/// result fusion and is the sole key for final ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedItem {
    pub id: String,
    pub content: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub score: f64,
    pub fusion_score: f64,
    pub source: ResultSource,
    /// Edge count of the traversal path (graph expansion results).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hops: Option<usize>,
    /// Relationship types along the traversal path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship_path: Option<Vec<String>>,
    /// Decayed path score before blending with content similarity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_relevance: Option<f64>,
    /// Cosine similarity of the intent embedding against the node embedding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_similarity: Option<f64>,
}

impl RankedItem {
    /// Construct a plain hit with no graph-specific fields.
    pub fn new(
        id: impl Into<String>,
        content: impl Into<String>,
        title: impl Into<String>,
        score: f64,
        source: ResultSource,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            title: title.into(),
            metadata: None,
            score,
            fusion_score: 0.0,
            source,
            hops: None,
            relationship_path: None,
            path_relevance: None,
            content_similarity: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_display() {
        assert_eq!(ResultSource::Vector.to_string(), "vector");
        assert_eq!(ResultSource::Graph.to_string(), "graph");
    }

    #[test]
    fn test_ranked_item_serializes_without_empty_options() {
        let item = RankedItem::new("c1", "body", "title", 0.9, ResultSource::Vector);
        let json = serde_json::to_string(&item).unwrap();
        assert!(!json.contains("hops"));
        assert!(!json.contains("relationship_path"));
        assert!(json.contains("\"source\":\"vector\""));
    }
}
