//! Combines ranked lists from the vector and graph backends into one ordering.

use tandem_core::{FusionStrategy, RankedItem};

use crate::types::FusionWeights;

/// Rank-offset constant for reciprocal rank fusion. Dampens the gap between
/// the top few ranks so that agreement between backends outweighs position.
const RRF_K: f64 = 60.0;

/// Fuse two ranked lists under the given weights and truncate to `max_results`.
///
/// Items sharing an id across (or within) the lists accumulate a combined
/// fusion score; ids are never merged into one entry, so a document surfaced
/// by both backends appears once per backend, each copy carrying its
/// accumulated score at the time it was visited.
pub fn fuse(
    vector_results: &[RankedItem],
    graph_results: &[RankedItem],
    weights: &FusionWeights,
    algorithm: FusionStrategy,
    max_results: usize,
) -> Vec<RankedItem> {
    let mut fused = match algorithm {
        FusionStrategy::ReciprocalRank => reciprocal_rank(vector_results, graph_results, weights),
        FusionStrategy::Weighted => weighted(vector_results, graph_results, weights, false),
        FusionStrategy::Linear => weighted(vector_results, graph_results, weights, true),
    };
    fused.sort_by(|a, b| {
        b.fusion_score
            .partial_cmp(&a.fusion_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    fused.truncate(max_results);
    fused
}

/// Key items by native id, falling back to a positional synthetic id so that
/// id-less items still participate without colliding.
fn fusion_key(item: &RankedItem, list: &str, position: usize) -> String {
    if item.id.is_empty() {
        format!("{list}_{position}")
    } else {
        item.id.clone()
    }
}

fn reciprocal_rank(
    vector_results: &[RankedItem],
    graph_results: &[RankedItem],
    weights: &FusionWeights,
) -> Vec<RankedItem> {
    let mut scores: std::collections::HashMap<String, f64> = std::collections::HashMap::new();
    let mut fused = Vec::with_capacity(vector_results.len() + graph_results.len());

    for (list, items, weight) in [
        ("vector", vector_results, weights.semantic),
        ("graph", graph_results, weights.graph),
    ] {
        for (rank, item) in items.iter().enumerate() {
            let key = fusion_key(item, list, rank);
            let entry = scores.entry(key).or_insert(0.0);
            *entry += weight / (RRF_K + rank as f64 + 1.0);
            let mut out = item.clone();
            out.fusion_score = *entry;
            fused.push(out);
        }
    }
    fused
}

/// Weight-scaled fusion over min-max normalized native scores. With `decay`
/// set, each item is additionally discounted by `1 / (1 + rank)` so that the
/// original list order still matters when native scores are flat.
fn weighted(
    vector_results: &[RankedItem],
    graph_results: &[RankedItem],
    weights: &FusionWeights,
    decay: bool,
) -> Vec<RankedItem> {
    let mut fused = Vec::with_capacity(vector_results.len() + graph_results.len());
    for (items, weight) in [
        (vector_results, weights.semantic),
        (graph_results, weights.graph),
    ] {
        for (rank, normalized) in normalize(items).into_iter().enumerate() {
            let mut out = items[rank].clone();
            out.fusion_score = normalized * weight;
            if decay {
                out.fusion_score /= 1.0 + rank as f64;
            }
            fused.push(out);
        }
    }
    fused
}

/// Min-max normalize native scores into `[0, 1]`. A constant-score list maps
/// to all ones, so weights alone decide its contribution.
fn normalize(items: &[RankedItem]) -> Vec<f64> {
    let min = items.iter().map(|i| i.score).fold(f64::INFINITY, f64::min);
    let max = items
        .iter()
        .map(|i| i.score)
        .fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    items
        .iter()
        .map(|i| {
            if range <= f64::EPSILON {
                1.0
            } else {
                (i.score - min) / range
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::ResultSource;

    fn item(id: &str, score: f64, source: ResultSource) -> RankedItem {
        RankedItem::new(id, format!("content {id}"), format!("title {id}"), score, source)
    }

    #[test]
    fn rrf_rewards_agreement_across_backends() {
        let vector = vec![
            item("a", 0.9, ResultSource::Vector),
            item("b", 0.8, ResultSource::Vector),
        ];
        let graph = vec![
            item("b", 0.7, ResultSource::Graph),
            item("c", 0.6, ResultSource::Graph),
        ];
        let weights = FusionWeights::new(0.5, 0.5);
        let fused = fuse(&vector, &graph, &weights, FusionStrategy::ReciprocalRank, 10);

        // "b" appears in both lists, so its accumulated score tops the order.
        assert_eq!(fused[0].id, "b");
        assert!(fused[0].fusion_score > fused.iter().find(|i| i.id == "a").unwrap().fusion_score);
    }

    #[test]
    fn rrf_preserves_within_list_order() {
        let vector: Vec<_> = (0..5)
            .map(|i| item(&format!("v{i}"), 1.0 - i as f64 * 0.1, ResultSource::Vector))
            .collect();
        let weights = FusionWeights::new(1.0, 0.0);
        let fused = fuse(&vector, &[], &weights, FusionStrategy::ReciprocalRank, 10);
        for pair in fused.windows(2) {
            assert!(pair[0].fusion_score >= pair[1].fusion_score);
        }
        assert_eq!(fused[0].id, "v0");
    }

    #[test]
    fn missing_ids_fall_back_to_positional_keys() {
        let mut a = item("", 0.9, ResultSource::Vector);
        a.content = "first".into();
        let mut b = item("", 0.8, ResultSource::Vector);
        b.content = "second".into();
        let weights = FusionWeights::new(1.0, 0.0);
        let fused = fuse(&[a, b], &[], &weights, FusionStrategy::ReciprocalRank, 10);

        assert_eq!(fused.len(), 2);
        assert!(fused[0].fusion_score > fused[1].fusion_score);
    }

    #[test]
    fn truncates_to_max_results() {
        let vector: Vec<_> = (0..20)
            .map(|i| item(&format!("v{i}"), 1.0, ResultSource::Vector))
            .collect();
        let weights = FusionWeights::new(0.7, 0.3);
        let fused = fuse(&vector, &[], &weights, FusionStrategy::ReciprocalRank, 5);
        assert_eq!(fused.len(), 5);
    }

    #[test]
    fn fusion_is_deterministic() {
        let vector = vec![
            item("a", 0.9, ResultSource::Vector),
            item("b", 0.9, ResultSource::Vector),
        ];
        let graph = vec![item("c", 0.9, ResultSource::Graph)];
        let weights = FusionWeights::new(0.5, 0.5);
        let first = fuse(&vector, &graph, &weights, FusionStrategy::ReciprocalRank, 10);
        let second = fuse(&vector, &graph, &weights, FusionStrategy::ReciprocalRank, 10);
        let ids: Vec<_> = first.iter().map(|i| i.id.as_str()).collect();
        let ids2: Vec<_> = second.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ids2);
    }

    #[test]
    fn weighted_normalizes_per_list() {
        let vector = vec![
            item("hi", 100.0, ResultSource::Vector),
            item("lo", 50.0, ResultSource::Vector),
        ];
        let graph = vec![
            item("g-hi", 0.9, ResultSource::Graph),
            item("g-lo", 0.1, ResultSource::Graph),
        ];
        let weights = FusionWeights::new(0.5, 0.5);
        let fused = fuse(&vector, &graph, &weights, FusionStrategy::Weighted, 10);

        // Each list's best item normalizes to 1.0, so both tie at the top
        // despite wildly different native score scales.
        assert!((fused[0].fusion_score - 0.5).abs() < 1e-9);
        assert!((fused[1].fusion_score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn linear_applies_rank_decay() {
        let vector = vec![
            item("a", 1.0, ResultSource::Vector),
            item("b", 1.0, ResultSource::Vector),
        ];
        let weights = FusionWeights::new(1.0, 0.0);
        let fused = fuse(&vector, &[], &weights, FusionStrategy::Linear, 10);
        assert_eq!(fused[0].id, "a");
        assert!((fused[0].fusion_score - 1.0).abs() < 1e-9);
        assert!((fused[1].fusion_score - 0.5).abs() < 1e-9);
    }
}
