//! Iterative broad search with graph-context refinement between steps.

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use tandem_core::{RankedItem, Result};
use tandem_store::ContextRecord;

use crate::types::{FusionWeights, RawResults, SearchOptions};

use super::{Strategy, StrategyContext};

const DEFAULT_MAX_STEPS: usize = 3;
const BROAD_LIMIT: usize = 50;
const BROAD_THRESHOLD: f64 = 0.6;
const CONTEXT_TOP_N: usize = 10;

/// Runs up to `max_steps` broad vector searches, pulling graph context for
/// the top hits between steps to steer the next query. Accumulated hits are
/// deduplicated (first occurrence wins) and ranked by native score, so this
/// strategy bypasses fusion.
pub struct MultiStep;

#[async_trait]
impl Strategy for MultiStep {
    async fn run(
        &self,
        ctx: &StrategyContext,
        query: &str,
        _context_domains: Option<&[String]>,
        _filters: Option<&Value>,
        options: &SearchOptions,
    ) -> Result<RawResults> {
        let max_steps = options.max_steps.unwrap_or(DEFAULT_MAX_STEPS).max(1);
        let mut current_query = query.to_string();
        let mut query_evolution = vec![current_query.clone()];
        let mut all_results: Vec<RankedItem> = Vec::new();
        let mut steps_executed = 0;

        for step in 0..max_steps {
            let step_results = match ctx
                .vector
                .semantic_search(&current_query, BROAD_LIMIT, BROAD_THRESHOLD, None)
                .await
            {
                Ok(results) => results,
                // Later steps only widen the result set, so their failure
                // keeps what earlier steps already found.
                Err(err) if step > 0 => {
                    warn!(step, error = %err, "search step failed, stopping iteration");
                    break;
                }
                Err(err) => return Err(err),
            };
            steps_executed += 1;
            debug!(step, hits = step_results.len(), "search step complete");
            if step_results.is_empty() {
                break;
            }

            if step < max_steps - 1 {
                let top_ids: Vec<String> = step_results
                    .iter()
                    .take(CONTEXT_TOP_N)
                    .filter(|item| !item.id.is_empty())
                    .map(|item| item.id.clone())
                    .collect();
                let context = match ctx.graph.get_context_for_entities(&top_ids).await {
                    Ok(context) => context,
                    Err(err) => {
                        warn!(step, error = %err, "context lookup failed, reusing query");
                        Vec::new()
                    }
                };
                let refined = refine_query(query, &context);
                if refined != current_query {
                    query_evolution.push(refined.clone());
                    current_query = refined;
                }
            }

            all_results.extend(step_results);
        }

        let total = all_results.len();
        let mut unique = dedup_first_wins(all_results);
        unique.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        unique.truncate(ctx.config.max_results);
        for item in &mut unique {
            item.fusion_score = item.score;
        }

        let mut raw = RawResults::new(FusionWeights::new(0.5, 0.5));
        raw.sources.insert("multi_step_total".into(), total);
        raw.sources.insert("final_unique".into(), unique.len());
        raw.metadata
            .insert("strategy_details".into(), json!("multi_step_iterative"));
        raw.metadata
            .insert("steps_executed".into(), json!(steps_executed));
        raw.metadata
            .insert("query_evolution".into(), json!(query_evolution));
        raw.prefused = Some(unique);
        Ok(raw)
    }
}

/// Hook for steering the next step's query with graph context. Currently a
/// pass-through; the step loop already handles an unchanged query by not
/// recording an evolution entry.
fn refine_query(original_query: &str, _context: &[ContextRecord]) -> String {
    original_query.to_string()
}

/// Keep the first occurrence of each id; id-less items are kept as-is.
fn dedup_first_wins(items: Vec<RankedItem>) -> Vec<RankedItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| item.id.is_empty() || seen.insert(item.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::ResultSource;

    #[test]
    fn dedup_keeps_first_occurrence() {
        let items = vec![
            RankedItem::new("a", "first", "t", 0.9, ResultSource::Vector),
            RankedItem::new("b", "b", "t", 0.8, ResultSource::Vector),
            RankedItem::new("a", "duplicate", "t", 0.7, ResultSource::Vector),
        ];
        let unique = dedup_first_wins(items);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].content, "first");
    }

    #[test]
    fn dedup_keeps_idless_items() {
        let items = vec![
            RankedItem::new("", "x", "t", 0.9, ResultSource::Vector),
            RankedItem::new("", "y", "t", 0.8, ResultSource::Vector),
        ];
        assert_eq!(dedup_first_wins(items).len(), 2);
    }
}
