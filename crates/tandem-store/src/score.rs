//! Keyword scoring shared by the memory backends.

use std::collections::HashSet;

/// Fraction of query tokens present in `text`, case-insensitive.
pub(crate) fn keyword_overlap(query: &str, text: &str) -> f64 {
    let query_tokens: Vec<String> = tokens(query);
    if query_tokens.is_empty() {
        return 0.0;
    }
    let text_tokens: HashSet<String> = tokens(text).into_iter().collect();
    let hits = query_tokens
        .iter()
        .filter(|t| text_tokens.contains(*t))
        .count();
    hits as f64 / query_tokens.len() as f64
}

pub(crate) fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}
