//! Vector similarity and ranking.
//!
//! All functions are pure: they borrow the records they rank and never
//! modify them, so any number of requests can rank against one snapshot.

use crate::record::EmbeddingRecord;

/// A record paired with its similarity to a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedMatch<'a> {
    pub item: &'a EmbeddingRecord,
    pub score: f32,
}

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if either vector is empty or all-zero, or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom).clamp(-1.0, 1.0) as f32
}

/// Score every record and sort descending. Equal scores keep input order.
pub fn rank_all<'a>(
    query: &[f32],
    items: impl IntoIterator<Item = &'a EmbeddingRecord>,
) -> Vec<RankedMatch<'a>> {
    let mut scored: Vec<RankedMatch<'a>> = items
        .into_iter()
        .map(|item| RankedMatch {
            item,
            score: cosine_similarity(&item.vector, query),
        })
        .collect();

    // `sort_by` is stable.
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored
}

/// The `k` best matches.
pub fn top_k<'a>(
    query: &[f32],
    items: impl IntoIterator<Item = &'a EmbeddingRecord>,
    k: usize,
) -> Vec<RankedMatch<'a>> {
    let mut ranked = rank_all(query, items);
    ranked.truncate(k);
    ranked
}

/// Matches scoring at least `floor`, best first, at most `limit`.
pub fn above_floor<'a>(
    query: &[f32],
    items: impl IntoIterator<Item = &'a EmbeddingRecord>,
    floor: f32,
    limit: usize,
) -> Vec<RankedMatch<'a>> {
    let mut ranked = rank_all(query, items);
    ranked.retain(|m| m.score >= floor);
    ranked.truncate(limit);
    ranked
}

/// The single best match, kept only if it scores strictly above `threshold`.
pub fn best_above<'a>(
    query: &[f32],
    items: impl IntoIterator<Item = &'a EmbeddingRecord>,
    threshold: f32,
) -> Option<RankedMatch<'a>> {
    rank_all(query, items)
        .into_iter()
        .next()
        .filter(|m| m.score > threshold)
}
