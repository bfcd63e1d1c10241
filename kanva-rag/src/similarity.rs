//! Cosine similarity and top-k ranking.
//!
//! Vectors are only comparable when produced by the same embedding provider
//! and model. Nothing here checks that; callers own the invariant.

use std::cmp::Ordering;

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude. Vectors of different
/// lengths are compared over their common prefix.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Rank `candidates` against `query`, returning at most `top_k` items.
///
/// Results are in descending score order; equal scores keep their original
/// insertion order. A `top_k` of zero yields an empty result.
///
/// ```rust
/// use kanva_rag::rank;
///
/// let a = vec![1.0, 0.0];
/// let b = vec![0.0, 1.0];
/// let ranked = rank(&[1.0, 0.1], [("a", a.as_slice()), ("b", b.as_slice())], 1);
/// assert_eq!(ranked[0].0, "a");
/// ```
pub fn rank<'a, T, I>(query: &[f32], candidates: I, top_k: usize) -> Vec<(T, f32)>
where
    I: IntoIterator<Item = (T, &'a [f32])>,
{
    if top_k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(T, f32)> = candidates
        .into_iter()
        .map(|(candidate, embedding)| {
            let score = cosine_similarity(query, embedding);
            (candidate, score)
        })
        .collect();

    // `sort_by` is stable, which gives the insertion-order tie break.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(top_k);
    scored
}
