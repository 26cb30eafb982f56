//! Maximal marginal relevance selection.

use super::cosine_similarity;

/// Pick `k` of the `candidates` (indices into `embeddings`, ordered by
/// relevance) maximising `lambda * relevance - (1 - lambda) * redundancy`,
/// where redundancy is the highest similarity to anything already picked.
///
/// The most relevant candidate is always picked first. Returns indices in
/// selection order.
pub fn mmr_select(
    query: &[f32],
    candidates: &[usize],
    embeddings: &[&[f32]],
    k: usize,
    lambda: f32,
) -> Vec<usize> {
    let lambda = lambda.clamp(0.0, 1.0);
    let relevance: Vec<f32> = candidates
        .iter()
        .map(|&i| cosine_similarity(query, embeddings[i]))
        .collect();

    let mut selected: Vec<usize> = Vec::with_capacity(k.min(candidates.len()));
    let mut remaining: Vec<usize> = (0..candidates.len()).collect();

    while selected.len() < k && !remaining.is_empty() {
        let mut best_pos = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (pos, &cand) in remaining.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|&s| cosine_similarity(embeddings[candidates[cand]], embeddings[candidates[s]]))
                .fold(f32::NEG_INFINITY, f32::max);
            let redundancy = if selected.is_empty() { 0.0 } else { redundancy };

            let score = lambda * relevance[cand] - (1.0 - lambda) * redundancy;
            if score > best_score {
                best_score = score;
                best_pos = pos;
            }
        }

        selected.push(remaining.remove(best_pos));
    }

    selected.into_iter().map(|pos| candidates[pos]).collect()
}
