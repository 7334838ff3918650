use std::cmp::Ordering;
use std::time::Instant;

use tracing::{debug, warn};

use super::backend::RelevanceBackend;
use super::types::{Candidate, RankOptions, RankTimings};
use crate::codec;

/// Maps a cosine similarity onto `[0, 1]`: `-1 -> 0`, `0 -> 0.5`, `1 -> 1`.
/// Non-finite input scores 0.
#[inline]
pub fn cosine_to_score(cosine: f32) -> f32 {
    if cosine.is_nan() {
        return 0.0;
    }
    (cosine.clamp(-1.0, 1.0) + 1.0) / 2.0
}

/// Cosine similarity between two vectors with known norms.
///
/// `None` when the lengths differ, a vector is empty, or a norm is not
/// strictly positive.
#[inline]
pub fn cosine(a: &[f32], norm_a: f32, b: &[f32], norm_b: f32) -> Option<f32> {
    if a.is_empty() || a.len() != b.len() || !is_positive(norm_a) || !is_positive(norm_b) {
        return None;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    Some((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

#[inline]
fn is_positive(value: f32) -> bool {
    value > 0.0
}

/// Cosine similarity between `query` and a stored blob.
///
/// The cached `stored_norm` is only trusted when strictly positive. An empty
/// or undecodable blob, a dimension mismatch or a zero norm gives `None`.
pub fn cosine_from_blob(
    query: &[f32],
    query_norm: f32,
    blob: &[u8],
    stored_norm: Option<f32>,
) -> Option<f32> {
    if blob.is_empty() {
        return None;
    }
    let vector = codec::decode(blob, None).ok()?;
    if vector.len() != query.len() {
        return None;
    }
    let vector_norm = match stored_norm {
        Some(n) if is_positive(n) => n,
        _ => codec::norm(&vector),
    };
    cosine(query, query_norm, &vector, vector_norm)
}

/// Sorts by descending `score`; equal scores keep their input order.
pub fn sort_by_score(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}

/// Scores and sorts `candidates` in place.
///
/// Cosine relevance against each stored vector becomes `base_score`. In
/// hybrid mode the top slice is reranked when the query is short or the
/// slice's score spread is within `epsilon`; reranked candidates get the
/// mean of both scores. Backend trouble never fails the call: without a
/// query embedding every score is zero.
pub async fn rank_candidates<B>(
    backend: &mut B,
    query: &str,
    candidates: &mut [Candidate],
    options: &RankOptions,
) -> RankTimings
where
    B: RelevanceBackend + ?Sized,
{
    let mut timings = RankTimings::default();
    for candidate in candidates.iter_mut() {
        candidate.base_score = 0.0;
        candidate.score = 0.0;
    }

    let started = Instant::now();
    let query_vector = if query.trim().is_empty() {
        Vec::new()
    } else {
        match backend.embed(query).await {
            Ok(outcome) => outcome.into_inner(),
            Err(e) => {
                warn!(error = %e, "Query embedding failed, scoring all candidates zero");
                Vec::new()
            }
        }
    };
    timings.embed = started.elapsed();

    if query_vector.is_empty() {
        debug!(candidates = candidates.len(), "No query embedding");
        return timings;
    }

    let started = Instant::now();
    let query_norm = codec::norm(&query_vector);
    for candidate in candidates.iter_mut() {
        let similarity = candidate
            .vector
            .as_deref()
            .and_then(|blob| cosine_from_blob(&query_vector, query_norm, blob, candidate.norm));
        let base = similarity.map(cosine_to_score).unwrap_or(0.0);
        candidate.base_score = base;
        candidate.score = base;
    }
    sort_by_score(candidates);
    timings.cosine = started.elapsed();

    if !options.mode.has_reranker() || candidates.is_empty() {
        return timings;
    }

    let top_n = options.rerank_window(candidates.len());
    let spread = candidates[0].score - candidates[top_n - 1].score;
    let short = options.is_short_query(query);
    if !short && spread > options.epsilon {
        debug!(spread, epsilon = options.epsilon, "Cosine ordering confident, skipping rerank");
        return timings;
    }

    let started = Instant::now();
    for candidate in candidates[..top_n].iter_mut() {
        let fallback = candidate.base_score;
        let rerank = match backend.rerank(query, &candidate.snippet, fallback).await {
            Ok(outcome) => outcome.into_inner(),
            Err(e) => {
                warn!(key = %candidate.key, error = %e, "Rerank failed, keeping base score");
                fallback
            }
        };
        let rerank = if (0.0..=1.0).contains(&rerank) {
            rerank
        } else {
            fallback
        };
        candidate.score = (candidate.base_score + rerank) / 2.0;
    }
    sort_by_score(candidates);
    timings.rerank = started.elapsed();
    timings.reranked = top_n;

    debug!(
        reranked = top_n,
        short,
        spread,
        rerank_ms = timings.rerank.as_millis() as u64,
        "Hybrid rerank applied"
    );
    timings
}
