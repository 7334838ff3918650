//! End-to-end ranking scenarios through the public API.

mod common;

use std::time::Duration;

use common::{candidate, keys};
use qxrank::codec::{decode, encode};
use qxrank::{
    Candidate, MockBackend, Outcome, RankConfig, RankOptions, RankSession, WorkerConfig,
    WorkerMode, WorkerState, deterministic_embed, rank_candidates,
};

fn unreachable_backend() -> WorkerConfig {
    WorkerConfig::default()
        .with_worker_command("/nonexistent/qx-worker", Vec::<String>::new())
        .with_startup_timeout(Duration::from_secs(1))
}

#[tokio::test]
async fn scenario_embeddings_orders_by_cosine() {
    let mut backend = MockBackend::new(vec![1.0, 0.0]);
    let mut candidates = vec![candidate("A", &[1.0, 0.0]), candidate("B", &[0.0, 1.0])];

    let timings = rank_candidates(
        &mut backend,
        "hello",
        &mut candidates,
        &RankOptions::new(WorkerMode::Embeddings),
    )
    .await;

    assert_eq!(keys(&candidates), ["A", "B"]);
    assert!((candidates[0].score - 1.0).abs() < 1e-5);
    assert!((candidates[1].score - 0.5).abs() < 1e-5);
    assert!(timings.embed_s() >= 0.0);
    assert!(timings.cosine_s() >= 0.0);
    assert_eq!(timings.rerank_s(), 0.0);
}

#[tokio::test]
async fn scenario_hybrid_near_tie_fuses_rerank() {
    let mut backend = MockBackend::new(vec![1.0, 0.0]).with_rerank_offset(0.1);
    let mut candidates = vec![
        candidate("a", &[1.0, 0.0]),
        candidate("b", &[0.99, 0.01]).with_norm(0.990_050_5),
    ];

    let options = RankOptions::new(WorkerMode::Hybrid)
        .with_top_k(2)
        .with_epsilon(0.5);
    rank_candidates(
        &mut backend,
        "how are signing keys rotated",
        &mut candidates,
        &options,
    )
    .await;

    assert_eq!(backend.rerank_count(), 2);
    for c in &candidates {
        let rerank = (c.base_score + 0.1).min(1.0);
        assert!((c.score - (c.base_score + rerank) / 2.0).abs() < 1e-6);
    }
}

#[tokio::test]
async fn scenario_empty_query_is_all_zero() {
    let mut backend = MockBackend::new(vec![1.0, 0.0]);
    let mut candidates = vec![candidate("a", &[1.0, 0.0]), candidate("b", &[0.0, 1.0])];

    let timings = rank_candidates(
        &mut backend,
        "",
        &mut candidates,
        &RankOptions::new(WorkerMode::Hybrid),
    )
    .await;

    assert!(candidates.iter().all(|c| c.score == 0.0));
    assert_eq!(timings.cosine_s(), 0.0);
    assert_eq!(timings.rerank_s(), 0.0);
}

#[tokio::test]
async fn scenario_stable_order_for_equal_scores() {
    let mut backend = MockBackend::new(vec![0.0, 1.0]);
    let mut candidates: Vec<Candidate> = ["n1", "n2", "n3", "n4"]
        .iter()
        .map(|key| candidate(key, &[1.0, 0.0]))
        .collect();

    rank_candidates(
        &mut backend,
        "several words in this query",
        &mut candidates,
        &RankOptions::new(WorkerMode::Embeddings),
    )
    .await;

    assert_eq!(keys(&candidates), ["n1", "n2", "n3", "n4"]);
}

#[tokio::test]
async fn scenario_backend_unavailable_is_deterministic() {
    let session = RankSession::new(unreachable_backend(), RankConfig::default());

    let first = session.embed("jwt key", WorkerMode::Hybrid).await.unwrap();
    let second = session.embed("jwt key", WorkerMode::Hybrid).await.unwrap();
    assert!(first.is_degraded());
    assert_eq!(first, second);
    assert_eq!(first.value(), &deterministic_embed("jwt key"));

    assert_eq!(
        session.rerank("jwt key", "snippet", 0.61).await.unwrap(),
        Outcome::Degraded(0.61)
    );
    assert_eq!(
        session.state(WorkerMode::Hybrid).await,
        Some(WorkerState::DegradedLocal)
    );
    session.shutdown().await;
}

#[tokio::test]
async fn scenario_degraded_session_still_ranks() {
    let session = RankSession::new(unreachable_backend(), RankConfig::default());
    let query_vector = deterministic_embed("archive");
    let mut candidates = vec![
        Candidate::new("other", "unrelated").with_vector(encode(&deterministic_embed("zzz"))),
        Candidate::new("same", "archive").with_vector(encode(&query_vector)),
        Candidate::new("missing", "no vector"),
    ];

    let timings = session
        .rank("archive", &mut candidates, WorkerMode::Hybrid)
        .await
        .unwrap();

    assert_eq!(candidates[0].key, "same");
    assert!((candidates[0].base_score - 1.0).abs() < 1e-4);
    assert_eq!(candidates[2].key, "missing");
    assert_eq!(candidates[2].base_score, 0.0);
    // Short query: the reranker ran, but every answer was the fallback.
    assert_eq!(timings.reranked, 3);
    for c in &candidates {
        assert_eq!(c.score, c.base_score);
    }
    session.shutdown().await;
}

#[test]
fn scenario_blob_round_trip() {
    let vector = vec![0.25_f32, -1.5, 3.0];
    let blob = encode(&vector);
    assert_eq!(blob.len(), 12);
    assert_eq!(decode(&blob, None).unwrap(), vector);
    assert_eq!(encode(&decode(&blob, None).unwrap()), blob);
}
