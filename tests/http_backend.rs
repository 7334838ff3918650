//! HTTP channel and worker serve loop against an in-process fake llama-server.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use qxrank::rpc::{HttpChannel, Response, RpcError, RpcResult, ServeBackend, ServeExit, serve};

#[derive(Clone)]
struct FakeLlama {
    healthy: bool,
    completion: String,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl FakeLlama {
    fn new(completion: &str) -> Self {
        Self {
            healthy: true,
            completion: completion.to_string(),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

async fn health(State(fake): State<FakeLlama>) -> StatusCode {
    if fake.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn embeddings(State(fake): State<FakeLlama>, Json(body): Json<Value>) -> Json<Value> {
    let input = body["input"].as_str().unwrap_or_default().to_string();
    fake.requests.lock().push(body);
    if input.is_empty() {
        return Json(json!({ "data": [] }));
    }
    Json(json!({ "data": [{ "embedding": [1.0, 0.0] }] }))
}

async fn completion(State(fake): State<FakeLlama>, Json(body): Json<Value>) -> Json<Value> {
    fake.requests.lock().push(body);
    Json(json!({ "content": fake.completion }))
}

struct FakeServer {
    addr: SocketAddr,
    fake: FakeLlama,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl FakeServer {
    async fn start(fake: FakeLlama) -> Self {
        let app = Router::new()
            .route("/health", get(health))
            .route("/v1/embeddings", post(embeddings))
            .route("/completion", post(completion))
            .with_state(fake.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            fake,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    fn channel(&self) -> HttpChannel {
        HttpChannel::for_port(self.addr.port())
    }

    fn last_request(&self) -> Value {
        self.fake.requests.lock().last().cloned().unwrap_or_default()
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Serves the stdio protocol from a single llama-server style endpoint.
struct ChannelBackend(HttpChannel);

#[async_trait]
impl ServeBackend for ChannelBackend {
    async fn embed(&mut self, text: &str) -> RpcResult<Vec<f32>> {
        self.0.embedding(text).await
    }

    async fn rerank(&mut self, query: &str, snippet: &str) -> RpcResult<Option<f32>> {
        self.0.rerank_score(query, snippet).await
    }
}

#[tokio::test]
async fn test_health_ready() {
    let server = FakeServer::start(FakeLlama::new("0.5")).await;
    assert!(server.channel().health().await.is_ok());
}

#[tokio::test]
async fn test_health_not_ready() {
    let mut fake = FakeLlama::new("0.5");
    fake.healthy = false;
    let server = FakeServer::start(fake).await;

    let err = server.channel().health().await.unwrap_err();
    assert!(matches!(err, RpcError::HttpStatus { status: 503, .. }));
}

#[tokio::test]
async fn test_health_connection_refused() {
    let port = qxrank::worker::find_free_port().await.unwrap();
    let err = HttpChannel::for_port(port).health().await.unwrap_err();
    assert!(matches!(err, RpcError::Http { .. }));
    assert!(!err.is_timeout());
    assert!(err.is_channel_failure());
}

#[tokio::test]
async fn test_embedding_request_and_reply() {
    let server = FakeServer::start(FakeLlama::new("0.5")).await;

    let vector = server.channel().embedding("jwt signing key").await.unwrap();

    assert_eq!(vector, vec![1.0, 0.0]);
    assert_eq!(server.last_request(), json!({ "input": "jwt signing key" }));
}

#[tokio::test]
async fn test_embedding_without_data_is_empty() {
    let server = FakeServer::start(FakeLlama::new("0.5")).await;
    let vector = server.channel().embedding("").await.unwrap();
    assert!(vector.is_empty());
}

#[tokio::test]
async fn test_rerank_score_parses_content() {
    let server = FakeServer::start(FakeLlama::new("0.83")).await;

    let score = server
        .channel()
        .rerank_score("jwt", "rotate the signing key")
        .await
        .unwrap();

    assert!((score.unwrap() - 0.83).abs() < 1e-6);
    let request = server.last_request();
    assert_eq!(request["n_predict"], 8);
    assert_eq!(request["temperature"], 0.0);
    assert_eq!(request["top_k"], 1);
    assert!(request["grammar"].as_str().unwrap().contains("root"));
    let prompt = request["prompt"].as_str().unwrap();
    assert!(prompt.contains("Query: jwt"));
    assert!(prompt.contains("Snippet: rotate the signing key"));
}

#[tokio::test]
async fn test_rerank_non_conforming_content_is_none() {
    for content in ["maybe", "1.5", "", "0.7 because"] {
        let server = FakeServer::start(FakeLlama::new(content)).await;
        let score = server.channel().rerank_score("q", "s").await.unwrap();
        assert_eq!(score, None, "content {content:?}");
    }
}

#[tokio::test]
async fn test_serve_loop_over_http_backend() {
    let server = FakeServer::start(FakeLlama::new("not a number")).await;
    let mut backend = ChannelBackend(server.channel());

    let input = concat!(
        "{\"op\":\"health\"}\n",
        "{\"op\":\"embed\",\"text\":\"hello\"}\n",
        "{\"op\":\"rerank\",\"query\":\"q\",\"snippet\":\"s\",\"fallback\":0.25}\n",
        "{\"op\":\"stop\"}\n",
    );
    let mut output = Vec::new();

    let exit = serve(input.as_bytes(), &mut output, &mut backend)
        .await
        .unwrap();
    assert_eq!(exit, ServeExit::Stopped);

    let replies: Vec<Response> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(replies.len(), 4);
    assert!(replies.iter().all(|r| r.ok));
    assert_eq!(replies[1].dim, Some(2));
    assert_eq!(replies[1].clone().into_embedding().unwrap(), vec![1.0, 0.0]);
    assert_eq!(replies[2].score, Some(0.25));
    assert_eq!(replies[3].op.as_deref(), Some("stop"));
}
