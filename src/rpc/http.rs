//! Per-request HTTP client for a llama-server style inference server.
//!
//! Endpoints: `GET /health`, `POST /v1/embeddings`, `POST /completion`.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{RpcError, RpcResult};
use super::protocol::Op;
use crate::constants::{
    COMPLETION_HTTP_TIMEOUT, EMBEDDING_HTTP_TIMEOUT, HEALTH_PROBE_TIMEOUT, RERANK_MAX_TOKENS,
    RERANK_SNIPPET_CHARS,
};

/// GBNF grammar restricting completions to a single decimal in `[0, 1]`.
pub const RERANK_GRAMMAR: &str = r#"root ::= score
score ::= "0" | "1" | "0." frac
frac ::= digit | digit frac
digit ::= "0" | "1" | "2" | "3" | "4" | "5" | "6" | "7" | "8" | "9""#;

static SCORE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:0(?:\.\d+)?|1(?:\.0+)?)$").expect("score pattern is a valid regex")
});

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    input: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct EmbeddingsResponse {
    #[serde(default)]
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Default, Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    prompt: String,
    temperature: f32,
    top_k: u32,
    top_p: f32,
    repeat_penalty: f32,
    mirostat: u32,
    n_predict: u32,
    grammar: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    content: Option<String>,
}

/// Builds the scoring prompt; the snippet is cut to its first 800 characters.
pub fn rerank_prompt(query: &str, snippet: &str) -> String {
    let snippet: String = snippet.chars().take(RERANK_SNIPPET_CHARS).collect();
    format!(
        "Return only a relevance number in [0..1].\nQuery: {query}\nSnippet: {snippet}\nScore:"
    )
}

/// Parses completion output as a score, rejecting anything that is not a
/// plain decimal in `[0, 1]`.
pub fn parse_rerank_content(content: &str) -> Option<f32> {
    let text = content.trim();
    if !SCORE_RE.is_match(text) {
        return None;
    }
    text.parse::<f32>()
        .ok()
        .filter(|v| (0.0..=1.0).contains(v))
}

/// Stateless channel: every call is an independent loopback request.
#[derive(Debug, Clone)]
pub struct HttpChannel {
    client: HttpClient,
    base_url: String,
}

impl HttpChannel {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: HttpClient::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn for_port(port: u16) -> Self {
        Self::new(format!("http://127.0.0.1:{port}"))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Readiness probe: any 2xx from `/health`.
    pub async fn health(&self) -> RpcResult<()> {
        let url = format!("{}/health", self.base_url);
        let resp = self
            .client
            .get(&url)
            .timeout(HEALTH_PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|source| RpcError::Http {
                url: url.clone(),
                source,
            })?;

        if !resp.status().is_success() {
            return Err(RpcError::HttpStatus {
                url,
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }

    /// Embeds `text`. A response without an embedding yields an empty vector.
    pub async fn embedding(&self, text: &str) -> RpcResult<Vec<f32>> {
        let res: EmbeddingsResponse = self
            .post_json(
                "/v1/embeddings",
                &EmbeddingsRequest { input: text },
                EMBEDDING_HTTP_TIMEOUT,
                Op::Embed,
            )
            .await?;

        Ok(res
            .data
            .into_iter()
            .next()
            .and_then(|item| item.embedding)
            .unwrap_or_default())
    }

    /// Asks the completion model for a relevance score. `None` means the model
    /// produced something other than a decimal in `[0, 1]`.
    pub async fn rerank_score(&self, query: &str, snippet: &str) -> RpcResult<Option<f32>> {
        let body = CompletionRequest {
            prompt: rerank_prompt(query, snippet),
            temperature: 0.0,
            top_k: 1,
            top_p: 1.0,
            repeat_penalty: 1.0,
            mirostat: 0,
            n_predict: RERANK_MAX_TOKENS,
            grammar: RERANK_GRAMMAR,
        };

        let res: CompletionResponse = self
            .post_json("/completion", &body, COMPLETION_HTTP_TIMEOUT, Op::Rerank)
            .await?;

        let content = res.content.unwrap_or_default();
        let score = parse_rerank_content(&content);
        if score.is_none() {
            debug!(content = %content, "Discarding non-conforming rerank output");
        }
        Ok(score)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B, timeout: Duration, op: Op) -> RpcResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned + Default,
    {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|source| Self::classify(url.clone(), op, timeout, source))?;

        if !resp.status().is_success() {
            return Err(RpcError::HttpStatus {
                url,
                status: resp.status().as_u16(),
            });
        }

        let raw = resp
            .text()
            .await
            .map_err(|source| Self::classify(url.clone(), op, timeout, source))?;

        if raw.trim().is_empty() {
            return Ok(T::default());
        }

        serde_json::from_str(&raw).map_err(|e| RpcError::Malformed {
            op,
            reason: e.to_string(),
        })
    }

    fn classify(url: String, op: Op, timeout: Duration, source: reqwest::Error) -> RpcError {
        if source.is_timeout() {
            RpcError::Timeout { op, timeout }
        } else {
            RpcError::Http { url, source }
        }
    }
}
