//! Line-delimited JSON messages exchanged with the stdio worker.
//!
//! Each request and each response is one JSON object terminated by `\n`.

use serde::{Deserialize, Serialize};

use super::error::{RpcError, RpcResult};
use crate::codec;

/// Operation tag carried in the `op` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Health,
    Embed,
    Rerank,
    Stop,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Health => "health",
            Op::Embed => "embed",
            Op::Rerank => "rerank",
            Op::Stop => "stop",
        }
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client-side request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Request {
    Health,
    Embed {
        text: String,
    },
    Rerank {
        query: String,
        snippet: String,
        fallback: f32,
    },
    Stop,
}

impl Request {
    pub fn embed(text: &str) -> Self {
        Request::Embed {
            text: text.to_string(),
        }
    }

    pub fn rerank(query: &str, snippet: &str, fallback: f32) -> Self {
        Request::Rerank {
            query: query.to_string(),
            snippet: snippet.to_string(),
            fallback,
        }
    }

    pub fn op(&self) -> Op {
        match self {
            Request::Health => Op::Health,
            Request::Embed { .. } => Op::Embed,
            Request::Rerank { .. } => Op::Rerank,
            Request::Stop => Op::Stop,
        }
    }

    /// Serializes the request as one protocol line (with trailing newline).
    pub fn to_line(&self) -> RpcResult<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Request as read by the worker. Every field is optional so that an unknown
/// or incomplete request still yields an error response instead of a parse
/// failure that would lose the `op`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncomingRequest {
    #[serde(default)]
    pub op: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub fallback: Option<f64>,
}

/// Response in either direction. `ok` is mandatory: a JSON line without it is
/// not a response (stray output is skipped by the reader).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vec_b64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dim: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed_load_s: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_load_s: Option<f64>,
}

impl Response {
    fn success(op: &str) -> Self {
        Self {
            op: Some(op.to_string()),
            ok: true,
            ..Default::default()
        }
    }

    pub fn health() -> Self {
        Self::success(Op::Health.as_str())
    }

    pub fn stop() -> Self {
        Self::success(Op::Stop.as_str())
    }

    pub fn embed(vector: &[f32]) -> Self {
        Self {
            vec_b64: Some(codec::encode_b64(vector)),
            dim: Some(vector.len()),
            ..Self::success(Op::Embed.as_str())
        }
    }

    pub fn rerank(score: f32) -> Self {
        Self {
            score: Some(score as f64),
            ..Self::success(Op::Rerank.as_str())
        }
    }

    /// Announcement printed by the worker once its backends are loaded.
    pub fn startup(embed_load_s: f64, rerank_load_s: f64) -> Self {
        Self {
            embed_load_s: Some(embed_load_s),
            rerank_load_s: Some(rerank_load_s),
            ..Self::success("startup")
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(message.into()),
            ..Default::default()
        }
    }

    /// Returns `false` only when the response names a different operation.
    /// Untagged responses (error replies) answer whatever was asked.
    pub fn answers(&self, op: Op) -> bool {
        self.op.as_deref().is_none_or(|tag| tag == op.as_str())
    }

    /// Decodes the embedding payload. A missing or empty payload is an empty
    /// vector; an undecodable one is [`RpcError::Malformed`].
    pub fn into_embedding(self) -> RpcResult<Vec<f32>> {
        let payload = self.vec_b64.unwrap_or_default();
        if payload.is_empty() {
            return Ok(Vec::new());
        }
        let dim = self.dim.filter(|d| *d > 0);
        codec::decode_b64(&payload, dim).map_err(|e| RpcError::Malformed {
            op: Op::Embed,
            reason: e.to_string(),
        })
    }

    /// The rerank score when present, finite and inside `[0, 1]`.
    pub fn rerank_score(&self) -> Option<f32> {
        self.score
            .filter(|s| s.is_finite() && (0.0..=1.0).contains(s))
            .map(|s| s as f32)
    }

    pub fn to_line(&self) -> RpcResult<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}
