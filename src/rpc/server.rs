//! Worker side of the stdio protocol.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use super::error::RpcResult;
use super::protocol::{IncomingRequest, Op, Response};

/// Inference capabilities a worker serves.
#[async_trait]
pub trait ServeBackend: Send {
    /// Embeds `text`.
    async fn embed(&mut self, text: &str) -> RpcResult<Vec<f32>>;

    /// Scores `snippet` against `query`. `None` when no reranker is loaded or
    /// the model produced an unusable answer.
    async fn rerank(&mut self, query: &str, snippet: &str) -> RpcResult<Option<f32>>;
}

/// Why [`serve`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeExit {
    /// A `stop` request was acknowledged.
    Stopped,
    /// Input reached end of file.
    Eof,
}

/// Writes one response line and flushes.
pub async fn write_response<W>(writer: &mut W, response: &Response) -> RpcResult<()>
where
    W: AsyncWrite + Unpin + Send,
{
    writer.write_all(response.to_line()?.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Answers requests from `reader` on `writer` until `stop` or end of input.
///
/// Handling failures are reported as `{"ok":false,...}` lines and the loop
/// keeps going; only I/O errors on the streams themselves end it early.
pub async fn serve<R, W, B>(mut reader: R, mut writer: W, backend: &mut B) -> RpcResult<ServeExit>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
    B: ServeBackend + ?Sized,
{
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(ServeExit::Eof);
        }

        let (response, stop) = match std::str::from_utf8(&buf) {
            Ok(raw) if raw.trim().is_empty() => continue,
            Ok(raw) => handle_line(raw.trim(), backend).await,
            Err(e) => (Response::error(format!("invalid request: {e}")), false),
        };
        write_response(&mut writer, &response).await?;

        if stop {
            debug!("Stop acknowledged");
            return Ok(ServeExit::Stopped);
        }
    }
}

async fn handle_line<B>(raw: &str, backend: &mut B) -> (Response, bool)
where
    B: ServeBackend + ?Sized,
{
    let request: IncomingRequest = match serde_json::from_str(raw) {
        Ok(request) => request,
        Err(e) => return (Response::error(format!("invalid request: {e}")), false),
    };

    let op = request.op.as_deref().unwrap_or_default();
    match op {
        "stop" => (Response::stop(), true),
        "health" => (Response::health(), false),
        "embed" => {
            let text = request.text.unwrap_or_default();
            match backend.embed(&text).await {
                Ok(vector) => (Response::embed(&vector), false),
                Err(e) => {
                    warn!(op = %Op::Embed, error = %e, "Embedding failed");
                    (Response::error(e.to_string()), false)
                }
            }
        }
        "rerank" => {
            let fallback = request.fallback.unwrap_or(0.0) as f32;
            let query = request.query.unwrap_or_default();
            let snippet = request.snippet.unwrap_or_default();
            match backend.rerank(&query, &snippet).await {
                Ok(score) => {
                    let score = score
                        .filter(|s| (0.0..=1.0).contains(s))
                        .unwrap_or(fallback);
                    (Response::rerank(score), false)
                }
                Err(e) => {
                    warn!(op = %Op::Rerank, error = %e, "Rerank failed");
                    (Response::error(e.to_string()), false)
                }
            }
        }
        other => (Response::error(format!("unsupported op: {other}")), false),
    }
}
