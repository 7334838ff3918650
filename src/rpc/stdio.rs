//! Request/response exchange over a worker's standard streams.

use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, ChildStdout};
use tracing::debug;

use super::error::{RpcError, RpcResult};
use super::protocol::{Op, Request, Response};

/// Channel bound to a spawned worker's pipes.
pub type ChildChannel = StdioChannel<ChildStdin, BufReader<ChildStdout>>;

/// One-request-at-a-time line channel.
///
/// Taking `&mut self` for every call is what keeps a single request in flight.
pub struct StdioChannel<W, R> {
    writer: W,
    reader: R,
    line: Vec<u8>,
}

impl<W, R> std::fmt::Debug for StdioChannel<W, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioChannel").finish_non_exhaustive()
    }
}

impl ChildChannel {
    pub fn from_child(stdin: ChildStdin, stdout: ChildStdout) -> Self {
        Self::new(stdin, BufReader::new(stdout))
    }
}

impl<W, R> StdioChannel<W, R>
where
    W: AsyncWrite + Unpin + Send,
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(writer: W, reader: R) -> Self {
        Self {
            writer,
            reader,
            line: Vec::new(),
        }
    }

    /// Writes `request`, then waits up to `timeout` for its response.
    ///
    /// A response with `ok: false` becomes [`RpcError::Backend`].
    pub async fn call(&mut self, request: &Request, timeout: Duration) -> RpcResult<Response> {
        let op = request.op();
        self.send(request).await?;

        match tokio::time::timeout(timeout, self.read_response(op)).await {
            Ok(result) => result,
            Err(_) => Err(RpcError::Timeout { op, timeout }),
        }
    }

    /// Writes and flushes one request line without waiting for a reply.
    pub async fn send(&mut self, request: &Request) -> RpcResult<()> {
        let line = request.to_line()?;
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn read_response(&mut self, op: Op) -> RpcResult<Response> {
        loop {
            self.line.clear();
            let read = self.reader.read_until(b'\n', &mut self.line).await?;
            if read == 0 {
                return Err(RpcError::WorkerExited);
            }

            let Ok(text) = std::str::from_utf8(&self.line) else {
                debug!(%op, len = self.line.len(), "Skipping non-UTF-8 line from worker");
                continue;
            };
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }

            let response: Response = match serde_json::from_str(trimmed) {
                Ok(response) => response,
                Err(e) => {
                    debug!(%op, error = %e, "Skipping non-protocol line from worker");
                    continue;
                }
            };

            if !response.answers(op) {
                debug!(%op, got = ?response.op, "Skipping response for another operation");
                continue;
            }

            if !response.ok {
                return Err(RpcError::Backend {
                    message: response
                        .error
                        .unwrap_or_else(|| "worker error".to_string()),
                });
            }

            return Ok(response);
        }
    }
}
