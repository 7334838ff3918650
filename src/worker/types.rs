use std::str::FromStr;

/// Backend operating mode. Each mode gets its own process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerMode {
    /// Embedding similarity only.
    Embeddings,
    /// Embeddings plus a reranking model.
    Hybrid,
}

impl WorkerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerMode::Embeddings => "embeddings",
            WorkerMode::Hybrid => "hybrid",
        }
    }

    pub fn has_reranker(&self) -> bool {
        matches!(self, WorkerMode::Hybrid)
    }
}

impl std::fmt::Display for WorkerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "emb" | "embedding" | "embeddings" => Ok(Self::Embeddings),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!("Unknown worker mode: {}", other)),
        }
    }
}

/// Lifecycle of a [`WorkerHandle`](super::WorkerHandle).
///
/// `Unstarted -> Starting -> Ready`; a failed start lands in `DegradedLocal`.
/// `Ready -> Starting` happens when the process is found dead. `Stopped` is
/// terminal and only reached through an explicit shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Unstarted,
    Starting,
    Ready,
    DegradedLocal,
    Stopped,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Unstarted => "UNSTARTED",
            WorkerState::Starting => "STARTING",
            WorkerState::Ready => "READY",
            WorkerState::DegradedLocal => "DEGRADED_LOCAL",
            WorkerState::Stopped => "STOPPED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerState::Stopped)
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value produced by the supervisor, tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// Answered by a live backend.
    Live(T),
    /// Substituted locally: hash embedding, caller fallback, or empty vector.
    Degraded(T),
}

impl<T> Outcome<T> {
    pub fn into_inner(self) -> T {
        match self {
            Outcome::Live(value) | Outcome::Degraded(value) => value,
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Outcome::Live(value) | Outcome::Degraded(value) => value,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Live(value) => Outcome::Live(f(value)),
            Outcome::Degraded(value) => Outcome::Degraded(f(value)),
        }
    }
}
