//! Environment-backed configuration.
//!
//! Every setting has a default. Override with `ARCHIVE_*` environment variables;
//! each subsystem reads its own block ([`WorkerConfig`], [`RankConfig`]).

pub(crate) mod env;
pub mod error;


pub use env::expand_home;
pub use error::ConfigError;

use crate::ranking::RankConfig;
use crate::worker::{WorkerConfig, WorkerMode};

/// Whether and how AI ranking runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AiMode {
    /// Ranking disabled; callers keep their own order.
    Off,
    #[default]
    Embeddings,
    Hybrid,
}

impl AiMode {
    /// Lenient parse: unknown or missing values mean [`AiMode::Embeddings`].
    pub fn normalize(value: Option<&str>) -> Self {
        let value = value.unwrap_or("embeddings").trim().to_lowercase();
        match value.as_str() {
            "off" | "none" => Self::Off,
            "hybrid" => Self::Hybrid,
            _ => Self::Embeddings,
        }
    }

    /// The worker mode to run, or `None` when ranking is off.
    pub fn worker_mode(&self) -> Option<WorkerMode> {
        match self {
            AiMode::Off => None,
            AiMode::Embeddings => Some(WorkerMode::Embeddings),
            AiMode::Hybrid => Some(WorkerMode::Hybrid),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, AiMode::Off)
    }
}

/// Full configuration loaded from environment variables.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// `ARCHIVE_AI_MODE`. Default: embeddings.
    pub ai_mode: AiMode,

    /// Backend launch and timeout settings.
    pub worker: WorkerConfig,

    /// Ranking defaults (top-k, spread threshold, short-query limit).
    pub ranking: RankConfig,
}

impl Config {
    const ENV_AI_MODE: &'static str = "ARCHIVE_AI_MODE";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let ai_mode = AiMode::normalize(env::var(Self::ENV_AI_MODE).as_deref());

        Ok(Self {
            ai_mode,
            worker: WorkerConfig::from_env()?,
            ranking: RankConfig::from_env()?,
        })
    }

    /// Checks numeric invariants. Missing binaries or models are not errors:
    /// they degrade to the local fallback at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.worker.validate()?;
        self.ranking.validate()?;
        Ok(())
    }
}
