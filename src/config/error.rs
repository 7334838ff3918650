//! Configuration error types.

use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held a value that does not parse.
    #[error("invalid value '{value}' for {name}")]
    InvalidValue {
        /// Variable name.
        name: &'static str,
        /// Raw value.
        value: String,
    },

    /// A setting parsed but is outside its allowed range.
    #[error("invalid {name}: {reason}")]
    OutOfRange {
        /// Setting name.
        name: &'static str,
        /// Constraint that was violated.
        reason: String,
    },
}
