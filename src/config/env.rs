//! Helpers for reading `ARCHIVE_*` overrides.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use super::error::ConfigError;

/// Returns the trimmed value of `name`, treating blank values as unset.
pub(crate) fn var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parses `name` when set, otherwise returns `default`.
pub(crate) fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match var(name) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(default),
    }
}

/// Reads a path from `name` (or `default`), expanding a leading `~`.
pub(crate) fn path_or(name: &str, default: &str) -> PathBuf {
    expand_home(&var(name).unwrap_or_else(|| default.to_string()))
}

/// Expands a leading `~` or `~/` to the home directory when one is known.
pub fn expand_home(raw: &str) -> PathBuf {
    let rest = match raw.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\') => rest,
        _ => return PathBuf::from(raw),
    };

    match dirs::home_dir() {
        Some(home) => home.join(rest.trim_start_matches(['/', '\\'])),
        None => PathBuf::from(raw),
    }
}
