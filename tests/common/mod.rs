//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use qxrank::codec::encode;
use qxrank::{BackendKind, Candidate, WorkerConfig};

/// Answers every op; embed returns `[1.0, 0.0]`, rerank returns 0.75.
/// Prints log noise and a startup line first. `$1` is a launch log.
pub const HEALTHY_WORKER: &str = r#"
echo launch >> "$1"
echo "loading models..."
echo '{"op":"startup","ok":true,"embed_load_s":0.01,"rerank_load_s":0.0}'
while IFS= read -r line; do
  case "$line" in
    *'"op":"health"'*) echo '{"op":"health","ok":true}' ;;
    *'"op":"embed"'*) echo '{"op":"embed","ok":true,"vec_b64":"AACAPwAAAAA=","dim":2}' ;;
    *'"op":"rerank"'*) echo '{"op":"rerank","ok":true,"score":0.75}' ;;
    *'"op":"stop"'*) echo '{"op":"stop","ok":true}'; exit 0 ;;
    *) echo '{"ok":false,"error":"unsupported op"}' ;;
  esac
done
"#;

/// Dies on the first embed of its lifetime unless `$1.crashed` exists.
pub const CRASH_ONCE_WORKER: &str = r#"
echo launch >> "$1"
while IFS= read -r line; do
  case "$line" in
    *'"op":"health"'*) echo '{"op":"health","ok":true}' ;;
    *'"op":"embed"'*)
      if [ ! -f "$1.crashed" ]; then touch "$1.crashed"; exit 1; fi
      echo '{"op":"embed","ok":true,"vec_b64":"AACAPwAAAAA=","dim":2}' ;;
    *'"op":"stop"'*) echo '{"op":"stop","ok":true}'; exit 0 ;;
  esac
done
"#;

/// Dies on every embed; rerank still works.
pub const CRASHING_WORKER: &str = r#"
echo launch >> "$1"
while IFS= read -r line; do
  case "$line" in
    *'"op":"health"'*) echo '{"op":"health","ok":true}' ;;
    *'"op":"embed"'*) exit 1 ;;
    *'"op":"rerank"'*) echo '{"op":"rerank","ok":true,"score":0.75}' ;;
    *'"op":"stop"'*) echo '{"op":"stop","ok":true}'; exit 0 ;;
  esac
done
"#;

/// Never answers embed in time; everything else is prompt.
pub const SLOW_EMBED_WORKER: &str = r#"
echo launch >> "$1"
while IFS= read -r line; do
  case "$line" in
    *'"op":"health"'*) echo '{"op":"health","ok":true}' ;;
    *'"op":"embed"'*) sleep 3; echo '{"op":"embed","ok":true,"vec_b64":"AACAPwAAAAA=","dim":2}' ;;
    *'"op":"rerank"'*) echo '{"op":"rerank","ok":true,"score":0.75}' ;;
    *'"op":"stop"'*) echo '{"op":"stop","ok":true}'; exit 0 ;;
  esac
done
"#;

/// Embeds "slow" as `[1.0, 0.0]` after a second, anything else as
/// `[0.0, 1.0]` immediately.
pub const SLOW_THEN_FAST_WORKER: &str = r#"
echo launch >> "$1"
while IFS= read -r line; do
  case "$line" in
    *'"op":"health"'*) echo '{"op":"health","ok":true}' ;;
    *'"text":"slow"'*) sleep 1; echo '{"op":"embed","ok":true,"vec_b64":"AACAPwAAAAA=","dim":2}' ;;
    *'"op":"embed"'*) echo '{"op":"embed","ok":true,"vec_b64":"AAAAAAAAgD8=","dim":2}' ;;
    *'"op":"stop"'*) echo '{"op":"stop","ok":true}'; exit 0 ;;
  esac
done
"#;

/// Writes a line of invalid UTF-8 before every reply.
pub const BINARY_NOISE_WORKER: &str = r#"
echo launch >> "$1"
while IFS= read -r line; do
  printf '\377\376 garbage log\n'
  case "$line" in
    *'"op":"health"'*) echo '{"op":"health","ok":true}' ;;
    *'"op":"embed"'*) echo '{"op":"embed","ok":true,"vec_b64":"AACAPwAAAAA=","dim":2}' ;;
    *'"op":"stop"'*) echo '{"op":"stop","ok":true}'; exit 0 ;;
  esac
done
"#;

/// Backend-side failures and non-conforming payloads.
pub const FAULTY_WORKER: &str = r#"
echo launch >> "$1"
while IFS= read -r line; do
  case "$line" in
    *'"op":"health"'*) echo '{"op":"health","ok":true}' ;;
    *'"text":"bad payload"'*) echo '{"op":"embed","ok":true,"vec_b64":"%%%","dim":2}' ;;
    *'"text":"huge dim"'*) echo '{"op":"embed","ok":true,"vec_b64":"AACAPwAAAAA=","dim":4611686018427387904}' ;;
    *'"op":"embed"'*) echo '{"op":"embed","ok":false,"error":"model not loaded"}' ;;
    *'"snippet":"too high"'*) echo '{"op":"rerank","ok":true,"score":1.5}' ;;
    *'"op":"rerank"'*) echo '{"ok":false,"error":"rerank server down"}' ;;
    *'"op":"stop"'*) echo '{"op":"stop","ok":true}'; exit 0 ;;
  esac
done
"#;

/// Reads requests but never answers.
pub const SILENT_WORKER: &str = r#"
echo launch >> "$1"
while IFS= read -r line; do :; done
"#;

/// Exits before the health probe.
pub const EXITING_WORKER: &str = r#"
echo launch >> "$1"
exit 3
"#;

/// Runs `script` through `sh -c`, passing `launch_log` as `$1`.
pub fn script_worker(script: &str, launch_log: &Path) -> WorkerConfig {
    WorkerConfig::default()
        .with_backend(BackendKind::Stdio)
        .with_worker_command(
            "sh",
            [
                "-c".to_string(),
                script.to_string(),
                "fake-worker".to_string(),
                launch_log.display().to_string(),
            ],
        )
        .with_startup_timeout(Duration::from_secs(5))
        .with_request_timeout(Duration::from_secs(5))
}

/// Number of times a script worker has been launched.
pub fn launches(launch_log: &Path) -> usize {
    std::fs::read_to_string(launch_log)
        .map(|log| log.lines().count())
        .unwrap_or(0)
}

pub fn candidate(key: &str, vector: &[f32]) -> Candidate {
    Candidate::new(key, format!("snippet {key}")).with_vector(encode(vector))
}

pub fn keys(candidates: &[Candidate]) -> Vec<&str> {
    candidates.iter().map(|c| c.key.as_str()).collect()
}
