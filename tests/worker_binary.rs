//! The `qx-worker` binary in its offline modes.

use std::process::Command;

const WORKER_BIN: &str = env!("CARGO_BIN_EXE_qx-worker");

fn worker() -> Command {
    let mut cmd = Command::new(WORKER_BIN);
    cmd.env_remove("ARCHIVE_AI_BACKEND")
        .env_remove("ARCHIVE_AI_MODE")
        .env_remove("ARCHIVE_AI_FALLBACK_DIM")
        .env("ARCHIVE_AI_STARTUP_TIMEOUT_SECS", "2")
        .env("RUST_LOG", "off");
    cmd
}

#[test]
fn test_self_check_without_backend_reports_fallback_dim() {
    let output = worker()
        .env("ARCHIVE_AI_WORKER_BIN", "/nonexistent/qx-worker")
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "dim=384");
}

#[test]
fn test_self_check_honours_fallback_dim() {
    let output = worker()
        .env("ARCHIVE_AI_WORKER_BIN", "/nonexistent/qx-worker")
        .env("ARCHIVE_AI_FALLBACK_DIM", "32")
        .output()
        .unwrap();

    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "dim=32");
}

#[test]
fn test_worker_mode_fails_without_llama_server() {
    let output = worker()
        .args(["--worker-mode", "embeddings"])
        .env("ARCHIVE_LLAMA_BIN", "/nonexistent/llama-server")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let line = String::from_utf8_lossy(&output.stdout);
    let reply: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
    assert_eq!(reply["ok"], false);
    assert!(reply["error"].as_str().unwrap().contains("spawn"));
}

#[test]
fn test_unknown_worker_mode_is_rejected() {
    let output = worker().arg("--worker-mode=rerank").output().unwrap();
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn test_invalid_config_is_rejected() {
    let output = worker()
        .env("ARCHIVE_AI_TOPK", "lots")
        .output()
        .unwrap();
    assert!(!output.status.success());
}
