//! `qx-worker`: persistent inference worker speaking the stdio line protocol.
//!
//! Stdout carries protocol lines only; logs go to stderr.

use std::time::Duration;

use anyhow::Context;
use mimalloc::MiMalloc;
use tokio::io::{AsyncWriteExt, BufReader};

use qxrank::config::Config;
use qxrank::rpc::{Response, ServeExit, serve, write_response};
use qxrank::worker::{LlamaBackend, WorkerHandle, WorkerMode};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const SELF_CHECK_TEXT: &str = "quick check";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;
    config.validate()?;

    match worker_mode_arg(std::env::args().skip(1))? {
        Some(mode) => run_worker(&config, mode).await,
        None => run_self_check(config).await,
    }
}

/// Accepts `--worker-mode <mode>` and `--worker-mode=<mode>`.
fn worker_mode_arg(mut args: impl Iterator<Item = String>) -> anyhow::Result<Option<WorkerMode>> {
    while let Some(arg) = args.next() {
        let value = if arg == "--worker-mode" {
            args.next().context("--worker-mode needs a value")?
        } else if let Some(value) = arg.strip_prefix("--worker-mode=") {
            value.to_string()
        } else {
            continue;
        };
        let mode = value.parse::<WorkerMode>().map_err(anyhow::Error::msg)?;
        return Ok(Some(mode));
    }
    Ok(None)
}

async fn run_worker(config: &Config, mode: WorkerMode) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();

    tracing::info!(%mode, llama_bin = %config.worker.llama.llama_bin.display(), "Loading models");
    let mut backend =
        match LlamaBackend::start(&config.worker.llama, mode, config.worker.startup_timeout).await
        {
            Ok(backend) => backend,
            Err(e) => {
                write_response(&mut stdout, &Response::error(e.to_string())).await?;
                return Err(e).context("backend startup failed");
            }
        };

    let announce = Response::startup(
        backend.embed_load_time().as_secs_f64(),
        backend.rerank_load_time().as_secs_f64(),
    );
    write_response(&mut stdout, &announce).await?;
    tracing::info!(%mode, "Worker serving");

    let served = serve(BufReader::new(tokio::io::stdin()), &mut stdout, &mut backend).await;
    backend.stop(config.worker.shutdown_grace).await;
    stdout.flush().await?;

    match served? {
        ServeExit::Stopped => tracing::info!("Worker stopped on request"),
        ServeExit::Eof => tracing::info!("Input closed, worker exiting"),
    }
    Ok(())
}

async fn run_self_check(config: Config) -> anyhow::Result<()> {
    let mut worker_config = config.worker;
    if std::env::var_os("ARCHIVE_AI_WORKER_BIN").is_none()
        && let Ok(exe) = std::env::current_exe()
    {
        worker_config.worker_bin = exe;
    }

    let mode = config.ai_mode.worker_mode().unwrap_or(WorkerMode::Embeddings);
    let mut handle = WorkerHandle::new(mode, worker_config);
    let outcome = handle.embed(SELF_CHECK_TEXT).await?;

    tracing::info!(
        state = %handle.state(),
        degraded = outcome.is_degraded(),
        startup_ms = handle.startup_time().unwrap_or(Duration::ZERO).as_millis() as u64,
        "Self-check finished"
    );
    println!("dim={}", outcome.value().len());

    handle.shutdown().await;
    Ok(())
}
