//! Staged reload driver.
//!
//! Rewrites the tileserver config with one, then two, then three `[[sources]]`
//! blocks, signalling the tileserver through the control API after each
//! rewrite, while polling the tileserver's own endpoints. The original config
//! is restored on exit.

use crate::api::{self, Lifecycle};
use anyhow::Context;
use arcturus_config::StagedConfig;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub config_path: PathBuf,
    pub tileserver_url: String,
    pub interval: Duration,
    pub reload_interval: Duration,
    pub timeout: Duration,
}

pub async fn run(client: &Client, server: &str, options: &WatchOptions) -> anyhow::Result<()> {
    let original = fs::read_to_string(&options.config_path).with_context(|| {
        format!(
            "Failed to read tileserver config at {}",
            options.config_path.display()
        )
    })?;
    let staged = StagedConfig::split(&original);

    let outcome = tokio::select! {
        result = drive(client, server, options, &staged) => result,
        _ = shutdown_signal() => {
            println!("Received shutdown signal, stopping tileserver...");
            Ok(())
        }
    };

    let stopped = api::lifecycle(client, server, Lifecycle::Stop).await;
    fs::write(&options.config_path, &original).with_context(|| {
        format!(
            "Failed to restore tileserver config at {}",
            options.config_path.display()
        )
    })?;

    outcome?;
    stopped?;
    Ok(())
}

/// Runs until an unrecoverable error; only `run` ends the watch normally.
async fn drive(
    client: &Client,
    server: &str,
    options: &WatchOptions,
    staged: &StagedConfig,
) -> anyhow::Result<()> {
    let stages = staged.stages();
    write_stage(&options.config_path, staged, stages[0])?;

    println!("Starting tileserver via {}", server);
    println!("  Config: {}", options.config_path.display());
    println!("  Stages: {:?} of {} sources", stages, staged.source_count());
    let status = api::lifecycle(client, server, Lifecycle::Start).await?;
    if let Some(pid) = status.pid {
        println!("  PID: {}", pid);
    }

    let probe_client = Client::builder().timeout(options.timeout).build()?;
    let base_url = options.tileserver_url.trim_end_matches('/');
    let mut next_stage = 1;
    let mut next_reload_at = Instant::now() + options.reload_interval;
    let mut ticker = tokio::time::interval(options.interval);

    loop {
        ticker.tick().await;

        match probe(&probe_client, base_url).await {
            Ok((health, data, sources)) => println!(
                "health={} data={} sources={}",
                health.as_u16(),
                data.as_u16(),
                sources
            ),
            Err(e) => println!("Probe failed: {:#}", e),
        }

        let now = Instant::now();
        if next_stage < stages.len() && now >= next_reload_at {
            let count = stages[next_stage];
            write_stage(&options.config_path, staged, count)?;

            // A failed signal is retried on the next tick
            match api::lifecycle(client, server, Lifecycle::Sighup).await {
                Ok(_) => {
                    println!("Reloaded config with {} sources", count);
                    next_stage += 1;
                    next_reload_at = now + options.reload_interval;
                }
                Err(e) => warn!(error = %e, "Reload request failed"),
            }
        }
    }
}

fn write_stage(config_path: &Path, staged: &StagedConfig, count: usize) -> anyhow::Result<()> {
    fs::write(config_path, staged.render(count)).with_context(|| {
        format!(
            "Failed to write staged config to {}",
            config_path.display()
        )
    })
}

/// GET the tileserver's `/health` and `/data.json`
async fn probe(client: &Client, base_url: &str) -> anyhow::Result<(StatusCode, StatusCode, usize)> {
    let health = client
        .get(format!("{}/health", base_url))
        .header(ACCEPT, "text/plain")
        .send()
        .await?
        .error_for_status()?;

    let data = client
        .get(format!("{}/data.json", base_url))
        .header(ACCEPT, "application/json")
        .send()
        .await?
        .error_for_status()?;
    let data_status = data.status();
    let payload: Value = data.json().await?;

    Ok((health.status(), data_status, count_sources(&payload)))
}

/// Sources advertised by `/data.json`: either `{"sources": [...]}` or a bare list
fn count_sources(payload: &Value) -> usize {
    match payload {
        Value::Object(map) => map
            .get("sources")
            .and_then(Value::as_array)
            .map_or(0, Vec::len),
        Value::Array(items) => items.len(),
        _ => 0,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
