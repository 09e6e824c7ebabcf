// src/main.rs

use anyhow::Context;
use clap::Parser;
use repo_enrich::cli::Args;
use repo_enrich::github::GitHubClient;
use repo_enrich::{Config, Pipeline};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from(Args::parse());
    let start_time = Instant::now();
    println!("Starting repository pipeline at {}", chrono::Local::now().to_rfc2822());

    if config.github_token.is_none() {
        tracing::warn!("no GITHUB_TOKEN set, requests will be heavily rate limited");
    }
    let client = GitHubClient::new(config.github_token.clone())
        .context("building HTTP client")?
        .with_retries(config.max_retries, config.retry_pause);

    let table = Pipeline::standard(config, client.clone(), client)
        .run()
        .context("pipeline run failed")?;

    println!(
        "Total time: {:.2?} ({} rows, {} columns)",
        start_time.elapsed(),
        table.row_count(),
        table.columns().len()
    );
    Ok(())
}
