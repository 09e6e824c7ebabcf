// src/config.rs

use crate::cli::{Args, Layer};
use crate::encoding::DEFAULT_CATEGORICAL_COLUMNS;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub raw_input: PathBuf,
    pub processed_dir: PathBuf,
    pub workers: usize,
    pub metrics_pause: Duration,
    pub retry_pause: Duration,
    pub max_retries: u32,
    pub owner_column: String,
    pub name_column: String,
    pub resume_from: Option<Layer>,
    pub encode: bool,
    pub categorical_columns: Vec<String>,
    pub github_token: Option<String>,
}

impl Config {
    pub fn layer_path(&self, layer: Layer) -> PathBuf {
        self.processed_dir.join(format!("{}.csv", layer.name()))
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.processed_dir.join("errors_layer_1.csv")
    }

    /// Resuming from the encoding layer implies `encode`.
    pub fn encoding_enabled(&self) -> bool {
        self.encode || self.resume_from == Some(Layer::Encoding)
    }

    /// Layers to run, in order
    pub fn layers(&self) -> Vec<Layer> {
        let start = self.resume_from.unwrap_or(Layer::Ingest);
        let encode = self.encoding_enabled();
        Layer::ALL
            .into_iter()
            .filter(|l| *l >= start)
            .filter(|l| encode || *l != Layer::Encoding)
            .collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            raw_input: PathBuf::from("data/raw/repositories_raw_data.csv"),
            processed_dir: PathBuf::from("data/processed"),
            workers: 5,
            metrics_pause: Duration::from_secs(1),
            retry_pause: Duration::from_millis(500),
            max_retries: 3,
            owner_column: "repo_owner".to_string(),
            name_column: "repo_name".to_string(),
            resume_from: None,
            encode: false,
            categorical_columns: DEFAULT_CATEGORICAL_COLUMNS.iter().map(|c| c.to_string()).collect(),
            github_token: None,
        }
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            raw_input: args.raw_input,
            processed_dir: args.processed_dir,
            workers: args.workers.max(1),
            metrics_pause: Duration::from_millis(args.metrics_pause_ms),
            retry_pause: Duration::from_millis(args.retry_pause_ms),
            max_retries: args.max_retries.max(1),
            owner_column: args.owner_column,
            name_column: args.name_column,
            resume_from: args.resume_from,
            encode: args.encode,
            github_token: args.github_token.filter(|t| !t.trim().is_empty()),
            ..Self::default()
        }
    }
}
