// src/cli.rs

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Enrich a repository dataset layer by layer", long_about = None)]
pub struct Args {
    /// Raw input dataset (CSV)
    #[arg(long, default_value = "data/raw/repositories_raw_data.csv")]
    pub raw_input: PathBuf,

    /// Directory holding the layer checkpoints
    #[arg(long, default_value = "data/processed")]
    pub processed_dir: PathBuf,

    /// Concurrent dependency requests
    #[arg(long, default_value_t = 5)]
    pub workers: usize,

    /// Pause between metrics requests, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub metrics_pause_ms: u64,

    /// Pause between retries of a failed request, in milliseconds
    #[arg(long, default_value_t = 500)]
    pub retry_pause_ms: u64,

    /// Attempts per request before giving up
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    /// Column holding the repository owner
    #[arg(long, default_value = "repo_owner")]
    pub owner_column: String,

    /// Column holding the repository name
    #[arg(long, default_value = "repo_name")]
    pub name_column: String,

    /// Start from this layer, reading the previous layer's checkpoint
    #[arg(long, value_enum)]
    pub resume_from: Option<Layer>,

    /// Also run the categorical one-hot encoding layer
    #[arg(long)]
    pub encode: bool,

    /// API token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,
}

/// Pipeline layers, in execution order
#[derive(clap::ValueEnum, Clone, Debug, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    /// Raw dataset ingestion
    #[value(name = "layer_0")]
    Ingest,
    /// Repository metadata and languages
    #[value(name = "layer_1")]
    Metrics,
    /// Dependency lists and dependency columns
    #[value(name = "layer_2")]
    Dependencies,
    /// Categorical one-hot encoding
    #[value(name = "layer_3")]
    Encoding,
}

impl Layer {
    pub const ALL: [Layer; 4] = [Layer::Ingest, Layer::Metrics, Layer::Dependencies, Layer::Encoding];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn previous(self) -> Option<Layer> {
        self.index().checked_sub(1).map(|i| Layer::ALL[i])
    }

    pub fn name(self) -> &'static str {
        match self {
            Layer::Ingest => "layer_0",
            Layer::Metrics => "layer_1",
            Layer::Dependencies => "layer_2",
            Layer::Encoding => "layer_3",
        }
    }
}
