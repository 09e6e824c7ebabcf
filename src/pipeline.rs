// src/pipeline.rs

use crate::checkpoint::CheckpointStore;
use crate::cli::Layer;
use crate::columnizer::transform_dependencies_to_columns;
use crate::config::Config;
use crate::dependencies::DependencyLayer;
use crate::encoding::one_hot_encode;
use crate::error::Result;
use crate::github::{DependencySource, MetadataSource};
use crate::metrics::MetricsLayer;
use crate::runner::{BatchRunner, Schedule};
use crate::table::Table;
use std::path::PathBuf;
use std::time::Instant;

/// One transformation between two checkpoints
pub trait PipelineStep {
    fn name(&self) -> &str;
    fn process(&self, table: Table) -> Result<Table>;
}

pub struct MetricsStep<S>(pub MetricsLayer<S>);

impl<S: MetadataSource> PipelineStep for MetricsStep<S> {
    fn name(&self) -> &str {
        "metrics"
    }

    fn process(&self, mut table: Table) -> Result<Table> {
        self.0.update_repository_metrics(&mut table)?;
        Ok(table)
    }
}

pub struct DependencyStep<S>(pub DependencyLayer<S>);

impl<S: DependencySource> PipelineStep for DependencyStep<S> {
    fn name(&self) -> &str {
        "dependencies"
    }

    fn process(&self, mut table: Table) -> Result<Table> {
        self.0.process_repositories(&mut table)?;
        transform_dependencies_to_columns(&mut table);
        Ok(table)
    }
}

pub struct EncodingStep {
    pub columns: Vec<String>,
}

impl PipelineStep for EncodingStep {
    fn name(&self) -> &str {
        "encoding"
    }

    fn process(&self, mut table: Table) -> Result<Table> {
        let added = one_hot_encode(&mut table, &self.columns);
        println!("Encoding: {added} categorical columns added");
        Ok(table)
    }
}

/// Runs the layers in order, each reading the previous layer's checkpoint path
pub struct Pipeline {
    config: Config,
    steps: Vec<(Layer, Box<dyn PipelineStep>)>,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            steps: Vec::new(),
        }
    }

    /// The standard chain: metrics, dependencies, and the encoding layer.
    pub fn standard<M, D>(config: Config, metadata: M, dependencies: D) -> Self
    where
        M: MetadataSource + 'static,
        D: DependencySource + 'static,
    {
        let metrics = MetricsLayer::new(
            metadata,
            BatchRunner::new(Schedule::Sequential { pause: config.metrics_pause }, "Fetching metrics"),
        )
        .with_key_columns(&config.owner_column, &config.name_column)
        .with_error_log(config.error_log_path());
        let deps = DependencyLayer::new(
            dependencies,
            BatchRunner::new(Schedule::Pool { workers: config.workers }, "Analyzing dependencies"),
        )
        .with_key_columns(&config.owner_column, &config.name_column);
        let columns = config.categorical_columns.clone();

        Pipeline::new(config)
            .with_step(Layer::Metrics, MetricsStep(metrics))
            .with_step(Layer::Dependencies, DependencyStep(deps))
            .with_step(Layer::Encoding, EncodingStep { columns })
    }

    pub fn with_step(mut self, layer: Layer, step: impl PipelineStep + 'static) -> Self {
        self.steps.push((layer, Box::new(step)));
        self.steps.sort_by_key(|(l, _)| *l);
        self
    }

    pub fn run(&self) -> Result<Table> {
        let layers = self.config.layers();
        let Some(&first) = layers.first() else {
            tracing::warn!("no layers selected, nothing to do");
            return Ok(Table::default());
        };

        let mut table = match first.previous() {
            None => self.ingest()?,
            Some(previous) => {
                println!("Resuming from {} using {}", first.name(), self.path(previous).display());
                CheckpointStore::new(self.path(previous), self.path(first)).load()?
            }
        };

        let mut input = match first.previous() {
            None => self.path(Layer::Ingest),
            Some(previous) => self.path(previous),
        };
        for (layer, step) in &self.steps {
            if !layers.contains(layer) {
                continue;
            }
            let store = CheckpointStore::new(&input, self.path(*layer));
            let started = Instant::now();
            tracing::info!(layer = layer.name(), step = step.name(), input = %store.input().display(), "layer started");

            table = step.process(table)?;
            store.save(&table)?;

            println!("[{}] {} finished in {:.2?}", layer.name(), step.name(), started.elapsed());
            input = store.output().to_path_buf();
        }

        println!("Pipeline complete. Final data in {}", input.display());
        Ok(table)
    }

    fn ingest(&self) -> Result<Table> {
        println!("[{}] loading raw dataset {}", Layer::Ingest.name(), self.config.raw_input.display());
        let store = CheckpointStore::new(&self.config.raw_input, self.path(Layer::Ingest));
        let table = store.load()?;
        store.save(&table)?;
        Ok(table)
    }

    fn path(&self, layer: Layer) -> PathBuf {
        self.config.layer_path(layer)
    }
}
