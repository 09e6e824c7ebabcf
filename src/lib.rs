// src/lib.rs

pub mod analyzer;
pub mod checkpoint;
pub mod cli;
pub mod columnizer;
pub mod config;
pub mod dependencies;
pub mod encoding;
pub mod error;
pub mod github;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod runner;
pub mod table;

pub use config::Config;
pub use error::{PipelineError, Result, SourceError};
pub use pipeline::Pipeline;
pub use table::{Cell, Table};
