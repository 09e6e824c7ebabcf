// src/checkpoint.rs

use crate::error::{PipelineError, Result};
use crate::table::{Cell, Table};
use std::fs;
use std::path::{Path, PathBuf};

/// Columns of the raw dataset that no layer uses
pub const LEGACY_COLUMNS: &[&str] = &[
    "labels",
    "topics",
    "Low",
    "Medium",
    "High",
    "Critical",
    "Total Vulnerabilities",
    "CWE Tags",
    "vulnerability-proneness-all",
];

/// Loads one layer's snapshot and persists the next one
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    input: PathBuf,
    output: PathBuf,
}

impl CheckpointStore {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn load(&self) -> Result<Table> {
        let mut table = read_csv(&self.input)?;
        let dropped = table.drop_columns(LEGACY_COLUMNS);
        if !dropped.is_empty() {
            tracing::debug!(?dropped, "dropped legacy columns");
        }
        tracing::info!(
            path = %self.input.display(),
            rows = table.row_count(),
            columns = table.columns().len(),
            "checkpoint loaded"
        );
        Ok(table)
    }

    pub fn save(&self, table: &Table) -> Result<()> {
        write_csv(&self.output, table)?;
        println!("Saved {} rows to {}", table.row_count(), self.output.display());
        Ok(())
    }
}

pub fn read_csv(path: &Path) -> Result<Table> {
    if !path.exists() {
        return Err(PipelineError::MissingInput(path.to_path_buf()));
    }
    let mut reader = csv::Reader::from_path(path)?;
    let mut table = Table::new(reader.headers()?.iter());
    for record in reader.records() {
        let record = record?;
        table.push_row(record.iter().map(Cell::from_field).collect());
    }
    Ok(table)
}

/// Writes the table, creating parent directories and replacing any existing file.
pub fn write_csv(path: &Path, table: &Table) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(table.columns())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(|c| c.render().into_owned()))?;
    }
    writer.flush()?;
    Ok(())
}
