// src/dependencies.rs

use crate::analyzer::DependencyAnalyzer;
use crate::error::Result;
use crate::github::DependencySource;
use crate::model::AnalysisResult;
use crate::runner::BatchRunner;
use crate::table::{Cell, Table};

pub const PAYLOAD_COLUMN: &str = "dependencies_json";
pub const COUNT_COLUMN: &str = "dep_count";
pub const ERROR_COLUMN: &str = "dep_error";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySummary {
    pub repositories: usize,
    pub rows_updated: usize,
    pub rows_with_errors: usize,
}

/// Fetches every repository's dependencies on a worker pool and merges the
/// results on the calling thread
pub struct DependencyLayer<S> {
    analyzer: DependencyAnalyzer<S>,
    runner: BatchRunner,
    owner_col: String,
    name_col: String,
}

impl<S: DependencySource> DependencyLayer<S> {
    pub fn new(source: S, runner: BatchRunner) -> Self {
        Self {
            analyzer: DependencyAnalyzer::new(source),
            runner,
            owner_col: "repo_owner".to_string(),
            name_col: "repo_name".to_string(),
        }
    }

    pub fn with_key_columns(mut self, owner: impl Into<String>, name: impl Into<String>) -> Self {
        self.owner_col = owner.into();
        self.name_col = name.into();
        self
    }

    pub fn process_repositories(&self, table: &mut Table) -> Result<DependencySummary> {
        let jobs = table.distinct_identities(&self.owner_col, &self.name_col)?;
        table.fill_column(PAYLOAD_COLUMN, Cell::Text(String::new()));
        table.fill_column(COUNT_COLUMN, Cell::Int(0));
        table.fill_column(ERROR_COLUMN, Cell::Null);

        tracing::info!(repositories = jobs.len(), schedule = ?self.runner.schedule(), "analyzing dependencies");

        let mut summary = DependencySummary {
            repositories: jobs.len(),
            ..Default::default()
        };
        self.runner.run(
            &jobs,
            |repo| self.analyzer.analyze_repository(repo),
            |repo, outcome| {
                let cells = match outcome.map(|r| encode_result(&r)) {
                    Ok(Ok(cells)) => cells,
                    Ok(Err(e)) => failure_cells(format!("could not serialize result: {e}")),
                    Err(panic) => failure_cells(panic),
                };
                let failed = !cells[2].1.is_null();
                for row in table.rows_matching(repo, &self.owner_col, &self.name_col) {
                    table.set_many(row, &cells);
                    summary.rows_updated += 1;
                    if failed {
                        summary.rows_with_errors += 1;
                    }
                }
            },
        )?;

        println!(
            "Dependencies: {} repositories, {} rows updated, {} rows with errors",
            summary.repositories, summary.rows_updated, summary.rows_with_errors
        );
        Ok(summary)
    }
}

fn encode_result(result: &AnalysisResult) -> serde_json::Result<[(&'static str, Cell); 3]> {
    let payload = serde_json::to_string(result)?;
    Ok([
        (PAYLOAD_COLUMN, Cell::Text(payload)),
        (COUNT_COLUMN, Cell::Int(result.metadata.total_dependencies as i64)),
        (ERROR_COLUMN, result.metadata.error.clone().into()),
    ])
}

fn failure_cells(error: String) -> [(&'static str, Cell); 3] {
    [
        (PAYLOAD_COLUMN, Cell::Null),
        (COUNT_COLUMN, Cell::Int(0)),
        (ERROR_COLUMN, Cell::Text(error)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::runner::Schedule;
    use serde_json::{json, Value};

    struct FakeGraph;

    impl DependencySource for FakeGraph {
        fn fetch_manifest_file(&self, _: &str, _: &str, _: &str) -> std::result::Result<Option<String>, SourceError> {
            Ok(None)
        }

        fn fetch_dependency_graph(&self, _: &str, name: &str) -> std::result::Result<Vec<Value>, SourceError> {
            match name {
                "deps" => Ok(vec![json!({"manifests": {"m": {"resolved": {"dependencies": [
                    {"package": {"name": "express"}, "metadata": {"version": "4.0"}, "direct": true},
                    {"package": {"name": "lodash"}, "metadata": {"version": "1.0"}, "direct": false}
                ]}}}})]),
                "empty" => Ok(Vec::new()),
                "broken" => Err(SourceError::Decode("graph unavailable".into())),
                _ => panic!("unexpected repository {name}"),
            }
        }
    }

    fn layer() -> DependencyLayer<FakeGraph> {
        DependencyLayer::new(FakeGraph, BatchRunner::new(Schedule::Pool { workers: 2 }, "deps"))
    }

    fn dataset(names: &[&str]) -> Table {
        let mut t = Table::new(["repo_owner", "repo_name"]);
        for n in names {
            t.push_row(vec!["octo".into(), (*n).into()]);
        }
        t
    }

    #[test]
    fn failures_and_empty_repositories_stay_distinguishable() {
        let mut table = dataset(&["empty", "broken"]);
        let summary = layer().process_repositories(&mut table).unwrap();

        assert_eq!(table.cell(0, COUNT_COLUMN), Some(&Cell::Int(0)));
        assert_eq!(table.cell(0, ERROR_COLUMN), Some(&Cell::Null));
        assert_eq!(table.cell(1, COUNT_COLUMN), Some(&Cell::Int(0)));
        assert!(table.cell(1, ERROR_COLUMN).and_then(Cell::as_text).unwrap().contains("graph unavailable"));
        assert_eq!(summary.rows_with_errors, 1);
    }

    #[test]
    fn duplicate_rows_receive_the_same_result() {
        let mut table = dataset(&["deps", "empty", "deps"]);
        let summary = layer().process_repositories(&mut table).unwrap();

        assert_eq!(summary.repositories, 2);
        assert_eq!(summary.rows_updated, 3);
        assert_eq!(table.cell(0, COUNT_COLUMN), Some(&Cell::Int(2)));
        assert_eq!(table.cell(0, PAYLOAD_COLUMN), table.cell(2, PAYLOAD_COLUMN));

        let payload: AnalysisResult =
            serde_json::from_str(table.cell(0, PAYLOAD_COLUMN).and_then(Cell::as_text).unwrap()).unwrap();
        assert_eq!(payload.repository, "octo/deps");
        assert_eq!(payload.dependencies.len(), 2);
    }

    #[test]
    fn panicking_job_marks_only_its_row() {
        let mut table = dataset(&["deps", "mystery"]);
        let summary = layer().process_repositories(&mut table).unwrap();

        assert_eq!(table.cell(0, ERROR_COLUMN), Some(&Cell::Null));
        assert_eq!(table.cell(1, PAYLOAD_COLUMN), Some(&Cell::Null));
        assert_eq!(table.cell(1, COUNT_COLUMN), Some(&Cell::Int(0)));
        assert_eq!(
            table.cell(1, ERROR_COLUMN),
            Some(&Cell::Text("unexpected repository mystery".into()))
        );
        assert_eq!(summary.rows_with_errors, 1);
    }
}
