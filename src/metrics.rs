// src/metrics.rs

use crate::checkpoint::write_csv;
use crate::error::{Result, SourceError};
use crate::github::MetadataSource;
use crate::model::*;
use crate::runner::BatchRunner;
use crate::table::{Cell, Table};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

pub const LANGUAGE_PREFIX: &str = "lang_";

/// Scalar columns every row carries after the metrics layer
pub const METRIC_COLUMNS: [&str; 8] = [
    "description",
    "primary_language",
    "license_name",
    "security_policy_enabled",
    "vulnerability_alerts_enabled",
    "stargazers_count",
    "network_count",
    "subscribers_count",
];

/// `lang_<name>` with the name lowercased, spaces and dashes as `_`, `+` as `plus`.
pub fn language_column(language: &str) -> String {
    let mut col = String::from(LANGUAGE_PREFIX);
    for c in language.chars() {
        match c {
            ' ' | '-' => col.push('_'),
            '+' => col.push_str("plus"),
            c => col.extend(c.to_lowercase()),
        }
    }
    col
}

impl MetricsRecord {
    pub fn language_columns(&self) -> BTreeSet<String> {
        self.languages.iter().map(|l| language_column(l)).collect()
    }

    /// Column/value pairs for one row, scalars first then one `lang_*` flag per language.
    pub fn to_cells(&self) -> Vec<(String, Cell)> {
        let scalars: [Cell; 8] = [
            self.description.clone().into(),
            self.primary_language.clone().into(),
            self.license_name.clone().into(),
            self.security_policy_enabled.into(),
            self.vulnerability_alerts_enabled.into(),
            Cell::Int(self.stargazers_count),
            self.network_count.into(),
            self.subscribers_count.into(),
        ];
        METRIC_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .zip(scalars)
            .chain(self.language_columns().into_iter().map(|c| (c, Cell::Int(1))))
            .collect()
    }
}

/// Fetches a `MetricsRecord` for one repository from a metadata source
pub struct RepoMetrics<S> {
    source: S,
}

impl<S: MetadataSource> RepoMetrics<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// `Ok(None)` when the source does not know the repository.
    pub fn fetch(&self, repo: &RepositoryIdentity) -> std::result::Result<Option<MetricsRecord>, SourceError> {
        let Some(meta) = self.source.query_metadata(&repo.owner, &repo.name)? else {
            return Ok(None);
        };

        let counts = match self.source.query_rest_counts(&repo.owner, &repo.name) {
            Ok(counts) => counts,
            Err(e) => {
                tracing::warn!(%repo, error = %e, "REST counts unavailable");
                Default::default()
            }
        };

        Ok(Some(MetricsRecord {
            description: meta.description.clone(),
            primary_language: meta.primary_language.as_ref().map(|n| n.name.clone()),
            license_name: meta.license_info.as_ref().map(|n| n.name.clone()),
            security_policy_enabled: meta.is_security_policy_enabled,
            vulnerability_alerts_enabled: meta.has_vulnerability_alerts_enabled,
            stargazers_count: meta.stargazers.as_ref().map_or(0, |s| s.total_count),
            network_count: counts.network_count,
            subscribers_count: counts.subscribers_count,
            languages: meta.language_names().map(str::to_string).collect(),
        }))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSummary {
    pub rows: usize,
    pub enriched: usize,
    pub errors: usize,
    pub language_columns: usize,
}

/// Adds metrics and `lang_*` columns to every row
pub struct MetricsLayer<S> {
    metrics: RepoMetrics<S>,
    runner: BatchRunner,
    owner_col: String,
    name_col: String,
    error_log: Option<PathBuf>,
}

impl<S: MetadataSource> MetricsLayer<S> {
    pub fn new(source: S, runner: BatchRunner) -> Self {
        Self {
            metrics: RepoMetrics::new(source),
            runner,
            owner_col: "repo_owner".to_string(),
            name_col: "repo_name".to_string(),
            error_log: None,
        }
    }

    pub fn with_key_columns(mut self, owner: impl Into<String>, name: impl Into<String>) -> Self {
        self.owner_col = owner.into();
        self.name_col = name.into();
        self
    }

    pub fn with_error_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.error_log = Some(path.into());
        self
    }

    pub fn update_repository_metrics(&self, table: &mut Table) -> Result<MetricsSummary> {
        let jobs = table.distinct_identities(&self.owner_col, &self.name_col)?;
        tracing::info!(repositories = jobs.len(), "collecting repository metrics");

        // Pass 1: fetch each repository once and gather the full language column set
        let mut fetched: HashMap<RepositoryIdentity, MetricsRecord> = HashMap::new();
        let mut languages: BTreeSet<String> = BTreeSet::new();
        let mut errors: Vec<ErrorRecord> = Vec::new();
        self.runner.run(
            &jobs,
            |repo| self.metrics.fetch(repo),
            |repo, outcome| match outcome {
                Ok(Ok(Some(record))) => {
                    languages.extend(record.language_columns());
                    fetched.insert(repo.clone(), record);
                }
                Ok(Ok(None)) => {
                    tracing::warn!(%repo, "no metadata returned");
                    errors.push(ErrorRecord::new(repo, "no metadata returned"));
                }
                Ok(Err(e)) => {
                    tracing::warn!(%repo, error = %e, "metrics fetch failed");
                    errors.push(ErrorRecord::new(repo, e.to_string()));
                }
                Err(panic) => errors.push(ErrorRecord::new(repo, panic)),
            },
        )?;

        // Pass 2: declare every column, then write the rows that have metrics
        for column in METRIC_COLUMNS {
            table.ensure_column(column, Cell::Null);
        }
        for column in &languages {
            table.fill_column(column, Cell::Int(0));
        }
        for row in 0..table.row_count() {
            let Some(repo) = table.identity(row, &self.owner_col, &self.name_col) else {
                continue;
            };
            if let Some(record) = fetched.get(&repo) {
                for (column, value) in record.to_cells() {
                    table.set(row, &column, value);
                }
            }
        }

        if !errors.is_empty() {
            self.flush_errors(&errors);
        }

        let summary = MetricsSummary {
            rows: table.row_count(),
            enriched: fetched.len(),
            errors: errors.len(),
            language_columns: languages.len(),
        };
        println!(
            "Metrics: {} rows, {} repositories enriched, {} errors, {} language columns",
            summary.rows, summary.enriched, summary.errors, summary.language_columns
        );
        Ok(summary)
    }

    fn flush_errors(&self, errors: &[ErrorRecord]) {
        let Some(path) = &self.error_log else {
            return;
        };
        let mut log = Table::new(["owner", "name", "error"]);
        for e in errors {
            log.push_row(vec![e.owner.as_str().into(), e.name.as_str().into(), e.error.as_str().into()]);
        }
        match write_csv(path, &log) {
            Ok(()) => tracing::info!(path = %path.display(), count = errors.len(), "error log written"),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "could not write error log"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::{LanguageConnection, NamedNode, RepoMetadata, RestCounts};
    use crate::runner::Schedule;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct FakeMetadata {
        repos: HashMap<String, Vec<&'static str>>,
        calls: AtomicUsize,
    }

    impl FakeMetadata {
        fn with(mut self, name: &str, languages: Vec<&'static str>) -> Self {
            self.repos.insert(name.to_string(), languages);
            self
        }
    }

    impl MetadataSource for FakeMetadata {
        fn query_metadata(&self, _: &str, name: &str) -> std::result::Result<Option<RepoMetadata>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.repos.get(name) {
                Some(langs) => Ok(Some(RepoMetadata {
                    description: Some(format!("{name} repo")),
                    primary_language: langs.first().map(|l| NamedNode { name: l.to_string() }),
                    languages: Some(LanguageConnection {
                        nodes: langs.iter().map(|l| NamedNode { name: l.to_string() }).collect(),
                    }),
                    ..Default::default()
                })),
                None => Err(SourceError::Decode(format!("{name} unavailable"))),
            }
        }

        fn query_rest_counts(&self, _: &str, _: &str) -> std::result::Result<RestCounts, SourceError> {
            Ok(RestCounts { network_count: Some(2), subscribers_count: Some(5) })
        }
    }

    fn dataset(names: &[&str]) -> Table {
        let mut t = Table::new(["repo_owner", "repo_name"]);
        for n in names {
            t.push_row(vec!["octo".into(), (*n).into()]);
        }
        t
    }

    fn runner() -> BatchRunner {
        BatchRunner::new(Schedule::Sequential { pause: Duration::ZERO }, "metrics")
    }

    #[test]
    fn language_column_normalization() {
        assert_eq!(language_column("C++"), "lang_cplusplus");
        assert_eq!(language_column("Jupyter Notebook"), "lang_jupyter_notebook");
        assert_eq!(language_column("Objective-C"), "lang_objective_c");
    }

    #[test]
    fn language_flags_cover_the_batch_union() {
        let source = FakeMetadata::default()
            .with("a", vec!["Python", "JavaScript"])
            .with("b", vec!["Go"]);
        let mut table = dataset(&["a", "b", "c"]);

        let summary = MetricsLayer::new(source, runner()).update_repository_metrics(&mut table).unwrap();

        assert_eq!(summary.enriched, 2);
        assert_eq!(summary.errors, 1);
        let lang: Vec<_> = table.columns().iter().filter(|c| c.starts_with(LANGUAGE_PREFIX)).cloned().collect();
        assert_eq!(lang, vec!["lang_go", "lang_javascript", "lang_python"]);

        let flag = |row: usize, col: &str| table.cell(row, col).cloned();
        assert_eq!(flag(0, "lang_python"), Some(Cell::Int(1)));
        assert_eq!(flag(0, "lang_javascript"), Some(Cell::Int(1)));
        assert_eq!(flag(0, "lang_go"), Some(Cell::Int(0)));
        assert_eq!(flag(1, "lang_go"), Some(Cell::Int(1)));
        assert_eq!(flag(1, "lang_python"), Some(Cell::Int(0)));
        for col in ["lang_python", "lang_javascript", "lang_go"] {
            assert_eq!(flag(2, col), Some(Cell::Int(0)));
        }
        assert_eq!(flag(2, "description"), Some(Cell::Null));
        assert_eq!(flag(0, "network_count"), Some(Cell::Int(2)));
    }

    #[test]
    fn each_repository_is_fetched_once() {
        let source = FakeMetadata::default().with("a", vec!["Rust"]);
        let mut table = dataset(&["a", "a", "a"]);
        let layer = MetricsLayer::new(source, runner());
        layer.update_repository_metrics(&mut table).unwrap();

        assert_eq!(layer.metrics.source.calls.load(Ordering::SeqCst), 1);
        assert!((0..3).all(|r| table.cell(r, "lang_rust") == Some(&Cell::Int(1))));
    }

    #[test]
    fn errors_are_flushed_to_the_log() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = dir.path().join("logs").join("errors.csv");
        let mut table = dataset(&["x"]);

        MetricsLayer::new(FakeMetadata::default(), runner())
            .with_error_log(&log)
            .update_repository_metrics(&mut table)
            .unwrap();

        let written = std::fs::read_to_string(&log).unwrap();
        assert_eq!(written, "owner,name,error\nocto,x,malformed response: x unavailable\n");
    }

    #[test]
    fn no_errors_means_no_log() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = dir.path().join("errors.csv");
        let mut table = dataset(&["a"]);

        MetricsLayer::new(FakeMetadata::default().with("a", vec![]), runner())
            .with_error_log(&log)
            .update_repository_metrics(&mut table)
            .unwrap();

        assert!(!log.exists());
    }
}
