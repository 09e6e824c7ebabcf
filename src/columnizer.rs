// src/columnizer.rs

use crate::dependencies::PAYLOAD_COLUMN;
use crate::table::{Cell, Table};
use serde::Deserialize;
use std::collections::BTreeSet;

pub const DEPENDENCY_PREFIX: &str = "dep_";

#[derive(Deserialize)]
struct Payload {
    #[serde(default)]
    dependencies: Vec<NamedDependency>,
}

#[derive(Deserialize)]
struct NamedDependency {
    name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnizeSummary {
    pub vocabulary: usize,
    pub rows_with_dependencies: usize,
}

/// Names listed in a serialized dependency payload. Anything unparsable is empty.
pub fn dependency_names(payload: Option<&str>) -> BTreeSet<String> {
    payload
        .and_then(|p| serde_json::from_str::<Payload>(p).ok())
        .map(|p| p.dependencies.into_iter().map(|d| d.name).collect())
        .unwrap_or_default()
}

/// `dep_` + the name with `@` removed and separators as `_`.
pub fn dependency_column(name: &str) -> String {
    let mut col = String::from(DEPENDENCY_PREFIX);
    for c in name.chars() {
        match c {
            '@' => {}
            '-' | '/' | '.' => col.push('_'),
            c if c.is_whitespace() => col.push('_'),
            c => col.push(c),
        }
    }
    col
}

/// Suffix for a dependency column that would shadow a column the table already had
pub const RESERVED_SUFFIX: &str = "_pkg";

/// One binary column per dependency name seen anywhere in the table. Columns that
/// exist before this runs, such as `dep_count`, are never overwritten.
pub fn transform_dependencies_to_columns(table: &mut Table) -> ColumnizeSummary {
    let reserved: BTreeSet<String> = table.columns().iter().cloned().collect();
    let sets: Vec<BTreeSet<String>> = (0..table.row_count())
        .map(|row| dependency_names(table.cell(row, PAYLOAD_COLUMN).and_then(Cell::as_text)))
        .collect();

    let vocabulary: BTreeSet<&String> = sets.iter().flatten().collect();
    tracing::info!(unique = vocabulary.len(), "dependency vocabulary collected");

    for dep in &vocabulary {
        let mut column = dependency_column(dep);
        if reserved.contains(&column) {
            let renamed = format!("{column}{RESERVED_SUFFIX}");
            tracing::warn!(dependency = %dep, %column, %renamed, "dependency column taken, renaming");
            column = renamed;
        }
        // colliding names overwrite the earlier column
        table.set_column(&column, sets.iter().map(|s| Cell::Int(s.contains(*dep) as i64)));
    }

    let summary = ColumnizeSummary {
        vocabulary: vocabulary.len(),
        rows_with_dependencies: sets.iter().filter(|s| !s.is_empty()).count(),
    };
    println!(
        "Columnized {} unique dependencies across {} rows",
        summary.vocabulary, summary.rows_with_dependencies
    );
    summary
}
