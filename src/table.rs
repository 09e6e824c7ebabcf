// src/table.rs

use crate::error::{PipelineError, Result};
use crate::model::RepositoryIdentity;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

/// A single value in the dataset
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// CSV field representation. `Null` is the empty field.
    pub fn render(&self) -> Cow<'_, str> {
        match self {
            Cell::Null => Cow::Borrowed(""),
            Cell::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
            Cell::Int(i) => Cow::Owned(i.to_string()),
            Cell::Text(s) => Cow::Borrowed(s),
        }
    }

    pub(crate) fn from_field(field: &str) -> Self {
        if field.is_empty() {
            Cell::Null
        } else {
            Cell::Text(field.to_string())
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<i64> for Cell {
    fn from(i: i64) -> Self {
        Cell::Int(i)
    }
}

impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Cell::Bool(b)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map_or(Cell::Null, Into::into)
    }
}

/// Ordered rows with named columns. Every row holds exactly one cell per column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Table::default();
        for column in columns {
            table.ensure_column(&column.into(), Cell::Null);
        }
        table
    }

    /// Appends a row. Short rows are padded with `Null`, extra cells are dropped.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Null);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let col = *self.index.get(column)?;
        self.rows.get(row).map(|r| &r[col])
    }

    /// Adds the column filled with `default` unless it already exists.
    pub fn ensure_column(&mut self, name: &str, default: Cell) -> usize {
        if let Some(&col) = self.index.get(name) {
            return col;
        }
        let col = self.columns.len();
        self.columns.push(name.to_string());
        self.index.insert(name.to_string(), col);
        for row in &mut self.rows {
            row.push(default.clone());
        }
        col
    }

    /// Sets every row of the column to `value`, adding the column if needed.
    pub fn fill_column(&mut self, name: &str, value: Cell) {
        let col = self.ensure_column(name, Cell::Null);
        for row in &mut self.rows {
            row[col] = value.clone();
        }
    }

    /// Replaces the column's values row by row. Missing trailing values become `Null`.
    pub fn set_column(&mut self, name: &str, values: impl IntoIterator<Item = Cell>) {
        let col = self.ensure_column(name, Cell::Null);
        let mut values = values.into_iter();
        for row in &mut self.rows {
            row[col] = values.next().unwrap_or_default();
        }
    }

    /// Writes one cell. Unknown columns are added with `Null` for the other rows.
    pub fn set(&mut self, row: usize, column: &str, value: Cell) {
        if row >= self.rows.len() {
            return;
        }
        let col = self.ensure_column(column, Cell::Null);
        self.rows[row][col] = value;
    }

    /// Writes several cells of one row in a single assignment.
    pub fn set_many(&mut self, row: usize, values: &[(&str, Cell)]) {
        if row >= self.rows.len() {
            return;
        }
        let cols: Vec<usize> = values
            .iter()
            .map(|(name, _)| self.ensure_column(name, Cell::Null))
            .collect();
        let target = &mut self.rows[row];
        for (col, (_, value)) in cols.into_iter().zip(values) {
            target[col] = value.clone();
        }
    }

    /// Removes the named columns that exist; returns the names actually dropped.
    pub fn drop_columns(&mut self, names: &[&str]) -> Vec<String> {
        let doomed: HashSet<usize> = names.iter().filter_map(|n| self.index.get(*n).copied()).collect();
        if doomed.is_empty() {
            return Vec::new();
        }

        let mut dropped = Vec::new();
        let mut kept = Vec::with_capacity(self.columns.len() - doomed.len());
        for (i, column) in self.columns.drain(..).enumerate() {
            if doomed.contains(&i) {
                dropped.push(column);
            } else {
                kept.push(column);
            }
        }
        for row in &mut self.rows {
            let mut i = 0;
            row.retain(|_| {
                let keep = !doomed.contains(&i);
                i += 1;
                keep
            });
        }
        self.columns = kept;
        self.index = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
        dropped
    }

    /// The identity of a row, if both key cells hold text.
    pub fn identity(&self, row: usize, owner_col: &str, name_col: &str) -> Option<RepositoryIdentity> {
        let owner = self.cell(row, owner_col)?.as_text()?;
        let name = self.cell(row, name_col)?.as_text()?;
        Some(RepositoryIdentity::new(owner, name))
    }

    /// Distinct identities in first-seen row order.
    pub fn distinct_identities(&self, owner_col: &str, name_col: &str) -> Result<Vec<RepositoryIdentity>> {
        self.require_columns(&[owner_col, name_col])?;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for row in 0..self.rows.len() {
            match self.identity(row, owner_col, name_col) {
                Some(identity) => {
                    if seen.insert(identity.clone()) {
                        out.push(identity);
                    }
                }
                None => tracing::warn!(row, "row has no repository identity, skipping"),
            }
        }
        Ok(out)
    }

    /// Row positions whose key cells equal `identity`.
    pub fn rows_matching(&self, identity: &RepositoryIdentity, owner_col: &str, name_col: &str) -> Vec<usize> {
        let (Some(&oc), Some(&nc)) = (self.index.get(owner_col), self.index.get(name_col)) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, r)| {
                r[oc].as_text() == Some(identity.owner.as_str()) && r[nc].as_text() == Some(identity.name.as_str())
            })
            .map(|(i, _)| i)
            .collect()
    }

    pub fn require_columns(&self, names: &[&str]) -> Result<()> {
        match names.iter().find(|n| !self.has_column(n)) {
            Some(missing) => Err(PipelineError::MissingColumn(missing.to_string())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut t = Table::new(["repo_owner", "repo_name", "stars"]);
        t.push_row(vec!["a".into(), "x".into(), "1".into()]);
        t.push_row(vec!["b".into(), "y".into(), Cell::Null]);
        t.push_row(vec!["a".into(), "x".into(), "3".into()]);
        t
    }

    #[test]
    fn set_adds_unknown_column_with_nulls() {
        let mut t = sample();
        t.set(1, "description", "hello".into());
        assert_eq!(t.columns().len(), 4);
        assert_eq!(t.cell(0, "description"), Some(&Cell::Null));
        assert_eq!(t.cell(1, "description"), Some(&Cell::Text("hello".into())));
    }

    #[test]
    fn drop_columns_ignores_absent_names() {
        let mut t = sample();
        let dropped = t.drop_columns(&["stars", "topics"]);
        assert_eq!(dropped, vec!["stars".to_string()]);
        assert_eq!(t.columns(), &["repo_owner".to_string(), "repo_name".to_string()]);
        assert!(t.rows().iter().all(|r| r.len() == 2));
        assert_eq!(t.cell(1, "repo_name"), Some(&Cell::Text("y".into())));
    }

    #[test]
    fn distinct_identities_keep_first_seen_order() {
        let t = sample();
        let ids = t.distinct_identities("repo_owner", "repo_name").unwrap();
        assert_eq!(ids, vec![RepositoryIdentity::new("a", "x"), RepositoryIdentity::new("b", "y")]);
    }

    #[test]
    fn rows_matching_finds_every_duplicate_row() {
        let t = sample();
        let rows = t.rows_matching(&RepositoryIdentity::new("a", "x"), "repo_owner", "repo_name");
        assert_eq!(rows, vec![0, 2]);
    }

    #[test]
    fn identity_is_case_sensitive() {
        let t = sample();
        let rows = t.rows_matching(&RepositoryIdentity::new("A", "x"), "repo_owner", "repo_name");
        assert!(rows.is_empty());
    }

    #[test]
    fn missing_key_column_is_an_error() {
        let t = Table::new(["owner"]);
        assert!(matches!(
            t.distinct_identities("owner", "repo_name"),
            Err(PipelineError::MissingColumn(c)) if c == "repo_name"
        ));
    }

    #[test]
    fn set_many_writes_all_cells() {
        let mut t = sample();
        t.set_many(2, &[("dep_count", Cell::Int(4)), ("dep_error", Cell::Null)]);
        assert_eq!(t.cell(2, "dep_count"), Some(&Cell::Int(4)));
        assert_eq!(t.cell(0, "dep_count"), Some(&Cell::Null));
    }
}
