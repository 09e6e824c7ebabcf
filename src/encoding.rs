// src/encoding.rs

use crate::table::{Cell, Table};
use std::collections::BTreeSet;

pub const DEFAULT_CATEGORICAL_COLUMNS: [&str; 2] = ["primary_language", "license_name"];

/// `<column>_<value>` with the value lowercased and non-alphanumerics as `_`.
pub fn category_column(column: &str, value: &str) -> String {
    let mut col = format!("{column}_");
    for c in value.trim().chars() {
        if c.is_alphanumeric() {
            col.extend(c.to_lowercase());
        } else {
            col.push('_');
        }
    }
    col
}

/// One-hot encodes text columns. Null cells become all zeros, the source column stays.
pub fn one_hot_encode(table: &mut Table, columns: &[String]) -> usize {
    let mut added = 0;
    for column in columns {
        if !table.has_column(column) {
            tracing::warn!(%column, "categorical column missing, skipping");
            continue;
        }
        let values: Vec<Option<String>> = (0..table.row_count())
            .map(|row| {
                table
                    .cell(row, column)
                    .filter(|c| !c.is_null())
                    .map(|c| c.render().into_owned())
            })
            .collect();
        let categories: BTreeSet<&String> = values.iter().flatten().collect();
        for category in &categories {
            let encoded = category_column(column, category);
            table.set_column(
                &encoded,
                values.iter().map(|v| Cell::Int((v.as_ref() == Some(*category)) as i64)),
            );
            added += 1;
        }
    }
    added
}
