//! In-memory tables produced by the loader and the normalizer.

use thiserror::Error;

/// A named column of raw string cells
#[derive(Debug, Clone, PartialEq)]
pub struct RawColumn {
    pub name: String,
    pub cells: Vec<String>,
}

impl RawColumn {
    pub fn new(name: impl Into<String>, cells: Vec<String>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }
}

/// A column whose length differs from the table's row count
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("column {column} has {found} rows, expected {expected}")]
pub struct RaggedColumn {
    pub column: String,
    pub found: usize,
    pub expected: usize,
}

/// Table of string cells exactly as read from an input file.
///
/// Every column, and the index when present, holds the same number of rows.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    index: Option<Vec<String>>,
    columns: Vec<RawColumn>,
    rows: usize,
}

impl RawTable {
    /// Build a table, rejecting the first column whose length is off
    pub fn new(index: Option<Vec<String>>, columns: Vec<RawColumn>) -> Result<Self, RaggedColumn> {
        let rows = index
            .as_ref()
            .map(Vec::len)
            .or_else(|| columns.first().map(|c| c.cells.len()))
            .unwrap_or(0);

        for column in &columns {
            if column.cells.len() != rows {
                return Err(RaggedColumn {
                    column: column.name.clone(),
                    found: column.cells.len(),
                    expected: rows,
                });
            }
        }

        Ok(Self { index, columns, rows })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    #[cfg(test)]
    pub fn index(&self) -> Option<&[String]> {
        self.index.as_deref()
    }

    #[cfg(test)]
    pub fn columns(&self) -> &[RawColumn] {
        &self.columns
    }

    pub fn into_parts(self) -> (Option<Vec<String>>, Vec<RawColumn>) {
        (self.index, self.columns)
    }
}

/// A named column of coerced values; `None` marks a missing cell
#[derive(Debug, Clone, PartialEq)]
pub struct NumericColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl NumericColumn {
    pub fn is_all_missing(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }
}

/// Numeric view of a [`RawTable`] after coercion and unit scaling.
///
/// Only columns with at least one numeric cell survive. Column order follows
/// the input file.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericTable {
    index: Option<Vec<String>>,
    columns: Vec<NumericColumn>,
    rows: usize,
}

impl NumericTable {
    pub fn new(index: Option<Vec<String>>, columns: Vec<NumericColumn>, rows: usize) -> Self {
        Self {
            index,
            columns,
            rows,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn column(&self, name: &str) -> Option<&NumericColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn into_parts(self) -> (Option<Vec<String>>, Vec<NumericColumn>) {
        (self.index, self.columns)
    }
}
