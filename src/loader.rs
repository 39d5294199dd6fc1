//! Reading benchmark exports into raw string tables.

use crate::error::PlotError;
use crate::table::{RawColumn, RawTable};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Column holding the elapsed time of a whitespace-pairs input
pub const ELAPSED_COLUMN: &str = "elapsed";
/// Column holding the raw metric of a whitespace-pairs input
pub const METRIC_COLUMN: &str = "metric";

/// On-disk layout of an input file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layout {
    /// Comma separated, header row, first column is the category index
    IndexedCsv,
    /// Headerless `elapsed metric` pairs separated by whitespace
    WhitespacePairs,
}

/// Load an input file in the given layout
pub fn load_table(path: &Path, layout: Layout) -> Result<RawTable, PlotError> {
    if !path.exists() {
        return Err(PlotError::NotFound {
            path: path.to_path_buf(),
        });
    }

    match layout {
        Layout::IndexedCsv => load_indexed(path),
        Layout::WhitespacePairs => load_pairs(path),
    }
}

fn malformed(path: &Path, reason: impl Into<String>) -> PlotError {
    PlotError::Malformed {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn load_indexed(path: &Path) -> Result<RawTable, PlotError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| malformed(path, e.to_string()))?;

    let headers = reader
        .headers()
        .map_err(|e| malformed(path, format!("reading header: {e}")))?
        .clone();
    if headers.is_empty() {
        return Err(malformed(path, "missing header row"));
    }

    let mut index = Vec::new();
    let mut columns: Vec<RawColumn> = headers
        .iter()
        .skip(1)
        .map(|name| RawColumn::new(name, Vec::new()))
        .collect();

    for (row, record) in reader.records().enumerate() {
        // Row numbers in messages count the header as line 1
        let record = record.map_err(|e| malformed(path, format!("line {}: {e}", row + 2)))?;
        index.push(record.get(0).unwrap_or_default().to_string());
        for (i, column) in columns.iter_mut().enumerate() {
            column
                .cells
                .push(record.get(i + 1).unwrap_or_default().to_string());
        }
    }

    RawTable::new(Some(index), columns).map_err(|e| malformed(path, e.to_string()))
}

fn load_pairs(path: &Path) -> Result<RawTable, PlotError> {
    let content = fs::read_to_string(path).map_err(|e| malformed(path, e.to_string()))?;

    let mut elapsed = Vec::new();
    let mut metric = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut tokens = line.split_whitespace();
        elapsed.push(tokens.next().unwrap_or_default().to_string());
        metric.push(tokens.next().unwrap_or_default().to_string());
    }

    RawTable::new(
        None,
        vec![
            RawColumn::new(ELAPSED_COLUMN, elapsed),
            RawColumn::new(METRIC_COLUMN, metric),
        ],
    )
    .map_err(|e| malformed(path, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let err = load_table(&dir.path().join("absent.csv"), Layout::IndexedCsv).unwrap_err();
        assert!(matches!(err, PlotError::NotFound { .. }));
    }

    #[test]
    fn indexed_csv_splits_index_from_series() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("producers.csv");
        fs::write(&path, " producers , RAIN ,CLMAT\n4,1200,1800\n8, 2300 ,3100\n").unwrap();

        let table = load_table(&path, Layout::IndexedCsv).unwrap();
        assert_eq!(table.rows(), 2);
        assert_eq!(table.index().unwrap(), ["4", "8"]);

        let names: Vec<_> = table.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["RAIN", "CLMAT"]);
        assert_eq!(table.columns()[0].cells, ["1200", "2300"]);
    }

    #[test]
    fn ragged_csv_is_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ragged.csv");
        fs::write(&path, "n,RAIN,CLMAT\n4,1,2\n8,3\n").unwrap();

        let err = load_table(&path, Layout::IndexedCsv).unwrap_err();
        assert!(matches!(err, PlotError::Malformed { .. }));
    }

    #[test]
    fn whitespace_pairs_skip_blank_and_comment_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("extracted.txt");
        fs::write(&path, "# time counter\n0   95\n\n100\t97 extra\n200\n").unwrap();

        let table = load_table(&path, Layout::WhitespacePairs).unwrap();
        assert_eq!(table.rows(), 3);
        assert_eq!(table.columns()[0].name, ELAPSED_COLUMN);
        assert_eq!(table.columns()[0].cells, ["0", "100", "200"]);
        assert_eq!(table.columns()[1].cells, ["95", "97", ""]);
    }
}
