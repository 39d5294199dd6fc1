//! Numeric coercion and unit scaling.

use crate::error::PlotError;
use crate::table::{NumericColumn, NumericTable, RawTable};
use log::debug;
use std::collections::BTreeMap;

/// Divisors applied to every retained column after coercion.
///
/// `elapsed` in milliseconds becomes seconds with a divisor of 1000; a raw
/// bandwidth counter may need 10, or 1 to stay as recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitScale {
    divisor: f64,
    overrides: BTreeMap<String, f64>,
}

impl UnitScale {
    pub fn new(divisor: f64) -> Self {
        Self {
            divisor,
            overrides: BTreeMap::new(),
        }
    }

    /// Leave values as recorded
    pub fn identity() -> Self {
        Self::new(1.0)
    }

    pub fn with_column(mut self, column: impl Into<String>, divisor: f64) -> Self {
        self.overrides.insert(column.into(), divisor);
        self
    }

    pub fn divisor_for(&self, column: &str) -> f64 {
        self.overrides.get(column).copied().unwrap_or(self.divisor)
    }
}

impl Default for UnitScale {
    fn default() -> Self {
        Self::identity()
    }
}

/// Parse one cell. Empty, non-numeric and non-finite cells are errors here;
/// [`normalize`] turns them into missing values.
pub fn coerce_cell(column: &str, raw: &str) -> Result<f64, PlotError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| PlotError::MalformedCell {
            column: column.to_string(),
            value: raw.to_string(),
        })
}

/// Coerce every cell, drop columns with no numeric cell, and scale the rest
pub fn normalize(table: RawTable, scale: &UnitScale) -> NumericTable {
    let rows = table.rows();
    let (index, raw_columns) = table.into_parts();

    let mut columns = Vec::with_capacity(raw_columns.len());
    for raw in raw_columns {
        let divisor = scale.divisor_for(&raw.name);
        let values: Vec<Option<f64>> = raw
            .cells
            .iter()
            .map(|cell| match coerce_cell(&raw.name, cell) {
                Ok(v) => Some(v / divisor),
                Err(e) => {
                    if !cell.trim().is_empty() {
                        debug!("{e}; treating as missing");
                    }
                    None
                }
            })
            .collect();

        let column = NumericColumn {
            name: raw.name,
            values,
        };
        if column.is_all_missing() {
            debug!("Dropping column {} with no numeric cells", column.name);
            continue;
        }
        columns.push(column);
    }

    NumericTable::new(index, columns, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::RawColumn;

    fn column(name: &str, cells: &[&str]) -> RawColumn {
        RawColumn::new(name, cells.iter().map(|c| c.to_string()).collect())
    }

    fn indexed(columns: Vec<RawColumn>) -> RawTable {
        let rows = columns[0].cells.len();
        let index = (0..rows).map(|i| i.to_string()).collect();
        RawTable::new(Some(index), columns).unwrap()
    }

    #[test]
    fn unparsable_cells_become_missing() {
        let table = indexed(vec![column("RAIN", &["12", "n/a", "", "NaN", "inf", "7"])]);
        let numeric = normalize(table, &UnitScale::identity());

        let rain = numeric.column("RAIN").unwrap();
        assert_eq!(rain.values, [Some(12.0), None, None, None, None, Some(7.0)]);
    }

    #[test]
    fn all_missing_columns_are_dropped() {
        let table = indexed(vec![
            column("RAIN", &["1", "2"]),
            column("Extra", &["fast", "slow"]),
            column("CLMAT", &["3", ""]),
        ]);
        let numeric = normalize(table, &UnitScale::identity());

        assert_eq!(numeric.column_names(), ["RAIN", "CLMAT"]);
        assert!(numeric.column("Extra").is_none());
        assert_eq!(numeric.rows(), 2);
    }

    #[test]
    fn milliseconds_become_seconds_exactly() {
        let table = indexed(vec![column("RAIN", &["1000", "250"])]);
        let numeric = normalize(table, &UnitScale::new(1000.0));
        assert_eq!(numeric.column("RAIN").unwrap().values, [Some(1.0), Some(0.25)]);
    }

    #[test]
    fn per_column_divisors_override_the_default() {
        let table = RawTable::new(
            None,
            vec![column("elapsed", &["1000"]), column("metric", &["100"])],
        )
        .unwrap();

        let dcn = UnitScale::new(1000.0).with_column("metric", 10.0);
        let numeric = normalize(table.clone(), &dcn);
        assert_eq!(numeric.column("elapsed").unwrap().values, [Some(1.0)]);
        assert_eq!(numeric.column("metric").unwrap().values, [Some(10.0)]);

        let isp = UnitScale::new(1000.0).with_column("metric", 1.0);
        let numeric = normalize(table, &isp);
        assert_eq!(numeric.column("metric").unwrap().values, [Some(100.0)]);
    }

    #[test]
    fn coerce_cell_reports_the_offending_value() {
        let err = coerce_cell("TCP", "12ms").unwrap_err();
        assert!(matches!(err, PlotError::MalformedCell { ref value, .. } if value == "12ms"));
        assert_eq!(coerce_cell("TCP", " 42.5 ").unwrap(), 42.5);
    }
}
