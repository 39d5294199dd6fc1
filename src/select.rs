//! Mapping table columns onto the canonical comparison order.

use crate::error::PlotError;
use crate::table::NumericTable;
use std::collections::BTreeMap;
use std::path::Path;

/// One selected series bound to its column values
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub id: String,
    pub values: Vec<Option<f64>>,
}

/// Selected series in canonical order, plus the category labels of each row
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub categories: Vec<String>,
    pub series: Vec<Series>,
}

impl Selection {
    pub fn ids(&self) -> Vec<&str> {
        self.series.iter().map(|s| s.id.as_str()).collect()
    }
}

/// A series with its own x values, from one whitespace-pairs input
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    pub id: String,
    pub x: Vec<Option<f64>>,
    pub y: Vec<Option<f64>>,
}

/// Allow-list of series identifiers in the order they are compared
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSelector {
    canonical: Vec<String>,
    aliases: BTreeMap<String, String>,
}

impl SeriesSelector {
    pub fn new<I, S>(canonical: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            canonical: canonical.into_iter().map(Into::into).collect(),
            aliases: BTreeMap::new(),
        }
    }

    /// Accept `column` as another name for the identifier `id`
    pub fn with_alias(mut self, column: impl Into<String>, id: impl Into<String>) -> Self {
        self.aliases.insert(column.into(), id.into());
        self
    }

    /// Find the column bound to `id`; an exact name beats an alias
    fn column_for<'t>(&self, id: &str, names: &[&'t str]) -> Option<&'t str> {
        names.iter().copied().find(|n| *n == id).or_else(|| {
            names
                .iter()
                .copied()
                .find(|n| self.aliases.get(*n).is_some_and(|target| target == id))
        })
    }

    /// Pick the recognized columns of `table` in canonical order.
    ///
    /// Unrecognized columns are discarded. Category labels come from the
    /// table index, or from row numbers when the table has none.
    pub fn select(&self, table: NumericTable, path: &Path) -> Result<Selection, PlotError> {
        let rows = table.rows();
        let bound: Vec<(String, String)> = {
            let names = table.column_names();
            self.canonical
                .iter()
                .filter_map(|id| self.column_for(id, &names).map(|n| (id.clone(), n.to_string())))
                .collect()
        };

        if bound.is_empty() {
            return Err(PlotError::EmptySeries {
                path: path.to_path_buf(),
                expected: self.canonical.clone(),
            });
        }

        let (index, mut columns) = table.into_parts();
        let series = bound
            .into_iter()
            .filter_map(|(id, name)| {
                let at = columns.iter().position(|c| c.name == name)?;
                Some(Series {
                    id,
                    values: columns.swap_remove(at).values,
                })
            })
            .collect();

        let categories = index.unwrap_or_else(|| (0..rows).map(|i| i.to_string()).collect());

        Ok(Selection { categories, series })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::NumericColumn;
    use std::path::PathBuf;

    fn table(names: &[&str]) -> NumericTable {
        let columns = names
            .iter()
            .enumerate()
            .map(|(i, name)| NumericColumn {
                name: name.to_string(),
                values: vec![Some(i as f64), Some(10.0 + i as f64)],
            })
            .collect();
        NumericTable::new(Some(vec!["4".into(), "8".into()]), columns, 2)
    }

    fn input() -> PathBuf {
        PathBuf::from("producers.csv")
    }

    #[test]
    fn output_follows_canonical_order() {
        let selector = SeriesSelector::new(["RAIN", "CLMAT"]);
        let selection = selector.select(table(&["CLMAT", "RAIN"]), &input()).unwrap();

        assert_eq!(selection.ids(), ["RAIN", "CLMAT"]);
        assert_eq!(selection.series[0].values, [Some(1.0), Some(11.0)]);
        assert_eq!(selection.categories, ["4", "8"]);
    }

    #[test]
    fn unrecognized_columns_are_discarded() {
        let selector = SeriesSelector::new(["RAIN", "TCP", "RAIN-0.5", "TCP-0.5"]);
        let selection = selector
            .select(table(&["TCP-0.5", "Notes", "RAIN"]), &input())
            .unwrap();
        assert_eq!(selection.ids(), ["RAIN", "TCP-0.5"]);
    }

    #[test]
    fn empty_intersection_is_reported() {
        let selector = SeriesSelector::new(["RAIN", "CLMAT"]);
        let err = selector.select(table(&["PS", "Other"]), &input()).unwrap_err();
        match err {
            PlotError::EmptySeries { path, expected } => {
                assert_eq!(path, input());
                assert_eq!(expected, ["RAIN", "CLMAT"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn aliases_bind_renamed_columns() {
        let selector = SeriesSelector::new(["RAIN", "TCP"])
            .with_alias("RAIN_runtime", "RAIN")
            .with_alias("TCP_runtime", "TCP");
        let selection = selector
            .select(table(&["TCP_runtime", "RAIN_runtime"]), &input())
            .unwrap();
        assert_eq!(selection.ids(), ["RAIN", "TCP"]);
        assert_eq!(selection.series[1].values, [Some(0.0), Some(10.0)]);
    }

    #[test]
    fn exact_name_wins_over_alias() {
        let selector = SeriesSelector::new(["RAIN"]).with_alias("RAIN_runtime", "RAIN");
        let selection = selector
            .select(table(&["RAIN_runtime", "RAIN"]), &input())
            .unwrap();
        assert_eq!(selection.series[0].values, [Some(1.0), Some(11.0)]);
    }

    #[test]
    fn missing_index_falls_back_to_row_numbers() {
        let numeric = NumericTable::new(
            None,
            vec![NumericColumn {
                name: "RAIN".into(),
                values: vec![Some(1.0), None, Some(3.0)],
            }],
            3,
        );
        let selection = SeriesSelector::new(["RAIN"]).select(numeric, &input()).unwrap();
        assert_eq!(selection.categories, ["0", "1", "2"]);
    }
}
