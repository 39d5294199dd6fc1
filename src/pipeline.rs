//! Drives inputs through Load -> Normalize -> Select -> Compose -> Export.

use crate::chart::{ChartComposer, ChartSpec};
use crate::config::{Inputs, PairedInput, ProfileConfig};
use crate::error::PlotError;
use crate::loader::{self, ELAPSED_COLUMN, METRIC_COLUMN};
use crate::normalize;
use crate::render;
use crate::select::TimeSeries;
use crate::style::StyleRegistry;
use log::{debug, error, info, warn};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Last stage an input reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Loaded,
    Normalized,
    Selected,
    Composed,
    Exported,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Loaded => "loaded",
            Stage::Normalized => "normalized",
            Stage::Selected => "selected",
            Stage::Composed => "composed",
            Stage::Exported => "exported",
        };
        f.write_str(name)
    }
}

/// Charts written and inputs skipped during one run
#[derive(Debug, Default)]
pub struct BatchReport {
    pub exported: Vec<PathBuf>,
    pub skipped: Vec<(PathBuf, PlotError)>,
}

impl BatchReport {
    fn record(&mut self, input: &Path, result: Result<PathBuf, PlotError>) {
        match result {
            Ok(path) => {
                info!("Saved {}", path.display());
                self.exported.push(path);
            }
            Err(e) => {
                match e {
                    PlotError::ExportFailure { .. } => error!("{e}"),
                    _ => warn!("Skipping {}: {e}", input.display()),
                }
                self.skipped.push((input.to_path_buf(), e));
            }
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Generated {} chart(s), skipped {} input(s)",
            self.exported.len(),
            self.skipped.len()
        )
    }
}

/// Every regular file in `dir` with the given extension, sorted by name
pub fn discover(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, PlotError> {
    if !dir.is_dir() {
        return Err(PlotError::NotFound {
            path: dir.to_path_buf(),
        });
    }

    let entries = fs::read_dir(dir).map_err(|e| PlotError::Malformed {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut inputs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(extension))
        .collect();
    inputs.sort();
    Ok(inputs)
}

/// Fails with `NotFound` on the first missing path
fn require_all<'p>(paths: impl IntoIterator<Item = &'p PathBuf>) -> Result<(), PlotError> {
    match paths.into_iter().find(|p| !p.exists()) {
        Some(missing) => Err(PlotError::NotFound {
            path: missing.clone(),
        }),
        None => Ok(()),
    }
}

pub struct Pipeline<'a> {
    registry: &'a StyleRegistry,
    profile: &'a ProfileConfig,
    family: Option<&'a str>,
}

impl<'a> Pipeline<'a> {
    pub fn new(registry: &'a StyleRegistry, profile: &'a ProfileConfig) -> Self {
        Self {
            registry,
            profile,
            family: None,
        }
    }

    /// Use `family` for every input instead of matching file names
    pub fn with_family(mut self, family: Option<&'a str>) -> Self {
        self.family = family;
        self
    }

    /// Process the profile's inputs under `dir`.
    ///
    /// Per-input failures end up in the report. Only a missing fixed or
    /// paired input (or an unreadable directory) is returned as an error,
    /// before anything is drawn.
    pub fn run(&self, dir: &Path) -> Result<BatchReport, PlotError> {
        match &self.profile.inputs {
            Inputs::Glob { extension } => {
                let inputs = discover(dir, extension)?;
                if inputs.is_empty() {
                    info!("No .{extension} files found in {}", dir.display());
                }
                Ok(self.run_batch(&inputs))
            }
            Inputs::Fixed { files } => {
                let inputs: Vec<PathBuf> = files.iter().map(|f| dir.join(f)).collect();
                require_all(&inputs)?;
                Ok(self.run_batch(&inputs))
            }
            Inputs::Paired { series, output } => {
                let paths: Vec<PathBuf> = series.iter().map(|s| dir.join(&s.file)).collect();
                require_all(&paths)?;

                let mut report = BatchReport::default();
                let target = render::output_path_named(dir, output);
                info!("Combining {} inputs into {}", series.len(), target.display());
                let result = self
                    .compose_paired(dir, series, target.clone())
                    .and_then(|spec| render::export(&spec));
                report.record(&target, result);
                Ok(report)
            }
        }
    }

    fn run_batch(&self, inputs: &[PathBuf]) -> BatchReport {
        let mut report = BatchReport::default();
        for input in inputs {
            info!("Processing {}", input.display());
            let result = self
                .compose_file(input)
                .and_then(|spec| render::export(&spec));
            if result.is_ok() {
                debug!("{}: {}", input.display(), Stage::Exported);
            }
            report.record(input, result);
        }
        report
    }

    fn family_for(&self, name: &Path) -> Option<&'a str> {
        self.family.or_else(|| {
            name.file_stem()
                .and_then(|s| s.to_str())
                .and_then(|stem| self.profile.family_for(stem))
        })
    }

    /// Run one indexed input up to a composed chart
    pub fn compose_file(&self, input: &Path) -> Result<ChartSpec, PlotError> {
        let profile = self.profile;

        let raw = loader::load_table(input, profile.layout)?;
        debug!("{}: {} {} rows", input.display(), Stage::Loaded, raw.rows());

        let numeric = normalize::normalize(raw, &profile.unit_scale());
        debug!(
            "{}: {} columns {:?}",
            input.display(),
            Stage::Normalized,
            numeric.column_names()
        );

        let mut selection = profile.selector().select(numeric, input)?;
        selection.categories = profile.x.categories.apply(selection.categories);
        debug!(
            "{}: {} series {:?}",
            input.display(),
            Stage::Selected,
            selection.ids()
        );

        let family = self.family_for(input);
        if let Some(family) = family {
            debug!("{}: family {family}", input.display());
        }
        let chart = profile.chart_profile(family);
        let spec = ChartComposer::new(self.registry, &chart)
            .compose(&selection, render::output_path_for(input));
        debug!(
            "{}: {} categories {:?}",
            input.display(),
            Stage::Composed,
            spec.x_axis.tick_labels()
        );
        Ok(spec)
    }

    /// Combine one whitespace-pairs input per series into a single line chart
    pub fn compose_paired(
        &self,
        dir: &Path,
        inputs: &[PairedInput],
        output: PathBuf,
    ) -> Result<ChartSpec, PlotError> {
        let profile = self.profile;
        let scale = profile.unit_scale();

        let mut series = Vec::new();
        for id in &profile.series {
            let Some(input) = inputs.iter().find(|i| &i.id == id) else {
                continue;
            };
            let path = dir.join(&input.file);

            let raw = loader::load_table(&path, profile.layout)?;
            debug!("{}: {} {} rows", path.display(), Stage::Loaded, raw.rows());
            let numeric = normalize::normalize(raw, &scale);
            debug!("{}: {}", path.display(), Stage::Normalized);

            match (numeric.column(ELAPSED_COLUMN), numeric.column(METRIC_COLUMN)) {
                (Some(x), Some(y)) => series.push(TimeSeries {
                    id: id.clone(),
                    x: x.values.clone(),
                    y: y.values.clone(),
                }),
                _ => warn!(
                    "Skipping {} for {id}: no numeric {ELAPSED_COLUMN}/{METRIC_COLUMN} pairs",
                    path.display()
                ),
            }
        }

        if series.is_empty() {
            return Err(PlotError::EmptySeries {
                path: output,
                expected: profile.series.clone(),
            });
        }
        debug!(
            "{}: {} series {:?}",
            output.display(),
            Stage::Selected,
            series.iter().map(|s| s.id.as_str()).collect::<Vec<_>>()
        );

        let chart = profile.chart_profile(self.family_for(&output));
        let spec = ChartComposer::new(self.registry, &chart).compose_timeseries(&series, output);
        for s in &spec.series {
            debug!(
                "{}: {} {} with {} points, {} markers",
                spec.output.display(),
                Stage::Composed,
                s.style.id,
                s.point_count(),
                s.marker_count()
            );
        }
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::Geometry;
    use crate::config::Config;
    use std::fmt::Write as _;
    use tempfile::tempdir;

    fn builtin() -> (Config, StyleRegistry) {
        let config = Config::builtin().unwrap();
        let registry = config.registry().unwrap();
        (config, registry)
    }

    #[test]
    fn extra_columns_are_dropped_and_order_kept() {
        let (config, registry) = builtin();
        let dir = tempdir().unwrap();
        let input = dir.path().join("producers.csv");
        fs::write(
            &input,
            "producers,CLMAT,RAIN,Extra\n4,2000,1000,fast\n8,2500,1500,slow\n",
        )
        .unwrap();

        let pipeline = Pipeline::new(&registry, config.profile("clustering").unwrap());
        let spec = pipeline.compose_file(&input).unwrap();

        let ids: Vec<&str> = spec.series.iter().map(|s| s.style.id.as_str()).collect();
        assert_eq!(ids, ["RAIN", "CLMAT"]);
        assert!(spec.series.iter().all(|s| s.point_count() == 2));
        assert_eq!(spec.x_axis.tick_labels(), ["4", "8"]);
        match &spec.series[0].geometry {
            Geometry::Bars(bars) => assert_eq!(bars[0].top, 1.0),
            other => panic!("expected bars, got {other:?}"),
        }
    }

    #[test]
    fn batch_skips_unrecognized_inputs_and_continues() {
        let (config, registry) = builtin();
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), "n,Other\n1,2\n").unwrap();
        fs::write(dir.path().join("b.csv"), "n,RAIN,CLMAT\n1,1000,2000\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "RAIN").unwrap();

        let pipeline = Pipeline::new(&registry, config.profile("clustering").unwrap());
        let report = pipeline.run(dir.path()).unwrap();

        assert_eq!(report.exported, [dir.path().join("b.svg")]);
        assert_eq!(report.skipped.len(), 1);
        assert!(matches!(report.skipped[0].1, PlotError::EmptySeries { .. }));
        assert!(!dir.path().join("a.svg").exists());
        assert!(dir.path().join("b.svg").exists());
        assert_eq!(report.summary(), "Generated 1 chart(s), skipped 1 input(s)");
    }

    #[test]
    fn export_failure_does_not_stop_the_batch() {
        let (config, registry) = builtin();
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), "n,RAIN\n1,1000\n").unwrap();
        fs::write(dir.path().join("b.csv"), "n,RAIN\n1,2000\n").unwrap();
        // a directory where a.svg should go makes that export fail
        fs::create_dir(dir.path().join("a.svg")).unwrap();

        let report = Pipeline::new(&registry, config.profile("clustering").unwrap())
            .run(dir.path())
            .unwrap();

        assert_eq!(report.exported, [dir.path().join("b.svg")]);
        assert_eq!(report.skipped.len(), 1);
        let (input, err) = &report.skipped[0];
        assert_eq!(input, &dir.path().join("a.csv"));
        match err {
            PlotError::ExportFailure { path, .. } => assert_eq!(path, &dir.path().join("a.svg")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_directory_is_not_an_error() {
        let (config, registry) = builtin();
        let dir = tempdir().unwrap();
        let report = Pipeline::new(&registry, config.profile("loss").unwrap())
            .run(dir.path())
            .unwrap();
        assert!(report.exported.is_empty() && report.skipped.is_empty());
    }

    #[test]
    fn missing_fixed_input_is_fatal() {
        let (config, registry) = builtin();
        let dir = tempdir().unwrap();
        let err = Pipeline::new(&registry, config.profile("datascale").unwrap())
            .run(dir.path())
            .unwrap_err();
        match err {
            PlotError::NotFound { path } => {
                assert_eq!(path, dir.path().join("DCN_datascale_runtime.csv"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn datascale_uses_log_ticks_and_model_labels() {
        let (config, registry) = builtin();
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("DCN_datascale_runtime.csv"),
            "model,RAIN,TCP,PS\nresnet18,1,5,12\nresnet50,20,40,90\ngpt2,150,300,700\nr1,800,1200,2000\n",
        )
        .unwrap();

        let pipeline = Pipeline::new(&registry, config.profile("datascale").unwrap());
        let spec = pipeline
            .compose_file(&dir.path().join("DCN_datascale_runtime.csv"))
            .unwrap();
        assert_eq!(spec.y_axis.tick_labels(), ["1", "10", "100", "1000"]);
        assert_eq!(spec.x_axis.tick_labels()[0], "ResNet\n-18");

        let report = pipeline.run(dir.path()).unwrap();
        assert_eq!(report.exported, [dir.path().join("DCN_datascale_runtime.svg")]);
    }

    #[test]
    fn family_is_resolved_from_the_file_name() {
        let (config, registry) = builtin();
        let dir = tempdir().unwrap();
        let csv = "producers,RAIN,TCP,RAIN-0.5,TCP-0.5\n4,1,2,3,4\n";
        fs::write(dir.path().join("DCN_producers.csv"), csv).unwrap();
        fs::write(dir.path().join("ISP_producers.csv"), csv).unwrap();

        let profile = config.profile("graphscale").unwrap();
        let pipeline = Pipeline::new(&registry, profile);
        let dcn = pipeline
            .compose_file(&dir.path().join("DCN_producers.csv"))
            .unwrap();
        let isp = pipeline
            .compose_file(&dir.path().join("ISP_producers.csv"))
            .unwrap();
        assert_eq!(dcn.legend.layout.columns, 1);
        assert_eq!(isp.legend.layout.columns, 2);

        let forced = Pipeline::new(&registry, profile)
            .with_family(Some("DCN"))
            .compose_file(&dir.path().join("ISP_producers.csv"))
            .unwrap();
        assert_eq!(forced.legend.layout.columns, 1);
    }

    #[test]
    fn loss_labels_drop_the_percent_sign() {
        let (config, registry) = builtin();
        let dir = tempdir().unwrap();
        let input = dir.path().join("loss.csv");
        fs::write(
            &input,
            "Loss,RAIN_runtime,TCP_runtime\n0%,1000,1200\n0.1%,1100,2400\n1%,1300,9000\n",
        )
        .unwrap();

        let spec = Pipeline::new(&registry, config.profile("loss").unwrap())
            .compose_file(&input)
            .unwrap();
        assert_eq!(spec.x_axis.tick_labels(), ["0", "0.1", "1"]);
        let ids: Vec<&str> = spec.series.iter().map(|s| s.style.id.as_str()).collect();
        assert_eq!(ids, ["RAIN", "TCP"]);
    }

    fn write_pairs(path: &Path, rows: usize, scale: f64) {
        let mut text = String::from("# elapsed metric\n");
        for i in 0..rows {
            writeln!(text, "{} {}", i * 100, 70.0 + scale * (i % 7) as f64).unwrap();
        }
        fs::write(path, text).unwrap();
    }

    #[test]
    fn paired_inputs_form_one_chart() {
        let (config, registry) = builtin();
        let dir = tempdir().unwrap();
        write_pairs(&dir.path().join("extracted_cfnagg_dcn.txt"), 500, 3.0);
        write_pairs(&dir.path().join("extracted_tcpagg_dcn.txt"), 500, 1.0);

        let profile = config.profile("throughput-dcn").unwrap();
        let Inputs::Paired { series, .. } = &profile.inputs else {
            panic!("throughput-dcn should use paired inputs");
        };
        let pipeline = Pipeline::new(&registry, profile);
        let spec = pipeline
            .compose_paired(dir.path(), series, dir.path().join("out.svg"))
            .unwrap();

        assert_eq!(spec.series.len(), 2);
        assert_eq!(spec.series[0].style.id, "RAIN");
        for s in &spec.series {
            assert_eq!(s.point_count(), 500);
            assert!(s.marker_count() <= 50);
        }
        assert_eq!(spec.y_axis.range, (6.0, 10.0));

        let report = pipeline.run(dir.path()).unwrap();
        assert_eq!(report.exported, [dir.path().join("dcn_time_throughput.svg")]);
    }

    #[test]
    fn missing_paired_input_is_fatal() {
        let (config, registry) = builtin();
        let dir = tempdir().unwrap();
        write_pairs(&dir.path().join("extracted_cfnagg_isp.txt"), 10, 1.0);

        let err = Pipeline::new(&registry, config.profile("throughput-isp").unwrap())
            .run(dir.path())
            .unwrap_err();
        assert!(matches!(err, PlotError::NotFound { .. }));
        assert!(!dir.path().join("isp_time_throughput.svg").exists());
    }
}
