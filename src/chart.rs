//! Chart composition: turns selected series into a backend-independent
//! description of bars, lines, axes and legend.
//!
//! Coordinates in a [`ChartSpec`] are data values. A logarithmic axis keeps
//! them as they are and only drops the non-positive ones; mapping to pixels
//! is left to the exporter.

use crate::select::{Selection, TimeSeries};
use crate::style::{Marker, SeriesStyle, StyleRegistry};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Fraction of the data span added on each side of an automatic range
const RANGE_PADDING: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChartKind {
    #[default]
    Bar,
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AxisScale {
    #[default]
    Linear,
    Log,
}

/// Corner of the legend box that sits on the anchor point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Corner {
    #[default]
    UpperLeft,
    UpperRight,
    LowerLeft,
    LowerRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FrameStyle {
    /// Black border
    #[default]
    Solid,
    /// Gray dashed border
    Dashed,
}

fn one() -> usize {
    1
}

fn default_legend_font() -> u32 {
    25
}

/// Where and how the legend is drawn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendLayout {
    #[serde(default)]
    pub corner: Corner,
    /// Anchor in plot-area fractions, x rightwards and y upwards
    #[serde(default)]
    pub anchor: Option<[f64; 2]>,
    #[serde(default = "one")]
    pub columns: usize,
    #[serde(default = "default_legend_font")]
    pub font_size: u32,
    #[serde(default)]
    pub frame: FrameStyle,
}

impl LegendLayout {
    pub fn anchor(&self) -> (f64, f64) {
        match self.anchor {
            Some([x, y]) => (x, y),
            None => match self.corner {
                Corner::UpperLeft => (0.02, 0.98),
                Corner::UpperRight => (0.98, 0.98),
                Corner::LowerLeft => (0.02, 0.02),
                Corner::LowerRight => (0.98, 0.02),
            },
        }
    }
}

impl Default for LegendLayout {
    fn default() -> Self {
        Self {
            corner: Corner::UpperLeft,
            anchor: None,
            columns: 1,
            font_size: default_legend_font(),
            frame: FrameStyle::Solid,
        }
    }
}

fn default_font_family() -> String {
    "serif".to_string()
}

/// Text sizes in pixels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontSizes {
    #[serde(default = "default_font_family")]
    pub family: String,
    pub x_ticks: u32,
    pub y_ticks: u32,
    pub x_label: u32,
    pub y_label: u32,
}

impl Default for FontSizes {
    fn default() -> Self {
        Self {
            family: default_font_family(),
            x_ticks: 30,
            y_ticks: 30,
            x_label: 36,
            y_label: 36,
        }
    }
}

/// Rendering decisions for one experiment family, resolved by the caller
#[derive(Debug, Clone, PartialEq)]
pub struct ChartProfile {
    /// Family the legend rules were resolved for, if any
    pub family: Option<String>,
    pub kind: ChartKind,
    pub size: (u32, u32),
    pub x_label: String,
    pub y_label: String,
    pub y_scale: AxisScale,
    /// Replaces automatic y ticks; the range grows to show all of them
    pub y_ticks: Option<Vec<f64>>,
    pub y_limits: Option<(f64, f64)>,
    pub bar_width: f64,
    pub max_markers: Option<usize>,
    pub legend: LegendLayout,
    pub fonts: FontSizes,
}

impl Default for ChartProfile {
    fn default() -> Self {
        Self {
            family: None,
            kind: ChartKind::Bar,
            size: (1000, 600),
            x_label: String::new(),
            y_label: String::new(),
            y_scale: AxisScale::Linear,
            y_ticks: None,
            y_limits: None,
            bar_width: 0.3,
            max_markers: None,
            legend: LegendLayout::default(),
            fonts: FontSizes::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub position: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    pub label: String,
    pub scale: AxisScale,
    /// Visible range in data units
    pub range: (f64, f64),
    /// Labelled tick positions. `None` lets the exporter place ticks.
    pub ticks: Option<Vec<Tick>>,
    pub grid: bool,
}

impl Axis {
    pub fn tick_labels(&self) -> Vec<&str> {
        self.ticks
            .iter()
            .flatten()
            .map(|t| t.label.as_str())
            .collect()
    }

    /// Text shown at `value`: the tick's own label if one sits there
    pub fn label_for(&self, value: f64) -> String {
        let tolerance = 1e-9 * value.abs().max(1.0);
        self.ticks
            .iter()
            .flatten()
            .find(|t| (t.position - value).abs() <= tolerance)
            .map(|t| t.label.clone())
            .unwrap_or_else(|| format_number(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
    pub top: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Bars(Vec<Bar>),
    /// Missing values split the line into segments; markers are a subset of
    /// the segment points
    Line {
        segments: Vec<Vec<(f64, f64)>>,
        markers: Vec<(f64, f64)>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlottedSeries {
    pub style: SeriesStyle,
    pub geometry: Geometry,
}

impl PlottedSeries {
    pub fn point_count(&self) -> usize {
        match &self.geometry {
            Geometry::Bars(bars) => bars.len(),
            Geometry::Line { segments, .. } => segments.iter().map(Vec::len).sum(),
        }
    }

    pub fn marker_count(&self) -> usize {
        match &self.geometry {
            Geometry::Bars(_) => 0,
            Geometry::Line { markers, .. } => markers.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Legend {
    pub layout: LegendLayout,
    /// One label per plotted series, same order
    pub entries: Vec<String>,
}

/// Complete, backend-independent description of one chart
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub size: (u32, u32),
    pub x_axis: Axis,
    pub y_axis: Axis,
    pub series: Vec<PlottedSeries>,
    pub legend: Legend,
    pub fonts: FontSizes,
    pub output: PathBuf,
}

/// Builds [`ChartSpec`]s from selected data with a fixed style registry
pub struct ChartComposer<'a> {
    registry: &'a StyleRegistry,
    profile: &'a ChartProfile,
}

impl<'a> ChartComposer<'a> {
    pub fn new(registry: &'a StyleRegistry, profile: &'a ChartProfile) -> Self {
        Self { registry, profile }
    }

    /// Compose a chart over category rows, as bars or lines per the profile
    pub fn compose(&self, selection: &Selection, output: PathBuf) -> ChartSpec {
        match self.profile.kind {
            ChartKind::Bar => self.grouped_bars(selection, output),
            ChartKind::Line => self.category_lines(selection, output),
        }
    }

    /// Compose a line chart over continuous x values such as elapsed time
    pub fn compose_timeseries(&self, series: &[TimeSeries], output: PathBuf) -> ChartSpec {
        let xs = series.iter().flat_map(|s| s.x.iter().flatten().copied());
        let x_range = min_max(xs)
            .map(|(lo, hi)| padded(lo, hi))
            .unwrap_or((0.0, 1.0));
        let x_axis = Axis {
            label: self.profile.x_label.clone(),
            scale: AxisScale::Linear,
            range: x_range,
            ticks: None,
            grid: true,
        };

        let ys = series.iter().flat_map(|s| s.y.iter().flatten().copied());
        let y_axis = self.value_axis(ys, false);

        let plotted = series
            .iter()
            .map(|s| {
                let points: Vec<Option<(f64, f64)>> = s
                    .x
                    .iter()
                    .zip(&s.y)
                    .map(|(x, y)| Some(((*x)?, plottable((*y)?, y_axis.scale)?)))
                    .collect();
                self.line_series(&s.id, &points)
            })
            .collect();

        self.finish(ChartKind::Line, x_axis, y_axis, plotted, output)
    }

    fn grouped_bars(&self, selection: &Selection, output: PathBuf) -> ChartSpec {
        let width = self.profile.bar_width;
        let clusters = selection.categories.len();
        let members = selection.series.len().max(1);
        let offset = (members - 1) as f64 * width / 2.0;

        let span_lo = -width / 2.0;
        let span_hi = clusters.saturating_sub(1) as f64 + (members - 1) as f64 * width + width / 2.0;
        let x_axis = Axis {
            label: self.profile.x_label.clone(),
            scale: AxisScale::Linear,
            range: padded(span_lo, span_hi),
            ticks: Some(category_ticks(&selection.categories, offset)),
            grid: false,
        };

        let values = selection
            .series
            .iter()
            .flat_map(|s| s.values.iter().flatten().copied());
        let y_axis = self.value_axis(values, true);
        let baseline = match y_axis.scale {
            AxisScale::Linear => 0.0,
            AxisScale::Log => y_axis.range.0,
        };

        let plotted = selection
            .series
            .iter()
            .enumerate()
            .map(|(i, series)| {
                let bars = series
                    .values
                    .iter()
                    .enumerate()
                    .filter_map(|(k, value)| {
                        let top = plottable((*value)?, y_axis.scale)?;
                        let center = k as f64 + i as f64 * width;
                        Some(Bar {
                            left: center - width / 2.0,
                            right: center + width / 2.0,
                            bottom: baseline.min(top),
                            top: baseline.max(top),
                        })
                    })
                    .collect();
                PlottedSeries {
                    style: self.registry.style_for(&series.id),
                    geometry: Geometry::Bars(bars),
                }
            })
            .collect();

        self.finish(ChartKind::Bar, x_axis, y_axis, plotted, output)
    }

    fn category_lines(&self, selection: &Selection, output: PathBuf) -> ChartSpec {
        let last = selection.categories.len().saturating_sub(1) as f64;
        let x_axis = Axis {
            label: self.profile.x_label.clone(),
            scale: AxisScale::Linear,
            range: padded(0.0, last),
            ticks: Some(category_ticks(&selection.categories, 0.0)),
            grid: true,
        };

        let values = selection
            .series
            .iter()
            .flat_map(|s| s.values.iter().flatten().copied());
        let y_axis = self.value_axis(values, false);

        let plotted = selection
            .series
            .iter()
            .map(|series| {
                let points: Vec<Option<(f64, f64)>> = series
                    .values
                    .iter()
                    .enumerate()
                    .map(|(k, v)| Some((k as f64, plottable((*v)?, y_axis.scale)?)))
                    .collect();
                self.line_series(&series.id, &points)
            })
            .collect();

        self.finish(ChartKind::Line, x_axis, y_axis, plotted, output)
    }

    fn line_series(&self, id: &str, points: &[Option<(f64, f64)>]) -> PlottedSeries {
        let style = self.registry.style_for(id);

        let mut segments = Vec::new();
        let mut current = Vec::new();
        for point in points {
            match point {
                Some(p) => current.push(*p),
                None if !current.is_empty() => segments.push(std::mem::take(&mut current)),
                None => {}
            }
        }
        if !current.is_empty() {
            segments.push(current);
        }

        let markers = match (style.marker, self.profile.max_markers) {
            (Marker::None, _) | (_, Some(0)) => Vec::new(),
            (_, max) => {
                let stride = marker_stride(points.len(), max);
                points
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| i % stride == 0)
                    .filter_map(|(_, p)| *p)
                    .collect()
            }
        };

        PlottedSeries {
            style,
            geometry: Geometry::Line { segments, markers },
        }
    }

    /// Value axis shared by bars and lines. Linear bar axes include zero.
    fn value_axis(&self, values: impl Iterator<Item = f64>, from_zero: bool) -> Axis {
        let profile = self.profile;
        let scale = profile.y_scale;
        let fixed = profile.y_ticks.as_deref();

        let range = match scale {
            AxisScale::Linear => match profile.y_limits {
                Some(limits) => limits,
                None => {
                    let fixed_span = fixed.and_then(|t| min_max(t.iter().copied()));
                    let (lo, hi) = merge(min_max(values), fixed_span).unwrap_or((0.0, 1.0));
                    if from_zero {
                        let (lo, hi) = (lo.min(0.0), hi.max(0.0));
                        let (plo, phi) = padded(lo, hi);
                        (
                            if lo >= 0.0 { 0.0 } else { plo },
                            if hi <= 0.0 { 0.0 } else { phi },
                        )
                    } else {
                        padded(lo, hi)
                    }
                }
            },
            AxisScale::Log => match profile.y_limits {
                Some((lo, hi)) if lo > 0.0 && hi > lo => (lo, hi),
                _ => {
                    let positive = |v: &f64| *v > 0.0;
                    let data = min_max(values.filter(positive));
                    let fixed_span = fixed.and_then(|t| min_max(t.iter().copied().filter(positive)));
                    let (lo, hi) = merge(data, fixed_span).unwrap_or((1.0, 10.0));
                    let (lo, hi) = padded(lo.log10(), hi.log10());
                    (10f64.powf(lo), 10f64.powf(hi))
                }
            },
        };

        Axis {
            label: profile.y_label.clone(),
            scale,
            range,
            ticks: fixed.map(|fixed| fixed_ticks(fixed, scale)),
            grid: true,
        }
    }

    fn finish(
        &self,
        kind: ChartKind,
        x_axis: Axis,
        y_axis: Axis,
        series: Vec<PlottedSeries>,
        output: PathBuf,
    ) -> ChartSpec {
        let entries = series.iter().map(|s| s.style.id.clone()).collect();
        ChartSpec {
            kind,
            size: self.profile.size,
            x_axis,
            y_axis,
            series,
            legend: Legend {
                layout: self.profile.legend.clone(),
                entries,
            },
            fonts: self.profile.fonts.clone(),
            output,
        }
    }
}

/// Every `stride`-th point gets a marker so that at most `max` are drawn
pub fn marker_stride(len: usize, max: Option<usize>) -> usize {
    match max {
        Some(max) if max > 0 => len.div_ceil(max).max(1),
        _ => 1,
    }
}

/// `value` if the axis can show it; a log axis has no place for non-positive values
fn plottable(value: f64, scale: AxisScale) -> Option<f64> {
    match scale {
        AxisScale::Log if value <= 0.0 => None,
        _ => Some(value),
    }
}

fn category_ticks(categories: &[String], offset: f64) -> Vec<Tick> {
    categories
        .iter()
        .enumerate()
        .map(|(k, label)| Tick {
            position: k as f64 + offset,
            label: label.clone(),
        })
        .collect()
}

fn min_max(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

fn merge(a: Option<(f64, f64)>, b: Option<(f64, f64)>) -> Option<(f64, f64)> {
    match (a, b) {
        (Some((alo, ahi)), Some((blo, bhi))) => Some((alo.min(blo), ahi.max(bhi))),
        (a, None) => a,
        (None, b) => b,
    }
}

fn padded(lo: f64, hi: f64) -> (f64, f64) {
    let span = hi - lo;
    if span > 0.0 {
        (lo - span * RANGE_PADDING, hi + span * RANGE_PADDING)
    } else {
        let half = if lo == 0.0 { 0.5 } else { lo.abs() * RANGE_PADDING };
        (lo - half, hi + half)
    }
}

/// Labels for configured ticks, placed at their own values
fn fixed_ticks(values: &[f64], scale: AxisScale) -> Vec<Tick> {
    values
        .iter()
        .filter_map(|v| {
            Some(Tick {
                position: plottable(*v, scale)?,
                label: format_number(*v),
            })
        })
        .collect()
}

/// Integers without a fractional part, everything else in shortest form.
/// Float noise below 1e-9 is rounded away first.
pub fn format_number(value: f64) -> String {
    let value = if value.abs() < 1e6 {
        (value * 1e9).round() / 1e9 + 0.0
    } else {
        value + 0.0
    };
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}
