//! SVG export of composed charts.

use crate::chart::{Axis, AxisScale, Bar, ChartKind, ChartSpec, Corner, FrameStyle, Geometry};
use crate::error::PlotError;
use crate::style::{Hatch, Marker, Rgb, SeriesStyle};
use anyhow::{Context, Result};
use plotters::coord::combinators::{BindKeyPoints, LogCoord, WithKeyPoints};
use plotters::coord::ranged1d::{KeyPointHint, NoDefaultFormatting, ValueFormatter};
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::element::DashedPathElement;
use plotters::prelude::*;
use plotters::series::DashedLineSeries;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::{Path, PathBuf};

type Canvas<'a> = DrawingArea<SVGBackend<'a>, Shift>;
type Chart<'a, 'b, X, Y> = ChartContext<'a, SVGBackend<'b>, Cartesian2d<X, Y>>;

/// Distance between hatch lines at density 1, in pixels
const HATCH_SPACING: u32 = 18;
const HATCH_WIDTH: u32 = 2;
const EDGE_WIDTH: u32 = 2;
const TICK_LENGTH: i32 = 8;
/// Marker half-width in pixels
const MARKER_SIZE: i32 = 5;
/// Tick budget for axes without configured ticks
const AUTO_TICKS: usize = 6;
const FRAME_DASH: (u32, u32) = (4, 3);

/// `<input-basename>.svg` next to the input
pub fn output_path_for(input: &Path) -> PathBuf {
    input.with_extension("svg")
}

/// Output for charts that combine several inputs
pub fn output_path_named(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.svg"))
}

/// Render `spec` and write it to `spec.output`
pub fn export(spec: &ChartSpec) -> Result<PathBuf, PlotError> {
    draw_chart(spec).map_err(|e| PlotError::ExportFailure {
        path: spec.output.clone(),
        reason: format!("{e:#}"),
    })?;
    Ok(spec.output.clone())
}

fn rgb(c: Rgb) -> RGBColor {
    RGBColor(c.0, c.1, c.2)
}

fn grid_color() -> RGBAColor {
    RGBColor(128, 128, 128).mix(0.4)
}

fn text_style<'a>(family: &'a str, size: u32, pos: Pos) -> TextStyle<'a> {
    (family, size).into_font().color(&BLACK).pos(pos)
}

/// Linear axis with fixed key points; plotters gives
/// `WithKeyPoints<RangedCoordf64>` no `ValueFormatter`, which `configure_mesh`
/// requires even though the mesh labels use their own formatters
struct LinearKeyPoints(WithKeyPoints<RangedCoordf64>);

impl Ranged for LinearKeyPoints {
    type FormatOption = NoDefaultFormatting;
    type ValueType = f64;

    fn map(&self, value: &f64, limit: (i32, i32)) -> i32 {
        self.0.map(value, limit)
    }

    fn key_points<Hint: KeyPointHint>(&self, hint: Hint) -> Vec<f64> {
        self.0.key_points(hint)
    }

    fn range(&self) -> std::ops::Range<f64> {
        self.0.range()
    }

    fn axis_pixel_range(&self, limit: (i32, i32)) -> std::ops::Range<i32> {
        self.0.axis_pixel_range(limit)
    }
}

impl ValueFormatter<f64> for LinearKeyPoints {
    fn format(value: &f64) -> String {
        RangedCoordf64::format(value)
    }
}

/// Tick positions inside the visible range: the axis's own ticks, or the
/// key points plotters picks for the range
fn key_points(axis: &Axis) -> Vec<f64> {
    let (lo, hi) = axis.range;
    if let Some(ticks) = &axis.ticks {
        return ticks
            .iter()
            .map(|t| t.position)
            .filter(|p| *p >= lo && *p <= hi)
            .collect();
    }

    let visible = |points: Vec<f64>| -> Vec<f64> {
        points.into_iter().filter(|p| *p >= lo && *p <= hi).collect()
    };
    let linear = || visible(RangedCoordf64::from(lo..hi).key_points(AUTO_TICKS));
    match axis.scale {
        AxisScale::Linear => linear(),
        AxisScale::Log => {
            let coord: LogCoord<f64> = (lo..hi).log_scale().into();
            let points = visible(coord.key_points(AUTO_TICKS));
            // a range inside one decade may hold no power of ten
            if points.len() < 2 {
                linear()
            } else {
                points
            }
        }
    }
}

fn draw_chart(spec: &ChartSpec) -> Result<()> {
    let root = SVGBackend::new(&spec.output, spec.size).into_drawing_area();
    root.fill(&WHITE)?;

    let fonts = &spec.fonts;
    let x_points = key_points(&spec.x_axis);
    let y_points = key_points(&spec.y_axis);

    let y_tick_style = text_style(&fonts.family, fonts.y_ticks, Pos::new(HPos::Right, VPos::Center));
    let mut y_tick_width = 0;
    for point in &y_points {
        let label = spec.y_axis.label_for(*point);
        y_tick_width = y_tick_width.max(root.estimate_text_size(&label, &y_tick_style)?.0);
    }
    let x_tick_lines = x_points
        .iter()
        .map(|p| spec.x_axis.label_for(*p).lines().count().max(1))
        .max()
        .unwrap_or(1) as u32;
    let areas = (
        TICK_LENGTH as u32 + x_tick_lines * fonts.x_ticks + fonts.x_label + 24,
        TICK_LENGTH as u32 + y_tick_width + fonts.y_label + 28,
    );

    let (x0, x1) = spec.x_axis.range;
    let (y0, y1) = spec.y_axis.range;
    let x = LinearKeyPoints((x0..x1).with_key_points(x_points));
    match spec.y_axis.scale {
        AxisScale::Linear => plot(&root, spec, areas, x, LinearKeyPoints((y0..y1).with_key_points(y_points)))?,
        AxisScale::Log => plot(
            &root,
            spec,
            areas,
            x,
            (y0..y1).log_scale().with_key_points(y_points),
        )?,
    }

    root.present()
        .with_context(|| format!("writing {}", spec.output.display()))?;
    Ok(())
}

/// Mesh, series and legend on one cartesian chart
fn plot<X, Y>(root: &Canvas, spec: &ChartSpec, (x_area, y_area): (u32, u32), x: X, y: Y) -> Result<()>
where
    X: Ranged<ValueType = f64> + ValueFormatter<f64>,
    Y: Ranged<ValueType = f64> + ValueFormatter<f64>,
{
    let fonts = &spec.fonts;
    let mut chart = ChartBuilder::on(root)
        .margin(20)
        .x_label_area_size(x_area)
        .y_label_area_size(y_area)
        .build_cartesian_2d(x, y)?;

    let x_label = |v: &f64| spec.x_axis.label_for(*v);
    let y_label = |v: &f64| spec.y_axis.label_for(*v);
    let mut mesh = chart.configure_mesh();
    mesh.bold_line_style(grid_color())
        .light_line_style(TRANSPARENT)
        .set_all_tick_mark_size(TICK_LENGTH)
        .x_label_formatter(&x_label)
        .y_label_formatter(&y_label)
        .x_label_style((fonts.family.as_str(), fonts.x_ticks))
        .y_label_style((fonts.family.as_str(), fonts.y_ticks))
        .x_desc(spec.x_axis.label.as_str())
        .y_desc(spec.y_axis.label.as_str())
        .axis_desc_style((fonts.family.as_str(), fonts.x_label));
    if !spec.x_axis.grid {
        mesh.disable_x_mesh();
    }
    if !spec.y_axis.grid {
        mesh.disable_y_mesh();
    }
    mesh.draw()?;

    for series in &spec.series {
        match &series.geometry {
            Geometry::Bars(bars) => draw_bars(root, &mut chart, &series.style, bars)?,
            Geometry::Line { segments, markers } => {
                draw_line(&mut chart, spec, &series.style, segments, markers)?
            }
        }
    }

    let (px, py) = chart.plotting_area().get_pixel_range();
    draw_legend(root, (px.start, py.start, px.end, py.end), spec)
}

/// Face and outline in data coordinates, hatch in pixels between them
fn draw_bars<X, Y>(
    root: &Canvas,
    chart: &mut Chart<'_, '_, X, Y>,
    style: &SeriesStyle,
    bars: &[Bar],
) -> Result<()>
where
    X: Ranged<ValueType = f64>,
    Y: Ranged<ValueType = f64>,
{
    let corners = |b: &Bar| [(b.left, b.top), (b.right, b.bottom)];

    if let Some(face) = style.face() {
        let fill = rgb(face).filled();
        chart.draw_series(bars.iter().map(|b| Rectangle::new(corners(b), fill)))?;
    }

    if !style.hatch.is_empty() {
        let (px, py) = chart.plotting_area().get_pixel_range();
        for bar in bars {
            let (left, top) = chart.backend_coord(&(bar.left, bar.top));
            let (right, bottom) = chart.backend_coord(&(bar.right, bar.bottom));
            let rect = (
                left.max(px.start),
                top.max(py.start),
                right.min(px.end),
                bottom.min(py.end),
            );
            draw_hatch(root, rect, style, HATCH_SPACING)?;
        }
    }

    let outline = rgb(style.outline()).stroke_width(EDGE_WIDTH);
    chart.draw_series(bars.iter().map(|b| Rectangle::new(corners(b), outline)))?;
    Ok(())
}

fn draw_hatch(root: &Canvas, rect: (i32, i32, i32, i32), style: &SeriesStyle, base: u32) -> Result<()> {
    let stroke = rgb(style.outline()).stroke_width(HATCH_WIDTH);
    for [p, q] in hatch_segments(rect, &style.hatch, style.hatch.spacing(base)) {
        root.draw(&PathElement::new(vec![p, q], stroke))?;
    }
    Ok(())
}

/// Dash and gap in pixels for the style's line pattern
fn dash_lengths(style: &SeriesStyle) -> Option<(u32, u32)> {
    let px = |len: f64| (len * style.line_width).round().max(1.0) as u32;
    style.line.dash().map(|(dash, gap)| (px(dash), px(gap)))
}

fn line_width(style: &SeriesStyle) -> u32 {
    style.line_width.round().max(1.0) as u32
}

fn draw_line<X, Y>(
    chart: &mut Chart<'_, '_, X, Y>,
    spec: &ChartSpec,
    style: &SeriesStyle,
    segments: &[Vec<(f64, f64)>],
    markers: &[(f64, f64)],
) -> Result<()>
where
    X: Ranged<ValueType = f64>,
    Y: Ranged<ValueType = f64>,
{
    let color = rgb(style.color);
    let stroke = color.stroke_width(line_width(style));

    for segment in segments {
        let points = segment.iter().copied();
        match dash_lengths(style) {
            None => {
                chart.draw_series(LineSeries::new(points, stroke))?;
            }
            Some((dash, gap)) => {
                chart.draw_series(DashedLineSeries::new(points, dash, gap, stroke))?;
            }
        }
    }

    let (x0, x1) = spec.x_axis.range;
    let (y0, y1) = spec.y_axis.range;
    let visible: Vec<(f64, f64)> = markers
        .iter()
        .copied()
        .filter(|(x, y)| (x0..=x1).contains(x) && (y0..=y1).contains(y))
        .collect();
    let face = color.filled();

    match style.marker {
        Marker::None => {}
        Marker::Square => {
            chart.draw_series(PointSeries::of_element(visible, MARKER_SIZE, face, &|c, s, st| {
                EmptyElement::at(c) + Rectangle::new([(-s, -s), (s, s)], st)
            }))?;
        }
        Marker::Circle => {
            chart.draw_series(PointSeries::of_element(visible, MARKER_SIZE, face, &|c, s, st| {
                EmptyElement::at(c) + Circle::new((0, 0), s, st)
            }))?;
        }
        Marker::Triangle => {
            chart.draw_series(PointSeries::of_element(visible, MARKER_SIZE, face, &|c, s, st| {
                EmptyElement::at(c) + TriangleMarker::new((0, 0), s, st)
            }))?;
        }
        Marker::Diamond => {
            chart.draw_series(PointSeries::of_element(visible, MARKER_SIZE, face, &|c, s, st| {
                EmptyElement::at(c) + Polygon::new(vec![(0, -s), (s, 0), (0, s), (-s, 0)], st)
            }))?;
        }
    }
    Ok(())
}

/// Legend marker in pixel coordinates
fn draw_marker(root: &Canvas, (x, y): (i32, i32), marker: Marker, color: RGBColor) -> Result<()> {
    let r = MARKER_SIZE;
    match marker {
        Marker::None => {}
        Marker::Square => root.draw(&Rectangle::new([(x - r, y - r), (x + r, y + r)], color.filled()))?,
        Marker::Circle => root.draw(&Circle::new((x, y), r, color.filled()))?,
        Marker::Triangle => root.draw(&TriangleMarker::new((x, y), r, color.filled()))?,
        Marker::Diamond => root.draw(&Polygon::new(
            vec![(x, y - r), (x + r, y), (x, y + r), (x - r, y)],
            color.filled(),
        ))?,
    }
    Ok(())
}

/// Multi-column legend anchored inside the plot area `(left, top, right, bottom)`
fn draw_legend(root: &Canvas, plot: (i32, i32, i32, i32), spec: &ChartSpec) -> Result<()> {
    let legend = &spec.legend;
    let count = legend.entries.len();
    if count == 0 {
        return Ok(());
    }

    let layout = &legend.layout;
    let font = layout.font_size as i32;
    let label_style = text_style(&spec.fonts.family, layout.font_size, Pos::new(HPos::Left, VPos::Center));
    let mut label_width = 0;
    for entry in &legend.entries {
        label_width = label_width.max(root.estimate_text_size(entry, &label_style)?.0 as i32);
    }

    let columns = layout.columns.clamp(1, count);
    let rows = count.div_ceil(columns);
    let pad = (font / 3).max(4);
    let gap = (font / 3).max(4);
    let handle = (font * 3 / 2).max(24);
    let row_height = font * 5 / 4;
    let column_width = handle + gap + label_width + pad;
    let box_width = columns as i32 * column_width + pad;
    let box_height = rows as i32 * row_height + 2 * pad;

    let (x0, y0, x1, y1) = plot;
    let (ax, ay) = layout.anchor();
    let anchor = (
        (x0 as f64 + ax * (x1 - x0) as f64).round() as i32,
        (y1 as f64 - ay * (y1 - y0) as f64).round() as i32,
    );
    let (bx, by) = match layout.corner {
        Corner::UpperLeft => anchor,
        Corner::UpperRight => (anchor.0 - box_width, anchor.1),
        Corner::LowerLeft => (anchor.0, anchor.1 - box_height),
        Corner::LowerRight => (anchor.0 - box_width, anchor.1 - box_height),
    };
    let (right, bottom) = (bx + box_width, by + box_height);

    root.draw(&Rectangle::new([(bx, by), (right, bottom)], WHITE.filled()))?;
    match layout.frame {
        FrameStyle::Solid => root.draw(&Rectangle::new([(bx, by), (right, bottom)], BLACK.stroke_width(1)))?,
        FrameStyle::Dashed => {
            let outline = vec![(bx, by), (right, by), (right, bottom), (bx, bottom), (bx, by)];
            let (dash, gap) = FRAME_DASH;
            root.draw(&DashedPathElement::new(
                outline.into_iter(),
                dash,
                gap,
                RGBColor(128, 128, 128).stroke_width(1),
            ))?;
        }
    }

    for (i, (entry, series)) in legend.entries.iter().zip(&spec.series).enumerate() {
        let (column, row) = legend_cell(i, rows);
        let x = bx + pad + column as i32 * column_width;
        let cy = by + pad + row as i32 * row_height + row_height / 2;
        draw_handle(root, spec.kind, &series.style, (x, cy), handle, font)?;
        root.draw(&Text::new(entry.clone(), (x + handle + gap, cy), label_style.clone()))?;
    }
    Ok(())
}

fn draw_handle(
    root: &Canvas,
    kind: ChartKind,
    style: &SeriesStyle,
    (x, cy): (i32, i32),
    width: i32,
    font: i32,
) -> Result<()> {
    match kind {
        ChartKind::Bar => {
            let half = (font * 2 / 5).max(6);
            let (a, b) = ((x, cy - half), (x + width, cy + half));
            if let Some(face) = style.face() {
                root.draw(&Rectangle::new([a, b], rgb(face).filled()))?;
            }
            draw_hatch(root, (a.0, a.1, b.0, b.1), style, HATCH_SPACING / 2)?;
            root.draw(&Rectangle::new([a, b], rgb(style.outline()).stroke_width(EDGE_WIDTH)))?;
            Ok(())
        }
        ChartKind::Line => {
            let color = rgb(style.color);
            let stroke = color.stroke_width(line_width(style));
            let line = vec![(x, cy), (x + width, cy)];
            match dash_lengths(style) {
                None => root.draw(&PathElement::new(line, stroke))?,
                Some((dash, gap)) => root.draw(&DashedPathElement::new(line.into_iter(), dash, gap, stroke))?,
            }
            draw_marker(root, (x + width / 2, cy), style.marker, color)
        }
    }
}

/// Legends fill column by column
fn legend_cell(index: usize, rows: usize) -> (usize, usize) {
    let rows = rows.max(1);
    (index / rows, index % rows)
}

/// Hatch strokes inside the pixel rectangle `(x0, y0, x1, y1)`
fn hatch_segments(rect: (i32, i32, i32, i32), hatch: &Hatch, spacing: u32) -> Vec<[(i32, i32); 2]> {
    let (x0, y0, x1, y1) = rect;
    let step = spacing.max(1) as i32;
    let mut out = Vec::new();
    if hatch.is_empty() || x1 <= x0 || y1 <= y0 {
        return out;
    }

    if hatch.horizontal {
        let mut y = y0 + step / 2;
        while y < y1 {
            out.push([(x0, y), (x1, y)]);
            y += step;
        }
    }
    if hatch.vertical {
        let mut x = x0 + step / 2;
        while x < x1 {
            out.push([(x, y0), (x, y1)]);
            x += step;
        }
    }
    // "/" lines satisfy x + y = c in screen space
    if hatch.forward {
        let mut c = x0 + y0 + step;
        while c < x1 + y1 {
            let xa = x0.max(c - y1);
            let xb = x1.min(c - y0);
            if xa < xb {
                out.push([(xa, c - xa), (xb, c - xb)]);
            }
            c += step;
        }
    }
    // "\" lines satisfy x - y = c
    if hatch.backward {
        let mut c = x0 - y1 + step;
        while c < x1 - y0 {
            let xa = x0.max(c + y0);
            let xb = x1.min(c + y1);
            if xa < xb {
                out.push([(xa, xa - c), (xb, xb - c)]);
            }
            c += step;
        }
    }
    out
}
