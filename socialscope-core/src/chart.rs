//! Chart sinks
//!
//! Analyses describe their charts as a [`ChartSet`]: a titled grid of panels,
//! each holding finished bar, line/scatter or histogram data. A [`ChartSink`]
//! only renders that table; no analytic logic lives here.
//!
//! Two sinks are provided:
//! - [`SvgChartSink`] writes a static SVG image
//! - [`JsonChartSink`] writes the chart table as JSON for an external renderer

use crate::analytics::stats::HistogramBin;
use crate::config::ChartFormat;
use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// A figure made of one or more panels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSet {
    /// File name without extension (e.g. "growth_projection")
    pub file_stem: String,
    pub title: String,
    pub panels: Vec<Panel>,
}

/// One plot inside a [`ChartSet`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Panel {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub body: PanelBody,
}

/// Data for a single panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PanelBody {
    /// Grouped vertical bars, one group per label.
    Bars {
        labels: Vec<String>,
        series: Vec<BarSeries>,
        /// Number of leading groups drawn emphasized
        highlight: usize,
        /// Optional horizontal reference line
        threshold: Option<Marker>,
    },
    /// Lines and/or scatter points on numeric axes.
    Lines { series: Vec<LineSeries> },
    /// Pre-binned histogram with vertical markers (mean, median).
    Histogram {
        bins: Vec<HistogramBin>,
        markers: Vec<Marker>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSeries {
    pub name: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<(f64, f64)>,
    pub style: SeriesStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesStyle {
    Line,
    LineWithMarkers,
    Points,
}

/// A labelled reference value drawn as a dashed line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub label: String,
    pub value: f64,
}

impl Marker {
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// Renders a finished [`ChartSet`] into a file under `dir`.
pub trait ChartSink {
    /// Write the chart and return the path of the written file.
    fn render(&self, chart: &ChartSet, dir: &Path) -> Result<PathBuf>;
}

/// Pick the sink for a configured chart format.
pub fn sink_for(format: ChartFormat) -> Box<dyn ChartSink> {
    match format {
        ChartFormat::Svg => Box::new(SvgChartSink::default()),
        ChartFormat::Json => Box::new(JsonChartSink),
    }
}

fn output_path(chart: &ChartSet, dir: &Path, extension: &str) -> Result<PathBuf> {
    if chart.file_stem.is_empty() || chart.file_stem.contains(['/', '\\']) {
        return Err(Error::Chart(format!(
            "invalid chart file name '{}'",
            chart.file_stem
        )));
    }
    fs::create_dir_all(dir)?;
    Ok(dir.join(format!("{}.{}", chart.file_stem, extension)))
}

// ============================================
// JSON sink
// ============================================

/// Writes the chart table as pretty-printed JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonChartSink;

impl ChartSink for JsonChartSink {
    fn render(&self, chart: &ChartSet, dir: &Path) -> Result<PathBuf> {
        let path = output_path(chart, dir, ChartFormat::Json.extension())?;
        let json = serde_json::to_string_pretty(chart)?;
        fs::write(&path, json)?;
        tracing::debug!(path = %path.display(), "Wrote chart data");
        Ok(path)
    }
}

// ============================================
// SVG sink
// ============================================

const PALETTE: &[&str] = &[
    "#4c72b0", "#dd8452", "#55a868", "#c44e52", "#8172b3", "#937860",
];
const MUTED: &str = "#a6b4c8";
const MARKER_COLORS: &[&str] = &["#c44e52", "#2ca02c", "#8172b3"];

/// Writes a static SVG image, panels laid out in a grid.
#[derive(Debug, Clone, Copy)]
pub struct SvgChartSink {
    pub panel_width: f64,
    pub panel_height: f64,
    pub columns: usize,
}

impl Default for SvgChartSink {
    fn default() -> Self {
        Self {
            panel_width: 560.0,
            panel_height: 380.0,
            columns: 2,
        }
    }
}

/// Plot area inside a panel, in SVG coordinates.
#[derive(Debug, Clone, Copy)]
struct Frame {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
}

/// Linear mapping from data range to pixels.
#[derive(Debug, Clone, Copy)]
struct Axis {
    min: f64,
    max: f64,
}

impl Axis {
    fn from_values(values: impl Iterator<Item = f64>) -> Self {
        let (min, max) = values
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        if !min.is_finite() {
            return Self { min: 0.0, max: 1.0 };
        }
        if max > min {
            let pad = (max - min) * 0.05;
            Self {
                min: min - pad,
                max: max + pad,
            }
        } else {
            Self {
                min: min - 1.0,
                max: max + 1.0,
            }
        }
    }

    fn from_zero(values: impl Iterator<Item = f64>) -> Self {
        let max = values.filter(|v| v.is_finite()).fold(0.0_f64, f64::max);
        Self {
            min: 0.0,
            max: if max > 0.0 { max * 1.1 } else { 1.0 },
        }
    }

    fn fraction(&self, value: f64) -> f64 {
        (value - self.min) / (self.max - self.min)
    }
}

impl Frame {
    fn x(&self, axis: &Axis, value: f64) -> f64 {
        self.left + axis.fraction(value) * self.width
    }

    fn y(&self, axis: &Axis, value: f64) -> f64 {
        self.top + self.height - axis.fraction(value) * self.height
    }

    fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

impl ChartSink for SvgChartSink {
    fn render(&self, chart: &ChartSet, dir: &Path) -> Result<PathBuf> {
        let path = output_path(chart, dir, ChartFormat::Svg.extension())?;
        let svg = self.to_svg(chart).map_err(|e| Error::Chart(e.to_string()))?;
        fs::write(&path, svg)?;
        tracing::debug!(path = %path.display(), panels = chart.panels.len(), "Wrote chart image");
        Ok(path)
    }
}

impl SvgChartSink {
    /// Render a chart to an SVG document.
    pub fn to_svg(&self, chart: &ChartSet) -> std::result::Result<String, std::fmt::Error> {
        let columns = self.columns.max(1).min(chart.panels.len().max(1));
        let rows = ((chart.panels.len() + columns - 1) / columns).max(1);
        let header = 48.0;
        let width = self.panel_width * columns as f64;
        let height = header + self.panel_height * rows as f64;

        let mut out = String::new();
        writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif">"#,
            w = width,
            h = height
        )?;
        writeln!(out, r#"<rect width="100%" height="100%" fill="white"/>"#)?;
        writeln!(
            out,
            r#"<text x="{}" y="30" font-size="20" font-weight="bold" text-anchor="middle">{}</text>"#,
            width / 2.0,
            escape(&chart.title)
        )?;

        for (i, panel) in chart.panels.iter().enumerate() {
            let col = i % columns;
            let row = i / columns;
            let origin_x = col as f64 * self.panel_width;
            let origin_y = header + row as f64 * self.panel_height;
            let frame = Frame {
                left: origin_x + 70.0,
                top: origin_y + 40.0,
                width: self.panel_width - 100.0,
                height: self.panel_height - 100.0,
            };
            self.write_panel(&mut out, panel, frame)?;
        }

        writeln!(out, "</svg>")?;
        Ok(out)
    }

    fn write_panel(&self, out: &mut String, panel: &Panel, frame: Frame) -> std::fmt::Result {
        writeln!(
            out,
            r#"<text x="{}" y="{}" font-size="14" font-weight="bold" text-anchor="middle">{}</text>"#,
            frame.left + frame.width / 2.0,
            frame.top - 14.0,
            escape(&panel.title)
        )?;

        match &panel.body {
            PanelBody::Bars {
                labels,
                series,
                highlight,
                threshold,
            } => self.write_bars(out, frame, labels, series, *highlight, threshold.as_ref())?,
            PanelBody::Lines { series } => self.write_lines(out, frame, series)?,
            PanelBody::Histogram { bins, markers } => {
                self.write_histogram(out, frame, bins, markers)?
            }
        }

        // Axes and labels
        writeln!(
            out,
            r#"<line x1="{l}" y1="{b}" x2="{r}" y2="{b}" stroke="black"/><line x1="{l}" y1="{t}" x2="{l}" y2="{b}" stroke="black"/>"#,
            l = frame.left,
            r = frame.left + frame.width,
            t = frame.top,
            b = frame.bottom()
        )?;
        writeln!(
            out,
            r#"<text x="{}" y="{}" font-size="12" text-anchor="middle">{}</text>"#,
            frame.left + frame.width / 2.0,
            frame.bottom() + 48.0,
            escape(&panel.x_label)
        )?;
        writeln!(
            out,
            r#"<text x="{x}" y="{y}" font-size="12" text-anchor="middle" transform="rotate(-90 {x} {y})">{}</text>"#,
            escape(&panel.y_label),
            x = frame.left - 52.0,
            y = frame.top + frame.height / 2.0
        )
    }

    fn write_y_ticks(&self, out: &mut String, frame: Frame, axis: &Axis) -> std::fmt::Result {
        for step in 0..=4 {
            let value = axis.min + (axis.max - axis.min) * step as f64 / 4.0;
            let y = frame.y(axis, value);
            writeln!(
                out,
                r##"<line x1="{l}" y1="{y:.1}" x2="{r}" y2="{y:.1}" stroke="#e5e5e5"/><text x="{tx}" y="{ty:.1}" font-size="10" text-anchor="end">{label}</text>"##,
                l = frame.left,
                r = frame.left + frame.width,
                tx = frame.left - 6.0,
                ty = y + 3.0,
                label = tick_label(value)
            )?;
        }
        Ok(())
    }

    fn write_x_ticks(&self, out: &mut String, frame: Frame, axis: &Axis) -> std::fmt::Result {
        for step in 0..=4 {
            let value = axis.min + (axis.max - axis.min) * step as f64 / 4.0;
            writeln!(
                out,
                r#"<text x="{:.1}" y="{:.1}" font-size="10" text-anchor="middle">{}</text>"#,
                frame.x(axis, value),
                frame.bottom() + 16.0,
                tick_label(value)
            )?;
        }
        Ok(())
    }

    fn write_bars(
        &self,
        out: &mut String,
        frame: Frame,
        labels: &[String],
        series: &[BarSeries],
        highlight: usize,
        threshold: Option<&Marker>,
    ) -> std::fmt::Result {
        let y_axis = Axis::from_zero(
            series
                .iter()
                .flat_map(|s| s.values.iter().copied())
                .chain(threshold.map(|t| t.value)),
        );
        self.write_y_ticks(out, frame, &y_axis)?;

        if labels.is_empty() || series.is_empty() {
            return Ok(());
        }

        let group_width = frame.width / labels.len() as f64;
        let bar_width = group_width * 0.8 / series.len() as f64;
        let single_series = series.len() == 1;

        for (g, label) in labels.iter().enumerate() {
            let group_left = frame.left + g as f64 * group_width + group_width * 0.1;
            for (s, bars) in series.iter().enumerate() {
                let Some(value) = bars.values.get(g).copied() else {
                    continue;
                };
                let color = if single_series && g >= highlight && highlight > 0 {
                    MUTED
                } else {
                    PALETTE[s % PALETTE.len()]
                };
                let top = frame.y(&y_axis, value.max(0.0));
                writeln!(
                    out,
                    r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}"><title>{}: {}</title></rect>"#,
                    group_left + s as f64 * bar_width,
                    top,
                    bar_width,
                    frame.bottom() - top,
                    color,
                    escape(&bars.name),
                    tick_label(value)
                )?;
            }
            let label_x = group_left + group_width * 0.4;
            let label_y = frame.bottom() + 12.0;
            writeln!(
                out,
                r#"<text x="{x:.1}" y="{y:.1}" font-size="9" text-anchor="end" transform="rotate(-35 {x:.1} {y:.1})">{}</text>"#,
                escape(&shorten(label, 18)),
                x = label_x,
                y = label_y
            )?;
        }

        if let Some(marker) = threshold {
            let y = frame.y(&y_axis, marker.value);
            writeln!(
                out,
                r#"<line x1="{l}" y1="{y:.1}" x2="{r}" y2="{y:.1}" stroke="{c}" stroke-dasharray="6 4"/><text x="{r}" y="{ty:.1}" font-size="10" text-anchor="end" fill="{c}">{}</text>"#,
                escape(&marker.label),
                l = frame.left,
                r = frame.left + frame.width,
                ty = y - 4.0,
                c = MARKER_COLORS[0]
            )?;
        }

        if !single_series {
            self.write_legend(out, frame, series.iter().map(|s| s.name.as_str()))?;
        }
        Ok(())
    }

    fn write_lines(&self, out: &mut String, frame: Frame, series: &[LineSeries]) -> std::fmt::Result {
        let points = || series.iter().flat_map(|s| s.points.iter().copied());
        let x_axis = Axis::from_values(points().map(|(x, _)| x));
        let y_axis = Axis::from_values(points().map(|(_, y)| y));
        self.write_y_ticks(out, frame, &y_axis)?;
        self.write_x_ticks(out, frame, &x_axis)?;

        for (i, line) in series.iter().enumerate() {
            let color = PALETTE[i % PALETTE.len()];
            let coords: Vec<(f64, f64)> = line
                .points
                .iter()
                .filter(|(x, y)| x.is_finite() && y.is_finite())
                .map(|&(x, y)| (frame.x(&x_axis, x), frame.y(&y_axis, y)))
                .collect();

            if matches!(line.style, SeriesStyle::Line | SeriesStyle::LineWithMarkers) {
                let path: Vec<String> = coords
                    .iter()
                    .map(|(x, y)| format!("{:.1},{:.1}", x, y))
                    .collect();
                writeln!(
                    out,
                    r#"<polyline points="{}" fill="none" stroke="{}" stroke-width="2"/>"#,
                    path.join(" "),
                    color
                )?;
            }
            if matches!(line.style, SeriesStyle::LineWithMarkers | SeriesStyle::Points) {
                let radius = if line.style == SeriesStyle::Points && coords.len() > 100 {
                    2.0
                } else {
                    4.0
                };
                for (x, y) in &coords {
                    writeln!(
                        out,
                        r#"<circle cx="{:.1}" cy="{:.1}" r="{}" fill="{}" fill-opacity="0.7"/>"#,
                        x, y, radius, color
                    )?;
                }
            }
        }

        self.write_legend(out, frame, series.iter().map(|s| s.name.as_str()))
    }

    fn write_histogram(
        &self,
        out: &mut String,
        frame: Frame,
        bins: &[HistogramBin],
        markers: &[Marker],
    ) -> std::fmt::Result {
        let x_axis = Axis {
            min: bins.first().map(|b| b.lower).unwrap_or(0.0),
            max: bins.last().map(|b| b.upper).unwrap_or(1.0),
        };
        let y_axis = Axis::from_zero(bins.iter().map(|b| b.count as f64));
        self.write_y_ticks(out, frame, &y_axis)?;
        self.write_x_ticks(out, frame, &x_axis)?;

        for bin in bins {
            let left = frame.x(&x_axis, bin.lower);
            let right = frame.x(&x_axis, bin.upper);
            let top = frame.y(&y_axis, bin.count as f64);
            writeln!(
                out,
                r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}" stroke="white" stroke-width="0.5"/>"#,
                left,
                top,
                (right - left).max(0.5),
                frame.bottom() - top,
                PALETTE[0]
            )?;
        }

        for (i, marker) in markers.iter().enumerate() {
            if marker.value < x_axis.min || marker.value > x_axis.max {
                continue;
            }
            let x = frame.x(&x_axis, marker.value);
            let color = MARKER_COLORS[i % MARKER_COLORS.len()];
            writeln!(
                out,
                r#"<line x1="{x:.1}" y1="{t}" x2="{x:.1}" y2="{b}" stroke="{c}" stroke-width="2" stroke-dasharray="6 4"/>"#,
                x = x,
                t = frame.top,
                b = frame.bottom(),
                c = color
            )?;
        }

        self.write_legend(out, frame, markers.iter().map(|m| m.label.as_str()))
    }

    fn write_legend<'a>(
        &self,
        out: &mut String,
        frame: Frame,
        names: impl Iterator<Item = &'a str>,
    ) -> std::fmt::Result {
        for (i, name) in names.enumerate() {
            let y = frame.top + 6.0 + i as f64 * 16.0;
            let x = frame.left + frame.width - 150.0;
            writeln!(
                out,
                r#"<rect x="{:.1}" y="{:.1}" width="10" height="10" fill="{}"/><text x="{:.1}" y="{:.1}" font-size="10">{}</text>"#,
                x,
                y,
                PALETTE[i % PALETTE.len()],
                x + 14.0,
                y + 9.0,
                escape(name)
            )?;
        }
        Ok(())
    }
}

fn tick_label(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1_000_000.0 {
        format!("{:.1}M", value / 1_000_000.0)
    } else if abs >= 10_000.0 {
        format!("{:.0}k", value / 1_000.0)
    } else if abs >= 100.0 || value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

fn shorten(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", head)
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
