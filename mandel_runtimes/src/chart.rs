//! Line chart of per-trial runtimes, one line per algorithm variant.

use std::panic;
use std::path::Path;

use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use plotters::style::{FontDesc, FontFamily, FontStyle};
use plotters_backend::DrawingBackend;
use tracing::{debug, warn};

use crate::fallback_font::FontSafeBackend;
use crate::{ReportError, RuntimeTable, Variant};

pub const DEFAULT_TITLE: &str = "Runtimes for various Mandelbrot Algorithms";
pub const X_AXIS_LABEL: &str = "Iteration";
pub const Y_AXIS_LABEL: &str = "Time (in seconds)";
pub const DEFAULT_SIZE: (u32, u32) = (1280, 760);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChartKind {
    Png,
    Svg,
}

impl ChartKind {
    /// `.svg` paths get an SVG chart, everything else a PNG.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("svg") => ChartKind::Svg,
            _ => ChartKind::Png,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ChartOptions {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub size: (u32, u32),
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            x_label: X_AXIS_LABEL.to_string(),
            y_label: Y_AXIS_LABEL.to_string(),
            size: DEFAULT_SIZE,
        }
    }
}

fn variant_color(variant: Variant) -> RGBColor {
    match variant {
        Variant::Unoptimized => RGBColor(31, 119, 180),
        Variant::Optimized => RGBColor(255, 127, 14),
        Variant::Periodic => RGBColor(44, 160, 44),
        Variant::Continuous => RGBColor(214, 39, 40),
        Variant::Histogram => RGBColor(148, 103, 189),
    }
}

/// Draw every series of `table` against `trials` and write the chart to `path`.
///
/// Each line pairs trial numbers with durations and stops at the shorter of the two. An empty
/// table still produces a chart with title, axes and legend.
pub fn render_chart(
    trials: &[u32],
    table: &RuntimeTable,
    path: &Path,
    kind: ChartKind,
    options: &ChartOptions,
) -> Result<(), ReportError> {
    if table.len() != trials.len() {
        warn!(
            "{} trials recorded but {} configured; plotting {}",
            table.len(),
            trials.len(),
            table.len().min(trials.len())
        );
    }

    let render = || -> Result<(), String> {
        match kind {
            ChartKind::Png => {
                let backend = BitMapBackend::new(path, options.size);
                let root = FontSafeBackend::new(backend).into_drawing_area();
                draw_runtimes(root, trials, table, options)
                    .map_err(|e| format!("plotting error: {}", e))
            }
            ChartKind::Svg => {
                let backend = SVGBackend::new(path, options.size);
                let root = FontSafeBackend::new(backend).into_drawing_area();
                draw_runtimes(root, trials, table, options)
                    .map_err(|e| format!("plotting error: {}", e))
            }
        }
    };

    panic::catch_unwind(panic::AssertUnwindSafe(render))
        .map_err(|_| ReportError::Render("plotting backend panicked".to_string()))?
        .map_err(ReportError::Render)?;
    debug!("Chart written to {}", path.display());
    Ok(())
}

fn draw_runtimes<DB>(
    area: DrawingArea<DB, Shift>,
    trials: &[u32],
    table: &RuntimeTable,
    options: &ChartOptions,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    area.fill(&WHITE)?;

    let (x_min, x_max) = x_span(trials);
    let y_max = y_ceiling(table);

    let title_font = FontDesc::new(FontFamily::SansSerif, 28.0, FontStyle::Normal);
    let mut chart = ChartBuilder::on(&area)
        .caption(options.title.as_str(), title_font)
        .margin(25)
        .set_label_area_size(LabelAreaPosition::Left, 80)
        .set_label_area_size(LabelAreaPosition::Bottom, 60)
        .build_cartesian_2d(x_min..x_max, 0.0..y_max)?;

    let axis_font = FontDesc::new(FontFamily::SansSerif, 18.0, FontStyle::Normal);
    let tick_count = (x_max - x_min) as usize + 1;
    let y_decimals = y_label_decimals(y_max);

    chart
        .configure_mesh()
        .light_line_style(&TRANSPARENT)
        .x_labels(tick_count)
        .x_label_formatter(&|v| format!("{:.0}", v))
        .y_label_formatter(&|v| format!("{:.*}", y_decimals, v))
        .x_desc(options.x_label.as_str())
        .y_desc(options.y_label.as_str())
        .axis_desc_style(axis_font.clone())
        .label_style(axis_font.color(&BLACK.mix(0.85)))
        .draw()?;

    for (variant, series) in table.iter() {
        let color = variant_color(variant);
        let style = ShapeStyle {
            color: color.to_rgba(),
            filled: false,
            stroke_width: 2,
        };
        chart
            .draw_series(LineSeries::new(
                trials
                    .iter()
                    .map(|&trial| f64::from(trial))
                    .zip(series.iter().copied()),
                style,
            ))?
            .label(variant.label())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 30, y)], style));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK.mix(0.3))
        .label_font(FontDesc::new(FontFamily::SansSerif, 16.0, FontStyle::Normal).color(&BLACK))
        .position(SeriesLabelPosition::UpperRight)
        .draw()?;

    area.present()?;
    Ok(())
}

/// X range covering every trial; at least `1..2` so a single trial or none still has width.
fn x_span(trials: &[u32]) -> (f64, f64) {
    let last = trials.iter().copied().max().unwrap_or(1).max(2);
    (1.0, f64::from(last))
}

/// Decimals that keep roughly five y ticks distinct; never fewer than two.
fn y_label_decimals(y_max: f64) -> usize {
    let step = y_max / 5.0;
    if !(step.is_finite() && step > 0.0) {
        return 2;
    }
    ((-step.log10()).ceil().max(0.0) as usize).max(2)
}

fn y_ceiling(table: &RuntimeTable) -> f64 {
    let max = table
        .iter()
        .flat_map(|(_, series)| series.iter().copied())
        .filter(|v| v.is_finite())
        .fold(0.0, f64::max);
    if max > 0.0 {
        max * 1.1
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse_runtimes_str, Separator};

    #[test]
    fn chart_kind_follows_extension() {
        assert_eq!(ChartKind::from_path(Path::new("runtime.svg")), ChartKind::Svg);
        assert_eq!(ChartKind::from_path(Path::new("RUNTIME.SVG")), ChartKind::Svg);
        assert_eq!(ChartKind::from_path(Path::new("runtime.png")), ChartKind::Png);
        assert_eq!(ChartKind::from_path(Path::new("runtime")), ChartKind::Png);
    }

    #[test]
    fn x_span_has_width_for_tiny_trial_counts() {
        assert_eq!(x_span(&[]), (1.0, 2.0));
        assert_eq!(x_span(&[1]), (1.0, 2.0));
        assert_eq!(x_span(&(1..=10).collect::<Vec<_>>()), (1.0, 10.0));
    }

    #[test]
    fn y_ceiling_pads_the_slowest_runtime() {
        let table =
            parse_runtimes_str("0.5 0.4 0.3 0.2 2.0\n", Separator::Whitespace).unwrap();
        assert!((y_ceiling(&table) - 2.2).abs() < 1e-9);
    }

    #[test]
    fn y_ceiling_defaults_without_positive_data() {
        assert_eq!(y_ceiling(&RuntimeTable::default()), 1.0);
        let table = parse_runtimes_str("0 0 0 0 0\n", Separator::Whitespace).unwrap();
        assert_eq!(y_ceiling(&table), 1.0);
    }

    #[test]
    fn y_labels_gain_decimals_for_millisecond_runtimes() {
        assert_eq!(y_label_decimals(2.2), 2);
        assert_eq!(y_label_decimals(55.0), 2);
        assert_eq!(y_label_decimals(0.0055), 3);
        assert_eq!(y_label_decimals(0.0002), 5);
        assert_eq!(y_label_decimals(0.0), 2);
    }

    #[test]
    fn every_variant_has_a_distinct_color() {
        for (i, a) in Variant::ALL.iter().enumerate() {
            for b in &Variant::ALL[i + 1..] {
                assert_ne!(variant_color(*a), variant_color(*b));
            }
        }
    }
}
