use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueHint};
use mandel_runtimes::{
    fastest, generate_report, render_chart, summarize, trial_index, ChartKind, Params,
    Separator, VariantSummary, DEFAULT_INPUT, DEFAULT_OUTPUT, DEFAULT_TRIALS,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// The binary's crate name collides with the library's, so CLI events name their target.
const LOG_TARGET: &str = "mandel_runtimes_cli";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Chart Mandelbrot algorithm runtimes across benchmark trials",
    long_about = None
)]
struct Cli {
    /// Runtime log: one trial per line, five durations in seconds
    #[arg(default_value = DEFAULT_INPUT, value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Output chart path (`.svg` writes SVG, anything else PNG)
    #[arg(short, long, default_value = DEFAULT_OUTPUT, value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Additionally write an SVG rendition of the chart
    #[arg(long, value_hint = ValueHint::FilePath)]
    svg: Option<PathBuf>,

    /// Number of trials on the x-axis
    #[arg(short = 'n', long, default_value_t = DEFAULT_TRIALS)]
    trials: u32,

    /// Split fields on single spaces only, rejecting doubled separators
    #[arg(long, action = ArgAction::SetTrue)]
    strict_separators: bool,

    /// Write per-variant summary (`.json` for JSON, `-` for CSV on stdout, otherwise CSV)
    #[arg(long, value_hint = ValueHint::FilePath)]
    summary: Option<PathBuf>,

    /// Chart title
    #[arg(long)]
    title: Option<String>,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

impl Cli {
    fn params(&self) -> Params {
        let mut params = Params::default();
        params.trials = self.trials;
        if self.strict_separators {
            params.separator = Separator::SingleSpace;
        }
        if let Some(title) = self.title.as_ref() {
            params.chart.title = title.clone();
        }
        params
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    let params = cli.params();

    let t_report = Instant::now();
    let kind = ChartKind::from_path(&cli.output);
    let table = generate_report(&cli.input, &cli.output, kind, &params).with_context(|| {
        format!(
            "failed to chart {} into {}",
            cli.input.display(),
            cli.output.display()
        )
    })?;
    debug!(
        target: LOG_TARGET,
        "Report stage: {:.1} ms",
        t_report.elapsed().as_secs_f64() * 1000.0
    );
    info!(
        target: LOG_TARGET,
        "Loaded {} trials from {}",
        table.len(),
        cli.input.display()
    );
    info!(target: LOG_TARGET, "Wrote chart: {}", cli.output.display());

    if let Some(svg_path) = cli.svg.as_ref() {
        render_chart(
            &trial_index(params.trials),
            &table,
            svg_path,
            ChartKind::Svg,
            &params.chart,
        )
        .with_context(|| format!("failed to write SVG chart {}", svg_path.display()))?;
        info!(target: LOG_TARGET, "Wrote chart: {}", svg_path.display());
    }

    let summaries = summarize(&table);
    log_summary(&summaries);

    if let Some(summary_path) = cli.summary.as_ref() {
        write_summary(&summaries, summary_path)?;
        if summary_path.as_os_str() != "-" {
            info!(target: LOG_TARGET, "Wrote summary: {}", summary_path.display());
        }
    }

    Ok(())
}

fn log_summary(summaries: &[VariantSummary]) {
    for summary in summaries {
        info!(
            target: LOG_TARGET,
            "{}: mean {:.4} s (min {:.4}, max {:.4}){}",
            summary.variant.label(),
            summary.mean_s,
            summary.min_s,
            summary.max_s,
            summary
                .speedup
                .map(|s| format!(", {:.2}x vs unoptimized", s))
                .unwrap_or_default()
        );
    }
    if let Some(best) = fastest(summaries) {
        info!(target: LOG_TARGET, "Fastest variant: {}", best.variant.label());
    }
}

fn write_summary(summaries: &[VariantSummary], path: &Path) -> Result<()> {
    if path.as_os_str() == "-" {
        let stdout = io::stdout();
        let mut writer = csv::Writer::from_writer(stdout.lock());
        return write_summary_rows(summaries, &mut writer);
    }

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        let text = serde_json::to_string_pretty(summaries)?;
        fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
        return Ok(());
    }

    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);
    write_summary_rows(summaries, &mut writer)
        .with_context(|| format!("failed to write {}", path.display()))
}

fn write_summary_rows<W: Write>(
    summaries: &[VariantSummary],
    writer: &mut csv::Writer<W>,
) -> Result<()> {
    writer.write_record(["variant", "samples", "mean_s", "min_s", "max_s", "speedup"])?;
    for summary in summaries {
        writer.write_record([
            summary.variant.id().to_string(),
            summary.samples.to_string(),
            format!("{:.6}", summary.mean_s),
            format!("{:.6}", summary.min_s),
            format!("{:.6}", summary.max_s),
            summary
                .speedup
                .map(|s| format!("{:.4}", s))
                .unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
