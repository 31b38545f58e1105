//! Runtime report generator for the Mandelbrot benchmark.
//!
//! Reads the plain-text runtime log written by the benchmark harness (one trial per line,
//! five whitespace separated durations in seconds) and renders a line chart comparing the
//! five algorithm variants across trials.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

pub mod chart;
pub mod fallback_font;
pub mod summary;

pub use chart::{render_chart, ChartKind, ChartOptions};
pub use summary::{fastest, summarize, VariantSummary};

/// Runtime log read when no path is given.
pub const DEFAULT_INPUT: &str = "runtimes.txt";
/// Chart written when no path is given.
pub const DEFAULT_OUTPUT: &str = "runtime.png";
/// Number of benchmark trials recorded per log.
pub const DEFAULT_TRIALS: u32 = 10;
/// Number of algorithm variants, i.e. fields per record.
pub const VARIANT_COUNT: usize = 5;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to open runtime log {}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read runtime log")]
    Read(#[from] io::Error),
    #[error("line {line}: expected 5 runtime fields, found {found}")]
    MissingField { line: usize, found: usize },
    #[error("line {line}: field {column} is not a number: {token:?}")]
    InvalidNumber {
        line: usize,
        column: usize,
        token: String,
    },
    #[error("failed to render chart: {0}")]
    Render(String),
}

/// The five Mandelbrot algorithms timed by the benchmark, in log column order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Unoptimized,
    Optimized,
    Periodic,
    Continuous,
    Histogram,
}

impl Variant {
    pub const ALL: [Variant; VARIANT_COUNT] = [
        Variant::Unoptimized,
        Variant::Optimized,
        Variant::Periodic,
        Variant::Continuous,
        Variant::Histogram,
    ];

    /// Zero-based field position in a runtime record.
    pub fn column(self) -> usize {
        match self {
            Variant::Unoptimized => 0,
            Variant::Optimized => 1,
            Variant::Periodic => 2,
            Variant::Continuous => 3,
            Variant::Histogram => 4,
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            Variant::Unoptimized => "unoptimized",
            Variant::Optimized => "optimized",
            Variant::Periodic => "periodic",
            Variant::Continuous => "continuous",
            Variant::Histogram => "histogram",
        }
    }

    /// Legend label used on the chart.
    pub fn label(self) -> &'static str {
        match self {
            Variant::Unoptimized => "Unoptimized Escape Time",
            Variant::Optimized => "Optimized Escape Time",
            Variant::Periodic => "Periodically Checked Optimized Escape Time",
            Variant::Continuous => "Continuous Coloring",
            Variant::Histogram => "Histogram Coloring",
        }
    }
}

/// How fields on a record line are separated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Separator {
    /// Any run of whitespace separates two fields.
    Whitespace,
    /// Every single space separates two fields, so doubled spaces yield an empty field.
    SingleSpace,
}

impl Default for Separator {
    fn default() -> Self {
        Separator::Whitespace
    }
}

#[derive(Clone, Debug)]
pub struct Params {
    pub trials: u32,
    pub separator: Separator,
    pub chart: ChartOptions,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            trials: DEFAULT_TRIALS,
            separator: Separator::Whitespace,
            chart: ChartOptions::default(),
        }
    }
}

/// Per-variant runtime series. All five series always have the same length.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RuntimeTable {
    columns: [Vec<f64>; VARIANT_COUNT],
}

impl RuntimeTable {
    pub fn push_record(&mut self, record: [f64; VARIANT_COUNT]) {
        for (column, value) in self.columns.iter_mut().zip(record) {
            column.push(value);
        }
    }

    pub fn series(&self, variant: Variant) -> &[f64] {
        &self.columns[variant.column()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Variant, &[f64])> + '_ {
        Variant::ALL
            .into_iter()
            .map(move |variant| (variant, self.series(variant)))
    }

    /// Number of trials recorded.
    pub fn len(&self) -> usize {
        self.columns[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Trial numbers `1..=trials` used as the chart's x values.
pub fn trial_index(trials: u32) -> Vec<u32> {
    (1..=trials).collect()
}

/// Load a runtime log from disk.
///
/// The file handle is owned by the reader and released when this function returns, on the
/// success path and on every error path alike.
pub fn load_runtimes(path: &Path, separator: Separator) -> Result<RuntimeTable, ReportError> {
    let file = File::open(path).map_err(|source| ReportError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let table = parse_runtimes(BufReader::new(file), separator)?;
    debug!(
        "Loaded {} records from {}",
        table.len(),
        path.display()
    );
    Ok(table)
}

/// Parse runtime records from any buffered reader.
///
/// Exactly empty lines are skipped; anything else, whitespace-only lines included, must carry
/// at least five numeric fields. Fields past the fifth are ignored.
pub fn parse_runtimes<R: BufRead>(
    reader: R,
    separator: Separator,
) -> Result<RuntimeTable, ReportError> {
    let mut table = RuntimeTable::default();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        table.push_record(parse_record(&line, idx + 1, separator)?);
    }
    Ok(table)
}

pub fn parse_runtimes_str(input: &str, separator: Separator) -> Result<RuntimeTable, ReportError> {
    parse_runtimes(input.as_bytes(), separator)
}

fn split_fields(line: &str, separator: Separator) -> Vec<&str> {
    match separator {
        Separator::Whitespace => line.split_whitespace().collect(),
        Separator::SingleSpace => line.split(' ').collect(),
    }
}

fn parse_record(
    line: &str,
    line_no: usize,
    separator: Separator,
) -> Result<[f64; VARIANT_COUNT], ReportError> {
    let tokens = split_fields(line, separator);
    if tokens.len() < VARIANT_COUNT {
        return Err(ReportError::MissingField {
            line: line_no,
            found: tokens.len(),
        });
    }

    let mut record = [0.0; VARIANT_COUNT];
    for (column, (slot, token)) in record.iter_mut().zip(&tokens).enumerate() {
        *slot = token
            .trim()
            .parse()
            .map_err(|_| ReportError::InvalidNumber {
                line: line_no,
                column: column + 1,
                token: (*token).to_string(),
            })?;
    }
    Ok(record)
}

/// Load `input`, chart it into `output`, and hand back the parsed table.
///
/// Nothing is written when the log fails to parse.
pub fn generate_report(
    input: &Path,
    output: &Path,
    kind: ChartKind,
    params: &Params,
) -> Result<RuntimeTable, ReportError> {
    let table = load_runtimes(input, params.separator)?;
    let trials = trial_index(params.trials);
    render_chart(&trials, &table, output, kind, &params.chart)?;
    Ok(table)
}
