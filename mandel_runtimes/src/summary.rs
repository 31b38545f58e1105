use serde::Serialize;

use crate::{RuntimeTable, Variant};

/// Aggregate runtime of one variant across all recorded trials.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VariantSummary {
    pub variant: Variant,
    pub samples: usize,
    pub mean_s: f64,
    pub min_s: f64,
    pub max_s: f64,
    /// Unoptimized mean divided by this variant's mean.
    pub speedup: Option<f64>,
}

/// Summaries for every variant that has at least one sample, in column order.
pub fn summarize(table: &RuntimeTable) -> Vec<VariantSummary> {
    let baseline = mean(table.series(Variant::Unoptimized));
    table
        .iter()
        .filter_map(|(variant, series)| {
            let mean_s = mean(series)?;
            let min_s = series.iter().copied().fold(f64::INFINITY, f64::min);
            let max_s = series.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let speedup = baseline.filter(|_| mean_s > 0.0).map(|base| base / mean_s);
            Some(VariantSummary {
                variant,
                samples: series.len(),
                mean_s,
                min_s,
                max_s,
                speedup,
            })
        })
        .collect()
}

/// Variant with the lowest mean runtime; the earlier column wins a tie.
pub fn fastest(summaries: &[VariantSummary]) -> Option<&VariantSummary> {
    summaries.iter().fold(None, |best, candidate| match best {
        Some(best) if best.mean_s <= candidate.mean_s => Some(best),
        _ => Some(candidate),
    })
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse_runtimes_str, Separator};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn summary_reports_mean_extremes_and_speedup() {
        let table = parse_runtimes_str(
            "2.0 1.0 0.5 4.0 3.0\n4.0 1.0 1.5 4.0 3.0\n",
            Separator::Whitespace,
        )
        .unwrap();
        let summaries = summarize(&table);
        assert_eq!(summaries.len(), 5);

        let unopt = &summaries[0];
        assert_eq!(unopt.variant, Variant::Unoptimized);
        assert_eq!(unopt.samples, 2);
        assert!(close(unopt.mean_s, 3.0));
        assert!(close(unopt.min_s, 2.0));
        assert!(close(unopt.max_s, 4.0));
        assert!(close(unopt.speedup.unwrap(), 1.0));

        let optimized = &summaries[1];
        assert!(close(optimized.speedup.unwrap(), 3.0));

        let periodic = &summaries[2];
        assert!(close(periodic.mean_s, 1.0));
        assert!(close(periodic.min_s, 0.5));
        assert!(close(periodic.max_s, 1.5));
    }

    #[test]
    fn zero_mean_has_no_speedup() {
        let table = parse_runtimes_str("1 0 1 1 1\n", Separator::Whitespace).unwrap();
        let summaries = summarize(&table);
        assert_eq!(summaries[1].speedup, None);
    }

    #[test]
    fn empty_table_has_no_summaries() {
        assert!(summarize(&RuntimeTable::default()).is_empty());
        assert!(fastest(&[]).is_none());
    }

    #[test]
    fn fastest_prefers_lowest_mean_then_column_order() {
        let table = parse_runtimes_str("5 2 1 1 3\n", Separator::Whitespace).unwrap();
        let summaries = summarize(&table);
        assert_eq!(fastest(&summaries).map(|s| s.variant), Some(Variant::Periodic));
    }

    #[test]
    fn summary_serializes_with_snake_case_variant_ids() {
        let table = parse_runtimes_str("2 1 0 1 1\n", Separator::Whitespace).unwrap();
        let value = serde_json::to_value(summarize(&table)).unwrap();

        assert_eq!(value[0]["variant"], "unoptimized");
        assert_eq!(value[0]["samples"], 1);
        assert_eq!(value[1]["speedup"], 2.0);
        assert!(value[2]["speedup"].is_null());
        assert_eq!(value[4]["variant"], "histogram");
    }
}
