use crate::error::{LedgerReportError, Result};
use crate::ledger::LedgerTable;
use log::debug;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Descriptive statistics of one numeric column, at full precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStatistics {
    pub mean: f64,
    pub median: f64,
    /// `None` when no value repeats.
    pub mode: Option<f64>,
    /// Sample standard deviation (N - 1). Zero for a single value.
    pub std_dev: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub column: String,
    pub statistics: ColumnStatistics,
}

/// Statistics keyed by column, in the order the caller selected them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StatisticsSummary {
    pub columns: Vec<ColumnSummary>,
}

impl StatisticsSummary {
    pub fn get(&self, column: &str) -> Option<&ColumnStatistics> {
        self.columns
            .iter()
            .find(|c| c.column == column)
            .map(|c| &c.statistics)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl ColumnStatistics {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        // Fold -0.0 into 0.0 so the two compare equal for the mode.
        let mut sorted: Vec<f64> = values.iter().map(|v| v + 0.0).collect();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let mean = mean_of(&sorted);

        Some(Self {
            mean,
            median: median_of_sorted(&sorted),
            mode: mode_of_sorted(&sorted),
            std_dev: sample_std_dev(&sorted, mean),
            count,
        })
    }
}

/// Plain sum when it fits; otherwise each value is divided first so values
/// near `f64::MAX` still give a finite mean.
fn mean_of(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let sum: f64 = values.iter().sum();
    if sum.is_finite() {
        sum / n
    } else {
        values.iter().map(|v| v / n).sum()
    }
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        sorted[mid - 1] / 2.0 + sorted[mid] / 2.0
    } else {
        sorted[mid]
    }
}

/// Most frequent value; ties go to the smallest value. `None` if nothing
/// repeats.
fn mode_of_sorted(sorted: &[f64]) -> Option<f64> {
    let mut best: Option<(f64, usize)> = None;
    let mut idx = 0;

    while idx < sorted.len() {
        let value = sorted[idx];
        let run = sorted[idx..]
            .iter()
            .take_while(|v| v.total_cmp(&value) == Ordering::Equal)
            .count();

        // Strictly greater keeps the earlier, smaller value on ties.
        if run > 1 && best.map_or(true, |(_, best_run)| run > best_run) {
            best = Some((value, run));
        }
        idx += run;
    }

    best.map(|(value, _)| value)
}

fn sample_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let dof = (values.len() - 1) as f64;
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    if sum_sq.is_finite() {
        return (sum_sq / dof).sqrt();
    }

    // Squares overflowed: work in units of the largest magnitude.
    let scale = values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let scaled_sq: f64 = values
        .iter()
        .map(|v| (v / scale - mean / scale).powi(2))
        .sum();
    scale * (scaled_sq / dof).sqrt()
}

/// Summarizes the selected numeric columns of a ledger.
///
/// Duplicate names in `columns` are ignored after their first occurrence.
/// Names resolve case-insensitively and through canonical ids, but each
/// record keeps the name the caller used.
pub fn summarize<S: AsRef<str>>(table: &LedgerTable, columns: &[S]) -> Result<StatisticsSummary> {
    if columns.is_empty() {
        return Err(LedgerReportError::EmptySelection);
    }

    let mut summary = StatisticsSummary::default();
    let mut seen: Vec<&str> = Vec::new();

    for requested in columns {
        let requested = requested.as_ref();
        let column = table
            .column(requested)
            .ok_or_else(|| LedgerReportError::UnknownColumn(requested.to_string()))?;

        if seen.contains(&column.name.as_str()) {
            continue;
        }
        seen.push(column.name.as_str());

        let values = column
            .numbers()
            .ok_or_else(|| LedgerReportError::NonNumericSelection(requested.to_string()))?;
        let statistics = ColumnStatistics::from_values(values)
            .ok_or_else(|| LedgerReportError::EmptyColumn(requested.to_string()))?;

        debug!(
            "Column '{}': mean={} median={} mode={:?} std_dev={}",
            column.name, statistics.mean, statistics.median, statistics.mode, statistics.std_dev
        );

        summary.columns.push(ColumnSummary {
            column: requested.to_string(),
            statistics,
        });
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{ColumnData, LedgerColumn};
    use crate::schema::CanonicalColumn;

    fn table(values: Vec<f64>) -> LedgerTable {
        let periods = (1..=values.len()).map(|i| format!("{}", i)).collect();
        LedgerTable::new(
            vec![
                LedgerColumn {
                    name: "mês".to_string(),
                    canonical: Some(CanonicalColumn::Period),
                    data: ColumnData::Text(periods),
                },
                LedgerColumn {
                    name: "aporte".to_string(),
                    canonical: Some(CanonicalColumn::Contribution),
                    data: ColumnData::Numeric(values),
                },
            ],
            0,
        )
        .unwrap()
    }

    #[test]
    fn test_two_row_contribution() {
        let summary = summarize(&table(vec![1000.0, 1500.0]), &["aporte"]).unwrap();
        let stats = summary.get("aporte").unwrap();
        assert_eq!(stats.mean, 1250.0);
        assert_eq!(stats.median, 1250.0);
        assert_eq!(stats.mode, None);
        assert!((stats.std_dev - 353.5533905932738).abs() < 1e-9);
    }

    #[test]
    fn test_values_near_float_max_stay_finite() {
        let stats = ColumnStatistics::from_values(&[1e308, 1e308]).unwrap();
        assert_eq!(stats.mean, 1e308);
        assert_eq!(stats.median, 1e308);
        assert_eq!(stats.mode, Some(1e308));
        assert_eq!(stats.std_dev, 0.0);

        let stats = ColumnStatistics::from_values(&[f64::MAX, f64::MAX / 2.0]).unwrap();
        assert!(stats.mean.is_finite());
        assert!(stats.median.is_finite());
        assert!(stats.std_dev.is_finite());
        assert!((stats.mean / f64::MAX - 0.75).abs() < 1e-12);
        assert!((stats.std_dev / f64::MAX - 0.125_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_mode_tie_break_smallest() {
        let stats = ColumnStatistics::from_values(&[2.0, 1.0, 2.0, 1.0]).unwrap();
        assert_eq!(stats.mode, Some(1.0));

        let stats = ColumnStatistics::from_values(&[5.0, 3.0, 5.0, 3.0, 5.0]).unwrap();
        assert_eq!(stats.mode, Some(5.0));
    }

    #[test]
    fn test_single_row_has_zero_deviation() {
        let stats = ColumnStatistics::from_values(&[42.0]).unwrap();
        assert_eq!(stats.std_dev, 0.0);
        assert_eq!(stats.mean, 42.0);
        assert_eq!(stats.median, 42.0);
        assert_eq!(stats.mode, None);
    }

    #[test]
    fn test_odd_median_and_negative_zero() {
        let stats = ColumnStatistics::from_values(&[3.0, -0.0, 0.0]).unwrap();
        assert_eq!(stats.median, 0.0);
        assert_eq!(stats.mode, Some(0.0));
    }

    #[test]
    fn test_empty_selection() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            summarize(&table(vec![1.0]), &empty),
            Err(LedgerReportError::EmptySelection)
        ));
    }

    #[test]
    fn test_selection_order_and_duplicates() {
        let t = table(vec![1.0, 2.0]);
        let summary = summarize(&t, &["aporte", "contribution", "APORTE"]).unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary.columns[0].column, "aporte");
    }

    #[test]
    fn test_unknown_and_text_columns() {
        let t = table(vec![1.0]);
        assert!(matches!(
            summarize(&t, &["saldo final"]),
            Err(LedgerReportError::UnknownColumn(name)) if name == "saldo final"
        ));
        assert!(matches!(
            summarize(&t, &["mês"]),
            Err(LedgerReportError::NonNumericSelection(_))
        ));
    }
}
