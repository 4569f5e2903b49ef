use crate::ledger::LedgerTable;
use crate::schema::CanonicalColumn;
use crate::utils::parse_period_label;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const BALANCE_OVER_TIME: &str = "balance_over_time";
pub const MONTHLY_CHANGE: &str = "monthly_change";
pub const CUMULATIVE_CONTRIBUTION: &str = "cumulative_contribution";

/// A series ready to be drawn: one value per period label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledSeries {
    pub name: String,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

/// Time-series views of a ledger, aligned with `labels` and `source_rows`.
/// A series is `None` when the columns it needs are absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedSeries {
    pub labels: Vec<String>,
    /// Row of the ledger table each position came from.
    pub source_rows: Vec<usize>,
    pub balance_over_time: Option<Vec<f64>>,
    /// Within-row `closing_balance - opening_balance`.
    pub monthly_change: Option<Vec<f64>>,
    pub cumulative_contribution: Option<Vec<f64>>,
}

impl DerivedSeries {
    pub fn is_empty(&self) -> bool {
        self.balance_over_time.is_none()
            && self.monthly_change.is_none()
            && self.cumulative_contribution.is_none()
    }

    /// The present series with their chart titles, in report order.
    pub fn chart_series(&self) -> Vec<LabeledSeries> {
        let mut series = Vec::new();

        if let Some(values) = &self.balance_over_time {
            series.push(self.labeled(
                BALANCE_OVER_TIME,
                "Evolução do Saldo",
                "Saldo Final",
                values,
            ));
        }
        if let Some(values) = &self.monthly_change {
            series.push(self.labeled(MONTHLY_CHANGE, "Saldo Mensal", "Saldo Mensal", values));
        }
        if let Some(values) = &self.cumulative_contribution {
            series.push(self.labeled(
                CUMULATIVE_CONTRIBUTION,
                "Saldo de Investimento",
                "Investimento Cumulativo",
                values,
            ));
        }

        series
    }

    fn labeled(&self, name: &str, title: &str, y_label: &str, values: &[f64]) -> LabeledSeries {
        LabeledSeries {
            name: name.to_string(),
            title: title.to_string(),
            x_label: "Mês".to_string(),
            y_label: y_label.to_string(),
            labels: self.labels.clone(),
            values: values.to_vec(),
        }
    }
}

/// Row order for derivation. Rows are sorted chronologically only when every
/// period label is recognized, carries a year, and no two labels fall on the
/// same month; otherwise the input order is kept.
///
/// Month names without a year cannot tell December of one year from December
/// of the next, so such ledgers are taken to be in sequence already.
pub fn chronological_order(labels: &[String]) -> Vec<usize> {
    let input_order: Vec<usize> = (0..labels.len()).collect();

    let keys: Option<Vec<_>> = labels.iter().map(|l| parse_period_label(l)).collect();
    let Some(keys) = keys else {
        return input_order;
    };

    if keys.iter().any(|k| k.year.is_none()) {
        return input_order;
    }

    let distinct: HashSet<_> = keys.iter().collect();
    if distinct.len() != keys.len() {
        return input_order;
    }

    let mut order = input_order;
    order.sort_by_key(|&idx| keys[idx]);
    order
}

/// Builds the derived series in [`chronological_order`]. Labels with a bare
/// month name and no year (e.g. "Fevereiro", "Janeiro") are not reordered;
/// rows then keep the order in which they were read.
pub fn derive(table: &LedgerTable) -> DerivedSeries {
    let labels: Vec<String> = match table.periods() {
        Some(periods) => periods.to_vec(),
        None => (1..=table.row_count()).map(|i| i.to_string()).collect(),
    };
    let order = chronological_order(&labels);
    if order.iter().enumerate().any(|(pos, &idx)| pos != idx) {
        debug!("Reordered {} ledger rows chronologically", order.len());
    }

    let reorder =
        |values: &[f64]| -> Vec<f64> { order.iter().map(|&idx| values[idx]).collect() };

    let closing = table
        .canonical_numbers(CanonicalColumn::ClosingBalance)
        .map(reorder);
    let opening = table
        .canonical_numbers(CanonicalColumn::OpeningBalance)
        .map(reorder);
    let contribution = table
        .canonical_numbers(CanonicalColumn::Contribution)
        .map(reorder);

    let monthly_change = match (&closing, &opening) {
        (Some(closing), Some(opening)) => Some(
            closing
                .iter()
                .zip(opening)
                .map(|(close, open)| close - open)
                .collect(),
        ),
        _ => None,
    };

    let cumulative_contribution = contribution.map(|values| {
        values
            .iter()
            .scan(0.0, |running, v| {
                *running += v;
                Some(*running)
            })
            .collect()
    });

    DerivedSeries {
        labels: order.iter().map(|&idx| labels[idx].clone()).collect(),
        source_rows: order,
        balance_over_time: closing,
        monthly_change,
        cumulative_contribution,
    }
}
