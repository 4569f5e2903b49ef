//! # Ledger Report
//!
//! A library for turning a monthly investment ledger spreadsheet into
//! descriptive statistics, derived time series and a self-contained report.
//!
//! ## Core Concepts
//!
//! - **Raw Table**: The grid read from an uploaded spreadsheet, CSV or JSON file, cells still untyped
//! - **Ledger Table**: The normalized table; numeric columns hold exactly one finite number per row
//! - **Canonical Columns**: `mês`, `aporte`, `taxa de juros`, `saldo inicial`, `juros do mês`, `saldo final`
//! - **Derived Series**: Balance evolution, within-row monthly change and cumulative contribution
//! - **Report Model**: Title, timestamp, statistics table and chart images, written by a document sink
//!
//! ## Example
//!
//! ```rust,ignore
//! use ledger_report::*;
//!
//! let bytes = std::fs::read("ledger.xlsx")?;
//! let table = LedgerProcessor::load(&bytes, &IngestConfig::default())?;
//!
//! let analysis = LedgerProcessor::analyze(&table, &["aporte", "saldo final"])?;
//! if let Some(stats) = &analysis.statistics {
//!     println!("mean contribution: {}", stats.get("aporte").unwrap().mean);
//! }
//!
//! let html = LedgerProcessor::generate_report(
//!     &table,
//!     &["aporte"],
//!     &SvgLineChart,
//!     &ReportConfig::default(),
//! )?;
//! ```

pub mod blueprint;
pub mod charts;
pub mod error;
pub mod ingestion;
pub mod ledger;
pub mod normalizer;
pub mod report;
pub mod schema;
pub mod series;
pub mod statistics;
pub mod utils;
pub mod validation;

pub use blueprint::{create_blueprint, BLUEPRINT_SHEET};
pub use charts::{ChartRenderer, RenderedImage, SvgLineChart};
pub use error::{LedgerReportError, Result, SchemaError};
pub use ingestion::{read_raw_table, InputFormat, RawCell, RawTable};
pub use ledger::{CellValue, ColumnData, LedgerColumn, LedgerTable};
pub use normalizer::normalize;
pub use report::{
    assemble, serialize, DocumentSink, HtmlSink, JsonSink, MarkdownSink, ReportImage,
    ReportModel, StatisticsRow, StatisticsTable,
};
pub use schema::*;
pub use series::{derive, DerivedSeries, LabeledSeries};
pub use statistics::{summarize, ColumnStatistics, ColumnSummary, StatisticsSummary};
pub use validation::{validate, ValidatedHeaders};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Result of analyzing a ledger for one column selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// `None` when no columns were selected.
    pub statistics: Option<StatisticsSummary>,
    pub derived: DerivedSeries,
}

pub struct LedgerProcessor;

impl LedgerProcessor {
    /// Reads, validates and normalizes an uploaded ledger.
    pub fn load(bytes: &[u8], config: &IngestConfig) -> Result<LedgerTable> {
        let raw = read_raw_table(bytes, config)?;

        let validated = validate(&raw)?;
        debug!(
            "Validated {} header(s); canonical columns at {:?}",
            validated.headers.len(),
            validated.canonical
        );

        let table = normalize(&raw)?;
        info!(
            "Loaded ledger with {} row(s); numeric columns: {}",
            table.row_count(),
            table.numeric_columns().join(", ")
        );
        Ok(table)
    }

    /// Statistics for `selection` and the derived series, computed side by
    /// side. An empty selection is not an error here; it just skips the
    /// statistics.
    pub fn analyze<S: AsRef<str> + Sync>(table: &LedgerTable, selection: &[S]) -> Result<Analysis> {
        if selection.is_empty() {
            info!("No columns selected; skipping statistics");
            return Ok(Analysis {
                statistics: None,
                derived: derive(table),
            });
        }

        let (statistics, derived) = std::thread::scope(|scope| {
            let statistics = scope.spawn(|| summarize(table, selection));
            let derived = derive(table);
            (statistics.join(), derived)
        });

        let statistics = statistics.map_err(|payload| {
            LedgerReportError::Worker(format!(
                "statistics worker panicked: {}",
                panic_message(payload.as_ref())
            ))
        })??;

        debug!(
            "Analysis produced {} statistics record(s); derived series empty: {}",
            statistics.len(),
            derived.is_empty()
        );

        Ok(Analysis {
            statistics: Some(statistics),
            derived,
        })
    }

    /// Builds the report model. Renderer failures, including panics, surface
    /// as [`LedgerReportError::Render`].
    pub fn build_report<S: AsRef<str> + Sync>(
        table: &LedgerTable,
        selection: &[S],
        renderer: &dyn ChartRenderer,
        config: &ReportConfig,
    ) -> Result<ReportModel> {
        config.validate()?;
        if selection.is_empty() {
            return Err(LedgerReportError::EmptySelection);
        }

        let analysis = Self::analyze(table, selection)?;
        let statistics = analysis.statistics.unwrap_or_default();

        let images = if config.include_charts {
            render_charts(&analysis.derived, renderer, &config.chart)?
        } else {
            Vec::new()
        };

        Ok(assemble(table, &statistics, images, config))
    }

    /// Builds the report and writes it in `config.format`.
    pub fn generate_report<S: AsRef<str> + Sync>(
        table: &LedgerTable,
        selection: &[S],
        renderer: &dyn ChartRenderer,
        config: &ReportConfig,
    ) -> Result<Vec<u8>> {
        let model = Self::build_report(table, selection, renderer, config)?;
        let bytes = serialize(&model, config.format)?;
        info!(
            "Generated {} report '{}' ({} bytes)",
            config.format.file_extension(),
            model.title,
            bytes.len()
        );
        Ok(bytes)
    }

    /// Runs [`Self::generate_report`] on the blocking thread pool. Every input
    /// is owned by the task.
    #[cfg(feature = "async")]
    pub async fn generate_report_async<R>(
        table: LedgerTable,
        selection: Vec<String>,
        renderer: R,
        config: ReportConfig,
    ) -> Result<Vec<u8>>
    where
        R: ChartRenderer + Send + 'static,
    {
        tokio::task::spawn_blocking(move || {
            Self::generate_report(&table, &selection, &renderer, &config)
        })
        .await
        .map_err(|e| LedgerReportError::Worker(format!("report task failed: {}", e)))?
    }
}

fn render_charts(
    derived: &DerivedSeries,
    renderer: &dyn ChartRenderer,
    chart: &ChartConfig,
) -> Result<Vec<ReportImage>> {
    let mut images = Vec::new();

    for series in derived.chart_series() {
        let outcome = catch_unwind(AssertUnwindSafe(|| renderer.render(&series, chart)));
        let image = match outcome {
            Ok(Ok(image)) => image,
            Ok(Err(err)) => {
                let message = match err {
                    LedgerReportError::Render(message) => message,
                    other => other.to_string(),
                };
                warn!("Chart '{}' failed: {}", series.title, message);
                return Err(LedgerReportError::Render(format!(
                    "{}: {}",
                    series.title, message
                )));
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!("Chart renderer panicked on '{}': {}", series.title, message);
                return Err(LedgerReportError::Render(format!(
                    "{}: renderer panicked: {}",
                    series.title, message
                )));
            }
        };

        debug!(
            "Rendered chart '{}' as {} ({} bytes)",
            series.title,
            image.mime_type,
            image.bytes.len()
        );
        images.push(ReportImage {
            caption: series.title,
            image,
        });
    }

    Ok(images)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
