use crate::error::{LedgerReportError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalColumn {
    #[schemars(description = "Display label of the ledger period, e.g. 'Janeiro/2024'. Always text.")]
    Period,

    #[schemars(description = "Amount deposited during the period. Non-negative.")]
    Contribution,

    #[schemars(description = "Interest rate applied in the period as a unit-less fraction (0.005 = 0.5%).")]
    InterestRate,

    #[schemars(description = "Balance at the start of the period.")]
    OpeningBalance,

    #[schemars(description = "Interest earned during the period.")]
    MonthlyInterest,

    #[schemars(description = "Balance at the end of the period.")]
    ClosingBalance,
}

impl CanonicalColumn {
    pub const ALL: [CanonicalColumn; 6] = [
        CanonicalColumn::Period,
        CanonicalColumn::Contribution,
        CanonicalColumn::InterestRate,
        CanonicalColumn::OpeningBalance,
        CanonicalColumn::MonthlyInterest,
        CanonicalColumn::ClosingBalance,
    ];

    /// Header the ledger spreadsheet uses for this column.
    pub fn header(&self) -> &'static str {
        match self {
            CanonicalColumn::Period => "mês",
            CanonicalColumn::Contribution => "aporte",
            CanonicalColumn::InterestRate => "taxa de juros",
            CanonicalColumn::OpeningBalance => "saldo inicial",
            CanonicalColumn::MonthlyInterest => "juros do mês",
            CanonicalColumn::ClosingBalance => "saldo final",
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            CanonicalColumn::Period => "period",
            CanonicalColumn::Contribution => "contribution",
            CanonicalColumn::InterestRate => "interest_rate",
            CanonicalColumn::OpeningBalance => "opening_balance",
            CanonicalColumn::MonthlyInterest => "monthly_interest",
            CanonicalColumn::ClosingBalance => "closing_balance",
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, CanonicalColumn::Period)
    }

    /// Case and whitespace insensitive match against the Portuguese header or
    /// the English id.
    pub fn from_header(name: &str) -> Option<Self> {
        let key = header_key(name);
        Self::ALL
            .into_iter()
            .find(|c| header_key(c.header()) == key || header_key(c.id()) == key)
    }
}

/// Lowercases and collapses internal whitespace so `"  Saldo   FINAL "` and
/// `"saldo final"` compare equal.
pub fn header_key(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    #[schemars(description = "Single self-contained HTML page with images embedded as data URIs.")]
    Html,

    #[schemars(description = "Markdown document with images embedded as data URIs.")]
    Markdown,

    #[schemars(description = "Machine-readable JSON rendition of the report model.")]
    Json,
}

impl OutputFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Html => "text/html",
            OutputFormat::Markdown => "text/markdown",
            OutputFormat::Json => "application/json",
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct ChartConfig {
    #[schemars(description = "Rendered chart width in pixels.")]
    pub width: u32,

    #[schemars(description = "Rendered chart height in pixels.")]
    pub height: u32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
        }
    }
}

pub const DEFAULT_TITLE: &str = "Relatório de Análise Financeira";
pub const DEFAULT_WATERMARK: &str = "Gerado automaticamente por ledger-report";
const MAX_DECIMAL_PLACES: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct ReportConfig {
    #[schemars(description = "Title printed at the top of the report.")]
    pub title: String,

    #[schemars(description = "Fixed attribution string printed at the bottom of the report.")]
    pub watermark: String,

    #[schemars(description = "Decimal places used when presenting statistics. Computation always uses full precision.")]
    pub decimal_places: u32,

    #[schemars(description = "Document format produced by the report serializer.")]
    pub format: OutputFormat,

    #[schemars(description = "Render the derived series as charts and embed them in the report.")]
    pub include_charts: bool,

    pub chart: ChartConfig,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            watermark: DEFAULT_WATERMARK.to_string(),
            decimal_places: 4,
            format: OutputFormat::Html,
            include_charts: true,
            chart: ChartConfig::default(),
        }
    }
}

impl ReportConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ReportConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(LedgerReportError::InvalidConfig(
                "title must not be blank".to_string(),
            ));
        }
        if self.decimal_places > MAX_DECIMAL_PLACES {
            return Err(LedgerReportError::InvalidConfig(format!(
                "decimal_places {} exceeds the maximum of {}",
                self.decimal_places, MAX_DECIMAL_PLACES
            )));
        }
        if self.chart.width == 0 || self.chart.height == 0 {
            return Err(LedgerReportError::InvalidConfig(format!(
                "chart dimensions must be positive, got {}x{}",
                self.chart.width, self.chart.height
            )));
        }
        Ok(())
    }

    pub fn json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ReportConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::json_schema())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct IngestConfig {
    #[schemars(description = "Number of header rows at the top of the sheet. Values above 1 collapse hierarchical headers into single names.")]
    pub header_rows: usize,

    #[schemars(description = "Sheet to read from a spreadsheet workbook. Defaults to the first sheet.")]
    pub sheet: Option<String>,

    #[schemars(description = "Field delimiter for CSV uploads. Detected from the header line when absent.")]
    pub csv_delimiter: Option<char>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            header_rows: 1,
            sheet: None,
            csv_delimiter: None,
        }
    }
}

impl IngestConfig {
    pub fn validate(&self) -> Result<()> {
        if self.header_rows == 0 {
            return Err(LedgerReportError::InvalidConfig(
                "header_rows must be at least 1".to_string(),
            ));
        }
        if let Some(delimiter) = self.csv_delimiter {
            if !delimiter.is_ascii() {
                return Err(LedgerReportError::InvalidConfig(format!(
                    "csv_delimiter '{}' must be a single ASCII character",
                    delimiter
                )));
            }
        }
        Ok(())
    }
}
