use crate::charts::RenderedImage;
use crate::error::Result;
use crate::ledger::LedgerTable;
use crate::schema::{OutputFormat, ReportConfig};
use crate::series::chronological_order;
use crate::statistics::StatisticsSummary;
use crate::utils::format_decimal;
use chrono::{DateTime, Utc};
use log::debug;
use quick_xml::escape::escape;
use serde::{Deserialize, Serialize};

pub const STATISTICS_CAPTION: &str = "Estatísticas Descritivas";
pub const STATISTICS_HEADERS: [&str; 5] = ["Coluna", "Média", "Mediana", "Moda", "Desvio Padrão"];
pub const NO_MODE: &str = "Nenhuma";
const TIMESTAMP_LABEL: &str = "Data de Geração";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// One presentation row of the statistics table, already rounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsRow {
    pub column: String,
    pub mean: String,
    pub median: String,
    pub mode: String,
    pub std_dev: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsTable {
    pub caption: String,
    pub rows: Vec<StatisticsRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportImage {
    pub caption: String,
    pub image: RenderedImage,
}

/// Format-agnostic report. Built once per report request and handed to a
/// [`DocumentSink`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportModel {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub row_count: usize,
    /// First and last period label in chronological order.
    pub period_range: Option<(String, String)>,
    /// Cells that held several values and were reduced to the first one.
    pub collapsed_cells: usize,
    pub tables: Vec<StatisticsTable>,
    pub images: Vec<ReportImage>,
    pub watermark: String,
}

impl ReportModel {
    pub fn lossy_disclosure(&self) -> Option<String> {
        if self.collapsed_cells == 0 {
            return None;
        }
        Some(format!(
            "Aviso: {} célula(s) com múltiplos valores foram reduzidas ao primeiro valor.",
            self.collapsed_cells
        ))
    }

    fn timestamp_line(&self) -> String {
        format!(
            "{}: {}",
            TIMESTAMP_LABEL,
            self.generated_at.format(TIMESTAMP_FORMAT)
        )
    }

    fn summary_line(&self) -> String {
        match &self.period_range {
            Some((first, last)) => format!(
                "Linhas analisadas: {} ({} a {})",
                self.row_count, first, last
            ),
            None => format!("Linhas analisadas: {}", self.row_count),
        }
    }
}

pub fn assemble(
    table: &LedgerTable,
    statistics: &StatisticsSummary,
    images: Vec<ReportImage>,
    config: &ReportConfig,
) -> ReportModel {
    assemble_at(table, statistics, images, config, Utc::now())
}

/// Same as [`assemble`] with an explicit generation time.
pub fn assemble_at(
    table: &LedgerTable,
    statistics: &StatisticsSummary,
    images: Vec<ReportImage>,
    config: &ReportConfig,
    generated_at: DateTime<Utc>,
) -> ReportModel {
    let places = config.decimal_places;
    let rows = statistics
        .columns
        .iter()
        .map(|summary| {
            let stats = &summary.statistics;
            StatisticsRow {
                column: summary.column.clone(),
                mean: format_decimal(stats.mean, places),
                median: format_decimal(stats.median, places),
                mode: stats
                    .mode
                    .map(|m| format_decimal(m, places))
                    .unwrap_or_else(|| NO_MODE.to_string()),
                std_dev: format_decimal(stats.std_dev, places),
            }
        })
        .collect();

    let period_range = table.periods().and_then(|labels| {
        let order = chronological_order(labels);
        let first = order.first()?;
        let last = order.last()?;
        Some((labels[*first].clone(), labels[*last].clone()))
    });

    debug!(
        "Assembled report '{}' with {} statistics row(s) and {} image(s)",
        config.title,
        statistics.len(),
        images.len()
    );

    ReportModel {
        title: config.title.clone(),
        generated_at,
        row_count: table.row_count(),
        period_range,
        collapsed_cells: table.collapsed_cells(),
        tables: vec![StatisticsTable {
            caption: STATISTICS_CAPTION.to_string(),
            rows,
        }],
        images,
        watermark: config.watermark.clone(),
    }
}

/// Writes a report model as a self-contained document.
///
/// Output must depend only on the model. The generation timestamp goes on a
/// line of its own so two renderings can be compared without it.
pub trait DocumentSink {
    fn mime_type(&self) -> &str;

    fn write(&self, report: &ReportModel) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlSink;

#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownSink;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSink;

impl DocumentSink for HtmlSink {
    fn mime_type(&self) -> &str {
        OutputFormat::Html.mime_type()
    }

    fn write(&self, report: &ReportModel) -> Result<Vec<u8>> {
        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n");
        html.push_str("<html lang=\"pt-BR\">\n<head>\n<meta charset=\"utf-8\">\n");
        html.push_str(&format!("<title>{}</title>\n", escape(&report.title)));
        html.push_str("</head>\n<body>\n");
        html.push_str(&format!("<h1>{}</h1>\n", escape(&report.title)));
        html.push_str(&format!(
            "<p class=\"generated\">{}</p>\n",
            escape(&report.timestamp_line())
        ));
        html.push_str(&format!(
            "<p>{}</p>\n",
            escape(&report.summary_line())
        ));
        if let Some(notice) = report.lossy_disclosure() {
            html.push_str(&format!(
                "<p class=\"notice\">{}</p>\n",
                escape(&notice)
            ));
        }

        for table in &report.tables {
            html.push_str(&format!("<h2>{}</h2>\n", escape(&table.caption)));
            html.push_str("<table>\n<tr>");
            for header in STATISTICS_HEADERS {
                html.push_str(&format!("<th>{}</th>", escape(header)));
            }
            html.push_str("</tr>\n");
            for row in &table.rows {
                html.push_str("<tr>");
                for cell in [&row.column, &row.mean, &row.median, &row.mode, &row.std_dev] {
                    html.push_str(&format!("<td>{}</td>", escape(cell)));
                }
                html.push_str("</tr>\n");
            }
            html.push_str("</table>\n");
        }

        for image in &report.images {
            html.push_str("<figure>\n");
            html.push_str(&format!(
                "<img src=\"{}\" alt=\"{}\">\n",
                image.image.data_uri(),
                escape(&image.caption)
            ));
            html.push_str(&format!(
                "<figcaption>{}</figcaption>\n",
                escape(&image.caption)
            ));
            html.push_str("</figure>\n");
        }

        html.push_str(&format!(
            "<footer>{}</footer>\n",
            escape(&report.watermark)
        ));
        html.push_str("</body>\n</html>\n");
        Ok(html.into_bytes())
    }
}

fn markdown_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

impl DocumentSink for MarkdownSink {
    fn mime_type(&self) -> &str {
        OutputFormat::Markdown.mime_type()
    }

    fn write(&self, report: &ReportModel) -> Result<Vec<u8>> {
        let mut md = String::new();
        md.push_str(&format!("# {}\n\n", report.title));
        md.push_str(&format!("_{}_\n\n", report.timestamp_line()));
        md.push_str(&format!("{}\n\n", report.summary_line()));
        if let Some(notice) = report.lossy_disclosure() {
            md.push_str(&format!("> {}\n\n", notice));
        }

        for table in &report.tables {
            md.push_str(&format!("## {}\n\n", table.caption));
            md.push_str(&format!("| {} |\n", STATISTICS_HEADERS.join(" | ")));
            md.push_str(&format!(
                "|{}\n",
                "---|".repeat(STATISTICS_HEADERS.len())
            ));
            for row in &table.rows {
                md.push_str(&format!(
                    "| {} | {} | {} | {} | {} |\n",
                    markdown_cell(&row.column),
                    row.mean,
                    row.median,
                    row.mode,
                    row.std_dev
                ));
            }
            md.push('\n');
        }

        for image in &report.images {
            md.push_str(&format!("## {}\n\n", image.caption));
            md.push_str(&format!(
                "![{}]({})\n\n",
                markdown_cell(&image.caption),
                image.image.data_uri()
            ));
        }

        md.push_str(&format!("---\n\n{}\n", report.watermark));
        Ok(md.into_bytes())
    }
}

impl DocumentSink for JsonSink {
    fn mime_type(&self) -> &str {
        OutputFormat::Json.mime_type()
    }

    fn write(&self, report: &ReportModel) -> Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(report)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

pub fn sink_for(format: OutputFormat) -> Box<dyn DocumentSink> {
    match format {
        OutputFormat::Html => Box::new(HtmlSink),
        OutputFormat::Markdown => Box::new(MarkdownSink),
        OutputFormat::Json => Box::new(JsonSink),
    }
}

pub fn serialize(report: &ReportModel, format: OutputFormat) -> Result<Vec<u8>> {
    let bytes = sink_for(format).write(report)?;
    debug!(
        "Serialized report as {} ({} bytes)",
        format.mime_type(),
        bytes.len()
    );
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{ColumnData, LedgerColumn};
    use crate::schema::CanonicalColumn;
    use crate::statistics::summarize;
    use chrono::TimeZone;

    fn table() -> LedgerTable {
        LedgerTable::new(
            vec![
                LedgerColumn {
                    name: "mês".to_string(),
                    canonical: Some(CanonicalColumn::Period),
                    data: ColumnData::Text(vec!["Janeiro".to_string(), "Fevereiro".to_string()]),
                },
                LedgerColumn {
                    name: "aporte".to_string(),
                    canonical: Some(CanonicalColumn::Contribution),
                    data: ColumnData::Numeric(vec![1000.0, 1500.0]),
                },
                LedgerColumn {
                    name: "saldo final".to_string(),
                    canonical: Some(CanonicalColumn::ClosingBalance),
                    data: ColumnData::Numeric(vec![1005.0, 2514.03]),
                },
            ],
            1,
        )
        .unwrap()
    }

    fn model_at(hour: u32) -> ReportModel {
        let table = table();
        let stats = summarize(&table, &["saldo final", "aporte"]).unwrap();
        let images = vec![ReportImage {
            caption: "Evolução do Saldo".to_string(),
            image: RenderedImage::new("image/svg+xml", b"<svg/>".to_vec()),
        }];
        let at = Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap();
        assemble_at(&table, &stats, images, &ReportConfig::default(), at)
    }

    fn without_timestamp(bytes: &[u8]) -> String {
        String::from_utf8(bytes.to_vec())
            .unwrap()
            .lines()
            .filter(|line| !line.contains(TIMESTAMP_LABEL) && !line.contains("generated_at"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_assemble_rounds_and_keeps_selection_order() {
        let model = model_at(9);
        let rows = &model.tables[0].rows;
        assert_eq!(model.tables[0].caption, STATISTICS_CAPTION);
        assert_eq!(rows[0].column, "saldo final");
        assert_eq!(rows[1].column, "aporte");
        assert_eq!(rows[1].mean, "1250.0000");
        assert_eq!(rows[1].mode, NO_MODE);
        assert_eq!(rows[1].std_dev, "353.5534");
        assert_eq!(
            model.period_range,
            Some(("Janeiro".to_string(), "Fevereiro".to_string()))
        );
        assert!(model.lossy_disclosure().is_some());
    }

    #[test]
    fn test_serialization_is_idempotent_apart_from_timestamp() {
        for format in [OutputFormat::Html, OutputFormat::Markdown, OutputFormat::Json] {
            let first = model_at(9);
            let second = model_at(17);

            let a = serialize(&first, format).unwrap();
            let b = serialize(&first, format).unwrap();
            assert_eq!(a, b, "{:?} output differs between calls", format);

            let c = serialize(&second, format).unwrap();
            assert_ne!(a, c);
            assert_eq!(without_timestamp(&a), without_timestamp(&c));
        }
    }

    #[test]
    fn test_html_is_self_contained() {
        let html = String::from_utf8(serialize(&model_at(9), OutputFormat::Html).unwrap()).unwrap();
        assert!(html.contains("data:image/svg+xml;base64,"));
        assert!(html.contains("Desvio Padrão"));
        assert!(html.contains("Data de Geração: 2024-03-01 09:00:00 UTC"));
        assert!(html.contains(crate::schema::DEFAULT_WATERMARK));
        assert!(!html.contains("src=\"http"));
    }

    #[test]
    fn test_html_escapes_user_text() {
        let mut model = model_at(9);
        model.title = "Carteira <A&B>".to_string();
        model.tables[0].rows[0].column = "<script>x</script>".to_string();
        let html = String::from_utf8(HtmlSink.write(&model).unwrap()).unwrap();
        assert!(html.contains("<h1>Carteira &lt;A&amp;B&gt;</h1>"));
        assert!(html.contains("<td>&lt;script&gt;x&lt;/script&gt;</td>"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_markdown_escapes_pipes() {
        let mut model = model_at(9);
        model.tables[0].rows[0].column = "a|b".to_string();
        let md = String::from_utf8(MarkdownSink.write(&model).unwrap()).unwrap();
        assert!(md.contains("| a\\|b |"));
        assert!(md.contains("| Coluna | Média | Mediana | Moda | Desvio Padrão |"));
    }

    #[test]
    fn test_json_round_trips() {
        let model = model_at(9);
        let bytes = JsonSink.write(&model).unwrap();
        let back: ReportModel = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, model);
    }
}
