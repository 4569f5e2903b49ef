use crate::error::{LedgerReportError, Result};
use crate::schema::{header_key, CanonicalColumn, IngestConfig};
use crate::utils::coerce_number;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use log::{debug, info};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Cursor;

/// Separator used when hierarchical header levels are collapsed into a
/// single column name.
pub const HEADER_LEVEL_SEPARATOR: &str = " / ";

const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];
const OLE_MAGIC: [u8; 4] = [0xD0, 0xCF, 0x11, 0xE0];

static EMPTY_CELL: RawCell = RawCell::Empty;

/// A cell exactly as the producing tool handed it over, before any coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Text(String),
    Number(f64),
    Empty,
    /// Some producers hand over several values for one cell.
    List(Vec<RawCell>),
    /// Booleans, spreadsheet error markers and other typed wrappers.
    Other(String),
}

impl RawCell {
    pub fn is_empty(&self) -> bool {
        match self {
            RawCell::Empty => true,
            RawCell::Text(s) => s.trim().is_empty(),
            RawCell::List(_) => self.first_scalar().is_empty(),
            _ => false,
        }
    }

    /// First scalar of a list cell; scalars return themselves.
    pub fn first_scalar(&self) -> &RawCell {
        match self {
            RawCell::List(items) => items
                .first()
                .map(RawCell::first_scalar)
                .unwrap_or(&EMPTY_CELL),
            other => other,
        }
    }

    /// True when reducing the cell to [`first_scalar`](Self::first_scalar)
    /// discards something, at any nesting depth.
    pub fn loses_values(&self) -> bool {
        match self {
            RawCell::List(items) => {
                items.len() > 1 || items.first().is_some_and(RawCell::loses_values)
            }
            _ => false,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self.first_scalar() {
            RawCell::Number(n) => Some(*n).filter(|v| v.is_finite()),
            RawCell::Text(s) => coerce_number(s),
            _ => None,
        }
    }

    /// Text used when a cell has to be quoted back to the user.
    pub fn display(&self) -> String {
        match self {
            RawCell::Text(s) | RawCell::Other(s) => s.clone(),
            RawCell::Number(n) => n.to_string(),
            RawCell::Empty => String::new(),
            RawCell::List(items) => format!(
                "[{}]",
                items
                    .iter()
                    .map(RawCell::display)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

impl From<&Data> for RawCell {
    fn from(cell: &Data) -> Self {
        match cell {
            Data::Empty => RawCell::Empty,
            Data::String(s) => RawCell::Text(s.clone()),
            Data::Float(n) => RawCell::Number(*n),
            Data::Int(n) => RawCell::Number(*n as f64),
            Data::Bool(b) => RawCell::Other(if *b { "TRUE" } else { "FALSE" }.to_string()),
            Data::Error(e) => RawCell::Other(format!("#{:?}", e)),
            Data::DateTime(dt) => match dt.as_datetime() {
                Some(datetime) => RawCell::Text(datetime.format("%Y-%m-%d").to_string()),
                None => RawCell::Number(dt.as_f64()),
            },
            Data::DateTimeIso(s) | Data::DurationIso(s) => RawCell::Text(s.clone()),
        }
    }
}

impl From<&Value> for RawCell {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => RawCell::Empty,
            Value::String(s) => RawCell::Text(s.clone()),
            Value::Number(n) => n
                .as_f64()
                .map(RawCell::Number)
                .unwrap_or_else(|| RawCell::Other(n.to_string())),
            Value::Bool(b) => RawCell::Other(b.to_string()),
            Value::Array(items) => RawCell::List(items.iter().map(RawCell::from).collect()),
            Value::Object(_) => RawCell::Other(value.to_string()),
        }
    }
}

/// Grid as read from the upload: one or more header rows followed by data rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    pub header_rows: Vec<Vec<String>>,
    pub rows: Vec<Vec<RawCell>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<RawCell>>) -> Self {
        Self {
            header_rows: vec![headers],
            rows,
        }
    }

    pub fn width(&self) -> usize {
        self.header_rows
            .iter()
            .map(Vec::len)
            .chain(self.rows.iter().map(Vec::len))
            .max()
            .unwrap_or(0)
    }

    pub fn cell(&self, row: usize, column: usize) -> &RawCell {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&EMPTY_CELL)
    }

    /// Splits a grid into `header_depth` header rows and data rows. Blank
    /// trailing rows are dropped.
    pub fn from_grid(grid: Vec<Vec<RawCell>>, header_depth: usize) -> Self {
        let mut grid = grid;
        while grid
            .last()
            .is_some_and(|row| row.iter().all(RawCell::is_empty))
        {
            grid.pop();
        }

        let split = header_depth.min(grid.len());
        let rows = grid.split_off(split);
        let header_rows = grid
            .into_iter()
            .map(|row| row.iter().map(RawCell::display).collect())
            .collect();

        Self { header_rows, rows }
    }

    /// Column names after collapsing header levels, trimming, naming blanks
    /// and de-duplicating.
    pub fn resolved_headers(&self) -> Vec<String> {
        let width = self.width();

        let mut levels: Vec<Vec<String>> = Vec::with_capacity(self.header_rows.len());
        let depth = self.header_rows.len();
        for (level_idx, level) in self.header_rows.iter().enumerate() {
            let mut filled = Vec::with_capacity(width);
            let mut carry = String::new();
            for col in 0..width {
                let name = level.get(col).map(|s| s.trim()).unwrap_or("").to_string();
                // Merged cells in upper levels only carry a value in their
                // first column.
                if name.is_empty() && level_idx + 1 < depth {
                    filled.push(carry.clone());
                } else {
                    carry = name.clone();
                    filled.push(name);
                }
            }
            levels.push(filled);
        }

        let mut headers: Vec<String> = (0..width)
            .map(|col| {
                let mut parts: Vec<&str> = Vec::new();
                for level in &levels {
                    let part = level[col].as_str();
                    if !part.is_empty() && parts.last() != Some(&part) {
                        parts.push(part);
                    }
                }
                if parts.is_empty() {
                    format!("coluna_{}", col + 1)
                } else {
                    parts.join(HEADER_LEVEL_SEPARATOR)
                }
            })
            .collect();

        let mut seen: BTreeMap<String, usize> = BTreeMap::new();
        for header in headers.iter_mut() {
            let count = seen.entry(header_key(header)).or_insert(0);
            if *count > 0 {
                *header = format!("{}.{}", header, count);
            }
            *count += 1;
        }

        headers
    }
}

/// Canonical column a resolved header stands for. Matches the whole collapsed
/// name first, then the innermost header level.
pub fn canonical_for_header(header: &str) -> Option<CanonicalColumn> {
    CanonicalColumn::from_header(header).or_else(|| {
        header
            .rsplit(HEADER_LEVEL_SEPARATOR)
            .next()
            .and_then(CanonicalColumn::from_header)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Spreadsheet,
    Csv,
    Json,
}

impl InputFormat {
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(&ZIP_MAGIC) || bytes.starts_with(&OLE_MAGIC) {
            return InputFormat::Spreadsheet;
        }
        let first = bytes
            .iter()
            .copied()
            .find(|b| !b.is_ascii_whitespace() && *b != 0xEF && *b != 0xBB && *b != 0xBF);
        match first {
            Some(b'[') => InputFormat::Json,
            _ => InputFormat::Csv,
        }
    }
}

pub fn read_raw_table(bytes: &[u8], config: &IngestConfig) -> Result<RawTable> {
    config.validate()?;
    let format = InputFormat::detect(bytes);
    debug!("Detected input format {:?} for {} bytes", format, bytes.len());

    let table = match format {
        InputFormat::Spreadsheet => read_spreadsheet(bytes, config)?,
        InputFormat::Csv => read_csv(bytes, config)?,
        InputFormat::Json => read_json(bytes)?,
    };

    info!(
        "Read raw table with {} header row(s), {} column(s) and {} data row(s)",
        table.header_rows.len(),
        table.width(),
        table.rows.len()
    );
    Ok(table)
}

pub fn read_spreadsheet(bytes: &[u8], config: &IngestConfig) -> Result<RawTable> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| LedgerReportError::Spreadsheet(format!("Failed to open workbook: {}", e)))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let sheet_name = match &config.sheet {
        Some(name) => sheet_names
            .iter()
            .find(|s| header_key(s) == header_key(name))
            .cloned()
            .ok_or_else(|| {
                LedgerReportError::Spreadsheet(format!("Sheet '{}' not found", name))
            })?,
        None => sheet_names.first().cloned().ok_or_else(|| {
            LedgerReportError::Spreadsheet("Workbook contains no sheets".to_string())
        })?,
    };

    let range = workbook.worksheet_range(&sheet_name).map_err(|e| {
        LedgerReportError::Spreadsheet(format!("Failed to read sheet '{}': {}", sheet_name, e))
    })?;

    let grid: Vec<Vec<RawCell>> = range
        .rows()
        .map(|row| row.iter().map(RawCell::from).collect())
        .collect();

    debug!("Sheet '{}' has {} grid rows", sheet_name, grid.len());
    Ok(RawTable::from_grid(grid, config.header_rows))
}

pub fn read_csv(bytes: &[u8], config: &IngestConfig) -> Result<RawTable> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(bytes);
    let delimiter = match config.csv_delimiter {
        Some(d) => d as u8,
        None => detect_delimiter(bytes),
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(bytes);

    let mut grid = Vec::new();
    for record in reader.records() {
        let record = record?;
        grid.push(
            record
                .iter()
                .map(|field| {
                    if field.trim().is_empty() {
                        RawCell::Empty
                    } else {
                        RawCell::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }

    Ok(RawTable::from_grid(grid, config.header_rows))
}

fn detect_delimiter(bytes: &[u8]) -> u8 {
    let header_line = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
    let semicolons = header_line.iter().filter(|b| **b == b';').count();
    let commas = header_line.iter().filter(|b| **b == b',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

/// Reads an array of JSON objects. Columns appear in first-seen key order.
pub fn read_json(bytes: &[u8]) -> Result<RawTable> {
    let records: Vec<serde_json::Map<String, Value>> = serde_json::from_slice(bytes)?;

    let mut headers: Vec<String> = Vec::new();
    for record in &records {
        for key in record.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let rows = records
        .iter()
        .map(|record| {
            headers
                .iter()
                .map(|h| record.get(h).map(RawCell::from).unwrap_or(RawCell::Empty))
                .collect()
        })
        .collect();

    Ok(RawTable::new(headers, rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> RawCell {
        RawCell::Text(s.to_string())
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(
            InputFormat::detect(&[0x50, 0x4B, 0x03, 0x04, 0x00]),
            InputFormat::Spreadsheet
        );
        assert_eq!(InputFormat::detect(b"  [{\"a\": 1}]"), InputFormat::Json);
        assert_eq!(InputFormat::detect(b"a,b\n1,2"), InputFormat::Csv);
    }

    #[test]
    fn test_resolved_headers_trim_blank_and_duplicates() {
        let table = RawTable::new(
            vec![
                " aporte ".to_string(),
                "".to_string(),
                "aporte".to_string(),
                "Aporte".to_string(),
            ],
            vec![],
        );
        assert_eq!(
            table.resolved_headers(),
            vec!["aporte", "coluna_2", "aporte.1", "Aporte.2"]
        );
    }

    #[test]
    fn test_resolved_headers_collapse_levels() {
        let table = RawTable {
            header_rows: vec![
                vec!["".into(), "Movimento".into(), "".into(), "Saldo".into()],
                vec!["mês".into(), "aporte".into(), "juros do mês".into(), "Saldo".into()],
            ],
            rows: vec![],
        };
        assert_eq!(
            table.resolved_headers(),
            vec![
                "mês",
                "Movimento / aporte",
                "Movimento / juros do mês",
                "Saldo"
            ]
        );
        assert_eq!(
            canonical_for_header("Movimento / aporte"),
            Some(CanonicalColumn::Contribution)
        );
    }

    #[test]
    fn test_read_csv_with_semicolons() {
        let csv = "mês;aporte\nJaneiro;1000\nFevereiro;\n\n";
        let table = read_csv(csv.as_bytes(), &IngestConfig::default()).unwrap();
        assert_eq!(table.resolved_headers(), vec!["mês", "aporte"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.cell(0, 1), &text("1000"));
        assert_eq!(table.cell(1, 1), &RawCell::Empty);
    }

    #[test]
    fn test_read_json_lists_and_missing_keys() {
        let json = r#"[
            {"mês": "Janeiro", "aporte": [1000, 2000]},
            {"mês": "Fevereiro", "extra": true}
        ]"#;
        let table = read_json(json.as_bytes()).unwrap();
        assert_eq!(table.resolved_headers(), vec!["mês", "aporte", "extra"]);
        assert_eq!(
            table.cell(0, 1),
            &RawCell::List(vec![RawCell::Number(1000.0), RawCell::Number(2000.0)])
        );
        assert_eq!(table.cell(1, 1), &RawCell::Empty);
        assert_eq!(table.cell(1, 2), &RawCell::Other("true".to_string()));
    }

    #[test]
    fn test_first_scalar_and_number() {
        let nested = RawCell::List(vec![
            RawCell::List(vec![text("12,5"), text("x")]),
            RawCell::Number(3.0),
        ]);
        assert_eq!(nested.first_scalar(), &text("12,5"));
        assert_eq!(nested.as_number(), Some(12.5));
        assert_eq!(RawCell::List(vec![]).first_scalar(), &RawCell::Empty);
        assert_eq!(RawCell::Other("TRUE".to_string()).as_number(), None);
    }

    #[test]
    fn test_loses_values_follows_first_element() {
        let wrapped = RawCell::List(vec![RawCell::List(vec![RawCell::Number(1000.0)])]);
        assert!(!wrapped.loses_values());
        assert!(!RawCell::List(vec![]).loses_values());
        assert!(!RawCell::Number(1.0).loses_values());

        let nested = RawCell::List(vec![RawCell::List(vec![
            RawCell::Number(1000.0),
            RawCell::Number(9999.0),
        ])]);
        assert!(nested.loses_values());
        assert_eq!(nested.as_number(), Some(1000.0));

        let wide = RawCell::List(vec![RawCell::Number(1.0), RawCell::Number(2.0)]);
        assert!(wide.loses_values());
    }

    #[test]
    fn test_from_grid_drops_trailing_blank_rows() {
        let grid = vec![
            vec![text("mês")],
            vec![text("Janeiro")],
            vec![RawCell::Empty],
        ];
        let table = RawTable::from_grid(grid, 1);
        assert_eq!(table.rows.len(), 1);
    }
}
