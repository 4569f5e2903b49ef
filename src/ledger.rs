use crate::error::{LedgerReportError, Result};
use crate::ingestion::canonical_for_header;
use crate::schema::{header_key, CanonicalColumn};
use serde::{Deserialize, Serialize};

/// A cell as seen by the normalizer. `Malformed` only exists transiently;
/// a normalized table never holds it, nor `Empty` in a numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Empty,
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    Text(Vec<String>),
    Numeric(Vec<f64>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Text(values) => values.len(),
            ColumnData::Numeric(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerColumn {
    pub name: String,
    pub canonical: Option<CanonicalColumn>,
    pub data: ColumnData,
}

impl LedgerColumn {
    pub fn is_numeric(&self) -> bool {
        matches!(self.data, ColumnData::Numeric(_))
    }

    pub fn numbers(&self) -> Option<&[f64]> {
        match &self.data {
            ColumnData::Numeric(values) => Some(values),
            ColumnData::Text(_) => None,
        }
    }

    pub fn texts(&self) -> Option<&[String]> {
        match &self.data {
            ColumnData::Text(values) => Some(values),
            ColumnData::Numeric(_) => None,
        }
    }
}

/// Normalized ledger, stored column by column so each column is homogeneous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerTable {
    columns: Vec<LedgerColumn>,
    row_count: usize,
    collapsed_cells: usize,
}

impl LedgerTable {
    pub fn new(columns: Vec<LedgerColumn>, collapsed_cells: usize) -> Result<Self> {
        let row_count = columns.first().map(|c| c.data.len()).unwrap_or(0);
        if let Some(column) = columns.iter().find(|c| c.data.len() != row_count) {
            return Err(LedgerReportError::InvalidTable(format!(
                "column '{}' has {} values but the table has {} rows",
                column.name,
                column.data.len(),
                row_count
            )));
        }

        Ok(Self {
            columns,
            row_count,
            collapsed_cells,
        })
    }

    pub fn columns(&self) -> &[LedgerColumn] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Number of list-valued cells that were reduced to their first element.
    pub fn collapsed_cells(&self) -> usize {
        self.collapsed_cells
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Columns a caller may select for statistics, in table order.
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_numeric())
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Looks a column up by its header (case/whitespace insensitive) or by the
    /// English id of a canonical column.
    pub fn column(&self, name: &str) -> Option<&LedgerColumn> {
        let key = header_key(name);
        self.columns
            .iter()
            .find(|c| header_key(&c.name) == key)
            .or_else(|| {
                let canonical = canonical_for_header(name)?;
                self.canonical(canonical)
            })
    }

    pub fn canonical(&self, canonical: CanonicalColumn) -> Option<&LedgerColumn> {
        self.columns
            .iter()
            .find(|c| c.canonical == Some(canonical))
    }

    pub fn canonical_numbers(&self, canonical: CanonicalColumn) -> Option<&[f64]> {
        self.canonical(canonical).and_then(LedgerColumn::numbers)
    }

    pub fn periods(&self) -> Option<&[String]> {
        self.canonical(CanonicalColumn::Period)
            .and_then(LedgerColumn::texts)
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<CellValue> {
        let column = self.column(column)?;
        match &column.data {
            ColumnData::Text(values) => values.get(row).map(|v| CellValue::Text(v.clone())),
            ColumnData::Numeric(values) => values.get(row).map(|v| CellValue::Number(*v)),
        }
    }

    /// One row as (column name, value) pairs in column order.
    pub fn row(&self, row: usize) -> Option<Vec<(&str, CellValue)>> {
        if row >= self.row_count {
            return None;
        }
        Some(
            self.columns
                .iter()
                .map(|c| {
                    let value = match &c.data {
                        ColumnData::Text(values) => CellValue::Text(values[row].clone()),
                        ColumnData::Numeric(values) => CellValue::Number(values[row]),
                    };
                    (c.name.as_str(), value)
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> LedgerTable {
        LedgerTable::new(
            vec![
                LedgerColumn {
                    name: "mês".to_string(),
                    canonical: Some(CanonicalColumn::Period),
                    data: ColumnData::Text(vec!["Janeiro".to_string(), "Fevereiro".to_string()]),
                },
                LedgerColumn {
                    name: "saldo final".to_string(),
                    canonical: Some(CanonicalColumn::ClosingBalance),
                    data: ColumnData::Numeric(vec![1005.0, 2514.03]),
                },
                LedgerColumn {
                    name: "nota".to_string(),
                    canonical: None,
                    data: ColumnData::Text(vec!["a".to_string(), "b".to_string()]),
                },
            ],
            0,
        )
        .unwrap()
    }

    #[test]
    fn test_column_lookup_by_header_and_alias() {
        let table = sample_table();
        assert_eq!(table.column("SALDO FINAL").unwrap().name, "saldo final");
        assert_eq!(table.column("closing_balance").unwrap().name, "saldo final");
        assert!(table.column("aporte").is_none());
        assert_eq!(table.numeric_columns(), vec!["saldo final"]);
    }

    #[test]
    fn test_row_view() {
        let table = sample_table();
        let row = table.row(1).unwrap();
        assert_eq!(row[0], ("mês", CellValue::Text("Fevereiro".to_string())));
        assert_eq!(row[1], ("saldo final", CellValue::Number(2514.03)));
        assert!(table.row(2).is_none());
        assert_eq!(
            table.cell(0, "saldo final"),
            Some(CellValue::Number(1005.0))
        );
    }

    #[test]
    fn test_ragged_columns_rejected() {
        let result = LedgerTable::new(
            vec![
                LedgerColumn {
                    name: "a".to_string(),
                    canonical: None,
                    data: ColumnData::Numeric(vec![1.0]),
                },
                LedgerColumn {
                    name: "b".to_string(),
                    canonical: None,
                    data: ColumnData::Numeric(vec![1.0, 2.0]),
                },
            ],
            0,
        );
        assert!(result.is_err());
    }
}
