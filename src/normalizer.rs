use crate::error::{LedgerReportError, Result};
use crate::ingestion::{RawCell, RawTable};
use crate::ledger::{CellValue, ColumnData, LedgerColumn, LedgerTable};
use crate::schema::CanonicalColumn;
use crate::utils::coerce_number;
use crate::validation::locate_canonical_columns;
use log::{debug, info, warn};

/// Turns a raw grid into a ledger table whose numeric columns hold exactly one
/// finite number per row and whose period column is text.
///
/// List-valued cells keep their first element; the number of cells that lost
/// values this way is recorded on the table.
pub fn normalize(raw: &RawTable) -> Result<LedgerTable> {
    let headers = raw.resolved_headers();
    let canonical = locate_canonical_columns(&headers);
    let row_count = raw.rows.len();

    let mut columns = Vec::with_capacity(headers.len());
    let mut collapsed_cells = 0;

    for (idx, name) in headers.iter().enumerate() {
        let cells: Vec<&RawCell> = (0..row_count).map(|row| raw.cell(row, idx)).collect();

        if row_count > 0 && cells.iter().all(|c| c.is_empty()) {
            warn!("Dropping column '{}': every cell is empty", name);
            continue;
        }

        let lossy = cells
            .iter()
            .filter(|c| c.loses_values())
            .count();
        if lossy > 0 {
            warn!(
                "Column '{}': {} multi-valued cell(s) reduced to their first value",
                name, lossy
            );
            collapsed_cells += lossy;
        }

        let role = canonical
            .iter()
            .find(|(_, &col_idx)| col_idx == idx)
            .map(|(c, _)| *c);

        let data = match role {
            Some(CanonicalColumn::Period) => {
                ColumnData::Text(cells.iter().map(|c| cell_text(c)).collect())
            }
            Some(_) => ColumnData::Numeric(strict_numbers(name, &cells)?),
            None => classify_extra_column(&cells),
        };

        debug!(
            "Column '{}' normalized as {}",
            name,
            if matches!(data, ColumnData::Numeric(_)) {
                "numeric"
            } else {
                "text"
            }
        );

        columns.push(LedgerColumn {
            name: name.clone(),
            canonical: role,
            data,
        });
    }

    let table = LedgerTable::new(columns, collapsed_cells)?;
    info!(
        "Normalized ledger: {} row(s), {} column(s), {} numeric",
        table.row_count(),
        table.columns().len(),
        table.numeric_columns().len()
    );
    Ok(table)
}

/// Tags a raw cell with what it holds after list collapse and numeric coercion.
pub fn to_cell_value(cell: &RawCell) -> CellValue {
    match cell.first_scalar() {
        RawCell::Empty => CellValue::Empty,
        RawCell::Number(n) if n.is_finite() => CellValue::Number(*n),
        RawCell::Number(n) => CellValue::Malformed(n.to_string()),
        RawCell::Text(s) if s.trim().is_empty() => CellValue::Empty,
        RawCell::Text(s) => match coerce_number(s) {
            Some(n) => CellValue::Number(n),
            None => CellValue::Malformed(s.clone()),
        },
        RawCell::Other(s) => CellValue::Malformed(s.clone()),
        RawCell::List(_) => CellValue::Empty,
    }
}

fn strict_numbers(column: &str, cells: &[&RawCell]) -> Result<Vec<f64>> {
    cells
        .iter()
        .enumerate()
        .map(|(row, cell)| match to_cell_value(cell) {
            CellValue::Number(n) => Ok(n),
            _ => Err(LedgerReportError::Normalization {
                column: column.to_string(),
                row: row + 1,
                raw: cell.display(),
            }),
        })
        .collect()
}

fn classify_extra_column(cells: &[&RawCell]) -> ColumnData {
    let numbers: Option<Vec<f64>> = cells
        .iter()
        .map(|cell| match to_cell_value(cell) {
            CellValue::Number(n) => Some(n),
            _ => None,
        })
        .collect();

    match numbers {
        Some(values) if !values.is_empty() => ColumnData::Numeric(values),
        _ => ColumnData::Text(cells.iter().map(|c| cell_text(c)).collect()),
    }
}

fn cell_text(cell: &RawCell) -> String {
    match cell.first_scalar() {
        RawCell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
        other => other.display().trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> Vec<String> {
        CanonicalColumn::ALL
            .iter()
            .map(|c| c.header().to_string())
            .collect()
    }

    fn row(period: RawCell, values: [f64; 5]) -> Vec<RawCell> {
        let mut cells = vec![period];
        cells.extend(values.iter().map(|v| RawCell::Number(*v)));
        cells
    }

    #[test]
    fn test_normalize_basic_ledger() {
        let raw = RawTable::new(
            headers(),
            vec![
                row(
                    RawCell::Text(" Janeiro ".to_string()),
                    [1000.0, 0.005, 0.0, 5.0, 1005.0],
                ),
                row(
                    RawCell::Text("Fevereiro".to_string()),
                    [1500.0, 0.006, 1005.0, 9.03, 2514.03],
                ),
            ],
        );
        let table = normalize(&raw).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(
            table.periods().unwrap(),
            &["Janeiro".to_string(), "Fevereiro".to_string()]
        );
        assert_eq!(
            table.canonical_numbers(CanonicalColumn::ClosingBalance).unwrap(),
            &[1005.0, 2514.03]
        );
        assert_eq!(table.numeric_columns().len(), 5);
        assert_eq!(table.collapsed_cells(), 0);
    }

    #[test]
    fn test_numeric_period_becomes_text() {
        let raw = RawTable::new(
            headers(),
            vec![row(RawCell::Number(202401.0), [1.0, 0.1, 0.0, 0.1, 1.1])],
        );
        let table = normalize(&raw).unwrap();
        assert_eq!(table.periods().unwrap(), &["202401".to_string()]);
        assert!(!table.column("mês").unwrap().is_numeric());
    }

    #[test]
    fn test_list_cells_take_first_element() {
        let mut cells = row(
            RawCell::List(vec![
                RawCell::Text("Janeiro".to_string()),
                RawCell::Text("Fevereiro".to_string()),
            ]),
            [0.0, 0.005, 0.0, 5.0, 1005.0],
        );
        cells[1] = RawCell::List(vec![RawCell::Number(1000.0), RawCell::Number(2000.0)]);
        cells[2] = RawCell::List(vec![RawCell::Text("0,005".to_string())]);
        let table = normalize(&RawTable::new(headers(), vec![cells])).unwrap();

        assert_eq!(table.periods().unwrap(), &["Janeiro".to_string()]);
        assert_eq!(
            table.canonical_numbers(CanonicalColumn::Contribution).unwrap(),
            &[1000.0]
        );
        assert_eq!(
            table.canonical_numbers(CanonicalColumn::InterestRate).unwrap(),
            &[0.005]
        );
        // The single-element list lost nothing.
        assert_eq!(table.collapsed_cells(), 2);
    }

    #[test]
    fn test_nested_list_cells_are_counted() {
        let mut cells = row(RawCell::Text("Janeiro".to_string()), [0.0, 0.005, 0.0, 5.0, 1005.0]);
        cells[1] = RawCell::List(vec![RawCell::List(vec![
            RawCell::Number(1000.0),
            RawCell::Number(9999.0),
        ])]);
        cells[2] = RawCell::List(vec![RawCell::List(vec![RawCell::Number(0.005)])]);
        let table = normalize(&RawTable::new(headers(), vec![cells])).unwrap();

        assert_eq!(
            table.canonical_numbers(CanonicalColumn::Contribution).unwrap(),
            &[1000.0]
        );
        assert_eq!(table.collapsed_cells(), 1);
    }

    #[test]
    fn test_malformed_numeric_cell_fails_with_location() {
        let mut cells = row(
            RawCell::Text("Janeiro".to_string()),
            [1000.0, 0.005, 0.0, 5.0, 1005.0],
        );
        cells[4] = RawCell::Other("TRUE".to_string());
        let ok = row(
            RawCell::Text("Fevereiro".to_string()),
            [1000.0, 0.005, 0.0, 5.0, 1005.0],
        );
        let err = normalize(&RawTable::new(headers(), vec![ok, cells])).unwrap_err();
        match err {
            LedgerReportError::Normalization { column, row, raw } => {
                assert_eq!(column, "juros do mês");
                assert_eq!(row, 2);
                assert_eq!(raw, "TRUE");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_empty_numeric_cell_is_not_zero_filled() {
        let mut cells = row(
            RawCell::Text("Janeiro".to_string()),
            [1000.0, 0.005, 0.0, 5.0, 1005.0],
        );
        cells[5] = RawCell::Empty;
        let ok = row(
            RawCell::Text("Fevereiro".to_string()),
            [1000.0, 0.005, 0.0, 5.0, 1005.0],
        );
        let result = normalize(&RawTable::new(headers(), vec![ok, cells]));
        assert!(matches!(
            result,
            Err(LedgerReportError::Normalization { row: 2, .. })
        ));
    }

    #[test]
    fn test_extra_columns_and_empty_columns() {
        let mut names = headers();
        names.push("observação".to_string());
        names.push("bônus".to_string());
        names.push("".to_string());

        let mut first = row(
            RawCell::Text("Janeiro".to_string()),
            [1000.0, 0.005, 0.0, 5.0, 1005.0],
        );
        first.extend([
            RawCell::Text("primeiro aporte".to_string()),
            RawCell::Text("10".to_string()),
            RawCell::Empty,
        ]);
        let mut second = row(
            RawCell::Text("Fevereiro".to_string()),
            [1500.0, 0.006, 1005.0, 9.03, 2514.03],
        );
        second.extend([RawCell::Empty, RawCell::Number(20.0), RawCell::Empty]);

        let table = normalize(&RawTable::new(names, vec![first, second])).unwrap();
        assert_eq!(table.columns().len(), 8);
        assert!(table.column("coluna_9").is_none());
        assert!(!table.column("observação").unwrap().is_numeric());
        assert_eq!(
            table.column("bônus").unwrap().numbers().unwrap(),
            &[10.0, 20.0]
        );
        assert!(table.numeric_columns().contains(&"bônus"));
    }

    #[test]
    fn test_to_cell_value() {
        assert_eq!(
            to_cell_value(&RawCell::Text("abc".into())),
            CellValue::Malformed("abc".into())
        );
        assert_eq!(to_cell_value(&RawCell::Text(" ".into())), CellValue::Empty);
        assert_eq!(
            to_cell_value(&RawCell::Text("2,5".into())),
            CellValue::Number(2.5)
        );
        assert_eq!(to_cell_value(&RawCell::List(vec![])), CellValue::Empty);
    }
}
