use crate::error::{LedgerReportError, Result};
use crate::schema::CanonicalColumn;
use log::debug;
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, XlsxError};

pub const BLUEPRINT_SHEET: &str = "Dados";
pub const BLUEPRINT_FILE_NAME: &str = "modelo_ledger.xlsx";
pub const XLSX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// One example row of the template: period label then the five numeric
/// columns in canonical order.
pub struct BlueprintRow {
    pub period: &'static str,
    pub values: [f64; 5],
}

pub const BLUEPRINT_ROWS: [BlueprintRow; 3] = [
    BlueprintRow {
        period: "Janeiro",
        values: [1000.0, 0.005, 0.0, 5.0, 1005.0],
    },
    BlueprintRow {
        period: "Fevereiro",
        values: [1500.0, 0.006, 1005.0, 8.03, 2513.03],
    },
    BlueprintRow {
        period: "Março",
        values: [2000.0, 0.0055, 2513.03, 14.12, 4527.15],
    },
];

fn xlsx_error(err: XlsxError) -> LedgerReportError {
    LedgerReportError::Spreadsheet(format!("Failed to write blueprint: {err}"))
}

/// Example spreadsheet that shows callers the expected ledger layout.
pub fn create_blueprint() -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header = Format::new()
        .set_bold()
        .set_align(FormatAlign::Center)
        .set_border(FormatBorder::Thin);

    let sheet = workbook.add_worksheet();
    sheet.set_name(BLUEPRINT_SHEET).map_err(xlsx_error)?;

    for (col, column) in CanonicalColumn::ALL.iter().enumerate() {
        sheet
            .write_with_format(0, col as u16, column.header(), &header)
            .map_err(xlsx_error)?;
        sheet.set_column_width(col as u16, 16).map_err(xlsx_error)?;
    }

    for (idx, row) in BLUEPRINT_ROWS.iter().enumerate() {
        let sheet_row = idx as u32 + 1;
        sheet
            .write_string(sheet_row, 0, row.period)
            .map_err(xlsx_error)?;
        for (offset, value) in row.values.iter().enumerate() {
            sheet
                .write_number(sheet_row, offset as u16 + 1, *value)
                .map_err(xlsx_error)?;
        }
    }

    let buffer = workbook.save_to_buffer().map_err(xlsx_error)?;
    debug!(
        "Created blueprint workbook with {} example rows ({} bytes)",
        BLUEPRINT_ROWS.len(),
        buffer.len()
    );
    Ok(buffer)
}
