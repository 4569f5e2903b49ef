use crate::error::SchemaError;
use crate::ingestion::{canonical_for_header, RawTable};
use crate::schema::CanonicalColumn;
use log::debug;
use std::collections::BTreeMap;

/// Headers of a raw table that passed the structural checks, with the
/// position of every canonical column.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedHeaders {
    pub headers: Vec<String>,
    pub canonical: BTreeMap<CanonicalColumn, usize>,
}

impl ValidatedHeaders {
    pub fn index_of(&self, column: CanonicalColumn) -> Option<usize> {
        self.canonical.get(&column).copied()
    }
}

/// Maps each canonical column to the first resolved header that matches it.
pub fn locate_canonical_columns(headers: &[String]) -> BTreeMap<CanonicalColumn, usize> {
    let mut found = BTreeMap::new();
    for (idx, header) in headers.iter().enumerate() {
        if let Some(canonical) = canonical_for_header(header) {
            found.entry(canonical).or_insert(idx);
        }
    }
    found
}

/// Structural check of an uploaded ledger. Does not modify the input.
///
/// Checks run in a fixed order so the first reported problem is stable:
/// empty file, missing columns, non-numeric columns, then incomplete rows.
/// Row numbers in errors are 1-based data rows.
pub fn validate(raw: &RawTable) -> Result<ValidatedHeaders, SchemaError> {
    if raw.rows.is_empty() {
        return Err(SchemaError::EmptyFile);
    }

    let headers = raw.resolved_headers();
    let canonical = locate_canonical_columns(&headers);

    let missing: Vec<String> = CanonicalColumn::ALL
        .iter()
        .filter(|c| !canonical.contains_key(*c))
        .map(|c| c.header().to_string())
        .collect();
    if !missing.is_empty() {
        return Err(SchemaError::MissingColumns(missing));
    }

    for column in CanonicalColumn::ALL.iter().filter(|c| c.is_numeric()) {
        let idx = canonical[column];
        let bad_row = (0..raw.rows.len()).find(|&row| {
            let cell = raw.cell(row, idx);
            !cell.is_empty() && cell.as_number().is_none()
        });
        if let Some(row) = bad_row {
            debug!(
                "Column '{}' has a non-numeric value at row {}: {:?}",
                column.header(),
                row + 1,
                raw.cell(row, idx)
            );
            return Err(SchemaError::NonNumericColumn(column.header().to_string()));
        }
    }

    for row in 0..raw.rows.len() {
        let incomplete = CanonicalColumn::ALL
            .iter()
            .any(|c| raw.cell(row, canonical[c]).is_empty());
        if incomplete {
            return Err(SchemaError::IncompleteRow(row + 1));
        }
    }

    Ok(ValidatedHeaders { headers, canonical })
}
