use thiserror::Error;

/// Structural problems with an uploaded ledger. Terminal for that input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("The file has no data rows")]
    EmptyFile,

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Column '{0}' must be numeric")]
    NonNumericColumn(String),

    #[error("Row {0} has missing required values")]
    IncompleteRow(usize),
}

#[derive(Error, Debug)]
pub enum LedgerReportError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Cannot coerce value '{raw}' in column '{column}' at row {row} to a number")]
    Normalization {
        column: String,
        row: usize,
        raw: String,
    },

    #[error("No columns selected for analysis")]
    EmptySelection,

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Column '{0}' is not numeric and cannot be summarized")]
    NonNumericSelection(String),

    #[error("Column '{0}' has no values")]
    EmptyColumn(String),

    #[error("Inconsistent ledger table: {0}")]
    InvalidTable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Chart rendering failed: {0}")]
    Render(String),

    #[error("Worker failed: {0}")]
    Worker(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl LedgerReportError {
    /// Only an empty column selection can be fixed by the caller without
    /// uploading a different file.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::EmptySelection)
    }

    /// Message shown to the person who uploaded the ledger.
    pub fn user_message(&self) -> String {
        match self {
            Self::Schema(SchemaError::EmptyFile) => {
                "Erro: o arquivo não contém linhas de dados.".to_string()
            }
            Self::Schema(SchemaError::MissingColumns(names)) => {
                format!("Erro: Colunas faltando: {}", names.join(", "))
            }
            Self::Schema(SchemaError::NonNumericColumn(name)) => {
                format!("Erro: A coluna '{}' deve ser numérica.", name)
            }
            Self::Schema(SchemaError::IncompleteRow(row)) => {
                format!("Erro: Existem dados faltando na linha {}.", row)
            }
            Self::Normalization { column, row, raw } => format!(
                "Erro: valor inválido '{}' na coluna '{}', linha {}.",
                raw, column, row
            ),
            Self::EmptySelection => "Selecione colunas para análise.".to_string(),
            Self::UnknownColumn(name) => format!("Erro: a coluna '{}' não existe.", name),
            Self::NonNumericSelection(name) => {
                format!("Erro: a coluna '{}' não é numérica.", name)
            }
            other => format!(
                "Erro inesperado: {}. Por favor, verifique o arquivo e tente novamente.",
                other
            ),
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerReportError>;
