use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrialBalanceError {
    #[error("Unsupported file type '{mime_type}' for file '{file_name}'")]
    UnsupportedFormat { mime_type: String, file_name: String },

    #[error("File is empty: {0}")]
    EmptyFile(String),

    #[error("No usable data rows found in {0}")]
    NoDataRows(String),

    #[error("Workbook error: {0}")]
    WorkbookError(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Invalid KPI definition '{code}': {details}")]
    InvalidKpiDefinition { code: String, details: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TrialBalanceError>;
