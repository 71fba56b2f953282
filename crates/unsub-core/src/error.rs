//! Error types for unsub

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Could not read PDF structure: {0}")]
    PdfStructure(String),

    #[error("The document looks like a scanned image, not a text statement: {0}")]
    ScannedDocument(String),

    #[error("No transactions found: {0}")]
    NoTransactions(String),

    #[error("Validator error: {0}")]
    Validation(String),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl Error {
    /// Short stable category code, suitable for API clients that switch on
    /// error kinds without parsing the human-readable message.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "invalid_input",
            Error::PdfStructure(_) => "pdf_unreadable",
            Error::ScannedDocument(_) => "pdf_scanned",
            Error::NoTransactions(_) => "no_transactions",
            Error::Validation(_) => "validation_failed",
            Error::Csv(_) => "csv_error",
            Error::Io(_) => "io_error",
            Error::Http(_) => "http_error",
            Error::Json(_) => "json_error",
            Error::Regex(_) => "internal_error",
        }
    }

    /// Whether the caller can fix this by retrying with corrected input.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::InvalidInput(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
