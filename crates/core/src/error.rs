//! Error types for the booking dashboard pipeline.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while ingesting, exporting or reopening a dataset.
///
/// Malformed cell values never produce an error; they fall back to defaults
/// during normalization.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to open or read the input file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// The file format is not supported or could not be detected.
    #[error("Unsupported or unrecognized file format: {0}")]
    UnsupportedFormat(String),

    /// Failed to parse the XLSX workbook structure.
    #[error("XLSX parsing error: {0}")]
    XlsxParseError(String),

    /// ZIP archive error (for XLSX).
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing error (for XLSX).
    #[error("XML parsing error: {0}")]
    XmlError(String),

    /// JSON records could not be read or written.
    #[error("JSON error: {0}")]
    JsonError(String),

    /// The document does not carry an embedded client report payload.
    #[error("Invalid client report: {0}")]
    InvalidReport(String),

    /// The client report was written by a newer format version.
    #[error("Unsupported client report version {found} (supported up to {supported})")]
    UnsupportedReportVersion { found: u32, supported: u32 },

    /// Export was requested from a session opened from a client report.
    #[error("Export is disabled for sessions opened from a client report")]
    ExportDisabled,

    /// Ingestion was requested from a session opened from a client report.
    #[error("Uploading is disabled for sessions opened from a client report")]
    IngestionDisabled,
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::JsonError(err.to_string())
    }
}
