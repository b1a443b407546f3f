use thiserror::Error;

/// File read / write failures. Surfaced at the upload step; never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IoError {
    /// Extension is not one of the flat or multi-sheet formats.
    #[error("unsupported file type '{name}' (expected .csv, .tsv, .txt, .xlsx, .xlsm, .xls, .xlsb or .ods)")]
    UnsupportedFormat { name: String },

    /// File could not be parsed.
    #[error("cannot read '{name}': {message}")]
    Corrupt { name: String, message: String },

    /// File parsed but holds no header row.
    #[error("'{name}' is empty (no header row)")]
    Empty { name: String },

    /// Requested sheet is not part of the workbook.
    #[error("sheet '{sheet}' not found in '{name}'")]
    SheetNotFound { name: String, sheet: String },

    /// Export failure.
    #[error("cannot write {target}: {message}")]
    Write { target: String, message: String },
}
