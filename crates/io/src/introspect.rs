//! Spreadsheet introspection: discover sheets and header columns of an upload.
//!
//! [`inspect`] never fails. Anything that goes wrong while reading is folded
//! into the error sentinel descriptor so a caller can keep its session alive
//! and ask the user to re-upload.

use serde::Serialize;

use crate::error::IoError;
use crate::handle::{FileFormat, SpreadsheetHandle};
use crate::table::Table;
use crate::{csv, xlsx};

/// First entry of every column list: "no binding yet".
pub const UNSELECTED: &str = "(unselected)";

/// Sheet name used for flat formats, which have exactly one implicit sheet.
pub const SINGLE_SHEET: &str = "Single Sheet";

/// Sheet and column entry of a descriptor whose file could not be read.
pub const ERROR_SENTINEL: &str = "(error)";

/// Sheets and header columns discovered in one upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inspection {
    pub file_name: String,
    pub format: Option<FileFormat>,
    pub sheets: Vec<String>,
    /// Sheet whose header produced `columns`.
    pub active_sheet: String,
    /// Header cells prefixed with [`UNSELECTED`].
    pub columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Inspection {
    /// The "not ready" descriptor for a file that could not be read.
    pub fn sentinel(file_name: &str, format: Option<FileFormat>, error: &IoError) -> Self {
        Self {
            file_name: file_name.to_string(),
            format,
            sheets: vec![ERROR_SENTINEL.to_string()],
            active_sheet: ERROR_SENTINEL.to_string(),
            columns: vec![ERROR_SENTINEL.to_string()],
            error: Some(error.to_string()),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.error.is_none()
    }

    /// Header columns without the sentinel.
    pub fn header(&self) -> &[String] {
        if self.is_ready() {
            &self.columns[1..]
        } else {
            &[]
        }
    }
}

/// Inspect raw upload bytes. The declared name only decides the format.
pub fn inspect(file_bytes: &[u8], declared_name: &str) -> Inspection {
    match SpreadsheetHandle::new(declared_name, file_bytes.to_vec()) {
        Ok(handle) => inspect_handle(&handle),
        Err(e) => {
            tracing::warn!(file = declared_name, error = %e, "upload rejected");
            Inspection::sentinel(declared_name, None, &e)
        }
    }
}

/// Inspect an existing handle: list sheets and read the first sheet's header.
pub fn inspect_handle(handle: &SpreadsheetHandle) -> Inspection {
    match try_inspect(handle) {
        Ok(inspection) => {
            tracing::debug!(
                file = handle.name(),
                id = %handle.id().short(),
                sheets = inspection.sheets.len(),
                columns = inspection.columns.len() - 1,
                "inspected upload"
            );
            inspection
        }
        Err(e) => {
            tracing::warn!(file = handle.name(), error = %e, "cannot inspect upload");
            Inspection::sentinel(handle.name(), Some(handle.format()), &e)
        }
    }
}

fn try_inspect(handle: &SpreadsheetHandle) -> Result<Inspection, IoError> {
    let (sheets, header) = match handle.format() {
        FileFormat::Flat => (vec![SINGLE_SHEET.to_string()], csv::read_header(handle)?),
        FileFormat::MultiSheet => {
            let sheets = xlsx::sheet_names(handle)?;
            let header = xlsx::read_header(handle, &sheets[0])?;
            (sheets, header)
        }
    };

    Ok(Inspection {
        file_name: handle.name().to_string(),
        format: Some(handle.format()),
        active_sheet: sheets[0].clone(),
        sheets,
        columns: with_sentinel(header),
        error: None,
    })
}

/// Re-read one sheet's header row, sentinel prefixed. Not cached; header
/// reads are cheap.
pub fn read_sheet_columns(handle: &SpreadsheetHandle, sheet: &str) -> Result<Vec<String>, IoError> {
    let header = match handle.format() {
        FileFormat::Flat => {
            if sheet != SINGLE_SHEET {
                return Err(IoError::SheetNotFound {
                    name: handle.name().to_string(),
                    sheet: sheet.to_string(),
                });
            }
            csv::read_header(handle)?
        }
        FileFormat::MultiSheet => xlsx::read_header(handle, sheet)?,
    };
    Ok(with_sentinel(header))
}

/// Load a full sheet for reconciliation.
pub fn load_table(handle: &SpreadsheetHandle, sheet: &str) -> Result<Table, IoError> {
    match handle.format() {
        FileFormat::Flat => {
            if sheet != SINGLE_SHEET {
                return Err(IoError::SheetNotFound {
                    name: handle.name().to_string(),
                    sheet: sheet.to_string(),
                });
            }
            csv::read_table(handle)
        }
        FileFormat::MultiSheet => xlsx::read_table(handle, sheet),
    }
}

fn with_sentinel(header: Vec<String>) -> Vec<String> {
    let mut columns = Vec::with_capacity(header.len() + 1);
    columns.push(UNSELECTED.to_string());
    columns.extend(header);
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xlsx::{write_workbook, SheetOut};

    #[test]
    fn flat_file_has_single_sentinel_sheet() {
        let ins = inspect(b"Order ID,Invoice Amount,State\nS1,1000,MH\n", "sales.csv");
        assert!(ins.is_ready());
        assert_eq!(ins.sheets, vec![SINGLE_SHEET]);
        assert_eq!(ins.active_sheet, SINGLE_SHEET);
        assert_eq!(ins.columns, vec![UNSELECTED, "Order ID", "Invoice Amount", "State"]);
        assert_eq!(ins.header(), &["Order ID", "Invoice Amount", "State"]);
    }

    #[test]
    fn multi_sheet_lists_all_and_reads_first_header() {
        let orders = Table {
            headers: vec!["Order ID".into(), "Amount".into()],
            rows: vec![],
        };
        let fees = Table {
            headers: vec!["Fee Type".into()],
            rows: vec![],
        };
        let bytes = write_workbook(&[
            SheetOut { name: "Orders", table: &orders },
            SheetOut { name: "Fees", table: &fees },
        ])
        .unwrap();

        let ins = inspect(&bytes, "settlement.xlsx");
        assert!(ins.is_ready(), "{:?}", ins.error);
        assert_eq!(ins.sheets, vec!["Orders", "Fees"]);
        assert_eq!(ins.active_sheet, "Orders");
        assert_eq!(ins.columns, vec![UNSELECTED, "Order ID", "Amount"]);

        let handle = SpreadsheetHandle::new("settlement.xlsx", bytes).unwrap();
        assert_eq!(read_sheet_columns(&handle, "Fees").unwrap(), vec![UNSELECTED, "Fee Type"]);
    }

    #[test]
    fn corrupt_file_yields_error_sentinel() {
        let ins = inspect(b"\x00\x01garbage", "payments.xlsx");
        assert!(!ins.is_ready());
        assert_eq!(ins.sheets, vec![ERROR_SENTINEL]);
        assert_eq!(ins.columns, vec![ERROR_SENTINEL]);
        assert!(ins.error.as_deref().unwrap().contains("payments.xlsx"));
        assert!(ins.header().is_empty());
    }

    #[test]
    fn unsupported_extension_yields_error_sentinel() {
        let ins = inspect(b"%PDF-1.4", "statement.pdf");
        assert!(!ins.is_ready());
        assert_eq!(ins.format, None);
        assert!(ins.error.as_deref().unwrap().contains("unsupported"));
    }

    #[test]
    fn empty_flat_file_yields_error_sentinel() {
        let ins = inspect(b"", "sales.csv");
        assert!(!ins.is_ready());
        assert_eq!(ins.columns, vec![ERROR_SENTINEL]);
    }

    #[test]
    fn flat_file_rejects_other_sheet_names() {
        let handle = SpreadsheetHandle::new("sales.csv", b"Order ID\nS1\n".to_vec()).unwrap();
        assert!(read_sheet_columns(&handle, "Sheet1").is_err());
        assert!(load_table(&handle, "Sheet1").is_err());
        assert_eq!(load_table(&handle, SINGLE_SHEET).unwrap().row_count(), 1);
    }

    #[test]
    fn inspection_is_idempotent() {
        let bytes = b"Order ID,Amount\nS1,5\n";
        assert_eq!(inspect(bytes, "a.csv"), inspect(bytes, "a.csv"));
    }
}
