// Result export: pick the writer from the output extension

use std::path::Path;

use crate::error::IoError;
use crate::handle::FileFormat;
use crate::xlsx::SheetOut;
use crate::{csv, xlsx};

/// Export named tables to `path`.
///
/// Multi-sheet targets get one worksheet per table. Flat targets hold a
/// single table, so only `primary` (an index into `sheets`) is written.
pub fn export(sheets: &[SheetOut<'_>], primary: usize, path: &Path) -> Result<FileFormat, IoError> {
    let name = path.display().to_string();
    let format = FileFormat::from_name(&name)?;
    match format {
        FileFormat::MultiSheet => {
            if !name.to_ascii_lowercase().ends_with(".xlsx") {
                return Err(IoError::Write {
                    target: name,
                    message: "only .xlsx is supported for workbook export".into(),
                });
            }
            xlsx::export(sheets, path)?;
        }
        FileFormat::Flat => {
            let sheet = sheets.get(primary).ok_or_else(|| IoError::Write {
                target: name.clone(),
                message: "nothing to export".into(),
            })?;
            csv::export(sheet.table, path)?;
        }
    }
    tracing::info!(path = %path.display(), %format, "exported report");
    Ok(format)
}
