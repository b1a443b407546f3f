// Excel/ODS reading (calamine) and writing (rust_xlsxwriter)

use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook};

use crate::error::IoError;
use crate::handle::SpreadsheetHandle;
use crate::table::{normalize_headers, Table};

/// Maximum rows read from one sheet
const MAX_ROWS: usize = 1_048_576;

fn open(handle: &SpreadsheetHandle) -> Result<Sheets<Cursor<Vec<u8>>>, IoError> {
    open_workbook_auto_from_rs(handle.reader()).map_err(|e| IoError::Corrupt {
        name: handle.name().to_string(),
        message: format!("failed to open workbook: {e}"),
    })
}

/// List the workbook's sheet names in workbook order.
pub fn sheet_names(handle: &SpreadsheetHandle) -> Result<Vec<String>, IoError> {
    let workbook = open(handle)?;
    let names: Vec<String> = workbook.sheet_names().to_vec();
    if names.is_empty() {
        return Err(IoError::Corrupt {
            name: handle.name().to_string(),
            message: "workbook contains no sheets".into(),
        });
    }
    Ok(names)
}

fn sheet_range(handle: &SpreadsheetHandle, sheet: &str) -> Result<Range<Data>, IoError> {
    let mut workbook = open(handle)?;
    if !workbook.sheet_names().iter().any(|n| n == sheet) {
        return Err(IoError::SheetNotFound {
            name: handle.name().to_string(),
            sheet: sheet.to_string(),
        });
    }
    workbook.worksheet_range(sheet).map_err(|e| IoError::Corrupt {
        name: handle.name().to_string(),
        message: format!("failed to read sheet '{sheet}': {e}"),
    })
}

/// Read the header row (first non-empty row) of one sheet.
pub fn read_header(handle: &SpreadsheetHandle, sheet: &str) -> Result<Vec<String>, IoError> {
    let range = sheet_range(handle, sheet)?;
    let headers = range
        .rows()
        .map(|r| r.iter().map(cell_to_string).collect::<Vec<_>>())
        .find(|r| r.iter().any(|c| !c.trim().is_empty()))
        .map(|r| normalize_headers(&r))
        .unwrap_or_default();

    if headers.is_empty() {
        return Err(IoError::Empty { name: format!("{}#{sheet}", handle.name()) });
    }
    Ok(headers)
}

/// Read one sheet as a table. Leading blank rows are skipped so the header
/// matches [`read_header`].
pub fn read_table(handle: &SpreadsheetHandle, sheet: &str) -> Result<Table, IoError> {
    let range = sheet_range(handle, sheet)?;
    let raw: Vec<Vec<String>> = range
        .rows()
        .take(MAX_ROWS)
        .map(|r| r.iter().map(cell_to_string).collect::<Vec<_>>())
        .skip_while(|r| r.iter().all(|c| c.trim().is_empty()))
        .collect();

    match Table::from_rows(raw) {
        Some(table) if !table.headers.is_empty() => Ok(table),
        _ => Err(IoError::Empty { name: format!("{}#{sheet}", handle.name()) }),
    }
}

/// Render a cell as text. Integral floats lose their trailing `.0` so
/// numeric order ids read the same as in a CSV export.
pub fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::Error(e) => format!("#{e:?}"),
        other => other.to_string(),
    }
}

/// A sheet to write: name, header, rows. Cells that parse as numbers are
/// written as numbers.
pub struct SheetOut<'a> {
    pub name: &'a str,
    pub table: &'a Table,
}

/// Write sheets into an in-memory XLSX workbook.
pub fn write_workbook(sheets: &[SheetOut<'_>]) -> Result<Vec<u8>, IoError> {
    let write_err = |e: rust_xlsxwriter::XlsxError| IoError::Write {
        target: "xlsx".into(),
        message: e.to_string(),
    };

    let mut workbook = XlsxWorkbook::new();
    let bold = Format::new().set_bold();

    for sheet in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet.name).map_err(write_err)?;

        for (col, header) in sheet.table.headers.iter().enumerate() {
            worksheet
                .write_string_with_format(0, col as u16, header, &bold)
                .map_err(write_err)?;
        }

        for (r, row) in sheet.table.rows.iter().enumerate() {
            let xl_row = (r + 1) as u32;
            for (col, value) in row.iter().enumerate() {
                if value.is_empty() {
                    continue;
                }
                match value.parse::<f64>() {
                    Ok(n) if looks_numeric(value) => {
                        worksheet.write_number(xl_row, col as u16, n).map_err(write_err)?;
                    }
                    _ => {
                        worksheet.write_string(xl_row, col as u16, value).map_err(write_err)?;
                    }
                }
            }
        }
    }

    workbook.save_to_buffer().map_err(write_err)
}

/// Significant digits an f64 cell holds exactly.
const MAX_NUMBER_DIGITS: usize = 15;

/// Plain decimal literal that survives a trip through an f64 cell; keeps
/// ids like "00123", "1e5" or long numeric order ids as text.
fn looks_numeric(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    let significant = digits
        .chars()
        .filter(char::is_ascii_digit)
        .skip_while(|&c| c == '0')
        .count();
    !digits.is_empty()
        && !(digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0."))
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.chars().filter(|&c| c == '.').count() <= 1
        && significant <= MAX_NUMBER_DIGITS
}

/// Write sheets to an `.xlsx` file on disk.
pub fn export(sheets: &[SheetOut<'_>], path: &Path) -> Result<(), IoError> {
    let bytes = write_workbook(sheets)?;
    std::fs::write(path, bytes).map_err(|e| IoError::Write {
        target: path.display().to_string(),
        message: e.to_string(),
    })
}
