//! `payrecon inspect`: show what a report file offers for column mapping.

use std::path::PathBuf;

use payrecon_io::{inspect_handle, read_sheet_columns, Inspection, IoError, SpreadsheetHandle};

use crate::exit_codes::EXIT_FILE_READ;
use crate::CliError;

fn io_err(e: IoError) -> CliError {
    let hint = matches!(e, IoError::SheetNotFound { .. });
    let err = CliError::new(EXIT_FILE_READ, e.to_string());
    if hint {
        err.with_hint("run without --sheet to list the available sheets")
    } else {
        err
    }
}

pub fn cmd_inspect(file: PathBuf, sheet: Option<String>, json: bool) -> Result<(), CliError> {
    let handle = SpreadsheetHandle::open(&file).map_err(io_err)?;
    let mut inspection = inspect_handle(&handle);

    if let Some(message) = &inspection.error {
        return Err(CliError::new(EXIT_FILE_READ, message.clone()));
    }

    if let Some(sheet) = sheet {
        if !inspection.sheets.contains(&sheet) {
            return Err(io_err(IoError::SheetNotFound { name: handle.name().to_string(), sheet }));
        }
        inspection.columns = read_sheet_columns(&handle, &sheet).map_err(io_err)?;
        inspection.active_sheet = sheet;
    }

    if json {
        let out = serde_json::to_string_pretty(&inspection)
            .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
        println!("{out}");
    } else {
        print_human(&inspection);
    }
    Ok(())
}

fn print_human(inspection: &Inspection) {
    println!("file:   {}", inspection.file_name);
    if let Some(format) = inspection.format {
        println!("format: {format}");
    }
    println!("sheets:");
    for s in &inspection.sheets {
        let marker = if *s == inspection.active_sheet { "*" } else { " " };
        println!("  {marker} {s}");
    }
    println!("columns ({}):", inspection.active_sheet);
    for c in &inspection.columns {
        println!("    {c}");
    }
}
