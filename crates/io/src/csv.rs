// CSV/TSV reading and writing

use std::path::Path;

use crate::error::IoError;
use crate::handle::SpreadsheetHandle;
use crate::table::{normalize_headers, Table};

/// Read the header row only.
pub fn read_header(handle: &SpreadsheetHandle) -> Result<Vec<String>, IoError> {
    let content = decode(handle.bytes());
    let delimiter = delimiter_for(handle.name(), &content);
    let mut reader = reader_for(&content, delimiter);

    let first = reader
        .records()
        .next()
        .ok_or_else(|| IoError::Empty { name: handle.name().to_string() })?
        .map_err(|e| corrupt(handle, e))?;

    let raw: Vec<String> = first.iter().map(str::to_string).collect();
    let headers = normalize_headers(&raw);
    if headers.is_empty() {
        return Err(IoError::Empty { name: handle.name().to_string() });
    }
    Ok(headers)
}

/// Read the whole file as a table (first row = header).
pub fn read_table(handle: &SpreadsheetHandle) -> Result<Table, IoError> {
    let content = decode(handle.bytes());
    let delimiter = delimiter_for(handle.name(), &content);
    let mut reader = reader_for(&content, delimiter);

    let mut raw = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| corrupt(handle, e))?;
        raw.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    match Table::from_rows(raw) {
        Some(table) if !table.headers.is_empty() => Ok(table),
        _ => Err(IoError::Empty { name: handle.name().to_string() }),
    }
}

fn reader_for(content: &str, delimiter: u8) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes())
}

fn corrupt(handle: &SpreadsheetHandle, e: csv::Error) -> IoError {
    IoError::Corrupt {
        name: handle.name().to_string(),
        message: e.to_string(),
    }
}

/// `.tsv` files are always tab-separated; everything else is sniffed.
fn delimiter_for(name: &str, content: &str) -> u8 {
    if name.to_ascii_lowercase().ends_with(".tsv") {
        b'\t'
    } else {
        sniff_delimiter(content)
    }
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).take(10).collect();

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample
            .iter()
            .map(|line| {
                reader_for(line, delim)
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        let Some(&target) = counts.first() else {
            break;
        };
        if target <= 1 {
            continue;
        }

        // Ties go to the wider split
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;
        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Decode uploaded bytes: UTF-8 (BOM stripped), falling back to Windows-1252
/// for Excel-exported CSVs.
pub fn decode(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Serialize a table (header + rows) as delimited text.
pub fn write_table(table: &Table, delimiter: u8) -> Result<Vec<u8>, IoError> {
    let write_err = |e: &dyn std::fmt::Display| IoError::Write {
        target: "csv".into(),
        message: e.to_string(),
    };

    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_writer(Vec::new());

    writer.write_record(&table.headers).map_err(|e| write_err(&e))?;
    for row in &table.rows {
        writer.write_record(row).map_err(|e| write_err(&e))?;
    }
    writer.into_inner().map_err(|e| write_err(&e))
}

/// Write a table to disk; `.tsv` paths get tabs, everything else commas.
pub fn export(table: &Table, path: &Path) -> Result<(), IoError> {
    let delimiter = if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("tsv")) {
        b'\t'
    } else {
        b','
    };
    let bytes = write_table(table, delimiter)?;
    std::fs::write(path, bytes).map_err(|e| IoError::Write {
        target: path.display().to_string(),
        message: e.to_string(),
    })
}
