// In-memory sheet contents

use serde::Serialize;

/// A header row plus string rows, as read from one sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table from raw rows where the first row is the header.
    /// Empty input yields `None`.
    pub fn from_rows(mut raw: Vec<Vec<String>>) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }
        let header = raw.remove(0);
        Some(Self {
            headers: normalize_headers(&header),
            rows: raw,
        })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell at (row, col); short rows read as empty.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Trim header cells, name blank ones `Column N` (1-based) and suffix
/// repeated names with ` (2)`, ` (3)`, ... so every column is addressable
/// by a unique name.
pub fn normalize_headers(raw: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for (i, cell) in raw.iter().enumerate() {
        let trimmed = cell.trim();
        let base = if trimmed.is_empty() {
            format!("Column {}", i + 1)
        } else {
            trimmed.to_string()
        };

        let mut name = base.clone();
        let mut n = 2;
        while out.contains(&name) {
            name = format!("{base} ({n})");
            n += 1;
        }
        out.push(name);
    }

    // Trailing blank headers carry no data worth binding
    let keep = raw
        .iter()
        .rposition(|cell| !cell.trim().is_empty())
        .map_or(0, |i| i + 1);
    out.truncate(keep);
    out
}
