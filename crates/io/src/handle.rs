// Uploaded file handles

use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::error::IoError;

/// Flat delimited text vs. multi-sheet workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    Flat,
    MultiSheet,
}

impl FileFormat {
    /// Infer the format from a declared file name's extension.
    pub fn from_name(name: &str) -> Result<Self, IoError> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" | "tsv" | "txt" => Ok(Self::Flat),
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Ok(Self::MultiSheet),
            _ => Err(IoError::UnsupportedFormat { name: name.to_string() }),
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flat => write!(f, "flat"),
            Self::MultiSheet => write!(f, "multi_sheet"),
        }
    }
}

/// Content identity of an upload: BLAKE3 hash of its bytes.
///
/// Two uploads with different bytes never share an id, regardless of name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId([u8; 32]);

impl FileId {
    pub fn of(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    /// Short hex prefix for log lines.
    pub fn short(&self) -> String {
        self.0[..6].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// An uploaded file: bytes, declared name, format and identity.
///
/// Immutable once created. Cloning shares the bytes.
#[derive(Debug, Clone)]
pub struct SpreadsheetHandle {
    name: String,
    format: FileFormat,
    id: FileId,
    bytes: Arc<[u8]>,
}

impl SpreadsheetHandle {
    /// Wrap uploaded bytes. Fails only for an unsupported extension.
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Result<Self, IoError> {
        let name = name.into();
        let format = FileFormat::from_name(&name)?;
        let bytes: Vec<u8> = bytes.into();
        Ok(Self {
            id: FileId::of(&bytes),
            bytes: bytes.into(),
            name,
            format,
        })
    }

    /// Read a file from disk, keeping only its file name as the declared name.
    pub fn open(path: &Path) -> Result<Self, IoError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        // Check the extension before touching the disk
        FileFormat::from_name(&name)?;
        let bytes = std::fs::read(path).map_err(|e| IoError::Corrupt {
            name: name.clone(),
            message: e.to_string(),
        })?;
        Self::new(name, bytes)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// A fresh reader positioned at the start of the content.
    pub(crate) fn reader(&self) -> Cursor<Vec<u8>> {
        Cursor::new(self.bytes.to_vec())
    }
}
