use std::fmt;

use payrecon_io::IoError;
use serde::Serialize;
use thiserror::Error;

use crate::model::{BindingRole, Marketplace, ReportRole};

/// One field-level problem that blocks an action. Local state is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    /// No file uploaded for this report yet.
    NoFile { marketplace: Marketplace, report: ReportRole },
    /// File uploaded but could not be read.
    FileNotReady { marketplace: Marketplace, report: ReportRole, error: String },
    /// Sheet name not offered by the current file.
    UnknownSheet { report: ReportRole, sheet: String },
    /// Column not offered by the current sheet.
    UnknownColumn { report: ReportRole, binding: BindingRole, column: String },
    /// A required binding is still unselected.
    MissingBinding { marketplace: Marketplace, report: ReportRole, binding: BindingRole },
    /// The same physical column is bound to two roles.
    DuplicateColumn { report: ReportRole, column: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFile { marketplace, report } => {
                write!(f, "{marketplace} {}: no file uploaded", report.label())
            }
            Self::FileNotReady { marketplace, report, error } => {
                write!(f, "{marketplace} {}: file not readable ({error})", report.label())
            }
            Self::UnknownSheet { report, sheet } => {
                write!(f, "{}: sheet '{sheet}' is not in the uploaded file", report.label())
            }
            Self::UnknownColumn { report, binding, column } => write!(
                f,
                "{}: column '{column}' for {binding} is not in the selected sheet",
                report.label()
            ),
            Self::MissingBinding { marketplace, report, binding } => {
                write!(f, "{marketplace} {}: select the {binding} column", report.label())
            }
            Self::DuplicateColumn { report, column } => write!(
                f,
                "{}: column '{column}' is bound to more than one role",
                report.label()
            ),
        }
    }
}

/// Validation failure carrying every issue found, in a stable order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", join_issues(.0))]
pub struct ValidationError(pub Vec<ValidationIssue>);

impl ValidationError {
    pub fn single(issue: ValidationIssue) -> Self {
        Self(vec![issue])
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.0
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum ReconError {
    /// Incomplete or inconsistent mappings; nothing was processed.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// One physical column serves two semantic roles within a report.
    #[error("configuration error: {report} column '{column}' is bound to both Order ID and Amount")]
    ColumnCollision { report: ReportRole, column: String },

    /// Bound column disappeared between mapping and loading.
    #[error("{report}: column '{column}' not found in sheet '{sheet}'")]
    MissingColumn { report: ReportRole, sheet: String, column: String },

    /// Reading a report failed.
    #[error("{report}: {source}")]
    File {
        report: ReportRole,
        #[source]
        source: IoError,
    },

    /// Summed amounts exceed the representable range.
    #[error("amounts too large to total ({context})")]
    AmountOverflow { context: String },

    /// Wall-clock budget exceeded.
    #[error("processing timed out after {elapsed_ms} ms (limit {limit_ms} ms)")]
    TimedOut { elapsed_ms: u128, limit_ms: u128 },

    /// Job file parse error.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// Job file validation error.
    #[error("config validation error: {0}")]
    ConfigValidation(String),
}
