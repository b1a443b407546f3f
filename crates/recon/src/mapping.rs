//! Mapping state for one report of one marketplace.
//!
//! Holds the uploaded file, the discovered sheets/columns, the active sheet
//! and the user's column bindings. Every mutator validates its input first
//! and leaves the state untouched on failure.

use std::collections::BTreeMap;

use payrecon_io::{read_sheet_columns, Inspection, IoError, SpreadsheetHandle, UNSELECTED};

use crate::error::{ValidationError, ValidationIssue};
use crate::model::{BindingRole, Marketplace, ReportMapping, ReportRole};

/// Header names (lowercased, punctuation collapsed) recognized as defaults.
const ORDER_ID_ALIASES: &[&str] = &[
    "order id",
    "orderid",
    "order no",
    "order number",
    "order item id",
    "sub order no",
    "suborder id",
    "amazon order id",
    "order",
];

const AMOUNT_ALIASES: &[&str] = &[
    "amount",
    "payment amount",
    "settlement amount",
    "net amount",
    "final settlement amount",
    "bank settlement value",
    "invoice amount",
    "invoice value",
    "order value",
    "sale amount",
    "sales amount",
    "total amount",
    "total",
];

/// The user's choice for one binding role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnBinding {
    pub role: BindingRole,
    /// `None` = "(unselected)"
    pub column: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MappingSession {
    marketplace: Marketplace,
    report: ReportRole,
    handle: Option<SpreadsheetHandle>,
    sheets: Vec<String>,
    active_sheet: Option<String>,
    columns: Vec<String>,
    file_error: Option<String>,
    bindings: BTreeMap<BindingRole, String>,
}

impl MappingSession {
    pub fn new(marketplace: Marketplace, report: ReportRole) -> Self {
        Self {
            marketplace,
            report,
            handle: None,
            sheets: Vec::new(),
            active_sheet: None,
            columns: vec![UNSELECTED.to_string()],
            file_error: None,
            bindings: BTreeMap::new(),
        }
    }

    /// Take a newly uploaded file with its (cached) inspection. Bindings are
    /// reset, then seeded from recognizable header names.
    pub fn attach(&mut self, handle: SpreadsheetHandle, inspection: &Inspection) {
        self.sheets = inspection.sheets.clone();
        self.columns = inspection.columns.clone();
        self.file_error = inspection.error.clone();
        self.active_sheet = inspection.is_ready().then(|| inspection.active_sheet.clone());
        self.handle = Some(handle);
        self.bindings.clear();

        if inspection.is_ready() {
            self.seed_defaults();
        }
        tracing::debug!(
            marketplace = %self.marketplace,
            report = %self.report,
            ready = inspection.is_ready(),
            seeded = self.bindings.len(),
            "file attached to mapping"
        );
    }

    /// Drop the file and all derived state.
    pub fn detach(&mut self) {
        *self = Self::new(self.marketplace.clone(), self.report);
    }

    /// Record an upload that could not even be wrapped (unsupported type).
    /// The slot holds no file but reports the error instead of "no file".
    pub fn reject(&mut self, inspection: &Inspection) {
        self.detach();
        self.sheets = inspection.sheets.clone();
        self.columns = inspection.columns.clone();
        self.file_error = inspection.error.clone();
    }

    fn seed_defaults(&mut self) {
        let header: Vec<String> = self.header().to_vec();
        let order_col = find_alias(&header, ORDER_ID_ALIASES, None);
        if let Some(col) = &order_col {
            self.bindings.insert(BindingRole::OrderId, col.clone());
        }
        if let Some(col) = find_alias(&header, AMOUNT_ALIASES, order_col.as_deref()) {
            self.bindings.insert(BindingRole::Amount, col);
        }
    }

    /// Switch the active sheet. Unknown names are rejected without change;
    /// the same sheet again is a no-op. A new sheet re-reads its header and
    /// resets every binding.
    pub fn set_sheet(&mut self, name: &str) -> Result<(), ValidationError> {
        if !self.is_ready() || !self.sheets.iter().any(|s| s == name) {
            return Err(ValidationError::single(ValidationIssue::UnknownSheet {
                report: self.report,
                sheet: name.to_string(),
            }));
        }
        if self.active_sheet.as_deref() == Some(name) {
            return Ok(());
        }

        let Some(handle) = &self.handle else {
            return Err(self.no_file_error());
        };
        let columns = read_sheet_columns(handle, name).map_err(|e| self.file_error_issue(&e))?;

        self.columns = columns;
        self.active_sheet = Some(name.to_string());
        self.bindings.clear();
        tracing::debug!(
            marketplace = %self.marketplace,
            report = %self.report,
            sheet = name,
            columns = self.columns.len() - 1,
            "sheet switched, bindings reset"
        );
        Ok(())
    }

    /// Bind `role` to `column`. The sentinel clears the binding; any other
    /// value must be one of the current columns.
    pub fn set_binding(&mut self, role: BindingRole, column: &str) -> Result<(), ValidationError> {
        if !self.is_ready() || !self.columns.iter().any(|c| c == column) {
            return Err(ValidationError::single(ValidationIssue::UnknownColumn {
                report: self.report,
                binding: role,
                column: column.to_string(),
            }));
        }
        if column == UNSELECTED {
            self.bindings.remove(&role);
        } else {
            self.bindings.insert(role, column.to_string());
        }
        Ok(())
    }

    /// Every required binding resolves to a real column.
    pub fn is_complete(&self) -> bool {
        self.is_ready() && self.missing_bindings().is_empty()
    }

    pub fn missing_bindings(&self) -> Vec<BindingRole> {
        self.report
            .required_bindings()
            .iter()
            .copied()
            .filter(|r| !self.bindings.contains_key(r))
            .collect()
    }

    /// Everything that keeps this mapping from being reconciled: missing
    /// file or required bindings, plus the checks the engine applies to
    /// every snapshot.
    pub fn issues(&self) -> Vec<ValidationIssue> {
        let mut issues = self.completeness_issues();
        if self.is_ready() {
            let conflicts = binding_conflicts(
                &self.marketplace,
                self.report,
                self.bindings.get(&BindingRole::OrderId).map(String::as_str),
                self.bindings.get(&BindingRole::Amount).map(String::as_str),
            );
            for issue in conflicts {
                if !issues.contains(&issue) {
                    issues.push(issue);
                }
            }
        }
        issues
    }

    fn completeness_issues(&self) -> Vec<ValidationIssue> {
        if let Some(error) = &self.file_error {
            return vec![ValidationIssue::FileNotReady {
                marketplace: self.marketplace.clone(),
                report: self.report,
                error: error.clone(),
            }];
        }
        if self.handle.is_none() {
            return vec![ValidationIssue::NoFile {
                marketplace: self.marketplace.clone(),
                report: self.report,
            }];
        }
        self.missing_bindings()
            .into_iter()
            .map(|binding| ValidationIssue::MissingBinding {
                marketplace: self.marketplace.clone(),
                report: self.report,
                binding,
            })
            .collect()
    }

    /// Snapshot for the engine. Fails with every outstanding issue.
    pub fn to_mapping(&self) -> Result<ReportMapping, ValidationError> {
        let issues = self.completeness_issues();
        if !issues.is_empty() {
            return Err(ValidationError(issues));
        }
        let (Some(handle), Some(sheet), Some(order_id)) = (
            &self.handle,
            &self.active_sheet,
            self.bindings.get(&BindingRole::OrderId),
        ) else {
            return Err(self.no_file_error());
        };

        Ok(ReportMapping {
            marketplace: self.marketplace.clone(),
            role: self.report,
            handle: handle.clone(),
            sheet: sheet.clone(),
            order_id_column: order_id.clone(),
            amount_column: self.bindings.get(&BindingRole::Amount).cloned(),
        })
    }

    pub fn binding(&self, role: BindingRole) -> ColumnBinding {
        ColumnBinding {
            role,
            column: self.bindings.get(&role).cloned(),
        }
    }

    /// Current column for `role`, or the sentinel text.
    pub fn binding_display(&self, role: BindingRole) -> &str {
        self.bindings.get(&role).map(String::as_str).unwrap_or(UNSELECTED)
    }

    pub fn marketplace(&self) -> &Marketplace {
        &self.marketplace
    }

    pub fn report(&self) -> ReportRole {
        self.report
    }

    pub fn handle(&self) -> Option<&SpreadsheetHandle> {
        self.handle.as_ref()
    }

    pub fn sheets(&self) -> &[String] {
        &self.sheets
    }

    pub fn active_sheet(&self) -> Option<&str> {
        self.active_sheet.as_deref()
    }

    /// Column choices including the sentinel.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn file_error(&self) -> Option<&str> {
        self.file_error.as_deref()
    }

    /// A file is attached and readable.
    pub fn is_ready(&self) -> bool {
        self.handle.is_some() && self.file_error.is_none()
    }

    fn header(&self) -> &[String] {
        self.columns.get(1..).unwrap_or(&[])
    }

    fn no_file_error(&self) -> ValidationError {
        ValidationError::single(ValidationIssue::NoFile {
            marketplace: self.marketplace.clone(),
            report: self.report,
        })
    }

    fn file_error_issue(&self, e: &IoError) -> ValidationError {
        ValidationError::single(ValidationIssue::FileNotReady {
            marketplace: self.marketplace.clone(),
            report: self.report,
            error: e.to_string(),
        })
    }
}

/// Binding problems that stop a run even when the mapping is complete: no
/// Amount column, or one column serving as both Order ID and Amount.
pub(crate) fn binding_conflicts(
    marketplace: &Marketplace,
    report: ReportRole,
    order_id: Option<&str>,
    amount: Option<&str>,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    match amount {
        None => issues.push(ValidationIssue::MissingBinding {
            marketplace: marketplace.clone(),
            report,
            binding: BindingRole::Amount,
        }),
        Some(column) if order_id == Some(column) => issues.push(ValidationIssue::DuplicateColumn {
            report,
            column: column.to_string(),
        }),
        Some(_) => {}
    }
    issues
}

fn normalize_header(h: &str) -> String {
    h.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// First header matching the earliest alias in `aliases`, skipping `exclude`.
fn find_alias(header: &[String], aliases: &[&str], exclude: Option<&str>) -> Option<String> {
    let normalized: Vec<String> = header.iter().map(|h| normalize_header(h)).collect();
    aliases.iter().find_map(|alias| {
        normalized
            .iter()
            .position(|n| n == alias)
            .map(|i| header[i].clone())
            .filter(|col| Some(col.as_str()) != exclude)
    })
}
