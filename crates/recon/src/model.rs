use std::fmt;

use payrecon_io::SpreadsheetHandle;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// A sales channel reconciled independently of the others.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Marketplace(String);

impl Marketplace {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Marketplace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Marketplace {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Semantic purpose of one uploaded file within a reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportRole {
    Sales,
    PreviousPayments,
    UpcomingPayments,
}

impl ReportRole {
    pub const ALL: [ReportRole; 3] = [Self::Sales, Self::PreviousPayments, Self::UpcomingPayments];

    /// Bindings that must resolve for the mapping to be complete.
    pub fn required_bindings(&self) -> &'static [BindingRole] {
        match self {
            Self::Sales => &[BindingRole::OrderId],
            Self::PreviousPayments | Self::UpcomingPayments => {
                &[BindingRole::OrderId, BindingRole::Amount]
            }
        }
    }

    pub fn is_payment(&self) -> bool {
        !matches!(self, Self::Sales)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Sales => "Sales",
            Self::PreviousPayments => "Previous Payments",
            Self::UpcomingPayments => "Upcoming Payments",
        }
    }
}

impl fmt::Display for ReportRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sales => write!(f, "sales"),
            Self::PreviousPayments => write!(f, "previous_payments"),
            Self::UpcomingPayments => write!(f, "upcoming_payments"),
        }
    }
}

/// Semantic column a user binds to a physical header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingRole {
    OrderId,
    /// Payment amount for payment reports, sale value for the sales report.
    Amount,
}

impl BindingRole {
    pub const ALL: [BindingRole; 2] = [Self::OrderId, Self::Amount];

    pub fn label(&self) -> &'static str {
        match self {
            Self::OrderId => "Order ID",
            Self::Amount => "Amount",
        }
    }
}

impl fmt::Display for BindingRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Mapping snapshot handed to the engine
// ---------------------------------------------------------------------------

/// A fully resolved report: file, sheet and bound columns.
#[derive(Debug, Clone)]
pub struct ReportMapping {
    pub marketplace: Marketplace,
    pub role: ReportRole,
    pub handle: SpreadsheetHandle,
    pub sheet: String,
    pub order_id_column: String,
    pub amount_column: Option<String>,
}

// ---------------------------------------------------------------------------
// Engine output
// ---------------------------------------------------------------------------

/// Per-order annotation carried on a discrepancy.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscrepancyFlag {
    /// A non-numeric amount cell in `report` was counted as 0.
    AmountParseError { report: ReportRole },
    /// Absent from the previous-payments report.
    MissingPreviousPayment,
    /// Absent from the upcoming-payments report.
    MissingUpcomingPayment,
    /// Absent from both payment reports.
    Unpaid,
}

impl fmt::Display for DiscrepancyFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AmountParseError { report } => write!(f, "amount-parse-error ({report})"),
            Self::MissingPreviousPayment => write!(f, "missing-previous-payment"),
            Self::MissingUpcomingPayment => write!(f, "missing-upcoming-payment"),
            Self::Unpaid => write!(f, "unpaid"),
        }
    }
}

/// One order whose expected and received amounts disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Discrepancy {
    pub order_id: String,
    pub expected_minor: i64,
    pub received_minor: i64,
    /// `expected - received`
    pub difference_minor: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<DiscrepancyFlag>,
}

impl Discrepancy {
    pub fn has_parse_error(&self) -> bool {
        self.flags
            .iter()
            .any(|f| matches!(f, DiscrepancyFlag::AmountParseError { .. }))
    }
}

/// A payment whose order id never appears in the sales report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanPayment {
    pub order_id: String,
    pub report: ReportRole,
    pub amount_minor: i64,
    pub record_count: usize,
    pub amount_parse_error: bool,
}

/// Row accounting for one input report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportStats {
    pub file_name: String,
    pub sheet: String,
    pub rows_read: usize,
    /// Rows without an order id: excluded from the join, reported here.
    pub rows_dropped_missing_order_id: usize,
    pub amount_parse_errors: usize,
    pub distinct_orders: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconSummary {
    pub orders_in_sales: usize,
    pub fully_settled: usize,
    pub discrepancies: usize,
    pub unpaid_orders: usize,
    pub orphan_payments: usize,
    pub rows_dropped: usize,
    pub amount_parse_errors: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconMeta {
    pub marketplace: Marketplace,
    pub engine_version: String,
    pub run_at: String,
    pub tolerance_minor: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportStatsSet {
    pub sales: ReportStats,
    pub previous_payments: ReportStats,
    pub upcoming_payments: ReportStats,
}

impl ReportStatsSet {
    pub fn get(&self, role: ReportRole) -> &ReportStats {
        match role {
            ReportRole::Sales => &self.sales,
            ReportRole::PreviousPayments => &self.previous_payments,
            ReportRole::UpcomingPayments => &self.upcoming_payments,
        }
    }
}

/// Outcome of one reconciliation. Amounts are in minor units (1/100).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub total_sales_minor: i64,
    pub total_received_minor: i64,
    /// `total_sales - total_received`
    pub variance_minor: i64,
    /// Descending |difference|, ties by order id ascending.
    pub discrepancies: Vec<Discrepancy>,
    /// Ordered by order id, then report.
    pub orphan_payments: Vec<OrphanPayment>,
    pub reports: ReportStatsSet,
    pub summary: ReconSummary,
}
