//! Variance report: presentation-ready view of a `ReconResult`.
//!
//! Pure formatting. Ordering and counts come from the engine unchanged.

use std::fmt::Write as _;

use payrecon_io::{SheetOut, Table};
use serde::Serialize;

use crate::amount::{format_minor, format_minor_grouped};
use crate::model::{ReconResult, ReportRole};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryLine {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscrepancyRow {
    pub order_id: String,
    pub expected: String,
    pub received: String,
    pub difference: String,
    /// Comma-separated flags; empty when none
    pub flags: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanRow {
    pub order_id: String,
    pub report: String,
    pub amount: String,
    pub records: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VarianceReport {
    pub title: String,
    pub summary: Vec<SummaryLine>,
    pub discrepancies: Vec<DiscrepancyRow>,
    pub orphans: Vec<OrphanRow>,
    /// Data-quality notes: dropped rows, unparseable amounts, orphans.
    pub warnings: Vec<String>,
}

/// Tables ready for export, one per worksheet.
#[derive(Debug, Clone)]
pub struct ReportTables {
    pub summary: Table,
    pub discrepancies: Table,
    pub orphans: Table,
}

impl ReportTables {
    pub const SUMMARY: &'static str = "Summary";
    pub const DISCREPANCIES: &'static str = "Discrepancies";
    pub const ORPHANS: &'static str = "Orphans";

    /// Index of the table written to single-table targets.
    pub const PRIMARY: usize = 1;

    pub fn sheets(&self) -> [SheetOut<'_>; 3] {
        [
            SheetOut { name: Self::SUMMARY, table: &self.summary },
            SheetOut { name: Self::DISCREPANCIES, table: &self.discrepancies },
            SheetOut { name: Self::ORPHANS, table: &self.orphans },
        ]
    }
}

fn line(label: &str, value: impl Into<String>) -> SummaryLine {
    SummaryLine { label: label.to_string(), value: value.into() }
}

/// Build the report for one reconciliation result.
pub fn format(result: &ReconResult) -> VarianceReport {
    let s = &result.summary;
    let summary = vec![
        line("Marketplace", result.meta.marketplace.as_str()),
        line("Total Sales Value", format_minor_grouped(result.total_sales_minor)),
        line("Total Payment Received", format_minor_grouped(result.total_received_minor)),
        line("Variance", format_minor_grouped(result.variance_minor)),
        line("Tolerance", format_minor(result.meta.tolerance_minor)),
        line("Orders in Sales", s.orders_in_sales.to_string()),
        line("Fully Settled", s.fully_settled.to_string()),
        line("Discrepancies", s.discrepancies.to_string()),
        line("Unpaid Orders", s.unpaid_orders.to_string()),
        line("Orphan Payments", s.orphan_payments.to_string()),
        line("Run At", result.meta.run_at.as_str()),
    ];

    let discrepancies = result
        .discrepancies
        .iter()
        .map(|d| DiscrepancyRow {
            order_id: d.order_id.clone(),
            expected: format_minor(d.expected_minor),
            received: format_minor(d.received_minor),
            difference: format_minor(d.difference_minor),
            flags: d.flags.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "),
        })
        .collect();

    let orphans = result
        .orphan_payments
        .iter()
        .map(|o| OrphanRow {
            order_id: o.order_id.clone(),
            report: o.report.label().to_string(),
            amount: format_minor(o.amount_minor),
            records: o.record_count,
        })
        .collect();

    let mut warnings = Vec::new();
    for role in ReportRole::ALL {
        let stats = result.reports.get(role);
        if stats.rows_dropped_missing_order_id > 0 {
            warnings.push(format!(
                "{}: {} row(s) without an Order ID were skipped",
                role.label(),
                stats.rows_dropped_missing_order_id
            ));
        }
        if stats.amount_parse_errors > 0 {
            warnings.push(format!(
                "{}: {} amount cell(s) were not numeric and counted as 0",
                role.label(),
                stats.amount_parse_errors
            ));
        }
    }
    if s.orphan_payments > 0 {
        warnings.push(format!(
            "{} payment(s) reference orders missing from the sales report",
            s.orphan_payments
        ));
    }

    VarianceReport {
        title: format!("{} reconciliation", result.meta.marketplace),
        summary,
        discrepancies,
        orphans,
        warnings,
    }
}

impl VarianceReport {
    pub fn to_tables(&self) -> ReportTables {
        let summary = Table {
            headers: vec!["Metric".into(), "Value".into()],
            rows: self
                .summary
                .iter()
                .map(|l| vec![l.label.clone(), l.value.clone()])
                .collect(),
        };
        let discrepancies = Table {
            headers: ["Order ID", "Expected", "Received", "Difference", "Flags"]
                .map(String::from)
                .to_vec(),
            rows: self
                .discrepancies
                .iter()
                .map(|d| {
                    vec![
                        d.order_id.clone(),
                        d.expected.clone(),
                        d.received.clone(),
                        d.difference.clone(),
                        d.flags.clone(),
                    ]
                })
                .collect(),
        };
        let orphans = Table {
            headers: ["Order ID", "Report", "Amount", "Records"].map(String::from).to_vec(),
            rows: self
                .orphans
                .iter()
                .map(|o| {
                    vec![o.order_id.clone(), o.report.clone(), o.amount.clone(), o.records.to_string()]
                })
                .collect(),
        };
        ReportTables { summary, discrepancies, orphans }
    }

    /// Plain-text rendering for terminals and logs.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.title);

        let width = self.summary.iter().map(|l| l.label.len()).max().unwrap_or(0);
        for l in &self.summary {
            let _ = writeln!(out, "  {:<width$}  {}", l.label, l.value);
        }

        if !self.discrepancies.is_empty() {
            let id_w = self
                .discrepancies
                .iter()
                .map(|d| d.order_id.len())
                .max()
                .unwrap_or(0)
                .max("Order ID".len());
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "  {:<id_w$}  {:>14}  {:>14}  {:>14}  Flags",
                "Order ID", "Expected", "Received", "Difference"
            );
            for d in &self.discrepancies {
                let _ = writeln!(
                    out,
                    "  {:<id_w$}  {:>14}  {:>14}  {:>14}  {}",
                    d.order_id, d.expected, d.received, d.difference, d.flags
                );
            }
        }

        if !self.orphans.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "  Orphan payments:");
            for o in &self.orphans {
                let _ = writeln!(out, "    {}  {}  {} ({} row(s))", o.order_id, o.report, o.amount, o.records);
            }
        }

        for w in &self.warnings {
            let _ = writeln!(out, "warning: {w}");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Discrepancy, DiscrepancyFlag, OrphanPayment, ReconMeta, ReconSummary, ReportStats,
        ReportStatsSet,
    };

    fn result() -> ReconResult {
        ReconResult {
            meta: ReconMeta {
                marketplace: "Amazon".into(),
                engine_version: "0.0.0".into(),
                run_at: "2026-01-01T00:00:00+00:00".into(),
                tolerance_minor: 50,
            },
            total_sales_minor: 150_000,
            total_received_minor: 100_000,
            variance_minor: 50_000,
            discrepancies: vec![
                Discrepancy {
                    order_id: "S2".into(),
                    expected_minor: 50_000,
                    received_minor: 0,
                    difference_minor: 50_000,
                    flags: vec![DiscrepancyFlag::Unpaid],
                },
                Discrepancy {
                    order_id: "S3".into(),
                    expected_minor: 0,
                    received_minor: 0,
                    difference_minor: 0,
                    flags: vec![
                        DiscrepancyFlag::AmountParseError { report: ReportRole::PreviousPayments },
                        DiscrepancyFlag::MissingUpcomingPayment,
                    ],
                },
            ],
            orphan_payments: vec![OrphanPayment {
                order_id: "S9".into(),
                report: ReportRole::UpcomingPayments,
                amount_minor: -1_250,
                record_count: 2,
                amount_parse_error: false,
            }],
            reports: ReportStatsSet {
                sales: ReportStats { rows_dropped_missing_order_id: 1, ..Default::default() },
                previous_payments: ReportStats { amount_parse_errors: 1, ..Default::default() },
                upcoming_payments: ReportStats::default(),
            },
            summary: ReconSummary {
                orders_in_sales: 3,
                fully_settled: 1,
                discrepancies: 2,
                unpaid_orders: 1,
                orphan_payments: 1,
                rows_dropped: 1,
                amount_parse_errors: 1,
            },
        }
    }

    #[test]
    fn summary_lines_formatted() {
        let r = format(&result());
        let get = |label: &str| {
            r.summary.iter().find(|l| l.label == label).map(|l| l.value.clone()).unwrap()
        };
        assert_eq!(get("Marketplace"), "Amazon");
        assert_eq!(get("Total Sales Value"), "1,500.00");
        assert_eq!(get("Total Payment Received"), "1,000.00");
        assert_eq!(get("Variance"), "500.00");
        assert_eq!(get("Tolerance"), "0.50");
    }

    #[test]
    fn discrepancy_rows_keep_engine_order() {
        let r = format(&result());
        let ids: Vec<&str> = r.discrepancies.iter().map(|d| d.order_id.as_str()).collect();
        assert_eq!(ids, vec!["S2", "S3"]);
        assert_eq!(r.discrepancies[0].expected, "500.00");
        assert_eq!(r.discrepancies[0].flags, "unpaid");
        assert_eq!(
            r.discrepancies[1].flags,
            "amount-parse-error (previous_payments), missing-upcoming-payment"
        );
    }

    #[test]
    fn orphans_and_warnings() {
        let r = format(&result());
        assert_eq!(r.orphans[0].amount, "-12.50");
        assert_eq!(r.orphans[0].report, "Upcoming Payments");
        assert_eq!(r.warnings.len(), 3);
        assert!(r.warnings[0].starts_with("Sales: 1 row(s)"));
    }

    #[test]
    fn tables_for_export() {
        let t = format(&result()).to_tables();
        assert_eq!(t.discrepancies.headers[0], "Order ID");
        assert_eq!(t.discrepancies.rows.len(), 2);
        assert_eq!(t.orphans.rows[0][3], "2");
        let sheets = t.sheets();
        assert_eq!(sheets[ReportTables::PRIMARY].name, "Discrepancies");
    }

    #[test]
    fn text_rendering_mentions_everything() {
        let text = format(&result()).render_text();
        assert!(text.starts_with("Amazon reconciliation\n"));
        assert!(text.contains("S2"));
        assert!(text.contains("Orphan payments:"));
        assert!(text.contains("warning: Previous Payments: 1 amount cell(s)"));
    }
}
