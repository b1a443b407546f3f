use std::collections::BTreeMap;

use payrecon_io::Table;

use crate::amount::{parse_cell, AmountCell};
use crate::deadline::Deadline;
use crate::error::ReconError;
use crate::model::{ReportRole, ReportStats};

/// Rows between deadline checks
const CHECK_EVERY: usize = 4096;

/// Sum of one order's rows within one report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderTotal {
    pub amount_minor: i64,
    pub record_count: usize,
    pub parse_error: bool,
}

/// One report reduced to per-order totals.
#[derive(Debug, Clone, Default)]
pub struct ReportTotals {
    pub orders: BTreeMap<String, OrderTotal>,
    pub stats: ReportStats,
}

/// Group rows by order id and sum amounts.
///
/// Rows with a blank order id are dropped and counted. Non-numeric amounts
/// count as 0 and mark the order. Without an amount column every order
/// totals 0.
pub fn aggregate_orders(
    report: ReportRole,
    table: &Table,
    order_col: usize,
    amount_col: Option<usize>,
    deadline: &Deadline,
) -> Result<ReportTotals, ReconError> {
    let mut totals = ReportTotals::default();

    for row in 0..table.row_count() {
        if row % CHECK_EVERY == 0 {
            deadline.check()?;
        }
        totals.stats.rows_read += 1;

        let order_id = table.cell(row, order_col).trim();
        if order_id.is_empty() {
            totals.stats.rows_dropped_missing_order_id += 1;
            continue;
        }

        let entry = totals.orders.entry(order_id.to_string()).or_default();
        entry.record_count += 1;

        if let Some(col) = amount_col {
            match parse_cell(table.cell(row, col)) {
                AmountCell::Value(v) => {
                    entry.amount_minor = entry.amount_minor.checked_add(v).ok_or_else(|| {
                        ReconError::AmountOverflow { context: format!("{report} order {order_id}") }
                    })?;
                }
                AmountCell::Blank => {}
                AmountCell::Invalid => {
                    entry.parse_error = true;
                    totals.stats.amount_parse_errors += 1;
                }
            }
        }
    }

    totals.stats.distinct_orders = totals.orders.len();
    if totals.stats.rows_dropped_missing_order_id > 0 {
        tracing::warn!(
            %report,
            dropped = totals.stats.rows_dropped_missing_order_id,
            "rows without order id dropped"
        );
    }
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[(&str, &str)]) -> Table {
        Table {
            headers: vec!["Order ID".into(), "Amount".into()],
            rows: rows
                .iter()
                .map(|(o, a)| vec![o.to_string(), a.to_string()])
                .collect(),
        }
    }

    fn run(rows: &[(&str, &str)]) -> ReportTotals {
        aggregate_orders(ReportRole::PreviousPayments, &table(rows), 0, Some(1), &Deadline::none())
            .unwrap()
    }

    #[test]
    fn rows_summed_per_order() {
        let t = run(&[("S1", "400"), ("S1", "300"), ("S2", "50.25")]);
        assert_eq!(t.orders["S1"].amount_minor, 70_000);
        assert_eq!(t.orders["S1"].record_count, 2);
        assert_eq!(t.orders["S2"].amount_minor, 5_025);
        assert_eq!(t.stats.rows_read, 3);
        assert_eq!(t.stats.distinct_orders, 2);
    }

    #[test]
    fn blank_order_ids_dropped_and_counted() {
        let t = run(&[("S1", "10"), ("", "99"), ("   ", "1")]);
        assert_eq!(t.orders.len(), 1);
        assert_eq!(t.stats.rows_dropped_missing_order_id, 2);
        assert_eq!(t.stats.rows_read, 3);
    }

    #[test]
    fn order_ids_trimmed() {
        let t = run(&[(" S1", "10"), ("S1 ", "5")]);
        assert_eq!(t.orders["S1"].amount_minor, 1_500);
    }

    #[test]
    fn invalid_amount_counts_zero_and_flags() {
        let t = run(&[("S3", "abc"), ("S3", "100")]);
        let s3 = &t.orders["S3"];
        assert_eq!(s3.amount_minor, 10_000);
        assert!(s3.parse_error);
        assert_eq!(t.stats.amount_parse_errors, 1);
    }

    #[test]
    fn blank_amount_is_zero_without_flag() {
        let t = run(&[("S4", "")]);
        assert_eq!(t.orders["S4"].amount_minor, 0);
        assert!(!t.orders["S4"].parse_error);
    }

    #[test]
    fn no_amount_column_totals_zero() {
        let t = aggregate_orders(
            ReportRole::Sales,
            &table(&[("S1", "10")]),
            0,
            None,
            &Deadline::none(),
        )
        .unwrap();
        assert_eq!(t.orders["S1"].amount_minor, 0);
        assert_eq!(t.orders["S1"].record_count, 1);
    }

    #[test]
    fn per_order_overflow_is_an_error() {
        let huge = "50000000000000000";
        let err = aggregate_orders(
            ReportRole::PreviousPayments,
            &table(&[("S1", huge), ("S1", huge)]),
            0,
            Some(1),
            &Deadline::none(),
        )
        .unwrap_err();
        assert!(matches!(err, ReconError::AmountOverflow { ref context } if context.ends_with("order S1")));
    }
}
