use crate::model::{Discrepancy, DiscrepancyFlag, OrphanPayment, ReconSummary, ReportStatsSet};

/// Compute summary counts from engine output.
///
/// Every sales order not listed as a discrepancy settled within tolerance.
pub fn compute_summary(
    orders_in_sales: usize,
    discrepancies: &[Discrepancy],
    orphans: &[OrphanPayment],
    reports: &ReportStatsSet,
) -> ReconSummary {
    let unpaid_orders = discrepancies
        .iter()
        .filter(|d| d.flags.contains(&DiscrepancyFlag::Unpaid))
        .count();

    let all = [&reports.sales, &reports.previous_payments, &reports.upcoming_payments];

    ReconSummary {
        orders_in_sales,
        fully_settled: orders_in_sales.saturating_sub(discrepancies.len()),
        discrepancies: discrepancies.len(),
        unpaid_orders,
        orphan_payments: orphans.len(),
        rows_dropped: all.iter().map(|s| s.rows_dropped_missing_order_id).sum(),
        amount_parse_errors: all.iter().map(|s| s.amount_parse_errors).sum(),
    }
}
