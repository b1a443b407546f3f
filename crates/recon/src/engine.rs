use std::time::Duration;

use payrecon_io::load_table;

use crate::aggregate::{aggregate_orders, ReportTotals};
use crate::deadline::Deadline;
use crate::error::{ReconError, ValidationError, ValidationIssue};
use crate::mapping::binding_conflicts;
use crate::model::{
    Discrepancy, DiscrepancyFlag, Marketplace, OrphanPayment, ReconMeta, ReconResult,
    ReportMapping, ReportRole, ReportStatsSet,
};
use crate::summary::compute_summary;

/// Orders joined between deadline checks
const CHECK_EVERY: usize = 4096;

/// Knobs for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconOptions {
    /// Differences strictly above this (minor units) are discrepancies.
    pub tolerance_minor: i64,
    pub timeout: Option<Duration>,
}

/// Reconcile one marketplace's sales against its settled and pending payments.
///
/// The three mappings are consumed; nothing is retained after the call.
pub fn reconcile(
    marketplace: &Marketplace,
    sales: ReportMapping,
    previous: ReportMapping,
    upcoming: ReportMapping,
    options: &ReconOptions,
) -> Result<ReconResult, ReconError> {
    let deadline = Deadline::from_option(options.timeout);

    check_mappings(marketplace, [&sales, &previous, &upcoming])?;

    let sales_totals = load_report(&sales, &deadline)?;
    let prev_totals = load_report(&previous, &deadline)?;
    let upcoming_totals = load_report(&upcoming, &deadline)?;

    let result = join(
        marketplace,
        sales_totals,
        prev_totals,
        upcoming_totals,
        options.tolerance_minor.saturating_abs(),
        &deadline,
    )?;

    tracing::info!(
        %marketplace,
        orders = result.summary.orders_in_sales,
        discrepancies = result.summary.discrepancies,
        orphans = result.summary.orphan_payments,
        variance_minor = result.variance_minor,
        elapsed_ms = deadline.elapsed().as_millis() as u64,
        "reconciliation complete"
    );
    Ok(result)
}

/// Reject inconsistent inputs before touching any file.
fn check_mappings(marketplace: &Marketplace, mappings: [&ReportMapping; 3]) -> Result<(), ReconError> {
    for (mapping, expected) in mappings.iter().zip(ReportRole::ALL) {
        if mapping.role != expected {
            return Err(ReconError::ConfigValidation(format!(
                "expected a {expected} mapping, got {}",
                mapping.role
            )));
        }
        if &mapping.marketplace != marketplace {
            return Err(ReconError::ConfigValidation(format!(
                "{} mapping belongs to {}, not {marketplace}",
                mapping.role, mapping.marketplace
            )));
        }
    }

    let issues: Vec<ValidationIssue> = mappings
        .iter()
        .flat_map(|m| {
            binding_conflicts(
                &m.marketplace,
                m.role,
                Some(m.order_id_column.as_str()),
                m.amount_column.as_deref(),
            )
        })
        .collect();
    if let Some(ValidationIssue::DuplicateColumn { report, column }) = issues
        .iter()
        .find(|i| matches!(i, ValidationIssue::DuplicateColumn { .. }))
    {
        return Err(ReconError::ColumnCollision { report: *report, column: column.clone() });
    }
    if !issues.is_empty() {
        return Err(ValidationError(issues).into());
    }
    Ok(())
}

fn load_report(mapping: &ReportMapping, deadline: &Deadline) -> Result<ReportTotals, ReconError> {
    deadline.check()?;
    let table = load_table(&mapping.handle, &mapping.sheet).map_err(|source| ReconError::File {
        report: mapping.role,
        source,
    })?;

    let column = |name: &str| {
        table.column_index(name).ok_or_else(|| ReconError::MissingColumn {
            report: mapping.role,
            sheet: mapping.sheet.clone(),
            column: name.to_string(),
        })
    };
    let order_col = column(&mapping.order_id_column)?;
    let amount_col = mapping.amount_column.as_deref().map(column).transpose()?;

    let mut totals = aggregate_orders(mapping.role, &table, order_col, amount_col, deadline)?;
    totals.stats.file_name = mapping.handle.name().to_string();
    totals.stats.sheet = mapping.sheet.clone();

    tracing::debug!(
        report = %mapping.role,
        file = mapping.handle.name(),
        rows = totals.stats.rows_read,
        orders = totals.stats.distinct_orders,
        "report loaded"
    );
    Ok(totals)
}

/// Outer join by order id. Sales orders drive the variance; payment-only
/// orders become orphans.
fn join(
    marketplace: &Marketplace,
    sales: ReportTotals,
    previous: ReportTotals,
    upcoming: ReportTotals,
    tolerance_minor: i64,
    deadline: &Deadline,
) -> Result<ReconResult, ReconError> {
    let mut total_sales_minor = 0i64;
    let mut total_received_minor = 0i64;
    let mut discrepancies = Vec::new();

    for (i, (order_id, sale)) in sales.orders.iter().enumerate() {
        if i % CHECK_EVERY == 0 {
            deadline.check()?;
        }

        let prev = previous.orders.get(order_id);
        let next = upcoming.orders.get(order_id);

        let overflow = || ReconError::AmountOverflow { context: format!("order {order_id}") };
        let expected = sale.amount_minor;
        let received = prev
            .map_or(0, |p| p.amount_minor)
            .checked_add(next.map_or(0, |u| u.amount_minor))
            .ok_or_else(overflow)?;
        let difference = expected.checked_sub(received).ok_or_else(overflow)?;

        total_sales_minor = total_sales_minor.checked_add(expected).ok_or_else(overflow)?;
        total_received_minor = total_received_minor.checked_add(received).ok_or_else(overflow)?;

        let mut flags = Vec::new();
        if sale.parse_error {
            flags.push(DiscrepancyFlag::AmountParseError { report: ReportRole::Sales });
        }
        if prev.is_some_and(|p| p.parse_error) {
            flags.push(DiscrepancyFlag::AmountParseError { report: ReportRole::PreviousPayments });
        }
        if next.is_some_and(|u| u.parse_error) {
            flags.push(DiscrepancyFlag::AmountParseError { report: ReportRole::UpcomingPayments });
        }
        match (prev, next) {
            (None, None) => flags.push(DiscrepancyFlag::Unpaid),
            (None, Some(_)) => flags.push(DiscrepancyFlag::MissingPreviousPayment),
            (Some(_), None) => flags.push(DiscrepancyFlag::MissingUpcomingPayment),
            (Some(_), Some(_)) => {}
        }

        let parse_error = flags
            .iter()
            .any(|f| matches!(f, DiscrepancyFlag::AmountParseError { .. }));
        if difference.unsigned_abs() > tolerance_minor.unsigned_abs() || parse_error {
            discrepancies.push(Discrepancy {
                order_id: order_id.clone(),
                expected_minor: expected,
                received_minor: received,
                difference_minor: difference,
                flags,
            });
        }
    }

    discrepancies.sort_by(|a, b| {
        b.difference_minor
            .unsigned_abs()
            .cmp(&a.difference_minor.unsigned_abs())
            .then_with(|| a.order_id.cmp(&b.order_id))
    });

    let mut orphan_payments: Vec<OrphanPayment> = [
        (ReportRole::PreviousPayments, &previous),
        (ReportRole::UpcomingPayments, &upcoming),
    ]
    .into_iter()
    .flat_map(|(report, totals)| {
        totals
            .orders
            .iter()
            .filter(|(id, _)| !sales.orders.contains_key(*id))
            .map(move |(id, t)| OrphanPayment {
                order_id: id.clone(),
                report,
                amount_minor: t.amount_minor,
                record_count: t.record_count,
                amount_parse_error: t.parse_error,
            })
    })
    .collect();
    orphan_payments.sort_by(|a, b| a.order_id.cmp(&b.order_id).then(a.report.cmp(&b.report)));

    if !orphan_payments.is_empty() {
        tracing::warn!(%marketplace, count = orphan_payments.len(), "orphan payments found");
    }

    let reports = ReportStatsSet {
        sales: sales.stats,
        previous_payments: previous.stats,
        upcoming_payments: upcoming.stats,
    };
    let summary = compute_summary(sales.orders.len(), &discrepancies, &orphan_payments, &reports);
    let variance_minor = total_sales_minor
        .checked_sub(total_received_minor)
        .ok_or_else(|| ReconError::AmountOverflow { context: "variance".into() })?;

    Ok(ReconResult {
        meta: ReconMeta {
            marketplace: marketplace.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            tolerance_minor,
        },
        total_sales_minor,
        total_received_minor,
        variance_minor,
        discrepancies,
        orphan_payments,
        reports,
        summary,
    })
}
