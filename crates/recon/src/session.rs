//! Per-user reconciliation state.
//!
//! One `ReconSession` owns the introspection cache and every mapping the user
//! has touched. Nothing is shared between sessions.

use std::collections::{BTreeMap, HashMap};

use payrecon_io::{Inspection, SpreadsheetHandle};
use uuid::Uuid;

use crate::cache::{CacheStats, IntrospectionCache, SlotKey};
use crate::engine::{self, ReconOptions};
use crate::error::{ReconError, ValidationError, ValidationIssue};
use crate::mapping::MappingSession;
use crate::model::{BindingRole, Marketplace, ReconResult, ReportRole};

#[derive(Debug)]
pub struct ReconSession {
    id: Uuid,
    cache: IntrospectionCache,
    mappings: BTreeMap<SlotKey, MappingSession>,
    /// Uploads rejected before a handle existed (unsupported extension)
    rejected: HashMap<SlotKey, Inspection>,
}

impl Default for ReconSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconSession {
    pub fn new() -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(session = %id, "session created");
        Self {
            id,
            cache: IntrospectionCache::new(),
            mappings: BTreeMap::new(),
            rejected: HashMap::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Store an upload in the (marketplace, report) slot and inspect it.
    ///
    /// Never fails: an unreadable file yields the error sentinel inspection
    /// and leaves the slot "not ready".
    pub fn upload(
        &mut self,
        marketplace: &Marketplace,
        report: ReportRole,
        name: &str,
        bytes: impl Into<Vec<u8>>,
    ) -> Inspection {
        let slot = SlotKey::new(marketplace.clone(), report);
        self.rejected.remove(&slot);
        let mapping = self
            .mappings
            .entry(slot.clone())
            .or_insert_with(|| MappingSession::new(marketplace.clone(), report));

        match SpreadsheetHandle::new(name, bytes) {
            Ok(handle) => {
                let inspection = self.cache.get_or_inspect(&slot, &handle).clone();
                mapping.attach(handle, &inspection);
                inspection
            }
            Err(e) => {
                tracing::warn!(session = %self.id, %marketplace, %report, file = name, error = %e, "upload rejected");
                self.cache.clear_slot(&slot);
                let inspection = Inspection::sentinel(name, None, &e);
                mapping.reject(&inspection);
                self.rejected.insert(slot, inspection.clone());
                inspection
            }
        }
    }

    /// Attach an already-built handle (files read from disk).
    pub fn upload_handle(
        &mut self,
        marketplace: &Marketplace,
        report: ReportRole,
        handle: SpreadsheetHandle,
    ) -> Inspection {
        let slot = SlotKey::new(marketplace.clone(), report);
        self.rejected.remove(&slot);
        let inspection = self.cache.get_or_inspect(&slot, &handle).clone();
        self.mappings
            .entry(slot)
            .or_insert_with(|| MappingSession::new(marketplace.clone(), report))
            .attach(handle, &inspection);
        inspection
    }

    /// Forget the slot's file and bindings.
    pub fn clear(&mut self, marketplace: &Marketplace, report: ReportRole) {
        let slot = SlotKey::new(marketplace.clone(), report);
        self.cache.clear_slot(&slot);
        self.rejected.remove(&slot);
        if let Some(mapping) = self.mappings.get_mut(&slot) {
            mapping.detach();
        }
    }

    /// The cached inspection for the slot's current upload.
    pub fn inspection(&self, marketplace: &Marketplace, report: ReportRole) -> Option<&Inspection> {
        let slot = SlotKey::new(marketplace.clone(), report);
        self.cache.for_slot(&slot).or_else(|| self.rejected.get(&slot))
    }

    pub fn set_sheet(
        &mut self,
        marketplace: &Marketplace,
        report: ReportRole,
        sheet: &str,
    ) -> Result<(), ValidationError> {
        self.mapping_mut(marketplace, report)?.set_sheet(sheet)
    }

    pub fn set_binding(
        &mut self,
        marketplace: &Marketplace,
        report: ReportRole,
        role: BindingRole,
        column: &str,
    ) -> Result<(), ValidationError> {
        self.mapping_mut(marketplace, report)?.set_binding(role, column)
    }

    pub fn is_complete(&self, marketplace: &Marketplace, report: ReportRole) -> bool {
        self.mapping(marketplace, report).is_some_and(MappingSession::is_complete)
    }

    pub fn mapping(&self, marketplace: &Marketplace, report: ReportRole) -> Option<&MappingSession> {
        self.mappings.get(&SlotKey::new(marketplace.clone(), report))
    }

    /// Marketplaces with at least one slot touched, in name order.
    pub fn marketplaces(&self) -> Vec<Marketplace> {
        let mut out: Vec<Marketplace> = self.mappings.keys().map(|k| k.marketplace.clone()).collect();
        out.dedup();
        out
    }

    /// Every issue blocking reconciliation of `marketplace`, sales first.
    pub fn issues(&self, marketplace: &Marketplace) -> Vec<ValidationIssue> {
        ReportRole::ALL
            .iter()
            .flat_map(|&report| match self.mapping(marketplace, report) {
                Some(m) => m.issues(),
                None => vec![ValidationIssue::NoFile { marketplace: marketplace.clone(), report }],
            })
            .collect()
    }

    /// Reconcile one marketplace. Fails before touching any data when a
    /// mapping is incomplete, listing every outstanding issue.
    pub fn reconcile(
        &self,
        marketplace: &Marketplace,
        options: &ReconOptions,
    ) -> Result<ReconResult, ReconError> {
        let issues = self.issues(marketplace);
        if !issues.is_empty() {
            tracing::debug!(session = %self.id, %marketplace, issues = issues.len(), "reconcile blocked");
            return Err(ValidationError(issues).into());
        }

        let snapshot = |report| {
            self.mapping(marketplace, report)
                .ok_or_else(|| {
                    ValidationError::single(ValidationIssue::NoFile {
                        marketplace: marketplace.clone(),
                        report,
                    })
                })
                .and_then(MappingSession::to_mapping)
        };
        let sales = snapshot(ReportRole::Sales)?;
        let previous = snapshot(ReportRole::PreviousPayments)?;
        let upcoming = snapshot(ReportRole::UpcomingPayments)?;

        engine::reconcile(marketplace, sales, previous, upcoming, options)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cached_files(&self) -> usize {
        self.cache.len()
    }

    fn mapping_mut(
        &mut self,
        marketplace: &Marketplace,
        report: ReportRole,
    ) -> Result<&mut MappingSession, ValidationError> {
        self.mappings
            .get_mut(&SlotKey::new(marketplace.clone(), report))
            .ok_or_else(|| {
                ValidationError::single(ValidationIssue::NoFile {
                    marketplace: marketplace.clone(),
                    report,
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payrecon_io::{ERROR_SENTINEL, UNSELECTED};

    const SALES: &[u8] = b"Order ID,Sale Amount\nS1,1000\nS2,500\n";
    const PREV: &[u8] = b"Order ID,Payment Amount\nS1,700\n";
    const NEXT: &[u8] = b"Order ID,Payment Amount\nS1,300\n";

    fn loaded(m: &Marketplace) -> ReconSession {
        let mut s = ReconSession::new();
        s.upload(m, ReportRole::Sales, "sales.csv", SALES);
        s.upload(m, ReportRole::PreviousPayments, "prev.csv", PREV);
        s.upload(m, ReportRole::UpcomingPayments, "next.csv", NEXT);
        s
    }

    #[test]
    fn end_to_end_unpaid_order() {
        let m = Marketplace::from("Amazon");
        let s = loaded(&m);
        let r = s.reconcile(&m, &ReconOptions::default()).unwrap();
        assert_eq!(r.variance_minor, 50_000);
        assert_eq!(r.discrepancies.len(), 1);
        assert_eq!(r.discrepancies[0].order_id, "S2");
    }

    #[test]
    fn incomplete_marketplace_lists_every_issue() {
        let m = Marketplace::from("Meesho");
        let mut s = ReconSession::new();
        s.upload(&m, ReportRole::Sales, "sales.csv", SALES);
        s.upload(&m, ReportRole::PreviousPayments, "prev.csv", b"ref,value\nS1,1\n".to_vec());

        let err = s.reconcile(&m, &ReconOptions::default()).unwrap_err();
        let ReconError::Validation(v) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert_eq!(v.issues().len(), 3);
        assert!(matches!(
            v.issues()[0],
            ValidationIssue::MissingBinding { report: ReportRole::PreviousPayments, binding: BindingRole::OrderId, .. }
        ));
        assert!(matches!(
            v.issues()[2],
            ValidationIssue::NoFile { report: ReportRole::UpcomingPayments, .. }
        ));
    }

    #[test]
    fn unsupported_upload_yields_sentinel() {
        let m = Marketplace::from("Amazon");
        let mut s = ReconSession::new();
        let i = s.upload(&m, ReportRole::Sales, "sales.pdf", b"%PDF".to_vec());
        assert!(!i.is_ready());
        assert_eq!(i.sheets, vec![ERROR_SENTINEL]);
        assert!(s.inspection(&m, ReportRole::Sales).is_some());
        assert!(!s.is_complete(&m, ReportRole::Sales));
        assert!(matches!(s.issues(&m)[0], ValidationIssue::FileNotReady { .. }));
    }

    #[test]
    fn marketplaces_are_isolated() {
        let amazon = Marketplace::from("Amazon");
        let meesho = Marketplace::from("Meesho");
        let mut s = loaded(&amazon);
        s.upload(&meesho, ReportRole::Sales, "sales.csv", SALES);

        s.set_binding(&meesho, ReportRole::Sales, BindingRole::OrderId, UNSELECTED).unwrap();
        assert!(!s.is_complete(&meesho, ReportRole::Sales));
        assert!(s.is_complete(&amazon, ReportRole::Sales));
        assert_eq!(s.marketplaces(), vec![amazon, meesho]);
    }

    #[test]
    fn same_bytes_in_two_slots_share_one_entry() {
        let m = Marketplace::from("Amazon");
        let mut s = ReconSession::new();
        s.upload(&m, ReportRole::PreviousPayments, "payments.csv", PREV);
        s.upload(&m, ReportRole::UpcomingPayments, "payments.csv", PREV);
        assert_eq!(s.cached_files(), 1);
        assert_eq!(s.cache_stats().hits, 1);
        assert_eq!(s.cache_stats().misses, 1);
    }

    #[test]
    fn same_bytes_under_other_names_stay_apart() {
        let m = Marketplace::from("Amazon");
        let mut s = ReconSession::new();
        s.upload(&m, ReportRole::PreviousPayments, "a.csv", PREV);
        s.upload(&m, ReportRole::UpcomingPayments, "b.csv", PREV);
        assert_eq!(s.cached_files(), 2);
        assert_eq!(s.inspection(&m, ReportRole::PreviousPayments).unwrap().file_name, "a.csv");
        assert_eq!(s.inspection(&m, ReportRole::UpcomingPayments).unwrap().file_name, "b.csv");
    }

    #[test]
    fn replacing_upload_evicts_old_entry() {
        let m = Marketplace::from("Amazon");
        let mut s = ReconSession::new();
        s.upload(&m, ReportRole::Sales, "sales.csv", SALES);
        s.upload(&m, ReportRole::Sales, "sales2.csv", b"Order ID\nX\n".to_vec());
        assert_eq!(s.cached_files(), 1);
        assert_eq!(s.cache_stats().evictions, 1);
        assert_eq!(s.inspection(&m, ReportRole::Sales).unwrap().file_name, "sales2.csv");
    }

    #[test]
    fn operations_on_empty_slot_fail_cleanly() {
        let m = Marketplace::from("Flipkart");
        let mut s = ReconSession::new();
        let err = s.set_sheet(&m, ReportRole::Sales, "Single Sheet").unwrap_err();
        assert!(matches!(err.issues()[0], ValidationIssue::NoFile { .. }));
        assert!(s.mapping(&m, ReportRole::Sales).is_none());
    }

    #[test]
    fn sessions_have_distinct_ids() {
        assert_ne!(ReconSession::new().id(), ReconSession::new().id());
    }
}
