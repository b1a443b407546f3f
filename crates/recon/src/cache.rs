//! Per-session memo of upload introspection.
//!
//! Keyed by content identity plus declared file name: the name decides the
//! format and is reported back in the inspection, so two uploads share an
//! entry only when both match. Each logical slot
//! (marketplace, report) remembers which file it holds; replacing the file
//! evicts the old entry once no slot references it.

use std::collections::HashMap;

use payrecon_io::{inspect_handle, FileId, Inspection, SpreadsheetHandle};

use crate::model::{Marketplace, ReportRole};

/// Upload slot of one report within one marketplace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    pub marketplace: Marketplace,
    pub report: ReportRole,
}

impl SlotKey {
    pub fn new(marketplace: Marketplace, report: ReportRole) -> Self {
        Self { marketplace, report }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// What makes two uploads the same file for inspection purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EntryKey {
    id: FileId,
    name: String,
}

impl EntryKey {
    fn of(handle: &SpreadsheetHandle) -> Self {
        Self { id: handle.id(), name: handle.name().to_string() }
    }
}

#[derive(Debug, Default)]
pub struct IntrospectionCache {
    entries: HashMap<EntryKey, Inspection>,
    slots: HashMap<SlotKey, EntryKey>,
    stats: CacheStats,
}

impl IntrospectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspection of `handle` as the current file of `slot`, parsing only on
    /// first sight of this content.
    pub fn get_or_inspect(&mut self, slot: &SlotKey, handle: &SpreadsheetHandle) -> &Inspection {
        let key = EntryKey::of(handle);
        let id = key.id;

        if let Some(previous) = self.slots.insert(slot.clone(), key.clone()) {
            if previous != key {
                self.evict_if_unreferenced(previous);
            }
        }

        if self.entries.contains_key(&key) {
            self.stats.hits += 1;
            tracing::debug!(file = handle.name(), id = %id.short(), "introspection cache hit");
        } else {
            self.stats.misses += 1;
            tracing::debug!(file = handle.name(), id = %id.short(), "introspection cache miss");
            self.entries.insert(key.clone(), inspect_handle(handle));
        }

        // Entry inserted above when absent
        &self.entries[&key]
    }

    /// Cached inspection of the file currently held by `slot`.
    pub fn for_slot(&self, slot: &SlotKey) -> Option<&Inspection> {
        self.slots.get(slot).and_then(|key| self.entries.get(key))
    }

    /// Forget the slot's file, evicting its entry if nothing else uses it.
    pub fn clear_slot(&mut self, slot: &SlotKey) {
        if let Some(key) = self.slots.remove(slot) {
            self.evict_if_unreferenced(key);
        }
    }

    fn evict_if_unreferenced(&mut self, key: EntryKey) {
        if !self.slots.values().any(|v| *v == key) && self.entries.remove(&key).is_some() {
            self.stats.evictions += 1;
            tracing::debug!(file = %key.name, id = %key.id.short(), "introspection cache eviction");
        }
    }

    /// Whether an inspection of this exact upload is held.
    pub fn contains(&self, handle: &SpreadsheetHandle) -> bool {
        self.entries.contains_key(&EntryKey::of(handle))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}
