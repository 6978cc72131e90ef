//! Hook bookkeeping
//!
//! The registry is the single source of truth for which slots this module
//! has hooked, and therefore for what unload must restore. It enforces
//! at-most-one-hook-per-slot at the point of registration: the check and
//! the insert are one step, so two install attempts cannot both pass.

use crate::error::{HookError, Result};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// lifecycle of a hook record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookState {
    /// record created, table untouched
    Uninstalled,
    /// substitution live in the table
    Installed,
    /// original pointer written back and verified
    Restored,
    /// restore ran against an unexpected slot value
    Corrupted,
}

/// bookkeeping for one hooked slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookRecord {
    /// table slot index
    pub slot: usize,
    /// pointer displaced by the hook
    pub original: usize,
    /// pointer written into the slot
    pub installed: usize,
    /// current lifecycle state
    pub state: HookState,
}

impl HookRecord {
    /// fresh record, not yet installed
    pub fn new(slot: usize, original: usize, installed: usize) -> Self {
        Self {
            slot,
            original,
            installed,
            state: HookState::Uninstalled,
        }
    }
}

/// registry of hooked slots
#[derive(Default)]
pub struct HookRegistry {
    by_slot: HashMap<usize, HookRecord>,
}

impl HookRegistry {
    /// empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// register a record, rejecting a slot that already has one
    pub fn register(&mut self, record: HookRecord) -> Result<()> {
        match self.by_slot.entry(record.slot) {
            Entry::Occupied(_) => Err(HookError::SlotAlreadyHooked { slot: record.slot }),
            Entry::Vacant(entry) => {
                entry.insert(record);
                Ok(())
            }
        }
    }

    /// remove and return the record for `slot`
    pub fn unregister(&mut self, slot: usize) -> Result<HookRecord> {
        self.by_slot
            .remove(&slot)
            .ok_or(HookError::RecordNotFound { slot })
    }

    /// record for `slot`, if any
    pub fn get(&self, slot: usize) -> Option<&HookRecord> {
        self.by_slot.get(&slot)
    }

    /// check if a slot has a record
    pub fn is_hooked(&self, slot: usize) -> bool {
        self.by_slot.contains_key(&slot)
    }

    /// snapshot of all records
    pub fn active(&self) -> Vec<HookRecord> {
        self.by_slot.values().cloned().collect()
    }

    /// snapshot of all hooked slot indices
    pub fn slots(&self) -> Vec<usize> {
        self.by_slot.keys().copied().collect()
    }

    /// number of records
    pub fn count(&self) -> usize {
        self.by_slot.len()
    }

    /// check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.by_slot.is_empty()
    }
}
