//! Dispatch table access
//!
//! A raw, fixed-length view over the host-owned dispatch table. Every slot
//! access is a single pointer-wide atomic operation, so a concurrent reader
//! can never observe a torn value. This is the property the whole crate
//! exists to preserve; nothing else is allowed to write the table.

use crate::error::{HookError, Result};
use crate::host::Region;
use core::sync::atomic::{AtomicUsize, Ordering};

/// view over a host-owned dispatch table
pub struct TableView {
    base: *const AtomicUsize,
    len: usize,
}

// SAFETY: the view reaches the table only through atomic operations, and
// the from_raw contract makes the caller guarantee the memory outlives the
// view; sharing it across threads adds no new hazard
unsafe impl Send for TableView {}
unsafe impl Sync for TableView {}

impl TableView {
    /// build a view over `len` pointer-wide slots at `base`
    ///
    /// # Safety
    /// `base` must point to `len` pointer-wide, pointer-aligned slots that
    /// remain valid for the lifetime of the view, and slot writes must only
    /// happen while the host has granted write access over the slot
    pub unsafe fn from_raw(base: usize, len: usize) -> Result<Self> {
        if base == 0 {
            return Err(HookError::NullAddress {
                context: "table base",
            });
        }
        if len == 0 {
            return Err(HookError::InvalidParameter {
                name: "table_len",
                reason: "table must have at least one slot".into(),
            });
        }
        Ok(Self {
            base: base as *const AtomicUsize,
            len,
        })
    }

    /// number of slots
    pub fn len(&self) -> usize {
        self.len
    }

    /// check if the view is empty (never true for a constructed view)
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// base address of the table
    pub fn base(&self) -> usize {
        self.base as usize
    }

    fn slot_ref(&self, index: usize) -> Result<&AtomicUsize> {
        if index >= self.len {
            return Err(HookError::SlotOutOfRange {
                slot: index,
                len: self.len,
            });
        }
        // SAFETY: index is in bounds and from_raw guarantees the slot memory
        // is valid for the view's lifetime
        Ok(unsafe { &*self.base.add(index) })
    }

    /// current value of a slot (single atomic load)
    pub fn read_slot(&self, index: usize) -> Result<usize> {
        Ok(self.slot_ref(index)?.load(Ordering::SeqCst))
    }

    /// substitute a slot value (single atomic store)
    ///
    /// # Safety
    /// the caller must hold write access over the slot's region, and `value`
    /// must be the address of a function matching the table's entry signature
    pub unsafe fn write_slot(&self, index: usize, value: usize) -> Result<()> {
        if value == 0 {
            return Err(HookError::NullAddress {
                context: "slot write",
            });
        }
        self.slot_ref(index)?.store(value, Ordering::SeqCst);
        Ok(())
    }

    /// region covering one slot, for protection toggling
    pub fn slot_region(&self, index: usize) -> Result<Region> {
        if index >= self.len {
            return Err(HookError::SlotOutOfRange {
                slot: index,
                len: self.len,
            });
        }
        Ok(Region::of_slot(self.base as usize, index))
    }
}
