//! Hook orchestration
//!
//! Owns the swap-and-restore protocol. Install: read the displaced pointer,
//! register the record, prime the hook, substitute with one pointer-wide
//! atomic store under write access; a registry rejection aborts before the
//! table is touched. Uninstall re-reads the slot first: a value other than
//! ours means a third party wrote the table behind us. That conflict is
//! reported and the original is still written back, because leaving our
//! entry dangling after unload is worse than clobbering theirs.

use crate::error::{HookError, Result};
use crate::intercept::SlotHook;
use crate::protect::ProtectionToggle;
use crate::registry::{HookRecord, HookRegistry, HookState};
use crate::table::TableView;
use log::{error, info, warn};
use std::sync::Mutex;

/// install/uninstall orchestrator for one dispatch table
pub struct HookManager<'h> {
    table: TableView,
    toggle: ProtectionToggle<'h>,
    registry: Mutex<HookRegistry>,
    corrupted: Mutex<Vec<HookRecord>>,
}

impl<'h> HookManager<'h> {
    /// manager over an already-resolved table
    ///
    /// resolution happens once, at module load; the manager keeps the view
    /// for its whole lifetime
    pub fn new(table: TableView, toggle: ProtectionToggle<'h>) -> Self {
        Self {
            table,
            toggle,
            registry: Mutex::new(HookRegistry::new()),
            corrupted: Mutex::new(Vec::new()),
        }
    }

    /// the managed table
    pub fn table(&self) -> &TableView {
        &self.table
    }

    /// the protection toggle serializing table writes
    pub fn toggle(&self) -> &ProtectionToggle<'h> {
        &self.toggle
    }

    /// number of currently installed hooks
    pub fn hook_count(&self) -> usize {
        self.registry.lock().unwrap().count()
    }

    /// snapshot of currently installed records
    pub fn active_hooks(&self) -> Vec<HookRecord> {
        self.registry.lock().unwrap().active()
    }

    /// records that finished Corrupted, retained for diagnostics
    pub fn corrupted_records(&self) -> Vec<HookRecord> {
        self.corrupted.lock().unwrap().clone()
    }

    /// substitute `hook` into `slot`
    ///
    /// on success the returned record is Installed and the slot serves the
    /// hook's entry; on any error the table and registry are as before,
    /// except that a failed protection restore leaves the hook live and
    /// registered so unload can still put the slot back
    pub fn install(&self, slot: usize, hook: &dyn SlotHook) -> Result<HookRecord> {
        let entry = hook.entry();
        if entry == 0 {
            return Err(HookError::NullAddress {
                context: "hook entry",
            });
        }

        let original = self.table.read_slot(slot)?;
        if original == 0 {
            return Err(HookError::NullAddress {
                context: "slot original",
            });
        }

        let region = self.table.slot_region(slot)?;

        let mut record = HookRecord::new(slot, original, entry);
        record.state = HookState::Installed;
        self.registry.lock().unwrap().register(record.clone())?;

        // the forward target must be set before any caller can reach the
        // entry through the table
        hook.prime(original);

        let access = match self.toggle.acquire(region) {
            Ok(access) => access,
            Err(e) => {
                self.registry.lock().unwrap().unregister(slot).ok();
                return Err(e);
            }
        };
        // SAFETY: write access is held over the slot region and entry is a
        // handler with the slot signature; the store is a single atomic
        // pointer-wide write, so concurrent readers see old or new, never
        // a mixture
        let written = unsafe { self.table.write_slot(slot, entry) };
        let restored = access.restore();

        if let Err(e) = written {
            self.registry.lock().unwrap().unregister(slot).ok();
            return Err(e);
        }
        if let Err(e) = restored {
            // hook is live; keep the record so unload still restores the slot
            warn!("hook on slot {slot} installed but protection restore failed");
            return Err(e);
        }

        info!("installed hook on slot {slot}: {original:#x} -> {entry:#x}");
        Ok(record)
    }

    /// write the displaced pointer back into `slot`
    ///
    /// runs to completion once initiated: even when the slot no longer
    /// holds our entry, the original is written back best-effort and the
    /// record finishes Corrupted instead of Restored
    pub fn uninstall(&self, slot: usize) -> Result<HookRecord> {
        let region = self.table.slot_region(slot)?;
        let mut record = self.registry.lock().unwrap().unregister(slot)?;
        let found = self.table.read_slot(slot)?;

        let access = match self.toggle.acquire(region) {
            Ok(access) => access,
            Err(e) => {
                self.registry.lock().unwrap().register(record).ok();
                return Err(e);
            }
        };
        // SAFETY: write access is held over the slot region and original is
        // the value the slot held before install, preserved in the record
        let written = unsafe { self.table.write_slot(slot, record.original) };
        let restored = access.restore();

        if let Err(e) = written {
            record.state = HookState::Corrupted;
            error!("slot {slot} could not be restored: {e}");
            self.corrupted.lock().unwrap().push(record);
            return Err(e);
        }

        if found != record.installed {
            let conflict = HookError::RestoreConflict {
                slot,
                expected: record.installed,
                found,
            };
            record.state = HookState::Corrupted;
            error!("{conflict}; original written back anyway");
            self.corrupted.lock().unwrap().push(record);
            return Err(conflict);
        }

        record.state = HookState::Restored;
        restored?;
        info!("restored slot {slot} to {:#x}", record.original);
        Ok(record)
    }

    /// restore every installed hook, never stopping at an individual failure
    ///
    /// called from the module-unload boundary; returns the number of slots
    /// that restored cleanly
    pub fn uninstall_all(&self) -> usize {
        let slots = self.registry.lock().unwrap().slots();
        let mut restored = 0;
        for slot in slots {
            match self.uninstall(slot) {
                Ok(_) => restored += 1,
                Err(e) => error!("unload: slot {slot} not cleanly restored: {e}"),
            }
        }
        restored
    }
}
