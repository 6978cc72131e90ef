//! Scoped write-protection toggling
//!
//! The protection flag is one processor-wide setting, so toggles serialize
//! through a single mutex and nest through a reference count: the first
//! acquire suppresses protection, the last release restores it, and an
//! inner release never re-protects memory an outer caller still writes.
//! Restoration runs on every exit path via the RAII guard. A restore that
//! fails degrades memory safety for the whole system; it is reported at the
//! highest severity and escalated, never swallowed.

use crate::error::Result;
use crate::host::{ProtectionHost, Region};
use log::error;
use std::sync::Mutex;

#[derive(Default)]
struct ToggleState {
    count: usize,
    region: Option<Region>,
}

/// serialized, reference-counted control over the host protection flag
pub struct ProtectionToggle<'h> {
    host: &'h (dyn ProtectionHost + Sync),
    state: Mutex<ToggleState>,
}

impl<'h> ProtectionToggle<'h> {
    /// toggle over `host`, protection assumed enabled
    pub fn new(host: &'h (dyn ProtectionHost + Sync)) -> Self {
        Self {
            host,
            state: Mutex::new(ToggleState::default()),
        }
    }

    /// suppress write protection over `region`, returning a guard that
    /// restores it when released
    ///
    /// nested acquires share the outermost suppression; only the first
    /// acquire touches the host flag, and the region of a nested acquire
    /// is ignored. the flag is processor-wide, so suppression over one
    /// region already covers every other; a per-region host needs one
    /// toggle per region
    pub fn acquire(&self, region: Region) -> Result<WriteAccess<'_, 'h>> {
        let mut state = self.state.lock().unwrap();
        if state.count == 0 {
            self.host.set_writable(region, true)?;
            state.region = Some(region);
        }
        state.count += 1;
        Ok(WriteAccess { toggle: self })
    }

    /// run `action` with write protection suppressed over `region`
    ///
    /// protection is restored on every exit path. an action error wins over
    /// a restore error in the return value; both are reported.
    pub fn with_write_access<R>(
        &self,
        region: Region,
        action: impl FnOnce() -> Result<R>,
    ) -> Result<R> {
        let guard = self.acquire(region)?;
        let outcome = action();
        let restored = guard.restore();
        match outcome {
            Err(e) => Err(e),
            Ok(value) => restored.map(|()| value),
        }
    }

    /// number of currently outstanding suppressions
    pub fn suppress_count(&self) -> usize {
        self.state.lock().unwrap().count
    }

    fn release(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        debug_assert!(state.count > 0, "release without matching acquire");
        state.count -= 1;
        if state.count > 0 {
            return Ok(());
        }
        let Some(region) = state.region.take() else {
            return Ok(());
        };
        if let Err(e) = self.host.set_writable(region, false) {
            // host memory is left writable; nothing local can fix that
            error!("FATAL: write protection not restored for region at {:#x}: {e}", region.base);
            return Err(e);
        }
        Ok(())
    }
}

/// RAII witness of suppressed write protection
///
/// dropping the guard releases the suppression; [`WriteAccess::restore`]
/// does the same but surfaces a restore failure to the caller
pub struct WriteAccess<'t, 'h> {
    toggle: &'t ProtectionToggle<'h>,
}

impl WriteAccess<'_, '_> {
    /// release explicitly, reporting a failed re-protect
    pub fn restore(self) -> Result<()> {
        let result = self.toggle.release();
        core::mem::forget(self);
        result
    }
}

impl Drop for WriteAccess<'_, '_> {
    fn drop(&mut self) {
        // failure already reported inside release
        let _ = self.toggle.release();
    }
}
