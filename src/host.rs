//! Host capability surface
//!
//! The crate treats the privileged environment as an opaque host exposing
//! exactly what the hooking core needs: a way to locate the dispatch table,
//! a write-protection flag over its memory, and the identity of the calling
//! context. Everything else about the host is out of scope.
//!
//! [`MemHost`] is the in-memory reference host. It owns a real slot array,
//! so hooks installed against it exercise the same raw-pointer paths a
//! privileged host would. The demos and the integration tests run on it.

use crate::error::{HookError, Result};
use core::fmt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

/// identity of the execution context issuing a dispatched call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallerId(pub u32);

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// contiguous memory region covered by a protection toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// first byte of the region
    pub base: usize,
    /// length in bytes
    pub len: usize,
}

impl Region {
    /// region covering `len` bytes at `base`
    pub fn new(base: usize, len: usize) -> Self {
        Self { base, len }
    }

    /// region covering exactly one pointer-wide slot of a table
    pub fn of_slot(table_base: usize, slot: usize) -> Self {
        let width = core::mem::size_of::<usize>();
        Self {
            base: table_base + slot * width,
            len: width,
        }
    }
}

/// symbol resolution capabilities of the host
///
/// which of these the host actually supports varies by host version and
/// configuration; the resolver picks a strategy accordingly.
pub trait SymbolSource {
    /// address the host publishes under a fixed identifier, if any
    fn exported(&self, name: &str) -> Option<usize>;

    /// exact-name search of a host-provided name-to-address table
    fn scan(&self, name: &str) -> Option<usize>;

    /// trap a related always-exported routine and capture the address as a
    /// side effect of its invocation, removing the trap afterwards
    ///
    /// hosts without trap support return [`HookError::CapabilityUnsupported`]
    fn probe(&self, name: &str) -> Result<usize>;
}

/// write-protection control over host memory
pub trait ProtectionHost {
    /// flip the protection flag over `region`
    ///
    /// the flag is a single processor-wide setting, so concurrent toggles
    /// must not interleave; callers go through
    /// [`ProtectionToggle`](crate::protect::ProtectionToggle), which
    /// serializes them
    fn set_writable(&self, region: Region, writable: bool) -> Result<()>;
}

/// calling-context identification
pub trait CallerHost {
    /// identity of the currently executing context
    fn caller_identity(&self) -> CallerId;
}

/// full capability set the hooking core needs from a host
pub trait Host: SymbolSource + ProtectionHost + CallerHost {}

impl<T: SymbolSource + ProtectionHost + CallerHost> Host for T {}

/// in-memory reference host
///
/// owns the dispatch table storage, a protection flag, a configurable
/// symbol listing per resolution channel, and a settable caller identity.
/// the protection paths support failure injection so error handling can be
/// exercised from tests.
pub struct MemHost {
    slots: Box<[AtomicUsize]>,
    exported: HashMap<String, usize>,
    listed: HashMap<String, usize>,
    probeable: HashMap<String, usize>,
    probe_supported: bool,
    protected: AtomicBool,
    identity: AtomicU32,
    fail_suppress: AtomicBool,
    fail_restore: AtomicBool,
}

impl MemHost {
    /// host with an all-zero table of `len` slots, protection enabled,
    /// no symbols published
    pub fn new(len: usize) -> Self {
        let slots = (0..len).map(|_| AtomicUsize::new(0)).collect();
        Self {
            slots,
            exported: HashMap::new(),
            listed: HashMap::new(),
            probeable: HashMap::new(),
            probe_supported: false,
            protected: AtomicBool::new(true),
            identity: AtomicU32::new(0),
            fail_suppress: AtomicBool::new(false),
            fail_restore: AtomicBool::new(false),
        }
    }

    /// base address of the table storage
    pub fn table_base(&self) -> usize {
        self.slots.as_ptr() as usize
    }

    /// number of slots
    pub fn table_len(&self) -> usize {
        self.slots.len()
    }

    /// set every slot to `handler`
    pub fn fill_slots(&self, handler: usize) {
        for slot in self.slots.iter() {
            slot.store(handler, Ordering::SeqCst);
        }
    }

    /// write one slot directly, bypassing the protection flag
    ///
    /// this is how a test simulates a third party touching the table.
    /// panics on an out-of-range index; checked access goes through
    /// [`TableView`](crate::table::TableView)
    pub fn poke_slot(&self, index: usize, value: usize) {
        self.slots[index].store(value, Ordering::SeqCst);
    }

    /// read one slot directly
    ///
    /// panics on an out-of-range index, like [`MemHost::poke_slot`]
    pub fn peek_slot(&self, index: usize) -> usize {
        self.slots[index].load(Ordering::SeqCst)
    }

    /// publish the table address as an exported symbol
    pub fn export_symbol(&mut self, name: &str) {
        self.exported.insert(name.to_string(), self.table_base());
    }

    /// publish the table address in the scannable symbol listing only
    pub fn list_symbol(&mut self, name: &str) {
        self.listed.insert(name.to_string(), self.table_base());
    }

    /// enable trap support and make `name` capturable through it
    pub fn allow_probe(&mut self, name: &str) {
        self.probe_supported = true;
        self.probeable.insert(name.to_string(), self.table_base());
    }

    /// set the identity reported for subsequent calls
    pub fn set_identity(&self, id: CallerId) {
        self.identity.store(id.0, Ordering::SeqCst);
    }

    /// current state of the protection flag
    pub fn is_protected(&self) -> bool {
        self.protected.load(Ordering::SeqCst)
    }

    /// make the next suppress request fail
    pub fn fail_next_suppress(&self) {
        self.fail_suppress.store(true, Ordering::SeqCst);
    }

    /// make the next restore request fail
    pub fn fail_next_restore(&self) {
        self.fail_restore.store(true, Ordering::SeqCst);
    }

    fn check_region(&self, region: Region) -> Result<()> {
        let base = self.table_base();
        let end = base + self.slots.len() * core::mem::size_of::<usize>();
        if region.base < base || region.base + region.len > end {
            return Err(HookError::ProtectionToggleFailed {
                region_base: region.base,
                reason: "region outside host table".into(),
            });
        }
        Ok(())
    }
}

impl SymbolSource for MemHost {
    fn exported(&self, name: &str) -> Option<usize> {
        self.exported.get(name).copied()
    }

    fn scan(&self, name: &str) -> Option<usize> {
        self.listed.get(name).copied()
    }

    fn probe(&self, name: &str) -> Result<usize> {
        if !self.probe_supported {
            return Err(HookError::CapabilityUnsupported { strategy: "probe" });
        }
        self.probeable
            .get(name)
            .copied()
            .ok_or_else(|| HookError::SymbolNotFound {
                name: name.to_string(),
            })
    }
}

impl ProtectionHost for MemHost {
    fn set_writable(&self, region: Region, writable: bool) -> Result<()> {
        self.check_region(region)?;
        let injected = if writable {
            self.fail_suppress.swap(false, Ordering::SeqCst)
        } else {
            self.fail_restore.swap(false, Ordering::SeqCst)
        };
        if injected {
            return Err(HookError::ProtectionToggleFailed {
                region_base: region.base,
                reason: "injected toggle failure".into(),
            });
        }
        self.protected.store(!writable, Ordering::SeqCst);
        Ok(())
    }
}

impl CallerHost for MemHost {
    fn caller_identity(&self) -> CallerId {
        CallerId(self.identity.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_of_slot() {
        let width = core::mem::size_of::<usize>();
        let region = Region::of_slot(0x1000, 3);
        assert_eq!(region.base, 0x1000 + 3 * width);
        assert_eq!(region.len, width);
    }

    #[test]
    fn test_memhost_symbol_channels() {
        let mut host = MemHost::new(4);
        assert!(host.exported("table").is_none());
        assert!(host.scan("table").is_none());
        assert!(matches!(
            host.probe("table"),
            Err(HookError::CapabilityUnsupported { .. })
        ));

        host.export_symbol("table");
        host.list_symbol("table");
        host.allow_probe("table");

        assert_eq!(host.exported("table"), Some(host.table_base()));
        assert_eq!(host.scan("table"), Some(host.table_base()));
        assert_eq!(host.probe("table").expect("probe"), host.table_base());
        assert!(matches!(
            host.probe("other"),
            Err(HookError::SymbolNotFound { .. })
        ));
    }

    #[test]
    fn test_memhost_protection_flag() {
        let host = MemHost::new(4);
        let region = Region::of_slot(host.table_base(), 0);

        assert!(host.is_protected());
        host.set_writable(region, true).expect("suppress");
        assert!(!host.is_protected());
        host.set_writable(region, false).expect("restore");
        assert!(host.is_protected());
    }

    #[test]
    fn test_memhost_rejects_foreign_region() {
        let host = MemHost::new(4);
        let foreign = Region::new(host.table_base() + 4096 * 16, 8);
        assert!(host.set_writable(foreign, true).is_err());
    }

    #[test]
    #[should_panic]
    fn test_peek_slot_out_of_range_panics() {
        let host = MemHost::new(4);
        host.peek_slot(4);
    }

    #[test]
    fn test_memhost_failure_injection() {
        let host = MemHost::new(4);
        let region = Region::of_slot(host.table_base(), 0);

        host.fail_next_suppress();
        assert!(host.set_writable(region, true).is_err());
        // injection is one-shot
        assert!(host.set_writable(region, true).is_ok());
        host.set_writable(region, false).expect("restore");
    }
}
