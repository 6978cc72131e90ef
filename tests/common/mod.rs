//! Shared fixtures for the integration suite
#![allow(dead_code)] // not every test binary uses every fixture

use std::sync::atomic::{AtomicUsize, Ordering};
use tablehook::{CallerId, MemHost, ReportSink, SlotHandler};

/// argument that makes the reference entry return a host error code
pub const POISON_ARG: usize = 0xBAD;

/// report sink that counts matches instead of logging
pub struct CountSink(AtomicUsize);

impl CountSink {
    pub fn new() -> Self {
        Self(AtomicUsize::new(0))
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for CountSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportSink for CountSink {
    fn report(&self, _label: &str, _caller: CallerId) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// reference table entry: sum of the first two arguments, with one poison
/// value that yields a negative host error code
pub unsafe extern "C" fn original_entry(
    a: usize,
    b: usize,
    _c: usize,
    _d: usize,
    _e: usize,
    _f: usize,
) -> isize {
    if a == POISON_ARG {
        return -14;
    }
    a.wrapping_add(b) as isize
}

/// invoke a slot exactly the way the host dispatcher would
pub fn call_through(host: &MemHost, slot: usize, args: [usize; 6]) -> isize {
    let addr = host.peek_slot(slot);
    assert_ne!(addr, 0, "slot must stay callable at every instant");
    // SAFETY: every value the tests put into the table is the address of a
    // function with the slot signature
    let entry: SlotHandler = unsafe { std::mem::transmute(addr) };
    // SAFETY: calling a live table entry with a full argument set is the
    // host's normal dispatch
    unsafe { entry(args[0], args[1], args[2], args[3], args[4], args[5]) }
}
