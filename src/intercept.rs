//! Intercepted-call handling
//!
//! The substituted slot entry wraps the preserved original: evaluate the
//! filter against the caller's identity, optionally report, then forward
//! with untouched arguments and propagate the return value byte for byte,
//! error codes included. A non-matching caller pays one predicate
//! evaluation and one indirect call. Nothing on this path blocks or sleeps.

use crate::host::CallerId;
use core::sync::atomic::{AtomicUsize, Ordering};
use log::info;

/// calling convention of a dispatch table entry
///
/// six machine-word arguments in, signed machine word out; negative values
/// carry host error codes
pub type SlotHandler =
    unsafe extern "C" fn(usize, usize, usize, usize, usize, usize) -> isize;

/// slot value for a handler function
pub fn handler_addr(handler: SlotHandler) -> usize {
    handler as usize
}

/// immutable filter predicate over caller identity
///
/// configured once at load time; a pure equality check thereafter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerFilter {
    target: CallerId,
}

impl CallerFilter {
    /// filter that matches exactly `target`
    pub fn watch(target: CallerId) -> Self {
        Self { target }
    }

    /// evaluate the predicate
    pub fn matches(&self, caller: CallerId) -> bool {
        caller == self.target
    }

    /// identity the filter watches
    pub fn target(&self) -> CallerId {
        self.target
    }
}

/// write-only sink for reported interceptions
///
/// implementations must not block and must not influence the intercepted
/// call in any observable way
pub trait ReportSink: Sync {
    /// record one matched call
    fn report(&self, label: &str, caller: CallerId);
}

/// sink that emits one log line per matched call
pub struct LogSink;

impl ReportSink for LogSink {
    fn report(&self, label: &str, caller: CallerId) {
        info!("{label}: intercepted call from {caller}");
    }
}

/// seam between the manager and a substituted entry
///
/// the manager primes the hook with the displaced pointer before the swap
/// is published, so no caller can ever race into an unset forward target
pub trait SlotHook {
    /// address to write into the slot
    fn entry(&self) -> usize;

    /// receive the displaced pointer; called before the swap is published
    fn prime(&self, original: usize);
}

/// forwarding core behind a substituted slot entry
///
/// the embedding `extern "C"` function obtains the caller identity from the
/// host and delegates here; see `demos/watch_caller.rs` for the wiring
pub struct Interceptor<S: ReportSink> {
    entry: usize,
    original: AtomicUsize,
    filter: CallerFilter,
    label: &'static str,
    sink: S,
}

impl<S: ReportSink> Interceptor<S> {
    /// interceptor that installs `entry` and reports matched calls as `label`
    pub fn new(entry: SlotHandler, filter: CallerFilter, label: &'static str, sink: S) -> Self {
        Self {
            entry: handler_addr(entry),
            original: AtomicUsize::new(0),
            filter,
            label,
            sink,
        }
    }

    /// pointer this hook displaced, zero until primed
    pub fn original(&self) -> usize {
        self.original.load(Ordering::Acquire)
    }

    /// filter the interceptor applies
    pub fn filter(&self) -> CallerFilter {
        self.filter
    }

    /// the sink matched calls are reported to
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// evaluate the filter, report a match, forward untouched
    ///
    /// must only run while installed: the manager primes the forward target
    /// before publishing the swap, so a live slot always finds it set
    pub fn dispatch(&self, caller: CallerId, args: [usize; 6]) -> isize {
        if self.filter.matches(caller) {
            self.sink.report(self.label, caller);
        }
        let original = self.original.load(Ordering::Acquire);
        debug_assert!(original != 0, "dispatch before prime");
        // SAFETY: original is the pointer read out of the slot at install
        // time, so it has the slot signature; prime happens before the swap
        // publishes this entry, so it is non-zero on every reachable path
        let forward: SlotHandler = unsafe { core::mem::transmute(original) };
        // SAFETY: forwarding the untouched argument set to the displaced
        // handler is exactly the call the host would have made
        unsafe { forward(args[0], args[1], args[2], args[3], args[4], args[5]) }
    }
}

impl<S: ReportSink> SlotHook for Interceptor<S> {
    fn entry(&self) -> usize {
        self.entry
    }

    fn prime(&self, original: usize) {
        self.original.store(original, Ordering::Release);
    }
}
