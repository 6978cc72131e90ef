#![deny(unsafe_op_in_unsafe_fn)]
#![allow(clippy::missing_safety_doc)] // we document safety in SAFETY comments

//! tablehook: hooking primitives for privileged dispatch tables
//!
//! The host routes numbered operations through a table of function
//! pointers. This crate substitutes individual entries while every thread
//! in the system may be issuing the intercepted operation concurrently,
//! and guarantees the table is put back bit for bit before the hooking
//! module goes away. It provides:
//!
//! - Table address resolution across host configurations (exported
//!   symbol, symbol-table scan, trap-based capture, explicit override)
//! - Scoped, serialized, reference-counted write-protection toggling
//! - Atomic pointer-wide slot substitution: callers see the old entry or
//!   the new one, never a torn value
//! - A registry enforcing at most one hook per slot, consulted at unload
//!   to restore everything this module touched
//! - Transparent interception: filter on caller identity, report matches,
//!   forward untouched arguments and propagate the return value byte for
//!   byte
//!
//! The privileged environment is abstracted as a [`host::Host`]; the
//! in-memory [`host::MemHost`] backs the demos and tests.

pub mod config;
pub mod error;
pub mod host;
pub mod intercept;
pub mod manager;
pub mod module;
pub mod protect;
pub mod registry;
pub mod resolver;
pub mod table;

// re-exports for convenience
pub use config::ModuleConfig;
pub use error::{HookError, Result};
pub use host::{CallerHost, CallerId, Host, MemHost, ProtectionHost, Region, SymbolSource};
pub use intercept::{handler_addr, CallerFilter, Interceptor, LogSink, ReportSink, SlotHandler, SlotHook};
pub use manager::HookManager;
pub use module::HookModule;
pub use protect::{ProtectionToggle, WriteAccess};
pub use registry::{HookRecord, HookRegistry, HookState};
pub use resolver::ResolveStrategy;
pub use table::TableView;

/// library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
