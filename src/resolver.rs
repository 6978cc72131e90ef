//! Dispatch table address resolution
//!
//! How the table address can be obtained varies by host version and
//! configuration: some hosts export the symbol, some only list it in a
//! scannable symbol table, some can capture it through a one-shot trap on a
//! related exported routine. The resolver expresses that choice as a tagged
//! strategy selected once at load time, and it fails closed: a guessed
//! address gets executed as code, so no strategy is allowed to guess.

use crate::error::{HookError, Result};
use crate::host::SymbolSource;
use log::debug;

/// how to locate the dispatch table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStrategy {
    /// operator supplied the address directly (fastest, least safe)
    Explicit(usize),
    /// the host publishes the address under the symbolic name
    Exported,
    /// exact-name search of the host's symbol listing
    Scan,
    /// one-shot trap on a related exported routine captures the address
    Probe,
    /// try Exported, then Scan, then Probe; first hit wins
    Auto,
}

/// resolve `name` to an address using `strategy`
///
/// deterministic for a given host configuration; returns
/// [`HookError::SymbolNotFound`] when the strategy cannot produce an address
pub fn resolve<S>(host: &S, strategy: ResolveStrategy, name: &str) -> Result<usize>
where
    S: SymbolSource + ?Sized,
{
    match strategy {
        ResolveStrategy::Explicit(addr) => {
            if addr == 0 {
                return Err(HookError::NullAddress {
                    context: "explicit table override",
                });
            }
            debug!("resolved {name} at {addr:#x} via explicit override");
            Ok(addr)
        }
        ResolveStrategy::Exported => {
            let addr = host.exported(name).ok_or_else(|| not_found(name))?;
            debug!("resolved {name} at {addr:#x} via exported symbol");
            Ok(addr)
        }
        ResolveStrategy::Scan => {
            let addr = host.scan(name).ok_or_else(|| not_found(name))?;
            debug!("resolved {name} at {addr:#x} via symbol table scan");
            Ok(addr)
        }
        ResolveStrategy::Probe => {
            let addr = host.probe(name)?;
            debug!("resolved {name} at {addr:#x} via probe capture");
            Ok(addr)
        }
        ResolveStrategy::Auto => {
            if let Some(addr) = host.exported(name) {
                debug!("resolved {name} at {addr:#x} via exported symbol");
                return Ok(addr);
            }
            if let Some(addr) = host.scan(name) {
                debug!("resolved {name} at {addr:#x} via symbol table scan");
                return Ok(addr);
            }
            match host.probe(name) {
                Ok(addr) => {
                    debug!("resolved {name} at {addr:#x} via probe capture");
                    Ok(addr)
                }
                // a host without trap support simply lacks the capability;
                // Auto falls through to the closed failure
                Err(HookError::CapabilityUnsupported { .. }) => Err(not_found(name)),
                Err(e) => Err(e),
            }
        }
    }
}

fn not_found(name: &str) -> HookError {
    HookError::SymbolNotFound {
        name: name.to_string(),
    }
}
