//! Load-time configuration
//!
//! The module takes textual parameters at load: the identity to watch, the
//! table symbol and length, and optionally an explicit table address
//! override. Validation is all-or-nothing; a bad value fails load with a
//! descriptive error instead of partially initializing anything.

use crate::error::{HookError, Result};
use crate::host::CallerId;
use crate::resolver::ResolveStrategy;

/// validated module parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleConfig {
    /// identity whose calls get reported
    pub watch: CallerId,
    /// symbolic name of the dispatch table
    pub table_symbol: String,
    /// number of slots in the table
    pub table_len: usize,
    /// operator-supplied table address, bypassing resolution
    pub table_addr: Option<usize>,
}

impl ModuleConfig {
    /// configuration with host-side resolution
    pub fn new(watch: CallerId, table_symbol: &str, table_len: usize) -> Result<Self> {
        if table_symbol.is_empty() {
            return Err(HookError::InvalidParameter {
                name: "table_symbol",
                reason: "must not be empty".into(),
            });
        }
        if table_len == 0 {
            return Err(HookError::InvalidParameter {
                name: "table_len",
                reason: "table must have at least one slot".into(),
            });
        }
        Ok(Self {
            watch,
            table_symbol: table_symbol.to_string(),
            table_len,
            table_addr: None,
        })
    }

    /// parse and validate textual module parameters
    ///
    /// `table_addr` accepts a `0x`-prefixed hexadecimal or a decimal
    /// address; `None` means resolve through the host
    pub fn from_params(
        watch: &str,
        table_symbol: &str,
        table_len: &str,
        table_addr: Option<&str>,
    ) -> Result<Self> {
        let watch = CallerId(parse_u32("watch_id", watch)?);
        let table_len = parse_usize("table_len", table_len)?;
        let mut config = Self::new(watch, table_symbol, table_len)?;
        if let Some(text) = table_addr {
            config.table_addr = Some(parse_address("table_addr", text)?);
        }
        Ok(config)
    }

    /// resolution strategy implied by the parameters
    ///
    /// an explicit override wins; otherwise the resolver tries the host's
    /// channels in capability order
    pub fn strategy(&self) -> ResolveStrategy {
        match self.table_addr {
            Some(addr) => ResolveStrategy::Explicit(addr),
            None => ResolveStrategy::Auto,
        }
    }
}

fn parse_u32(name: &'static str, text: &str) -> Result<u32> {
    text.trim()
        .parse::<u32>()
        .map_err(|e| HookError::InvalidParameter {
            name,
            reason: format!("{text:?}: {e}"),
        })
}

fn parse_usize(name: &'static str, text: &str) -> Result<usize> {
    text.trim()
        .parse::<usize>()
        .map_err(|e| HookError::InvalidParameter {
            name,
            reason: format!("{text:?}: {e}"),
        })
}

fn parse_address(name: &'static str, text: &str) -> Result<usize> {
    let trimmed = text.trim();
    let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => trimmed.parse::<usize>(),
    };
    let addr = parsed.map_err(|e| HookError::InvalidParameter {
        name,
        reason: format!("{text:?}: {e}"),
    })?;
    if addr == 0 {
        return Err(HookError::InvalidParameter {
            name,
            reason: "address must be non-zero".into(),
        });
    }
    Ok(addr)
}
