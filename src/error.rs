//! Unified error types for tablehook

use core::fmt;

/// all errors that can occur in tablehook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookError {
    // === resolution ===
    /// dispatch table symbol could not be resolved
    SymbolNotFound { name: String },

    /// the host does not support the requested resolution strategy
    CapabilityUnsupported { strategy: &'static str },

    /// null address where a valid address was expected
    NullAddress { context: &'static str },

    // === table access ===
    /// slot index outside the dispatch table
    SlotOutOfRange { slot: usize, len: usize },

    // === registry ===
    /// slot already has an installed hook
    SlotAlreadyHooked { slot: usize },

    /// no installed record for the slot
    RecordNotFound { slot: usize },

    // === protection ===
    /// write protection could not be suppressed or re-enabled
    ProtectionToggleFailed {
        region_base: usize,
        reason: String,
    },

    // === restore ===
    /// slot value at uninstall did not match the installed pointer
    RestoreConflict {
        slot: usize,
        expected: usize,
        found: usize,
    },

    // === configuration ===
    /// module parameter failed validation
    InvalidParameter {
        name: &'static str,
        reason: String,
    },
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SymbolNotFound { name } => {
                write!(f, "symbol not found: {name}")
            }
            Self::CapabilityUnsupported { strategy } => {
                write!(f, "host does not support {strategy} resolution")
            }
            Self::NullAddress { context } => {
                write!(f, "unexpected null address in {context}")
            }
            Self::SlotOutOfRange { slot, len } => {
                write!(f, "slot {slot} outside table of {len} entries")
            }
            Self::SlotAlreadyHooked { slot } => {
                write!(f, "slot {slot} already hooked")
            }
            Self::RecordNotFound { slot } => {
                write!(f, "no hook record for slot {slot}")
            }
            Self::ProtectionToggleFailed { region_base, reason } => {
                write!(
                    f,
                    "protection toggle failed for region at {region_base:#x}: {reason}"
                )
            }
            Self::RestoreConflict { slot, expected, found } => {
                write!(
                    f,
                    "slot {slot} changed behind us: expected {expected:#x}, found {found:#x}"
                )
            }
            Self::InvalidParameter { name, reason } => {
                write!(f, "invalid parameter {name}: {reason}")
            }
        }
    }
}

impl std::error::Error for HookError {}

/// result type alias using HookError
pub type Result<T> = std::result::Result<T, HookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_restore_conflict() {
        let err = HookError::RestoreConflict {
            slot: 257,
            expected: 0x1000,
            found: 0x2000,
        };
        let text = err.to_string();
        assert!(text.contains("257"));
        assert!(text.contains("0x1000"));
        assert!(text.contains("0x2000"));
    }

    #[test]
    fn test_display_invalid_parameter() {
        let err = HookError::InvalidParameter {
            name: "table_addr",
            reason: "not a hexadecimal address".into(),
        };
        assert!(err.to_string().contains("table_addr"));
    }
}
