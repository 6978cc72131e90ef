//! Module load/unload boundary
//!
//! Load resolves the table address once, builds the manager around it and
//! installs the hook; a resolution or parameter failure aborts load with
//! the table untouched. Unload always runs to completion: every slot this
//! module hooked is written back, individual failures are reported at the
//! highest severity, and nothing is silently left behind.

use crate::config::ModuleConfig;
use crate::error::Result;
use crate::host::Host;
use crate::intercept::SlotHook;
use crate::manager::HookManager;
use crate::protect::ProtectionToggle;
use crate::resolver;
use crate::table::TableView;
use log::{error, info};

/// a loaded hooking module
pub struct HookModule<'h> {
    manager: HookManager<'h>,
    config: ModuleConfig,
}

impl<'h> HookModule<'h> {
    /// load boundary: resolve, build, install `hook` on `slot`
    pub fn load<H>(host: &'h H, config: ModuleConfig, slot: usize, hook: &dyn SlotHook) -> Result<Self>
    where
        H: Host + Sync,
    {
        let addr = resolver::resolve(host, config.strategy(), &config.table_symbol)?;
        // SAFETY: the address came from the host's own resolution channels
        // or the operator's validated override, and the host outlives the
        // module; writes only happen under the manager's protection toggle
        let table = unsafe { TableView::from_raw(addr, config.table_len) }?;
        let manager = HookManager::new(table, ProtectionToggle::new(host));
        manager.install(slot, hook)?;
        info!(
            "module loaded: hooked slot {slot} of {}, watching identity {}",
            config.table_symbol, config.watch
        );
        Ok(Self { manager, config })
    }

    /// the manager owning this module's hooks
    pub fn manager(&self) -> &HookManager<'h> {
        &self.manager
    }

    /// the validated load-time parameters
    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    /// unload boundary: restore everything, report what could not be verified
    ///
    /// always completes; returns the number of cleanly restored slots
    pub fn unload(self) -> usize {
        let total = self.manager.hook_count();
        let restored = self.manager.uninstall_all();
        if restored == total {
            info!("module unloaded: all {total} hooks restored");
        } else {
            error!(
                "FATAL: {} of {total} hooks not verifiably restored at unload",
                total - restored
            );
        }
        restored
    }
}
