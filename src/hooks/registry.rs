//! Hook install and uninstall.
//!
//! One [`HookSlot`] per configured routine: its trampoline, the entry it
//! displaced, and whether the slot can still be restored. Install and
//! uninstall mutate the registry and are single-writer by construction
//! (`&mut self`); trampoline invocations only read state published at
//! install time and are safe to race against.

use std::sync::Arc;

use log::{debug, error, warn};

use crate::error::HookError;
use crate::hooks::ServiceEntry;
use crate::hooks::dispatch::{DispatchEnv, TrampolineState, make_trampoline};
use crate::hooks::policy::ThreadDirectory;
use crate::hooks::routines::{HookGroup, InstallMethod, Routine};
use crate::hooks::table::{DispatchSnapshot, TableAccessor};
use crate::session::ClientSession;
use crate::version::{self, KernelVersion};

/// Result of installing one routine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The trampoline went in and the displaced entry was saved.
    Installed,
    /// The table already held this trampoline; the previously saved
    /// original was retained instead of the displaced value.
    HazardRetained,
    /// No table index resolved for this kernel version; nothing done.
    SkippedUnresolved,
    /// The routine was already installed; nothing done.
    AlreadyInstalled,
}

struct HookSlot {
    routine: Routine,
    /// Resolved once at construction; `None` leaves an index-installed
    /// routine permanently un-hookable on this kernel.
    index: Option<u16>,
    trampoline: ServiceEntry,
    state: Arc<TrampolineState>,
    installed: bool,
    unrestorable: bool,
}

/// Installs and removes the trampolines for every configured routine.
pub struct HookRegistry {
    table: Arc<dyn TableAccessor>,
    slots: Vec<HookSlot>,
}

impl HookRegistry {
    /// Build a registry for the compiled-in routine groups.
    ///
    /// `snapshot` is the optional pre-hook table capture used for
    /// client bypass routing; `threads` backs the open-thread policy
    /// lookup; `version` pins the indices of index-installed routines.
    pub fn new(
        table: Arc<dyn TableAccessor>,
        session: Arc<ClientSession>,
        snapshot: Option<Arc<DispatchSnapshot>>,
        threads: Arc<dyn ThreadDirectory>,
        version: KernelVersion,
    ) -> Self {
        let env = Arc::new(DispatchEnv {
            session,
            snapshot,
            threads,
        });

        let mut slots = Vec::new();
        let mut unresolved = false;
        for routine in Routine::ALL {
            if !routine.group().enabled() {
                continue;
            }
            let index = version::dispatch_index(version, routine);
            if routine.install_method() == InstallMethod::ByIndex && index.is_none() {
                unresolved = true;
            }
            let state = Arc::new(TrampolineState::new());
            let trampoline = make_trampoline(routine, Arc::clone(&state), Arc::clone(&env));
            slots.push(HookSlot {
                routine,
                index,
                trampoline,
                state,
                installed: false,
                unrestorable: false,
            });
        }
        if unresolved {
            version::log_unsupported(version);
        }

        Self { table, slots }
    }

    /// Install every compiled-in group.
    pub fn install_all(&mut self) {
        for group in HookGroup::ALL {
            self.install_group(group);
        }
    }

    /// Remove every compiled-in group.
    pub fn uninstall_all(&mut self) {
        for group in HookGroup::ALL {
            self.uninstall_group(group);
        }
    }

    /// Install one group. Routines are independent; a failure is logged
    /// and does not stop the rest of the group.
    pub fn install_group(&mut self, group: HookGroup) {
        if !group.enabled() {
            return;
        }
        debug!("hooking {} routines", group.label());
        for routine in self.group_routines(group) {
            if let Err(err) = self.install(routine) {
                error!("installing {} failed: {err}", routine.name());
            }
        }
    }

    /// Remove one group, restoring displaced entries.
    pub fn uninstall_group(&mut self, group: HookGroup) {
        if !group.enabled() {
            return;
        }
        debug!("unhooking {} routines", group.label());
        for routine in self.group_routines(group) {
            if let Err(err) = self.uninstall(routine) {
                error!("restoring {} failed: {err}", routine.name());
            }
        }
    }

    /// Swap in the trampoline for `routine` and save the displaced
    /// entry.
    ///
    /// If the displaced entry turns out to be this registry's own
    /// trampoline, a previous instance's hook was never unwound
    /// properly; adopting it would make the trampoline chain to itself
    /// and recurse without bound on the next call. The previously saved
    /// original is retained instead. If there is none, the slot is
    /// flagged unrestorable and uninstall will refuse to touch it.
    pub fn install(&mut self, routine: Routine) -> Result<InstallOutcome, HookError> {
        let table = Arc::clone(&self.table);
        let slot = self
            .slots
            .iter_mut()
            .find(|slot| slot.routine == routine)
            .ok_or(HookError::NotConfigured(routine))?;

        if slot.installed {
            return Ok(InstallOutcome::AlreadyInstalled);
        }

        let displaced = match routine.install_method() {
            InstallMethod::ByAddress => {
                table.modify_entry_by_call(routine, slot.trampoline.clone())?
            }
            InstallMethod::ByIndex => {
                let Some(index) = slot.index else {
                    return Ok(InstallOutcome::SkippedUnresolved);
                };
                table.modify_entry_by_index(index, slot.trampoline.clone())?
            }
        };

        if displaced == slot.trampoline {
            warn!(
                "entry for {} was already set to its trampoline; keeping the previously saved original",
                routine.name()
            );
            if !slot.state.has_saved() {
                error!(
                    "{} has no known-good original entry; its table slot must not be restored until repaired",
                    routine.name()
                );
                slot.unrestorable = true;
            }
            slot.installed = true;
            return Ok(InstallOutcome::HazardRetained);
        }

        slot.state.save(displaced);
        slot.unrestorable = false;
        slot.installed = true;
        Ok(InstallOutcome::Installed)
    }

    /// Write the saved original back into the table.
    ///
    /// The saved entry survives the uninstall so a later reinstall can
    /// still fall back to it after a hazard.
    pub fn uninstall(&mut self, routine: Routine) -> Result<(), HookError> {
        let table = Arc::clone(&self.table);
        let slot = self
            .slots
            .iter_mut()
            .find(|slot| slot.routine == routine)
            .ok_or(HookError::NotConfigured(routine))?;

        if !slot.installed {
            return Ok(());
        }
        if slot.unrestorable {
            return Err(HookError::Unrestorable(routine));
        }
        let Some(saved) = slot.state.saved() else {
            return Err(HookError::Unrestorable(routine));
        };

        match routine.install_method() {
            InstallMethod::ByAddress => {
                table.restore_entry_by_call(routine, saved, slot.trampoline.clone())?
            }
            InstallMethod::ByIndex => {
                let Some(index) = slot.index else {
                    slot.installed = false;
                    return Ok(());
                };
                table.restore_entry_by_index(index, saved, slot.trampoline.clone())?
            }
        }

        slot.installed = false;
        Ok(())
    }

    /// Whether `routine` currently has its trampoline installed.
    pub fn installed(&self, routine: Routine) -> bool {
        self.slot(routine).is_some_and(|slot| slot.installed)
    }

    /// Whether `routine` is flagged as unsafe to restore.
    pub fn unrestorable(&self, routine: Routine) -> bool {
        self.slot(routine).is_some_and(|slot| slot.unrestorable)
    }

    /// The trampoline entry for `routine`, if configured.
    pub fn trampoline(&self, routine: Routine) -> Option<ServiceEntry> {
        self.slot(routine).map(|slot| slot.trampoline.clone())
    }

    /// The entry displaced at the last effective install, if any.
    pub fn saved_original(&self, routine: Routine) -> Option<ServiceEntry> {
        self.slot(routine).and_then(|slot| slot.state.saved())
    }

    fn slot(&self, routine: Routine) -> Option<&HookSlot> {
        self.slots.iter().find(|slot| slot.routine == routine)
    }

    fn group_routines(&self, group: HookGroup) -> Vec<Routine> {
        self.slots
            .iter()
            .filter(|slot| slot.routine.group() == group)
            .map(|slot| slot.routine)
            .collect()
    }
}
