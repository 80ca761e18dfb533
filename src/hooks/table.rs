//! The dispatch-table seam.
//!
//! The registry never touches table memory itself; it goes through a
//! [`TableAccessor`], injected by the surrounding driver and replaced by
//! a fake in tests. Restore calls carry the entry the caller believes it
//! installed so the accessor can notice tampering by other agents.

use std::collections::HashMap;

use crate::error::HookError;
use crate::hooks::ServiceEntry;
use crate::hooks::routines::Routine;

/// Reads and writes single dispatch-table entries.
///
/// `modify_*` swaps in `new` and returns the displaced entry. `restore_*`
/// writes `old` back; `current` is the entry the caller installed, for
/// tamper detection below this layer.
pub trait TableAccessor: Send + Sync {
    /// Locate the slot from the routine's public call stub and swap it.
    fn modify_entry_by_call(
        &self,
        routine: Routine,
        new: ServiceEntry,
    ) -> Result<ServiceEntry, HookError>;

    /// Swap the slot at a numeric table index.
    fn modify_entry_by_index(
        &self,
        index: u16,
        new: ServiceEntry,
    ) -> Result<ServiceEntry, HookError>;

    fn restore_entry_by_call(
        &self,
        routine: Routine,
        old: ServiceEntry,
        current: ServiceEntry,
    ) -> Result<(), HookError>;

    fn restore_entry_by_index(
        &self,
        index: u16,
        old: ServiceEntry,
        current: ServiceEntry,
    ) -> Result<(), HookError>;
}

/// A read-only copy of dispatch-table entries captured before any hook
/// was installed.
///
/// Owned by the surrounding driver; the interception layer only reads
/// through it. Presence of a snapshot at all is the routing gate; a
/// routine missing from the captured subset simply routes like any
/// non-client call.
#[derive(Default)]
pub struct DispatchSnapshot {
    entries: HashMap<Routine, ServiceEntry>,
}

impl DispatchSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the pre-hook entry for `routine`.
    pub fn record(&mut self, routine: Routine, entry: ServiceEntry) {
        self.entries.insert(routine, entry);
    }

    /// The captured entry for `routine`, if it was part of the subset.
    pub fn entry(&self, routine: Routine) -> Option<ServiceEntry> {
        self.entries.get(&routine).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
