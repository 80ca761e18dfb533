//! Trampoline construction and routing.
//!
//! A trampoline is the entry installed into the dispatch table for one
//! routine. Invocation is a pure routing decision:
//!
//! 1. Calls from the trusted client, when a pre-hook snapshot exists,
//!    go straight to the snapshot entry, bypassing every agent's hooks.
//! 2. Everything else chains to the entry this driver displaced at
//!    install time, composing with other interception agents.
//!
//! The saved entry is published at install and not mutated again until
//! uninstall; invocations only ever read it.

use std::sync::{Arc, RwLock};

use crate::hooks::policy::{self, PolicyAction, ThreadDirectory};
use crate::hooks::routines::Routine;
use crate::hooks::table::DispatchSnapshot;
use crate::hooks::{CallContext, ServiceEntry, ServiceRequest};
use crate::session::ClientSession;
use crate::status::{self, NtStatus};

/// Shared state read by every trampoline invocation.
pub(crate) struct DispatchEnv {
    pub(crate) session: Arc<ClientSession>,
    pub(crate) snapshot: Option<Arc<DispatchSnapshot>>,
    pub(crate) threads: Arc<dyn ThreadDirectory>,
}

impl DispatchEnv {
    fn snapshot_entry(&self, routine: Routine) -> Option<ServiceEntry> {
        self.snapshot.as_ref().and_then(|snap| snap.entry(routine))
    }

    fn is_client(&self, cx: &CallContext) -> bool {
        self.session.current() == Some(cx.caller)
    }
}

/// Per-routine trampoline state: the entry displaced at install time.
///
/// Survives uninstall so a later reinstall that trips the re-entrancy
/// hazard can fall back to the last known-good original.
pub(crate) struct TrampolineState {
    saved: RwLock<Option<ServiceEntry>>,
}

impl TrampolineState {
    pub(crate) fn new() -> Self {
        Self {
            saved: RwLock::new(None),
        }
    }

    pub(crate) fn saved(&self) -> Option<ServiceEntry> {
        self.saved
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub(crate) fn save(&self, entry: ServiceEntry) {
        *self
            .saved
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(entry);
    }

    pub(crate) fn has_saved(&self) -> bool {
        self.saved().is_some()
    }
}

/// The boundary remap: internal policy verdicts become wire statuses
/// here and nowhere else. Denial leaves the driver disguised as an
/// unimplemented call.
fn resolve(action: PolicyAction, genuine: NtStatus) -> NtStatus {
    match action {
        PolicyAction::Forward => genuine,
        PolicyAction::Deny => status::STATUS_NOT_IMPLEMENTED,
        PolicyAction::Fail(failed) => failed,
    }
}

/// Build the trampoline entry for `routine`.
pub(crate) fn make_trampoline(
    routine: Routine,
    state: Arc<TrampolineState>,
    env: Arc<DispatchEnv>,
) -> ServiceEntry {
    ServiceEntry::new(move |cx, request| {
        if routine == Routine::OpenProcess {
            match policy::screen_open_process(cx, request, &env) {
                PolicyAction::Forward => {}
                action => return resolve(action, status::STATUS_SUCCESS),
            }
        }

        if env.is_client(cx) {
            if let Some(entry) = env.snapshot_entry(routine) {
                return entry.invoke(cx, request);
            }
        }

        let Some(original) = state.saved() else {
            // Reachable only after an unrestorable-hazard install left
            // this routine with no displaced entry. The snapshot is the
            // one safe forwarding target; without it the call fails
            // with the same unremarkable status a denial uses.
            return match env.snapshot_entry(routine) {
                Some(entry) => entry.invoke(cx, request),
                None => status::STATUS_NOT_IMPLEMENTED,
            };
        };

        let genuine = original.invoke(cx, request);

        if routine == Routine::OpenThread {
            let action = policy::filter_open_thread(cx, request, genuine, &env);
            return resolve(action, genuine);
        }

        genuine
    })
}
