//! Client-identity policy for the two open routines.
//!
//! The trusted client's process must not be reachable through handles
//! acquired by other processes. Denials are never announced as denials:
//! the caller sees a status chosen to look like a capability gap.

use crate::hooks::dispatch::DispatchEnv;
use crate::hooks::{CallContext, ServiceRequest};
use crate::status::{self, NtStatus};

/// Injected lookup over live thread handles. Models the object-manager
/// calls the real driver would make to resolve a handle it did not
/// create.
pub trait ThreadDirectory: Send + Sync {
    /// Process owning the thread behind `handle`.
    fn process_of_thread(
        &self,
        handle: crate::hooks::Handle,
    ) -> Result<crate::session::Pid, NtStatus>;

    /// Release the handle.
    fn close(&self, handle: crate::hooks::Handle);
}

/// What the policy decided about one call.
///
/// `Deny` stays a distinct variant through the whole layer; only the
/// trampoline boundary maps it onto the disguised status.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum PolicyAction {
    /// No objection; continue with the genuine result.
    Forward,
    /// Deny the call, disguised at the boundary.
    Deny,
    /// Fail the call with this exact status.
    Fail(NtStatus),
}

/// Open-process guard, evaluated before the call is routed anywhere.
///
/// A caller that is neither the client nor a system thread may not open
/// the client process. The target identity lives in caller memory and is
/// probed; a fault is the caller's problem, reported as an access
/// violation.
pub(crate) fn screen_open_process(
    cx: &CallContext,
    request: &ServiceRequest,
    env: &DispatchEnv,
) -> PolicyAction {
    let Some(client) = env.session.current() else {
        return PolicyAction::Forward;
    };
    if cx.caller == client || cx.system_thread {
        return PolicyAction::Forward;
    }
    let ServiceRequest::OpenProcess(args) = request else {
        return PolicyAction::Forward;
    };
    match args.client_id.probe_read() {
        Ok(id) if id.process == client => PolicyAction::Deny,
        Ok(_) => PolicyAction::Forward,
        Err(_) => PolicyAction::Fail(status::STATUS_ACCESS_VIOLATION),
    }
}

/// Open-thread filter, run after the genuine open so system bookkeeping
/// stays consistent.
///
/// On a successful open by a non-system thread, the new handle's owning
/// process is resolved; a handle into the client is closed, the output
/// is zeroed, and the call is denied. A failed lookup propagates as-is.
pub(crate) fn filter_open_thread(
    cx: &CallContext,
    request: &mut ServiceRequest,
    opened: NtStatus,
    env: &DispatchEnv,
) -> PolicyAction {
    if opened != status::STATUS_SUCCESS || cx.system_thread {
        return PolicyAction::Forward;
    }
    let Some(client) = env.session.current() else {
        return PolicyAction::Forward;
    };
    let ServiceRequest::OpenThread(args) = request else {
        return PolicyAction::Forward;
    };
    let Some(handle) = args.handle else {
        return PolicyAction::Forward;
    };
    match env.threads.process_of_thread(handle) {
        Err(lookup_failed) => PolicyAction::Fail(lookup_failed),
        Ok(owner) if owner == client => {
            env.threads.close(handle);
            args.handle = None;
            PolicyAction::Deny
        }
        Ok(_) => PolicyAction::Forward,
    }
}
