//! Call interception layer.
//!
//! The dispatch table maps each native call to a [`ServiceEntry`]. The
//! registry swaps entries for trampolines at install time; every later
//! invocation of an intercepted call runs through its trampoline, which
//! routes to the pre-hook snapshot or to whatever entry was displaced.
//!
//! Key responsibilities:
//! - Model table entries as invokable, identity-comparable values.
//! - Carry per-invocation caller identity in a [`CallContext`].
//! - Model caller-supplied memory as fallible reads, never trusted
//!   pointers.

pub mod dispatch;
pub mod policy;
pub mod registry;
pub mod routines;
pub mod table;

use std::fmt;
use std::sync::Arc;

use crate::session::Pid;
use crate::status::NtStatus;

/// An opaque caller-visible handle value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Handle(pub u64);

/// Caller-supplied identity of an open target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientId {
    pub process: Pid,
    pub thread: Pid,
}

/// Read failure on caller memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbeFault;

/// Caller-supplied memory that must be probed before reading.
///
/// A caller can hand the kernel any address; reads go through
/// [`UserPtr::probe_read`] and faults surface as an error, never a
/// crash.
#[derive(Clone, Copy, Debug)]
pub enum UserPtr<T> {
    Readable(T),
    Unreadable,
}

impl<T: Copy> UserPtr<T> {
    pub fn probe_read(&self) -> Result<T, ProbeFault> {
        match self {
            UserPtr::Readable(value) => Ok(*value),
            UserPtr::Unreadable => Err(ProbeFault),
        }
    }
}

/// Identity of the thread invoking an intercepted call.
///
/// Built by the dispatch front-end from the current thread; trampolines
/// never look it up themselves.
#[derive(Clone, Copy, Debug)]
pub struct CallContext {
    pub caller: Pid,
    pub system_thread: bool,
}

impl CallContext {
    /// An ordinary user-mode caller.
    pub fn user(caller: Pid) -> Self {
        Self {
            caller,
            system_thread: false,
        }
    }

    /// A system worker thread.
    pub fn system(caller: Pid) -> Self {
        Self {
            caller,
            system_thread: true,
        }
    }
}

/// Arguments to an open-process or open-thread call. Only what the
/// policy layer inspects is modeled; everything else rides through
/// untouched.
#[derive(Debug)]
pub struct OpenRequest {
    pub desired_access: u32,
    pub client_id: UserPtr<ClientId>,
    /// Output handle; zeroed (`None`) when the open is denied.
    pub handle: Option<Handle>,
}

impl OpenRequest {
    pub fn new(desired_access: u32, client_id: UserPtr<ClientId>) -> Self {
        Self {
            desired_access,
            client_id,
            handle: None,
        }
    }
}

/// Argument bundle of one in-flight call.
///
/// Trampolines do no argument validation of their own; arguments exist
/// so the two guarded routines can inspect and amend them.
#[derive(Debug)]
pub enum ServiceRequest {
    OpenProcess(OpenRequest),
    OpenThread(OpenRequest),
    /// Any other intercepted call; routing never looks inside.
    Other,
}

type ServiceFn = dyn Fn(&CallContext, &mut ServiceRequest) -> NtStatus + Send + Sync;

/// One dispatch-table entry: an invokable service routine.
///
/// Entries compare by identity, the way raw entry-point addresses do in
/// the table itself. Equality of two entries means they are the same
/// installed routine, which is what hazard detection and restore
/// verification rely on.
#[derive(Clone)]
pub struct ServiceEntry(Arc<ServiceFn>);

impl ServiceEntry {
    pub fn new<F>(routine: F) -> Self
    where
        F: Fn(&CallContext, &mut ServiceRequest) -> NtStatus + Send + Sync + 'static,
    {
        Self(Arc::new(routine))
    }

    pub fn invoke(&self, cx: &CallContext, request: &mut ServiceRequest) -> NtStatus {
        (self.0)(cx, request)
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl PartialEq for ServiceEntry {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.addr(), other.addr())
    }
}

impl Eq for ServiceEntry {}

impl fmt::Debug for ServiceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceEntry({:p})", self.addr())
    }
}
