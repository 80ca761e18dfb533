//! Core of a dispatch-table call-interception driver.
//!
//! Two subsystems, usable independently:
//!
//! - **Interception** ([`hooks`]): a registry that swaps dispatch-table
//!   entries for per-routine trampolines through an injected
//!   [`hooks::table::TableAccessor`], with snapshot-bypass routing for
//!   one trusted client process and an identity policy guarding the two
//!   open routines.
//! - **Object manager** ([`object`]): typed, atomically reference-
//!   counted allocations with per-type delete procedures and a global
//!   liveness registry for bulk teardown.
//!
//! Everything that would touch kernel memory or kernel objects sits
//! behind injected traits, so the whole core runs, and is tested,
//! in user mode against fakes.

pub mod error;
pub mod hooks;
pub mod object;
pub mod session;
pub mod status;
pub mod version;

pub use error::{HookError, ObjectError};
pub use hooks::policy::ThreadDirectory;
pub use hooks::registry::{HookRegistry, InstallOutcome};
pub use hooks::routines::{HookGroup, InstallMethod, Routine};
pub use hooks::table::{DispatchSnapshot, TableAccessor};
pub use hooks::{
    CallContext, ClientId, Handle, OpenRequest, ProbeFault, ServiceEntry, ServiceRequest, UserPtr,
};
pub use object::{DeleteProcedure, Object, ObjectManager, PoolKind, TypeDescriptor, TypeObject};
pub use session::{ClientSession, Pid};
pub use version::KernelVersion;
