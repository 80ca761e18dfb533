//! Public error types.

use thiserror::Error;

use crate::hooks::routines::Routine;
use crate::status::{self, NtStatus};

/// Errors reported by the object manager.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ObjectError {
    /// Malformed creation parameters. Always returned, never masked.
    #[error("invalid object parameters: {0}")]
    InvalidArgument(&'static str),

    /// Storage for the object could not be allocated.
    #[error("insufficient resources for a {0}-byte object")]
    InsufficientResources(usize),
}

impl ObjectError {
    /// Status value surfaced at the driver boundary.
    pub fn to_status(&self) -> NtStatus {
        match self {
            Self::InvalidArgument(_) => status::STATUS_INVALID_PARAMETER,
            Self::InsufficientResources(_) => status::STATUS_INSUFFICIENT_RESOURCES,
        }
    }
}

/// Errors reported by the hook registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HookError {
    /// The running kernel version resolved no table index for this routine.
    #[error("no dispatch index for {0:?} on this kernel version")]
    UnresolvedIndex(Routine),

    /// The routine is not part of this registry's configuration.
    #[error("{0:?} is not configured for interception")]
    NotConfigured(Routine),

    /// The table accessor rejected the entry update.
    #[error("dispatch table update failed: {0}")]
    Table(&'static str),

    /// The routine has no known-good original entry; restoring it would
    /// corrupt the call path.
    #[error("{0:?} has no known-good original entry; restore refused")]
    Unrestorable(Routine),
}
