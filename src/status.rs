//! NT-style status codes for the intercepted call surface.
//!
//! Trampolines return these to their callers verbatim; the driver never
//! invents status values beyond the small set below.

/// Status word returned by every intercepted native call.
pub type NtStatus = i32;

pub const STATUS_SUCCESS: NtStatus = 0;
/// The disguised denial status. Deliberately indistinguishable from an
/// unsupported call, so a denied caller learns nothing.
pub const STATUS_NOT_IMPLEMENTED: NtStatus = 0xC000_0002_u32 as i32;
pub const STATUS_ACCESS_VIOLATION: NtStatus = 0xC000_0005_u32 as i32;
pub const STATUS_INVALID_PARAMETER: NtStatus = 0xC000_000D_u32 as i32;
pub const STATUS_INVALID_HANDLE: NtStatus = 0xC000_0008_u32 as i32;
pub const STATUS_INSUFFICIENT_RESOURCES: NtStatus = 0xC000_009A_u32 as i32;

/// Success test, warnings and informational values included.
#[inline]
pub const fn nt_success(status: NtStatus) -> bool {
    status >= 0
}
