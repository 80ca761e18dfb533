//! Version-keyed dispatch-table indices.
//!
//! Index-installed routines have no stable way to locate their slot, so
//! their indices are pinned per supported kernel version. An unrecognized
//! version resolves nothing; the affected routines are simply left
//! unhooked.

use log::debug;

use crate::hooks::routines::Routine;

/// Major/minor kernel version, as reported by the loader environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KernelVersion {
    pub major: u32,
    pub minor: u32,
}

impl KernelVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

/// Resolve the dispatch-table index for an index-installed routine.
///
/// Returns `None` for address-installed routines and for unsupported
/// kernel versions.
pub fn dispatch_index(version: KernelVersion, routine: Routine) -> Option<u16> {
    match (version.major, version.minor) {
        (5, 1) => match routine {
            Routine::OpenThread => Some(0x80),
            Routine::QueryInformationProcess => Some(0x9A),
            Routine::QueryInformationThread => Some(0x9B),
            Routine::QuerySystemInformation => Some(0xAD),
            Routine::SetInformationProcess => Some(0xE4),
            Routine::TerminateThread => Some(0x102),
            _ => None,
        },
        (6, 0) => match routine {
            Routine::OpenThread => Some(0xC9),
            Routine::QueryInformationProcess => Some(0xE4),
            Routine::QueryInformationThread => Some(0xE5),
            Routine::QuerySystemInformation => Some(0xF8),
            Routine::SetInformationProcess => Some(0x131),
            Routine::TerminateThread => Some(0x14F),
            _ => None,
        },
        _ => None,
    }
}

/// Whether `version` has a pinned index set at all.
pub fn version_supported(version: KernelVersion) -> bool {
    matches!((version.major, version.minor), (5, 1) | (6, 0))
}

/// Log the fallback once, at registry construction.
pub(crate) fn log_unsupported(version: KernelVersion) {
    debug!(
        "no dispatch indices for kernel version {}.{}; index-installed routines stay unhooked",
        version.major, version.minor
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_versions_resolve_index_routines() {
        for version in [KernelVersion::new(5, 1), KernelVersion::new(6, 0)] {
            for routine in Routine::ALL {
                let resolved = dispatch_index(version, routine);
                match routine.install_method() {
                    crate::hooks::routines::InstallMethod::ByIndex => {
                        assert!(resolved.is_some(), "{:?} missing for {:?}", routine, version)
                    }
                    crate::hooks::routines::InstallMethod::ByAddress => {
                        assert!(resolved.is_none())
                    }
                }
            }
        }
    }

    #[test]
    fn unknown_version_resolves_nothing() {
        let version = KernelVersion::new(6, 1);
        assert!(!version_supported(version));
        for routine in Routine::ALL {
            assert_eq!(dispatch_index(version, routine), None);
        }
    }

    #[test]
    fn vista_open_thread_index_matches_table() {
        assert_eq!(
            dispatch_index(KernelVersion::new(6, 0), Routine::OpenThread),
            Some(0xC9)
        );
    }
}
