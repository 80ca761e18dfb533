//! The fixed set of interceptable native calls.
//!
//! Routines are grouped the way they are installed: file I/O, registry
//! keys, process/thread, and information queries. Each routine also
//! carries its install method, since a handful of entries can only be
//! located by a hardcoded, version-dependent table index.

/// One interceptable native call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Routine {
    // file group
    CreateFile,
    OpenFile,
    QueryInformationFile,
    ReadFile,
    SetInformationFile,
    WriteFile,
    // key group
    CreateKey,
    DeleteKey,
    DeleteValueKey,
    EnumerateKey,
    EnumerateValueKey,
    OpenKey,
    QueryKey,
    QueryValueKey,
    SetValueKey,
    // process/thread group
    OpenProcess,
    OpenThread,
    QueryInformationProcess,
    QueryInformationThread,
    SetInformationProcess,
    SetInformationThread,
    TerminateProcess,
    TerminateThread,
    // information group
    DuplicateObject,
    QuerySystemInformation,
}

/// A routine group, installed and uninstalled as a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookGroup {
    File,
    Key,
    ProcessThread,
    Information,
}

/// How a routine's table entry is located.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstallMethod {
    /// Resolve the slot from the routine's public call stub.
    ByAddress,
    /// Use a hardcoded, version-dependent table index.
    ByIndex,
}

impl Routine {
    /// Every interceptable routine, in group order.
    pub const ALL: [Routine; 25] = [
        Routine::CreateFile,
        Routine::OpenFile,
        Routine::QueryInformationFile,
        Routine::ReadFile,
        Routine::SetInformationFile,
        Routine::WriteFile,
        Routine::CreateKey,
        Routine::DeleteKey,
        Routine::DeleteValueKey,
        Routine::EnumerateKey,
        Routine::EnumerateValueKey,
        Routine::OpenKey,
        Routine::QueryKey,
        Routine::QueryValueKey,
        Routine::SetValueKey,
        Routine::OpenProcess,
        Routine::OpenThread,
        Routine::QueryInformationProcess,
        Routine::QueryInformationThread,
        Routine::SetInformationProcess,
        Routine::SetInformationThread,
        Routine::TerminateProcess,
        Routine::TerminateThread,
        Routine::DuplicateObject,
        Routine::QuerySystemInformation,
    ];

    pub fn group(self) -> HookGroup {
        use Routine::*;
        match self {
            CreateFile | OpenFile | QueryInformationFile | ReadFile | SetInformationFile
            | WriteFile => HookGroup::File,
            CreateKey | DeleteKey | DeleteValueKey | EnumerateKey | EnumerateValueKey | OpenKey
            | QueryKey | QueryValueKey | SetValueKey => HookGroup::Key,
            OpenProcess | OpenThread | QueryInformationProcess | QueryInformationThread
            | SetInformationProcess | SetInformationThread | TerminateProcess
            | TerminateThread => HookGroup::ProcessThread,
            DuplicateObject | QuerySystemInformation => HookGroup::Information,
        }
    }

    pub fn install_method(self) -> InstallMethod {
        use Routine::*;
        match self {
            OpenThread | QueryInformationProcess | QueryInformationThread
            | SetInformationProcess | TerminateThread | QuerySystemInformation => {
                InstallMethod::ByIndex
            }
            _ => InstallMethod::ByAddress,
        }
    }

    /// Export-style name, for diagnostics.
    pub fn name(self) -> &'static str {
        use Routine::*;
        match self {
            CreateFile => "ZwCreateFile",
            OpenFile => "ZwOpenFile",
            QueryInformationFile => "ZwQueryInformationFile",
            ReadFile => "ZwReadFile",
            SetInformationFile => "ZwSetInformationFile",
            WriteFile => "ZwWriteFile",
            CreateKey => "ZwCreateKey",
            DeleteKey => "ZwDeleteKey",
            DeleteValueKey => "ZwDeleteValueKey",
            EnumerateKey => "ZwEnumerateKey",
            EnumerateValueKey => "ZwEnumerateValueKey",
            OpenKey => "ZwOpenKey",
            QueryKey => "ZwQueryKey",
            QueryValueKey => "ZwQueryValueKey",
            SetValueKey => "ZwSetValueKey",
            OpenProcess => "ZwOpenProcess",
            OpenThread => "ZwOpenThread",
            QueryInformationProcess => "ZwQueryInformationProcess",
            QueryInformationThread => "ZwQueryInformationThread",
            SetInformationProcess => "ZwSetInformationProcess",
            SetInformationThread => "ZwSetInformationThread",
            TerminateProcess => "ZwTerminateProcess",
            TerminateThread => "ZwTerminateThread",
            DuplicateObject => "ZwDuplicateObject",
            QuerySystemInformation => "ZwQuerySystemInformation",
        }
    }
}

impl HookGroup {
    pub const ALL: [HookGroup; 4] = [
        HookGroup::File,
        HookGroup::Key,
        HookGroup::ProcessThread,
        HookGroup::Information,
    ];

    /// Whether this group was compiled in.
    pub fn enabled(self) -> bool {
        match self {
            HookGroup::File => cfg!(feature = "hook-file"),
            HookGroup::Key => cfg!(feature = "hook-key"),
            HookGroup::ProcessThread => cfg!(feature = "hook-process"),
            HookGroup::Information => cfg!(feature = "hook-information"),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            HookGroup::File => "file",
            HookGroup::Key => "key",
            HookGroup::ProcessThread => "process and thread",
            HookGroup::Information => "information",
        }
    }
}
