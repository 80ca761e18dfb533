//! Shared fakes for exercising the interception core in user mode:
//! an in-memory dispatch table and a canned thread-handle directory.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use krait::status::{self, NtStatus};
use krait::{
    ClientSession, DispatchSnapshot, Handle, HookError, HookRegistry, KernelVersion, Pid, Routine,
    ServiceEntry, ServiceRequest, TableAccessor, ThreadDirectory,
};

pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn hits(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// An entry that records its tag and succeeds.
pub fn recorder(log: &CallLog, tag: &str) -> ServiceEntry {
    let log = Arc::clone(log);
    let tag = tag.to_string();
    ServiceEntry::new(move |_cx, _request| {
        log.lock().unwrap().push(tag.clone());
        status::STATUS_SUCCESS
    })
}

/// An entry that performs a successful open, producing `handle`.
pub fn opening_entry(log: &CallLog, tag: &str, handle: Handle) -> ServiceEntry {
    let log = Arc::clone(log);
    let tag = tag.to_string();
    ServiceEntry::new(move |_cx, request| {
        log.lock().unwrap().push(tag.clone());
        match request {
            ServiceRequest::OpenProcess(args) | ServiceRequest::OpenThread(args) => {
                args.handle = Some(handle);
            }
            ServiceRequest::Other => {}
        }
        status::STATUS_SUCCESS
    })
}

/// In-memory dispatch table with by-call and by-index slots.
#[derive(Default)]
pub struct FakeTable {
    by_call: Mutex<HashMap<Routine, ServiceEntry>>,
    by_index: Mutex<HashMap<u16, ServiceEntry>>,
    /// Routines whose restore did not match the entry the restorer
    /// claimed to have installed.
    pub tampered: Mutex<Vec<Routine>>,
}

impl FakeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_call(&self, routine: Routine, entry: ServiceEntry) {
        self.by_call.lock().unwrap().insert(routine, entry);
    }

    pub fn seed_index(&self, index: u16, entry: ServiceEntry) {
        self.by_index.lock().unwrap().insert(index, entry);
    }

    pub fn entry_by_call(&self, routine: Routine) -> ServiceEntry {
        self.by_call.lock().unwrap().get(&routine).cloned().unwrap()
    }

    pub fn entry_by_index(&self, index: u16) -> ServiceEntry {
        self.by_index.lock().unwrap().get(&index).cloned().unwrap()
    }
}

impl TableAccessor for FakeTable {
    fn modify_entry_by_call(
        &self,
        routine: Routine,
        new: ServiceEntry,
    ) -> Result<ServiceEntry, HookError> {
        let mut slots = self.by_call.lock().unwrap();
        match slots.insert(routine, new) {
            Some(previous) => Ok(previous),
            None => {
                slots.remove(&routine);
                Err(HookError::Table("no slot for routine"))
            }
        }
    }

    fn modify_entry_by_index(
        &self,
        index: u16,
        new: ServiceEntry,
    ) -> Result<ServiceEntry, HookError> {
        let mut slots = self.by_index.lock().unwrap();
        match slots.insert(index, new) {
            Some(previous) => Ok(previous),
            None => {
                slots.remove(&index);
                Err(HookError::Table("no slot at index"))
            }
        }
    }

    fn restore_entry_by_call(
        &self,
        routine: Routine,
        old: ServiceEntry,
        current: ServiceEntry,
    ) -> Result<(), HookError> {
        let mut slots = self.by_call.lock().unwrap();
        if slots.get(&routine) != Some(&current) {
            self.tampered.lock().unwrap().push(routine);
        }
        slots.insert(routine, old);
        Ok(())
    }

    fn restore_entry_by_index(
        &self,
        index: u16,
        old: ServiceEntry,
        current: ServiceEntry,
    ) -> Result<(), HookError> {
        let _ = current;
        self.by_index.lock().unwrap().insert(index, old);
        Ok(())
    }
}

/// Canned thread-handle directory.
#[derive(Default)]
pub struct FakeThreads {
    owners: Mutex<HashMap<Handle, Pid>>,
    pub closed: Mutex<Vec<Handle>>,
}

impl FakeThreads {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_owner(&self, handle: Handle, owner: Pid) {
        self.owners.lock().unwrap().insert(handle, owner);
    }

    pub fn closed_handles(&self) -> Vec<Handle> {
        self.closed.lock().unwrap().clone()
    }
}

impl ThreadDirectory for FakeThreads {
    fn process_of_thread(&self, handle: Handle) -> Result<Pid, NtStatus> {
        self.owners
            .lock()
            .unwrap()
            .get(&handle)
            .copied()
            .ok_or(status::STATUS_INVALID_HANDLE)
    }

    fn close(&self, handle: Handle) {
        self.closed.lock().unwrap().push(handle);
    }
}

pub const XP: KernelVersion = KernelVersion::new(5, 1);

/// A fully seeded table plus the collaborators a registry needs.
pub struct Rig {
    pub table: Arc<FakeTable>,
    pub session: Arc<ClientSession>,
    pub threads: Arc<FakeThreads>,
    pub log: CallLog,
    pub originals: HashMap<Routine, ServiceEntry>,
}

impl Rig {
    /// Seed every routine's slot with a recording original, index slots
    /// at the 5.1 indices.
    pub fn new() -> Self {
        let table = Arc::new(FakeTable::new());
        let log = new_log();
        let mut originals = HashMap::new();
        for routine in Routine::ALL {
            let entry = recorder(&log, &format!("orig:{}", routine.name()));
            originals.insert(routine, entry.clone());
            match krait::version::dispatch_index(XP, routine) {
                Some(index) => table.seed_index(index, entry),
                None => table.seed_call(routine, entry),
            }
        }
        Self {
            table,
            session: Arc::new(ClientSession::new()),
            threads: Arc::new(FakeThreads::new()),
            log,
            originals,
        }
    }

    /// A snapshot carrying distinct, recording entries for every routine.
    pub fn snapshot(&self) -> DispatchSnapshot {
        let mut snapshot = DispatchSnapshot::new();
        for routine in Routine::ALL {
            snapshot.record(
                routine,
                recorder(&self.log, &format!("snapshot:{}", routine.name())),
            );
        }
        snapshot
    }

    pub fn registry(
        &self,
        snapshot: Option<Arc<DispatchSnapshot>>,
        version: KernelVersion,
    ) -> HookRegistry {
        HookRegistry::new(
            Arc::clone(&self.table) as Arc<dyn TableAccessor>,
            Arc::clone(&self.session),
            snapshot,
            Arc::clone(&self.threads) as Arc<dyn ThreadDirectory>,
            version,
        )
    }

    /// The live table entry for a routine, wherever its slot is.
    pub fn live_entry(&self, routine: Routine) -> ServiceEntry {
        match krait::version::dispatch_index(XP, routine) {
            Some(index) => self.table.entry_by_index(index),
            None => self.table.entry_by_call(routine),
        }
    }
}
