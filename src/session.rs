//! The trusted client session.
//!
//! At most one client process is trusted at a time. The surrounding
//! connection layer publishes its PID here when the client connects and
//! clears it on disconnect; every trampoline invocation reads it.

use core::sync::atomic::{AtomicU32, Ordering};

/// Process identifier as seen by the dispatch layer.
pub type Pid = u32;

/// PID slot value meaning "no client connected".
const NO_CLIENT: u32 = 0;

/// Process-wide trusted-client record.
///
/// Written by the connection layer, read concurrently from arbitrary
/// caller threads inside trampolines; a single atomic word, no lock.
#[derive(Debug, Default)]
pub struct ClientSession {
    pid: AtomicU32,
}

impl ClientSession {
    pub const fn new() -> Self {
        Self {
            pid: AtomicU32::new(NO_CLIENT),
        }
    }

    /// Publish `pid` as the trusted client.
    pub fn connect(&self, pid: Pid) {
        self.pid.store(pid, Ordering::Release);
    }

    /// Clear the trusted client.
    pub fn disconnect(&self) {
        self.pid.store(NO_CLIENT, Ordering::Release);
    }

    /// The currently trusted PID, if any client is connected.
    pub fn current(&self) -> Option<Pid> {
        match self.pid.load(Ordering::Acquire) {
            NO_CLIENT => None,
            pid => Some(pid),
        }
    }
}
