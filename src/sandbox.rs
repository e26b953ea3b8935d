//! Capability-dropping marker (§4.10 design notes). The original daemon
//! this front-end is modeled on calls `chroot(2)`/`setresuid(2)` once
//! startup finishes (the listening sockets and IPC fds are already open by
//! then, so the process never needs filesystem or network-bind access
//! again). Rust has no safe wrapper for that, and getting it wrong is a
//! security bug, not a style choice — so instead of hand-rolling the
//! syscalls this models the restriction as an in-process capability
//! tripwire: once `Sandbox::install` runs, every privileged operation in
//! this crate checks `Sandbox::is_installed` first and returns
//! [`FrontendError::CapabilityViolation`] rather than silently succeeding.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use crate::error::{FrontendError, Result};

static INSTALLED: AtomicBool = AtomicBool::new(false);

pub struct Sandbox {
    _private: (),
}

impl Sandbox {
    /// Install the tripwire. Must be called exactly once, after every
    /// listening socket and IPC channel this process will ever need has
    /// already been opened.
    pub fn install() -> Result<Self> {
        if INSTALLED.swap(true, Ordering::SeqCst) {
            return Err(FrontendError::DuplicateSetup("Sandbox::install"));
        }
        info!("sandbox installed: no further privileged operations permitted");
        Ok(Sandbox { _private: () })
    }

    pub fn is_installed() -> bool {
        INSTALLED.load(Ordering::SeqCst)
    }
}

/// Guard a privileged operation (opening a new raw socket, binding a new
/// listener) so it fails cleanly once the sandbox is installed instead of
/// attempting a syscall that would only fail at the OS level anyway.
pub fn require_unsandboxed(what: &'static str) -> Result<()> {
    if Sandbox::is_installed() {
        return Err(FrontendError::CapabilityViolation(what.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Once;

    // The tripwire is process-global by design; run its test under a
    // private Once so other tests in this binary aren't affected by a
    // leaked `INSTALLED = true`.
    static INIT: Once = Once::new();

    #[test]
    fn require_unsandboxed_fails_after_install() {
        INIT.call_once(|| {
            require_unsandboxed("test op").expect("not installed yet");
            let _sandbox = Sandbox::install().unwrap();
        });
        assert!(require_unsandboxed("late op").is_err());
    }
}
