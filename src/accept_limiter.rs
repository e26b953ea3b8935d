//! TCP accept backoff (§4.4): when the process is close to running out of
//! file descriptors, stop calling `accept()` for a second rather than
//! spinning on `EMFILE`/`ENFILE`. Grounded on the teacher's
//! `protocol/permit_manager.rs`, which wraps a `Semaphore` the same way;
//! here the semaphore's permits represent descriptor headroom rather than
//! in-flight request concurrency.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::warn;

/// Descriptors kept in reserve below the process's soft `RLIMIT_NOFILE`,
/// for the listening sockets, the IPC channels, and slack for the next
/// `accept()` itself.
pub const RESERVED_DESCRIPTORS: u64 = 5;

pub const REARM_DELAY: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct AcceptLimiter {
    semaphore: Arc<Semaphore>,
}

impl AcceptLimiter {
    /// Size the limiter from the process's current soft `RLIMIT_NOFILE`,
    /// reserving `RESERVED_DESCRIPTORS` for everything that isn't a client
    /// TCP connection.
    pub fn from_rlimit() -> Self {
        let soft_limit = current_nofile_soft_limit();
        let capacity = soft_limit.saturating_sub(RESERVED_DESCRIPTORS).max(1) as usize;
        Self::with_capacity(capacity)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        AcceptLimiter {
            semaphore: Arc::new(Semaphore::new(capacity)),
        }
    }

    /// Hold a permit for the lifetime of one accepted TCP connection.
    /// Returns `None` when the limiter is out of headroom; the caller
    /// should stop accepting for [`REARM_DELAY`] before retrying.
    pub fn try_acquire(&self) -> Option<OwnedSemaphorePermit> {
        match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                warn!("accept backoff: no descriptor headroom, pausing accept()");
                None
            }
        }
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(unix)]
fn current_nofile_soft_limit() -> u64 {
    let mut limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: `libc::getrlimit` only writes into `limit`, a valid stack
    // value of the expected type.
    let rc = unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut limit) };
    if rc == 0 {
        limit.rlim_cur as u64
    } else {
        1024
    }
}

#[cfg(not(unix))]
fn current_nofile_soft_limit() -> u64 {
    1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquires_up_to_capacity_then_backs_off() {
        let limiter = AcceptLimiter::with_capacity(2);
        let a = limiter.try_acquire().unwrap();
        let b = limiter.try_acquire().unwrap();
        assert!(limiter.try_acquire().is_none());
        drop(a);
        assert!(limiter.try_acquire().is_some());
        drop(b);
    }

    #[test]
    fn from_rlimit_reserves_headroom() {
        let limiter = AcceptLimiter::from_rlimit();
        assert!(limiter.available() >= 1);
    }
}
