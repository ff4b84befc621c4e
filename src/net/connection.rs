//! Session identity and process accounting.
//!
//! # Responsibilities
//! - Generate a correlation ID for every session
//! - Cap the number of concurrently running processes
//! - Release the slot when the session ends, even on panic

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Last issued ID, used to keep IDs strictly increasing when the clock
/// stalls or steps backwards.
static LAST_SESSION_ID: AtomicU64 = AtomicU64::new(0);

/// Correlation ID for a session.
///
/// Derived from wall-clock nanoseconds. Unique within one gateway process,
/// not meant to be unguessable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Generate a new session ID.
    pub fn generate() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);

        let mut last = LAST_SESSION_ID.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1);
            match LAST_SESSION_ID.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => return Self(next),
                Err(actual) => last = actual,
            }
        }
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Limits how many sessions may own a process at once.
#[derive(Debug, Clone)]
pub struct ForkLimiter {
    /// `None` when unlimited.
    slots: Option<Arc<Semaphore>>,
    max_forks: usize,
}

impl ForkLimiter {
    /// Create a limiter; `0` means unlimited.
    pub fn new(max_forks: usize) -> Self {
        Self {
            slots: (max_forks > 0).then(|| Arc::new(Semaphore::new(max_forks))),
            max_forks,
        }
    }

    /// Claim a slot without waiting. Returns `None` when all slots are taken.
    pub fn try_acquire(&self) -> Option<ForkPermit> {
        match &self.slots {
            None => Some(ForkPermit { _permit: None }),
            Some(slots) => slots
                .clone()
                .try_acquire_owned()
                .ok()
                .map(|permit| ForkPermit { _permit: Some(permit) }),
        }
    }

    /// Slots still free, or `None` when unlimited.
    pub fn available(&self) -> Option<usize> {
        self.slots.as_ref().map(|s| s.available_permits())
    }

    /// Get configured maximum (0 = unlimited).
    pub fn max_forks(&self) -> usize {
        self.max_forks
    }
}

/// A claimed process slot.
///
/// When dropped, the slot is released back to the limiter.
#[derive(Debug)]
pub struct ForkPermit {
    _permit: Option<OwnedSemaphorePermit>,
}
