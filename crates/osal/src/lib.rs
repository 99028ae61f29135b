//! # OSAL — OS Abstraction Layer
//!
//! The synchronization primitives consumed by the Moorings settings store,
//! behind traits so embedded targets can supply their own RTOS-backed
//! implementations.
//!
//! Two primitive shapes exist, both with the same two-method surface:
//!
//! - a **mutex**, created *available*;
//! - a **binary semaphore**, created *unavailable* (the consumer signals once
//!   to hand out the first permit).
//!
//! Every `wait` is bounded: it returns `true` when the permit was acquired
//! within `timeout_ms`, `false` otherwise. `signal` releases a permit and is
//! capped at one (signalling an available primitive leaves it available).
//!
//! ## Example
//! ```rust
//! use osal::{BinarySemaphore, Os, StdOs};
//!
//! let os = StdOs;
//! let sem = os.create_binary_semaphore();
//! assert!(!sem.wait(10)); // starts unavailable
//! sem.signal();
//! assert!(sem.wait(10));
//! ```

use std::sync::{Condvar, Mutex as SyncMutex};
use std::time::{Duration, Instant};

/// A mutual-exclusion primitive with a bounded wait. Created available.
pub trait Mutex: Send + Sync {
    /// Acquires the mutex, blocking at most `timeout_ms` milliseconds.
    /// Returns `false` if the deadline passed without acquisition.
    fn wait(&self, timeout_ms: u32) -> bool;

    /// Releases the mutex.
    fn signal(&self);
}

/// A binary (single-permit) semaphore with a bounded wait. Created
/// unavailable; `signal` makes it available.
pub trait BinarySemaphore: Send + Sync {
    /// Takes the permit, blocking at most `timeout_ms` milliseconds.
    /// Returns `false` if the deadline passed without a permit.
    fn wait(&self, timeout_ms: u32) -> bool;

    /// Returns the permit. Signalling an already-available semaphore is a
    /// no-op (the permit count is capped at one).
    fn signal(&self);
}

/// Factory for the platform's primitives.
pub trait Os {
    type Mutex: Mutex;
    type Semaphore: BinarySemaphore;

    /// Creates a mutex in the available state.
    fn create_mutex(&self) -> Self::Mutex;

    /// Creates a binary semaphore in the unavailable state.
    fn create_binary_semaphore(&self) -> Self::Semaphore;
}

/// A single permit guarded by a `Mutex<bool>` + `Condvar` pair.
///
/// Lock poisoning is recovered with `into_inner`: the guarded state is a
/// plain bool and stays coherent even if a holder panicked.
struct Gate {
    available: SyncMutex<bool>,
    cv: Condvar,
}

impl Gate {
    fn new(available: bool) -> Self {
        Self {
            available: SyncMutex::new(available),
            cv: Condvar::new(),
        }
    }

    fn wait(&self, timeout_ms: u32) -> bool {
        let deadline = Instant::now() + Duration::from_millis(u64::from(timeout_ms));
        let mut available = self
            .available
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        loop {
            if *available {
                *available = false;
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, result) = self
                .cv
                .wait_timeout(available, deadline - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            available = guard;
            if result.timed_out() && !*available {
                return false;
            }
        }
    }

    fn signal(&self) {
        let mut available = self
            .available
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *available = true;
        drop(available);
        self.cv.notify_one();
    }
}

/// Mutex backed by [`Gate`], created available.
pub struct StdMutex(Gate);

impl Mutex for StdMutex {
    fn wait(&self, timeout_ms: u32) -> bool {
        self.0.wait(timeout_ms)
    }

    fn signal(&self) {
        self.0.signal();
    }
}

/// Binary semaphore backed by [`Gate`], created unavailable.
pub struct StdSemaphore(Gate);

impl BinarySemaphore for StdSemaphore {
    fn wait(&self, timeout_ms: u32) -> bool {
        self.0.wait(timeout_ms)
    }

    fn signal(&self) {
        self.0.signal();
    }
}

/// The host implementation of [`Os`] on `std::sync`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdOs;

impl Os for StdOs {
    type Mutex = StdMutex;
    type Semaphore = StdSemaphore;

    fn create_mutex(&self) -> StdMutex {
        StdMutex(Gate::new(true))
    }

    fn create_binary_semaphore(&self) -> StdSemaphore {
        StdSemaphore(Gate::new(false))
    }
}
