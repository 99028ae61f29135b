//! A readers/writer wrapper around the trie with bounded-wait acquisition.
//!
//! The protocol admits any number of concurrent readers but a single
//! exclusive writer, and keeps both sides live: a *turn* semaphore forms a
//! barrier every acquirer passes through, so a writer queued behind the
//! current batch of readers overtakes any stream of readers arriving after
//! it. Every wait is bounded by [`MUTEX_TIMEOUT_MS`]; an expired wait makes
//! the operation report "no result" instead of blocking forever.
//!
//! Acquisition order:
//!
//! - reader: *turn* (released immediately), then the readers mutex to bump
//!   the counter; the first reader in a batch takes *empty*.
//! - writer: *turn*, then *empty*; both held for the whole critical section.

use std::cell::{Cell, UnsafeCell};

use art::Art;
use osal::{BinarySemaphore, Mutex, Os};

/// Upper bound, in milliseconds, on every internal semaphore or mutex wait.
pub const MUTEX_TIMEOUT_MS: u32 = 100;

/// A shared [`Art`] behind the readers/writer protocol.
///
/// Access goes through closures: [`RwTree::read`] hands out `&Art<V>` under a
/// shared permit, [`RwTree::write`] hands out `&mut Art<V>` under the
/// exclusive one. `None` means a bounded wait expired and the closure never
/// ran.
pub struct RwTree<V, O: Os> {
    tree: UnsafeCell<Art<V>>,
    /// Exclusive access to the tree; held by the writer or the reader batch.
    empty: O::Semaphore,
    /// The overtaking barrier; held only across an acquisition.
    turn: O::Semaphore,
    readers_mutex: O::Mutex,
    /// Guarded by `readers_mutex`.
    readers: Cell<u32>,
}

// The protocol guarantees `tree` is borrowed shared under a read permit and
// exclusively under the write permit, and `readers` is only touched while
// `readers_mutex` is held.
unsafe impl<V: Send, O: Os> Send for RwTree<V, O> {}
unsafe impl<V: Send + Sync, O: Os> Sync for RwTree<V, O> {}

impl<V, O: Os> RwTree<V, O> {
    /// Creates an empty shared tree using the platform's primitives.
    pub fn new(os: &O) -> Self {
        let empty = os.create_binary_semaphore();
        let turn = os.create_binary_semaphore();
        // semaphores are created unavailable; hand out the first permit
        empty.signal();
        turn.signal();
        Self {
            tree: UnsafeCell::new(Art::new()),
            empty,
            turn,
            readers_mutex: os.create_mutex(),
            readers: Cell::new(0),
        }
    }

    /// Runs `f` with shared access. `None` if a bounded wait expired.
    pub fn read<R>(&self, f: impl FnOnce(&Art<V>) -> R) -> Option<R> {
        if !self.pre_read() {
            return None;
        }
        let result = f(unsafe { &*self.tree.get() });
        self.post_read();
        Some(result)
    }

    /// Runs `f` with exclusive access. `None` if a bounded wait expired.
    pub fn write<R>(&self, f: impl FnOnce(&mut Art<V>) -> R) -> Option<R> {
        if !self.pre_write() {
            return None;
        }
        let result = f(unsafe { &mut *self.tree.get() });
        self.post_write();
        Some(result)
    }

    /// The number of stored keys; zero if the bounded wait expired.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read(|tree| tree.len()).unwrap_or(0)
    }

    /// Whether no keys are stored (or the bounded wait expired).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn pre_read(&self) -> bool {
        if !self.turn.wait(MUTEX_TIMEOUT_MS) {
            return false;
        }
        // the barrier is held only across the doorway
        self.turn.signal();
        if !self.readers_mutex.wait(MUTEX_TIMEOUT_MS) {
            return false;
        }
        let count = self.readers.get() + 1;
        self.readers.set(count);
        if count == 1 && !self.empty.wait(MUTEX_TIMEOUT_MS) {
            // roll back so the failed acquisition leaves no trace
            self.readers.set(0);
            self.readers_mutex.signal();
            return false;
        }
        self.readers_mutex.signal();
        true
    }

    fn post_read(&self) {
        // the counter must come back down or writers starve; the mutex is
        // only ever held for counter arithmetic, so this terminates
        while !self.readers_mutex.wait(MUTEX_TIMEOUT_MS) {}
        let count = self.readers.get() - 1;
        self.readers.set(count);
        if count == 0 {
            self.empty.signal();
        }
        self.readers_mutex.signal();
    }

    fn pre_write(&self) -> bool {
        if !self.turn.wait(MUTEX_TIMEOUT_MS) {
            return false;
        }
        if !self.empty.wait(MUTEX_TIMEOUT_MS) {
            self.turn.signal();
            return false;
        }
        true
    }

    fn post_write(&self) {
        self.empty.signal();
        self.turn.signal();
    }
}
