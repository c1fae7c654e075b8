//! Lock-free double buffer for background reconfiguration
//!
//! Two instances of a configuration object live side by side. The control
//! side mutates the *inactive* one (allocating as much as it likes) and then
//! publishes it with a single atomic store. The audio side always works on
//! the *active* one and never blocks, locks or allocates.
//!
//! # Protocol
//!
//! ```text
//!   Writer (control)                       Reader (audio)
//!   ────────────────                       ──────────────
//!   wait until `reading != inactive`       idx = active
//!   mutate slots[inactive]                 reading = idx
//!   active = inactive  ──── publish ────►  if active != idx { retry }
//!                                          ... use slots[idx] ...
//!                                          reading = IDLE   (guard drop)
//! ```
//!
//! The reader announces the slot it is about to use and re-validates that
//! it is still the published one, so the writer can never start mutating a
//! slot the reader holds. All four atomics use `SeqCst`: the reader's
//! announce-then-recheck and the writer's publish-then-check must be
//! totally ordered against each other. On the audio side that is one store
//! and two loads per block.
//!
//! # Single writer, single reader
//!
//! [`double_buffer`] hands out exactly one [`Writer`] and one [`Reader`];
//! neither is `Clone` and both take `&mut self`, so the single-writer and
//! single-reader disciplines are enforced by the type system rather than by
//! convention.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// `reading` value while the reader holds no slot
const IDLE: usize = usize::MAX;

/// Spins before the writer starts yielding its time slice while waiting
const SPINS_BEFORE_YIELD: u32 = 64;

struct Shared<T> {
    slots: [UnsafeCell<T>; 2],
    /// Index of the published slot
    active: AtomicUsize,
    /// Slot the reader currently holds, or `IDLE`
    reading: AtomicUsize,
}

// SAFETY: access to each slot is serialized by the protocol above: the
// writer only touches `slots[1 - active]` after observing that the reader
// is not holding it, and the reader only touches a slot after confirming it
// is the published one. `T: Send` is required because the writer and reader
// live on different threads and each gets `&mut T`.
unsafe impl<T: Send> Sync for Shared<T> {}

/// Create a double buffer from two initial instances
///
/// `first` starts out active.
pub fn double_buffer<T: Send>(first: T, second: T) -> (Writer<T>, Reader<T>) {
    let shared = Arc::new(Shared {
        slots: [UnsafeCell::new(first), UnsafeCell::new(second)],
        active: AtomicUsize::new(0),
        reading: AtomicUsize::new(IDLE),
    });

    (
        Writer {
            shared: Arc::clone(&shared),
            swaps: 0,
        },
        Reader { shared },
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// Writer
// ═══════════════════════════════════════════════════════════════════════════════

/// Control-side handle: mutates the inactive instance and publishes it
pub struct Writer<T> {
    shared: Arc<Shared<T>>,
    swaps: u64,
}

impl<T: Send> Writer<T> {
    /// Run `mutator` on the inactive instance, then make it active
    ///
    /// Blocks (spinning, then yielding) only while the reader still holds
    /// the instance that is about to be mutated, which is at most one
    /// audio block.
    pub fn modify_inactive_and_swap<F>(&mut self, mutator: F)
    where
        F: FnOnce(&mut T),
    {
        let result: Result<(), std::convert::Infallible> =
            self.try_modify_inactive_and_swap(|inactive| {
                mutator(inactive);
                Ok(())
            });
        match result {
            Ok(()) => {}
            Err(never) => match never {},
        }
    }

    /// Run a fallible `mutator` on the inactive instance
    ///
    /// The instance is published only if the mutator succeeds. On error the
    /// active instance is left untouched and keeps playing; the inactive
    /// one may be left half-modified, but it is never visible to the reader
    /// and the next successful mutation starts from whatever it contains.
    pub fn try_modify_inactive_and_swap<F, R, E>(&mut self, mutator: F) -> Result<R, E>
    where
        F: FnOnce(&mut T) -> Result<R, E>,
    {
        // Only this handle ever stores `active`, so our own view is current
        let inactive = 1 - self.shared.active.load(Ordering::SeqCst);
        self.wait_for_reader_to_leave(inactive);

        // SAFETY: the reader does not hold `inactive` (checked above) and
        // cannot acquire it until we publish it below, because it only
        // takes slots it has re-validated as active.
        let slot = unsafe { &mut *self.shared.slots[inactive].get() };
        let value = mutator(slot)?;

        self.shared.active.store(inactive, Ordering::SeqCst);
        self.swaps += 1;
        Ok(value)
    }

    /// Apply `reset` to both instances
    ///
    /// Used on stream stop to release heap-held contents outside the
    /// real-time path. Both instances are mutated through the normal
    /// swap protocol, so this is safe even if the reader is still running.
    pub fn clear<F>(&mut self, mut reset: F)
    where
        F: FnMut(&mut T),
    {
        self.modify_inactive_and_swap(&mut reset);
        self.modify_inactive_and_swap(&mut reset);
    }

    /// Index of the currently published instance (0 or 1)
    pub fn active_index(&self) -> usize {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Number of successful swaps performed through this handle
    pub fn swap_count(&self) -> u64 {
        self.swaps
    }

    fn wait_for_reader_to_leave(&self, slot: usize) {
        let mut spins = 0u32;
        while self.shared.reading.load(Ordering::SeqCst) == slot {
            if spins < SPINS_BEFORE_YIELD {
                std::hint::spin_loop();
                spins += 1;
            } else {
                std::thread::yield_now();
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Reader
// ═══════════════════════════════════════════════════════════════════════════════

/// Audio-side handle: borrows the active instance for one block
pub struct Reader<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Send> Reader<T> {
    /// Borrow the currently active instance
    ///
    /// Never blocks and never allocates. The guard must be dropped before
    /// the next call (enforced by `&mut self`); holding it across blocks
    /// would stall the writer.
    #[inline]
    pub fn get_active(&mut self) -> ActiveGuard<'_, T> {
        let index = loop {
            let index = self.shared.active.load(Ordering::SeqCst);
            self.shared.reading.store(index, Ordering::SeqCst);
            // A swap may have landed between the load and the announce; if
            // so the writer could already be mutating `index`. Retry.
            if self.shared.active.load(Ordering::SeqCst) == index {
                break index;
            }
        };

        // SAFETY: `index` is published and announced in `reading`, so the
        // writer will not touch it until the guard clears `reading`.
        let value = unsafe { &mut *self.shared.slots[index].get() };
        ActiveGuard {
            value,
            reading: &self.shared.reading,
        }
    }
}

/// Exclusive access to the active instance for the lifetime of the guard
pub struct ActiveGuard<'a, T> {
    value: &'a mut T,
    reading: &'a AtomicUsize,
}

impl<T> Deref for ActiveGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.value
    }
}

impl<T> DerefMut for ActiveGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value
    }
}

impl<T> Drop for ActiveGuard<'_, T> {
    fn drop(&mut self) {
        self.reading.store(IDLE, Ordering::SeqCst);
    }
}
