//! Process-wide mutable state without synchronization.
//!
//! The runtime assumes a single thread of execution. Process state that is
//! mutated in place (the console instance, stored arguments, firmware
//! tables) lives in a [`RacyCell`]. Concurrent access from several threads
//! is out of contract: no lock or atomic is involved.
//!
//! We use `UnsafeCell` to avoid `static mut` (denied in Rust 2024 edition).

use core::cell::UnsafeCell;

pub(crate) struct RacyCell<T>(UnsafeCell<T>);

// SAFETY: single-threaded contract; see module docs.
unsafe impl<T> Sync for RacyCell<T> {}

impl<T> RacyCell<T> {
    pub(crate) const fn new(value: T) -> Self {
        Self(UnsafeCell::new(value))
    }

    /// # Safety
    ///
    /// No other reference obtained from this cell may be live.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn get_mut(&self) -> &mut T {
        unsafe { &mut *self.0.get() }
    }

    pub(crate) const fn as_ptr(&self) -> *mut T {
        self.0.get()
    }

    pub(crate) fn set(&self, value: T) {
        unsafe { *self.0.get() = value }
    }
}

impl<T: Copy> RacyCell<T> {
    pub(crate) fn get(&self) -> T {
        unsafe { *self.0.get() }
    }
}
