//! Synchronization primitives.
//!
//! [`SpinLock`] is const-constructible so it can guard `static` subsystem
//! state, and it needs neither an allocator nor a scheduler.

pub(crate) mod loom_compat;
mod spinlock;

pub use spinlock::{SpinLock, SpinLockGuard};
