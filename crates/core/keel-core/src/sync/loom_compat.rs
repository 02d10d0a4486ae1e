//! Loom compatibility shim.
//!
//! Under `cfg(loom)` the lock's atomics and spin hint come from loom so the
//! model checker can explore interleavings; otherwise they are the `core`
//! versions.

#[cfg(loom)]
pub(crate) use loom::hint::spin_loop;
#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicBool, Ordering};

#[cfg(not(loom))]
pub(crate) use core::hint::spin_loop;
#[cfg(not(loom))]
pub(crate) use core::sync::atomic::{AtomicBool, Ordering};
