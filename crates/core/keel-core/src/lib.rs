//! Core primitives shared by Keel kernel subsystems.
//!
//! Holds the pieces every subsystem needs before anything else is up: the
//! spin lock used for process-wide state and the leveled log sink. Nothing
//! here touches hardware, so the crate is tested on the host with
//! `cargo test` (and with loom via `--cfg loom`).

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

pub mod log;
pub mod sync;
