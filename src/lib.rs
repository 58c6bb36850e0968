// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! # Rite VM
//!
//! Embedded-class virtual machine for RITE 3.0 bytecode, the on-disk format
//! `mrbc` compiles Ruby into and `mruby/c` executes.
//!
//! This crate provides:
//! - A TLSF allocator over a single fixed-size memory pool
//! - A RITE 0300 binary loader
//! - A register-machine bytecode interpreter (`vm`)
//! - A cooperative, tick-budgeted round-robin scheduler (`sched`)
//! - The built-in class/method registry and intrinsic methods
//!
//! The VM is designed to run with no heap beyond the allocator's own pool,
//! so it fits targets that have no global allocator at all.
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` outside of tests and the `std` feature, which
//! enables the CLI front-end (`StdHal`, `bin/vm.rs`) and std-only test
//! helpers.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[cfg(any(test, feature = "std"))]
extern crate std;

#[cfg(not(any(test, feature = "std")))]
extern crate alloc;
#[cfg(any(test, feature = "std"))]
extern crate alloc;

pub mod bytecode;
pub mod class;
pub mod config;
pub mod error;
pub mod hal;
pub mod intrinsics;
pub mod irep;
pub mod loader;
/// The TLSF pool allocator. Named `mem`, not `alloc`, so it doesn't collide
/// with the `alloc` sysroot crate this crate links against for `Vec`/`String`.
#[path = "alloc/mod.rs"]
pub mod mem;
pub mod sched;
pub mod symbol;
pub mod types;
pub mod value;
pub mod vm;

// Re-export commonly used types at crate root
pub use hal::{CriticalSection, Hal};
pub use sched::Scheduler;
pub use types::{ClassId, Handle, SymId, VmId};

/// Crate version for runtime queries.
pub const VERSION: &str = match option_env!("CARGO_PKG_VERSION") {
    Some(v) => v,
    None => "unknown",
};
