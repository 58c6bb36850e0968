// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Compile-time configuration.
//!
//! Mirrors `vm_config.h` from the upstream mruby/c sources: every tunable
//! here is a `pub const`, overridden by enabling the matching Cargo feature
//! rather than an environment variable or runtime flag.

/// Maximum number of concurrently loaded VMs (tasks).
pub const MAX_VM_COUNT: usize = 5;

/// Maximum number of registers in a single VM's register file.
pub const MAX_REGS_SIZE: usize = 100;

/// Maximum number of interned symbols (dynamic + builtin).
///
/// `mrbc_sym` is a 16-bit id upstream; this budget keeps well within that.
pub const MAX_SYMBOLS_COUNT: usize = 255;

/// Maximum call-frame / rescue nesting depth.
pub const MAX_EXCEPTION_COUNT: usize = 16;

/// Number of scheduler ticks a task runs before its slice is exhausted.
///
/// Matches `TIMESLICE_TICK` in upstream `rrt0.c` (10 ticks of a 1ms hardware
/// timer by default).
pub const DEFAULT_TIMESLICE_TICK_COUNT: u8 = 10;

/// Length, in milliseconds, of one scheduler tick.
pub const TICK_UNIT_MS: u32 = 1;

#[cfg(feature = "wide-int")]
pub type MrbcInt = i64;
#[cfg(not(feature = "wide-int"))]
pub type MrbcInt = i32;

#[cfg(feature = "float")]
pub type MrbcFloat = f64;

/// TLSF: low bits of a block size ignored when computing its size class.
pub const TLSF_IGNORE_LSBS: u32 = 4;

/// TLSF: number of first-level size classes tracked (one bit per class in
/// the FLI bitmap, so this must be <= 32).
pub const TLSF_FLI_COUNT: u32 = 32;

/// TLSF: number of second-level subdivisions per first-level class.
pub const TLSF_SLI_BITS: u32 = 3;
