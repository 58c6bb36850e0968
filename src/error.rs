// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Crate-wide error types.
//!
//! No `thiserror`/`anyhow`: every variant implements `core::fmt::Display` by
//! hand, matching the rest of the dependency-free error style in this
//! workspace.

use core::fmt;

/// Packed loader failure code: `(phase << 16) | detail`, matching spec.md's
/// host failure-code contract so a caller without access to this crate's
/// types can still log/compare a plain `u32`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct LoadError(u32);

impl LoadError {
    const PHASE_HEADER: u32 = 1;
    const PHASE_SECTION: u32 = 2;
    const PHASE_IREP: u32 = 3;
    const PHASE_POOL: u32 = 4;

    const fn pack(phase: u32, detail: u16) -> Self {
        Self((phase << 16) | detail as u32)
    }

    #[must_use]
    pub const fn bad_identifier() -> Self {
        Self::pack(Self::PHASE_HEADER, 1)
    }

    #[must_use]
    pub const fn bad_version() -> Self {
        Self::pack(Self::PHASE_HEADER, 2)
    }

    #[must_use]
    pub const fn truncated_header() -> Self {
        Self::pack(Self::PHASE_HEADER, 3)
    }

    #[must_use]
    pub const fn size_mismatch() -> Self {
        Self::pack(Self::PHASE_HEADER, 4)
    }

    #[must_use]
    pub const fn unknown_section_tag() -> Self {
        Self::pack(Self::PHASE_SECTION, 1)
    }

    #[must_use]
    pub const fn truncated_section() -> Self {
        Self::pack(Self::PHASE_SECTION, 2)
    }

    #[must_use]
    pub const fn irep_nesting_too_deep() -> Self {
        Self::pack(Self::PHASE_IREP, 1)
    }

    #[must_use]
    pub const fn truncated_irep() -> Self {
        Self::pack(Self::PHASE_IREP, 2)
    }

    #[must_use]
    pub const fn too_many_registers() -> Self {
        Self::pack(Self::PHASE_IREP, 3)
    }

    #[must_use]
    pub const fn unknown_pool_literal_tag() -> Self {
        Self::pack(Self::PHASE_POOL, 1)
    }

    #[must_use]
    pub const fn truncated_pool() -> Self {
        Self::pack(Self::PHASE_POOL, 2)
    }

    /// The packed `(phase << 16) | detail` code, for host-level logging or
    /// exit-status reporting.
    #[must_use]
    pub const fn code(self) -> u32 {
        self.0
    }

    const fn phase(self) -> u32 {
        self.0 >> 16
    }

    const fn detail(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    const fn phase_name(self) -> &'static str {
        match self.phase() {
            Self::PHASE_HEADER => "header",
            Self::PHASE_SECTION => "section",
            Self::PHASE_IREP => "irep",
            Self::PHASE_POOL => "pool",
            _ => "unknown",
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "load error in {} phase (code {:#010x}, detail {})",
            self.phase_name(),
            self.0,
            self.detail()
        )
    }
}

impl fmt::Debug for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Runtime (interpreter) exception taxonomy, raised by `RAISE` and by
/// intrinsic method failures. Mirrors the built-in exception classes spec.md
/// §4.6/§7 name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuntimeError {
    NoMethodError,
    TypeError,
    ArgumentError,
    IndexError,
    ZeroDivisionError,
    NameError,
    NotImplementedError,
    RuntimeError,
    StackOverflow,
}

impl RuntimeError {
    /// Name of the exception class this error raises as, for use in the
    /// exception object's `class` field and in `message`.
    #[must_use]
    pub const fn class_name(self) -> &'static str {
        match self {
            Self::NoMethodError => "NoMethodError",
            Self::TypeError => "TypeError",
            Self::ArgumentError => "ArgumentError",
            Self::IndexError => "IndexError",
            Self::ZeroDivisionError => "ZeroDivisionError",
            Self::NameError => "NameError",
            Self::NotImplementedError => "NotImplementedError",
            Self::RuntimeError => "RuntimeError",
            Self::StackOverflow => "StackOverflow",
        }
    }

    /// Default `#message` text for an exception raised from this error,
    /// matching the wording mruby's own built-in raises use.
    #[must_use]
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::NoMethodError => "undefined method",
            Self::TypeError => "type mismatch",
            Self::ArgumentError => "wrong number of arguments",
            Self::IndexError => "index out of range",
            Self::ZeroDivisionError => "divided by 0",
            Self::NameError => "uninitialized constant",
            Self::NotImplementedError => "not implemented",
            Self::RuntimeError => "runtime error",
            Self::StackOverflow => "stack level too deep",
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

/// Allocator failure: the pool has no free block large enough, or (debug
/// builds only) a consistency check on the free lists failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AllocError {
    OutOfMemory,
    InvalidFree,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory => f.write_str("allocator pool exhausted"),
            Self::InvalidFree => f.write_str("free of a handle the pool does not own"),
        }
    }
}
