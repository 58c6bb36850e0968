// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Small newtypes shared across the crate.
//!
//! These exist for the same reason `Vaddr`/`Paddr` do in similarly-scoped
//! embedded interpreters: they stop a raw `u32`/`u16` meant as a symbol id
//! from being passed where a heap offset or a VM id is expected.

use core::fmt;

/// Interned-string id. 16 bits, per the upstream `mrbc_sym` budget.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct SymId(pub u16);

impl SymId {
    #[inline]
    #[must_use]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Debug for SymId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymId({})", self.0)
    }
}

/// Class id: either a builtin tag-indexed class or a dynamically registered
/// user class.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct ClassId(pub u16);

impl ClassId {
    #[inline]
    #[must_use]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({})", self.0)
    }
}

/// Task / VM identity, used to tag allocator blocks for bulk reclamation.
///
/// `0` is reserved to mean "no owner" / "shared, process-wide" (symbol
/// strings, builtin class objects): such blocks are never touched by
/// `free_all`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct VmId(pub u8);

impl VmId {
    pub const SHARED: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    #[inline]
    #[must_use]
    pub const fn is_shared(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for VmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VmId({})", self.0)
    }
}

/// An offset into the allocator's memory pool, identifying a heap block.
///
/// This plays the role `Vaddr` plays in address-space-based interpreters,
/// but the pool here is a single flat `[u8]` owned by the allocator rather
/// than a page-mapped address space, so the offset is a plain `u32`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Handle(pub u32);

impl Handle {
    /// Sentinel used for "no block" (free-list terminator, null handle).
    pub const NULL: Self = Self(u32::MAX);

    #[inline]
    #[must_use]
    pub const fn new(offset: u32) -> Self {
        Self(offset)
    }

    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == Self::NULL.0
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    #[inline]
    #[must_use]
    pub const fn add(self, offset: u32) -> Self {
        Self(self.0.wrapping_add(offset))
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "Handle(null)")
        } else {
            write!(f, "Handle(+{:#x})", self.0)
        }
    }
}
