// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The parsed, in-memory form of an IREP ("instruction representation")
//! record: one method/block body's register count, bytecode, literal pool,
//! local symbol table, and nested child IREPs (one per block/method/class
//! body defined within it).

use crate::types::SymId;
use crate::value::Value;

use alloc::vec::Vec;

pub struct Irep {
    pub nlocals: u16,
    pub nregs: u16,
    /// This IREP's own symbol table: bytecode operands that name a method
    /// or global (`SEND`, `GETGV`, ...) index into this table rather than
    /// holding a global `SymId` directly, so the same bytecode is portable
    /// across a symbol table built in a different order.
    pub syms: Vec<SymId>,
    pub pool: Vec<Value>,
    pub code: Vec<u8>,
    /// Indices into the owning [`Program`]'s arena, one per nested
    /// block/method/class body defined within this IREP.
    pub children: Vec<u32>,
}

impl Irep {
    #[must_use]
    pub fn sym(&self, local_index: u16) -> Option<SymId> {
        self.syms.get(local_index as usize).copied()
    }

    #[must_use]
    pub fn literal(&self, index: u16) -> Option<Value> {
        self.pool.get(index as usize).copied()
    }

    #[must_use]
    pub fn child(&self, index: u16) -> Option<u32> {
        self.children.get(index as usize).copied()
    }
}

/// A whole loaded program: a flat arena of every IREP it contains, indexed
/// by the `u32` ids [`Irep::children`] and
/// [`crate::value::heap::HeapProc::irep_index`] point into. Flattening the
/// tree at load time means a call frame only needs to carry an index, not a
/// borrowed reference with a lifetime tied to the program.
pub struct Program {
    pub ireps: Vec<Irep>,
    pub root: u32,
}

impl Program {
    #[must_use]
    pub fn irep(&self, index: u32) -> &Irep {
        &self.ireps[index as usize]
    }
}
