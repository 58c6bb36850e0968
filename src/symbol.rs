// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Symbol interning.
//!
//! A fixed-capacity table mapping strings to 16-bit [`SymId`]s and back.
//! Capped at [`MAX_SYMBOLS_COUNT`], matching the upstream `mrbc_sym` budget;
//! exceeding it is a load-time error rather than a silent table growth,
//! since the id space itself is fixed width.

use crate::mem::TlsfPool;
use crate::class::BuiltinClass;
use crate::config::MAX_SYMBOLS_COUNT;
use crate::error::RuntimeError;
use crate::types::{ClassId, SymId, VmId};
use crate::value::heap::HeapString;

use alloc::string::String;
use alloc::vec::Vec;

struct Entry {
    text: String,
    /// Backing heap allocation for `Symbol#to_s` / error messages, permanent
    /// (`alloc_no_free`) since symbol text outlives every task.
    handle: Option<crate::types::Handle>,
}

/// The process-wide symbol table. There is exactly one; it is never
/// per-task, since symbols are shared across every VM.
pub struct SymbolTable {
    entries: Vec<Entry>,
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Interns `text`, returning its existing id if already present or a
    /// freshly assigned one otherwise. The symbol's backing string is
    /// allocated with [`TlsfPool::alloc_no_free`] so later `free_all` calls
    /// never reclaim it.
    pub fn intern(&mut self, pool: &mut TlsfPool, text: &str) -> Result<SymId, RuntimeError> {
        if let Some(id) = self.lookup(text) {
            return Ok(id);
        }
        if self.entries.len() >= MAX_SYMBOLS_COUNT {
            return Err(RuntimeError::RuntimeError);
        }
        let string_class = ClassId::new(BuiltinClass::String as u16);
        let handle = HeapString::new(pool, string_class, VmId::SHARED, text.as_bytes()).ok();
        let id = SymId::new(self.entries.len() as u16);
        self.entries.push(Entry {
            text: String::from(text),
            handle,
        });
        Ok(id)
    }

    /// Reserves a symbol id without an owning class registry available yet
    /// (used to preload the builtin symbol table before `ClassRegistry`
    /// exists). The backing string is kept purely in the table's own
    /// `String`; no heap allocation is made.
    pub fn intern_builtin(&mut self, text: &str) -> SymId {
        if let Some(id) = self.lookup(text) {
            return id;
        }
        let id = SymId::new(self.entries.len() as u16);
        self.entries.push(Entry {
            text: String::from(text),
            handle: None,
        });
        id
    }

    #[must_use]
    pub fn lookup(&self, text: &str) -> Option<SymId> {
        self.entries.iter().position(|e| e.text == text).map(|i| SymId::new(i as u16))
    }

    #[must_use]
    pub fn text(&self, id: SymId) -> &str {
        &self.entries[id.as_u16() as usize].text
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Names preloaded into the symbol table at startup so their ids are
/// stable across builds and programs never need to intern them on first
/// use, matching spec.md's `symbol_builtin` requirement.
pub const BUILTIN_SYMBOLS: &[&str] = &[
    "+", "-", "*", "/", "%", "==", "!=", "<", "<=", ">", ">=", "<=>",
    "size", "length", "to_s", "to_i", "to_f", "to_a", "call", "new",
    "each", "message", "class", "is_a?", "puts", "print", "inspect",
];

#[cfg(test)]
mod symbol_test;
