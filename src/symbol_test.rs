// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

use super::*;
use crate::mem::TlsfPool;
use alloc::vec::Vec;

#[test]
fn interning_the_same_text_twice_returns_the_same_id() {
    let mut pool = TlsfPool::new(8192);
    let mut table = SymbolTable::new();
    let a = table.intern(&mut pool, "foo").unwrap();
    let b = table.intern(&mut pool, "foo").unwrap();
    assert_eq!(a, b);
    assert_eq!(table.text(a), "foo");
}

#[test]
fn distinct_text_gets_distinct_ids() {
    let mut pool = TlsfPool::new(8192);
    let mut table = SymbolTable::new();
    let a = table.intern(&mut pool, "foo").unwrap();
    let b = table.intern(&mut pool, "bar").unwrap();
    assert_ne!(a, b);
}

#[test]
fn builtin_symbols_preload_with_stable_ids() {
    let mut table = SymbolTable::new();
    let ids: Vec<SymId> = BUILTIN_SYMBOLS.iter().map(|s| table.intern_builtin(s)).collect();
    for (i, id) in ids.iter().enumerate() {
        assert_eq!(id.as_u16() as usize, i);
    }
    assert_eq!(table.lookup("puts"), Some(ids[BUILTIN_SYMBOLS.iter().position(|s| *s == "puts").unwrap()]));
}
