// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

use super::*;
use crate::mem::TlsfPool;
use alloc::string::String;
use alloc::vec::Vec;

fn names() -> [crate::types::SymId; crate::class::BUILTIN_CLASS_COUNT] {
    core::array::from_fn(|i| crate::types::SymId::new(i as u16))
}

#[test]
fn integer_arithmetic() {
    let mut pool = TlsfPool::new(4096);
    let mut classes = ClassRegistry::new(crate::types::SymId::new(0), names());
    let mut out = Vec::new();
    let mut write = |b: &[u8]| out.extend_from_slice(b);
    let mut ctx = IntrinsicCtx {
        pool: &mut pool,
        classes: &mut classes,
        vm_id: VmId::new(1),
        receiver: Value::Integer(4),
        args: &[Value::Integer(3)],
        write: &mut write,
    };
    assert_eq!(integer_add(&mut ctx).unwrap(), Value::Integer(7));
    assert_eq!(integer_sub(&mut ctx).unwrap(), Value::Integer(1));
    assert_eq!(integer_mul(&mut ctx).unwrap(), Value::Integer(12));
}

#[test]
fn division_by_zero_raises() {
    let mut pool = TlsfPool::new(4096);
    let mut classes = ClassRegistry::new(crate::types::SymId::new(0), names());
    let mut out = Vec::new();
    let mut write = |b: &[u8]| out.extend_from_slice(b);
    let mut ctx = IntrinsicCtx {
        pool: &mut pool,
        classes: &mut classes,
        vm_id: VmId::new(1),
        receiver: Value::Integer(1),
        args: &[Value::Integer(0)],
        write: &mut write,
    };
    assert_eq!(integer_div(&mut ctx).unwrap_err(), RuntimeError::ZeroDivisionError);
}

#[test]
fn kernel_puts_writes_each_argument_followed_by_a_newline() {
    let mut pool = TlsfPool::new(4096);
    let mut classes = ClassRegistry::new(crate::types::SymId::new(0), names());
    let mut out = Vec::new();
    let class = classes.string_class();
    let s = HeapString::new(&mut pool, class, VmId::new(1), b"hi").unwrap();
    {
        let mut write = |b: &[u8]| out.extend_from_slice(b);
        let mut ctx = IntrinsicCtx {
            pool: &mut pool,
            classes: &mut classes,
            vm_id: VmId::new(1),
            receiver: Value::Nil,
            args: &[Value::String(s), Value::Integer(42)],
            write: &mut write,
        };
        kernel_puts(&mut ctx).unwrap();
    }
    assert_eq!(String::from_utf8(out).unwrap(), "hi\n42\n");
}

#[test]
fn string_concatenation_allocates_a_new_string() {
    let mut pool = TlsfPool::new(4096);
    let mut classes = ClassRegistry::new(crate::types::SymId::new(0), names());
    let class = classes.string_class();
    let a = HeapString::new(&mut pool, class, VmId::new(1), b"foo").unwrap();
    let b = HeapString::new(&mut pool, class, VmId::new(1), b"bar").unwrap();
    let mut out = Vec::new();
    let mut write = |bytes: &[u8]| out.extend_from_slice(bytes);
    let mut ctx = IntrinsicCtx {
        pool: &mut pool,
        classes: &mut classes,
        vm_id: VmId::new(1),
        receiver: Value::String(a),
        args: &[Value::String(b)],
        write: &mut write,
    };
    let result = string_plus(&mut ctx).unwrap();
    let Value::String(h) = result else { panic!("expected string") };
    assert_eq!(HeapString::as_bytes(ctx.pool, h), b"foobar");
}
