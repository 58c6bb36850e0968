// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Built-in method implementations.
//!
//! Every native method has the same signature so it can be stored as a
//! plain function pointer in a [`Method::Native`](crate::class::Method)
//! slot: it receives an [`IntrinsicCtx`] bundling the receiver, arguments,
//! and the process-wide state it may need to touch (the allocator, the
//! class registry, and an output sink for `Kernel#puts`/`print`).

use crate::mem::TlsfPool;
use crate::class::{BuiltinClass, ClassRegistry};
use crate::config::MrbcInt;
use crate::error::RuntimeError;
use crate::types::{ClassId, VmId};
use crate::value::heap::{HeapArray, HeapHeader, HeapString};
use crate::value::Value;

use alloc::vec::Vec;

/// Everything a native method implementation may need.
pub struct IntrinsicCtx<'a> {
    pub pool: &'a mut TlsfPool,
    pub classes: &'a mut ClassRegistry,
    pub vm_id: VmId,
    pub receiver: Value,
    pub args: &'a [Value],
    /// Sink for `Kernel#puts`/`print`; the VM wires this to `Hal::write`.
    pub write: &'a mut dyn FnMut(&[u8]),
}

pub type IntrinsicFn = fn(&mut IntrinsicCtx) -> Result<Value, RuntimeError>;

fn string_class(ctx: &IntrinsicCtx) -> ClassId {
    ctx.classes.string_class()
}

fn array_class(ctx: &IntrinsicCtx) -> ClassId {
    ctx.classes.array_class()
}

fn new_string(ctx: &mut IntrinsicCtx, bytes: &[u8]) -> Result<Value, RuntimeError> {
    let class = string_class(ctx);
    HeapString::new(ctx.pool, class, ctx.vm_id, bytes)
        .map(Value::String)
        .map_err(|_| RuntimeError::RuntimeError)
}

fn require_integer(value: Value) -> Result<MrbcInt, RuntimeError> {
    match value {
        Value::Integer(n) => Ok(n),
        _ => Err(RuntimeError::TypeError),
    }
}

// ---- Integer -----------------------------------------------------------------

pub fn integer_add(ctx: &mut IntrinsicCtx) -> Result<Value, RuntimeError> {
    let a = require_integer(ctx.receiver)?;
    let b = require_integer(ctx.args[0])?;
    Ok(Value::Integer(a.wrapping_add(b)))
}

pub fn integer_sub(ctx: &mut IntrinsicCtx) -> Result<Value, RuntimeError> {
    let a = require_integer(ctx.receiver)?;
    let b = require_integer(ctx.args[0])?;
    Ok(Value::Integer(a.wrapping_sub(b)))
}

pub fn integer_mul(ctx: &mut IntrinsicCtx) -> Result<Value, RuntimeError> {
    let a = require_integer(ctx.receiver)?;
    let b = require_integer(ctx.args[0])?;
    Ok(Value::Integer(a.wrapping_mul(b)))
}

pub fn integer_div(ctx: &mut IntrinsicCtx) -> Result<Value, RuntimeError> {
    let a = require_integer(ctx.receiver)?;
    let b = require_integer(ctx.args[0])?;
    if b == 0 {
        return Err(RuntimeError::ZeroDivisionError);
    }
    Ok(Value::Integer(a.wrapping_div(b)))
}

pub fn integer_to_s(ctx: &mut IntrinsicCtx) -> Result<Value, RuntimeError> {
    let n = require_integer(ctx.receiver)?;
    let mut buf = itoa_buf();
    let text = format_int(n, &mut buf);
    new_string(ctx, text.as_bytes())
}

fn itoa_buf() -> [u8; 24] {
    [0u8; 24]
}

fn format_int(n: MrbcInt, buf: &mut [u8; 24]) -> &str {
    if n == 0 {
        buf[0] = b'0';
        return core::str::from_utf8(&buf[..1]).unwrap();
    }
    let negative = n < 0;
    let mut i = buf.len();
    // work in a widened signed type so i64::MIN negation doesn't overflow
    let mut magnitude = (n as i64).unsigned_abs();
    while magnitude > 0 {
        i -= 1;
        buf[i] = b'0' + (magnitude % 10) as u8;
        magnitude /= 10;
    }
    if negative {
        i -= 1;
        buf[i] = b'-';
    }
    core::str::from_utf8(&buf[i..]).unwrap()
}

// ---- Comparison (shared by Integer/Float/String) ------------------------------

pub fn numeric_eq(ctx: &mut IntrinsicCtx) -> Result<Value, RuntimeError> {
    Ok(bool_value(values_equal(ctx.receiver, ctx.args[0])))
}

pub fn numeric_lt(ctx: &mut IntrinsicCtx) -> Result<Value, RuntimeError> {
    let a = require_integer(ctx.receiver)?;
    let b = require_integer(ctx.args[0])?;
    Ok(bool_value(a < b))
}

pub fn numeric_le(ctx: &mut IntrinsicCtx) -> Result<Value, RuntimeError> {
    let a = require_integer(ctx.receiver)?;
    let b = require_integer(ctx.args[0])?;
    Ok(bool_value(a <= b))
}

pub fn numeric_gt(ctx: &mut IntrinsicCtx) -> Result<Value, RuntimeError> {
    let a = require_integer(ctx.receiver)?;
    let b = require_integer(ctx.args[0])?;
    Ok(bool_value(a > b))
}

pub fn numeric_ge(ctx: &mut IntrinsicCtx) -> Result<Value, RuntimeError> {
    let a = require_integer(ctx.receiver)?;
    let b = require_integer(ctx.args[0])?;
    Ok(bool_value(a >= b))
}

fn bool_value(b: bool) -> Value {
    if b {
        Value::True
    } else {
        Value::False
    }
}

/// Structural equality, following the same per-variant rules `EQ` uses in
/// the interpreter loop (shared so `Array#==`/`Hash#==` and the opcode
/// agree).
pub fn values_equal(a: Value, b: Value) -> bool {
    match (a, b) {
        (Value::Nil, Value::Nil) | (Value::False, Value::False) | (Value::True, Value::True) => true,
        (Value::Integer(x), Value::Integer(y)) => x == y,
        #[cfg(feature = "float")]
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::Symbol(x), Value::Symbol(y)) => x == y,
        (Value::Class(x), Value::Class(y)) => x == y,
        (Value::Object(x), Value::Object(y))
        | (Value::Proc(x), Value::Proc(y))
        | (Value::Array(x), Value::Array(y))
        | (Value::String(x), Value::String(y))
        | (Value::Range(x), Value::Range(y))
        | (Value::Hash(x), Value::Hash(y))
        | (Value::Exception(x), Value::Exception(y)) => x == y,
        _ => false,
    }
}

// ---- String ---------------------------------------------------------------------

pub fn string_plus(ctx: &mut IntrinsicCtx) -> Result<Value, RuntimeError> {
    let Value::String(lhs) = ctx.receiver else {
        return Err(RuntimeError::TypeError);
    };
    let Value::String(rhs) = ctx.args[0] else {
        return Err(RuntimeError::TypeError);
    };
    let mut bytes = Vec::new();
    bytes.extend_from_slice(HeapString::as_bytes(ctx.pool, lhs));
    bytes.extend_from_slice(HeapString::as_bytes(ctx.pool, rhs));
    new_string(ctx, &bytes)
}

pub fn string_size(ctx: &mut IntrinsicCtx) -> Result<Value, RuntimeError> {
    let Value::String(h) = ctx.receiver else {
        return Err(RuntimeError::TypeError);
    };
    Ok(Value::Integer(HeapString::len(ctx.pool, h) as MrbcInt))
}

pub fn string_to_s(ctx: &mut IntrinsicCtx) -> Result<Value, RuntimeError> {
    Ok(ctx.receiver)
}

// ---- Array ------------------------------------------------------------------------

pub fn array_size(ctx: &mut IntrinsicCtx) -> Result<Value, RuntimeError> {
    let Value::Array(h) = ctx.receiver else {
        return Err(RuntimeError::TypeError);
    };
    Ok(Value::Integer(HeapArray::len(ctx.pool, h) as MrbcInt))
}

pub fn array_index_get(ctx: &mut IntrinsicCtx) -> Result<Value, RuntimeError> {
    let Value::Array(h) = ctx.receiver else {
        return Err(RuntimeError::TypeError);
    };
    let index = require_integer(ctx.args[0])?;
    let len = HeapArray::len(ctx.pool, h) as MrbcInt;
    let normalized = if index < 0 { index + len } else { index };
    if normalized < 0 || normalized >= len {
        return Ok(Value::Nil);
    }
    Ok(HeapArray::get(ctx.pool, h, normalized as u32))
}

pub fn array_push(ctx: &mut IntrinsicCtx) -> Result<Value, RuntimeError> {
    let Value::Array(h) = ctx.receiver else {
        return Err(RuntimeError::TypeError);
    };
    let mut elements = HeapArray::to_vec(ctx.pool, h);
    elements.push(ctx.args[0]);
    let class = array_class(ctx);
    let new_handle = HeapArray::new(ctx.pool, class, ctx.vm_id, &elements).map_err(|_| RuntimeError::RuntimeError)?;
    HeapHeader::release(ctx.pool, Value::Array(h));
    Ok(Value::Array(new_handle))
}

// ---- Exception --------------------------------------------------------------------

pub fn exception_message(ctx: &mut IntrinsicCtx) -> Result<Value, RuntimeError> {
    let Value::Exception(h) = ctx.receiver else {
        return Err(RuntimeError::TypeError);
    };
    match crate::value::heap::HeapException::message(ctx.pool, h) {
        Some(msg) => {
            HeapHeader::retain(ctx.pool, Value::String(msg));
            Ok(Value::String(msg))
        }
        None => new_string(ctx, b""),
    }
}

// ---- Object / Kernel ------------------------------------------------------------

pub fn object_class(ctx: &mut IntrinsicCtx) -> Result<Value, RuntimeError> {
    Ok(Value::Class(class_of(ctx.pool, ctx.classes, ctx.receiver)))
}

pub fn object_is_a(ctx: &mut IntrinsicCtx) -> Result<Value, RuntimeError> {
    let Value::Class(other) = ctx.args[0] else {
        return Err(RuntimeError::TypeError);
    };
    let own = class_of(ctx.pool, ctx.classes, ctx.receiver);
    Ok(bool_value(ctx.classes.is_a(own, other)))
}

/// Resolves the class of any value, consulting the heap header for
/// heap-allocated objects and [`Value::immediate_class`] otherwise.
#[must_use]
pub fn class_of(pool: &TlsfPool, classes: &ClassRegistry, value: Value) -> ClassId {
    if let Some(builtin) = value.immediate_class() {
        return ClassId::new(builtin as u16);
    }
    if let Some(h) = value.handle() {
        return HeapHeader::class(pool, h);
    }
    classes.object_class()
}

pub fn kernel_puts(ctx: &mut IntrinsicCtx) -> Result<Value, RuntimeError> {
    for arg in ctx.args {
        write_display(ctx.pool, *arg, ctx.write);
        (ctx.write)(b"\n");
    }
    if ctx.args.is_empty() {
        (ctx.write)(b"\n");
    }
    Ok(Value::Nil)
}

pub fn kernel_print(ctx: &mut IntrinsicCtx) -> Result<Value, RuntimeError> {
    for arg in ctx.args {
        write_display(ctx.pool, *arg, ctx.write);
    }
    Ok(Value::Nil)
}

fn write_display(pool: &TlsfPool, value: Value, write: &mut dyn FnMut(&[u8])) {
    match value {
        Value::Nil => write(b""),
        Value::False => write(b"false"),
        Value::True => write(b"true"),
        Value::Integer(n) => {
            let mut buf = itoa_buf();
            write(format_int(n, &mut buf).as_bytes());
        }
        Value::String(h) => write(HeapString::as_bytes(pool, h)),
        Value::Symbol(s) => write(&[s.as_u16() as u8]),
        _ => write(b"#<object>"),
    }
}

/// Registers every built-in method against its class in `classes`, using
/// the fixed [`SymId`](crate::types::SymId)s assigned to
/// [`crate::symbol::BUILTIN_SYMBOLS`] at startup.
pub fn register_builtins(classes: &mut ClassRegistry, sym: impl Fn(&str) -> crate::types::SymId) {
    use BuiltinClass::*;
    let mut def = |class: BuiltinClass, name: &str, f: IntrinsicFn| {
        classes.define_method(ClassId::new(class as u16), sym(name), crate::class::Method::Native(f));
    };

    def(Integer, "+", integer_add);
    def(Integer, "-", integer_sub);
    def(Integer, "*", integer_mul);
    def(Integer, "/", integer_div);
    def(Integer, "==", numeric_eq);
    def(Integer, "<", numeric_lt);
    def(Integer, "<=", numeric_le);
    def(Integer, ">", numeric_gt);
    def(Integer, ">=", numeric_ge);
    def(Integer, "to_s", integer_to_s);

    def(String, "+", string_plus);
    def(String, "size", string_size);
    def(String, "length", string_size);
    def(String, "to_s", string_to_s);
    def(String, "==", numeric_eq);

    def(Array, "size", array_size);
    def(Array, "length", array_size);
    def(Array, "[]", array_index_get);
    def(Array, "push", array_push);
    def(Array, "==", numeric_eq);

    def(Exception, "message", exception_message);
    def(Exception, "to_s", exception_message);

    def(Object, "class", object_class);
    def(Object, "is_a?", object_is_a);
    // Kernel#puts/print are mixed into every Object in real Ruby; this VM
    // has no module-inclusion machinery, so they are defined directly on
    // Object, which every other built-in class inherits from.
    def(Object, "puts", kernel_puts);
    def(Object, "print", kernel_print);
}

#[cfg(test)]
mod intrinsics_test;
