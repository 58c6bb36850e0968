// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Runtime value representation.
//!
//! Immediate values (nil, booleans, integers, floats, symbols, class
//! references) live entirely in the register slot. Compound values
//! (strings, arrays, hashes, ranges, exceptions, procs) are heap-allocated
//! and carry a [`Handle`] into the allocator's pool plus a refcount stored
//! in the heap block itself.


pub mod heap;

pub use heap::HeapHeader;

use crate::class::BuiltinClass;
use crate::config::{MrbcFloat, MrbcInt};
use crate::types::{ClassId, Handle, SymId};

/// A VM value: immediate or a handle into the heap.
#[derive(Clone, Copy, PartialEq, Default)]
pub enum Value {
    #[default]
    Nil,
    False,
    True,
    Integer(MrbcInt),
    #[cfg(feature = "float")]
    Float(MrbcFloat),
    Symbol(SymId),
    /// A reference to a class itself (the receiver of `Foo.new`, `Foo.class`).
    Class(ClassId),
    Object(Handle),
    Proc(Handle),
    Array(Handle),
    String(Handle),
    Range(Handle),
    Hash(Handle),
    Exception(Handle),
}

impl Value {
    #[inline]
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Ruby-style truthiness: everything but `nil` and `false` is truthy.
    #[inline]
    #[must_use]
    pub const fn is_truthy(&self) -> bool {
        !matches!(self, Self::Nil | Self::False)
    }

    /// Handle backing this value, if it is heap-allocated.
    #[inline]
    #[must_use]
    pub const fn handle(&self) -> Option<Handle> {
        match *self {
            Self::Object(h)
            | Self::Proc(h)
            | Self::Array(h)
            | Self::String(h)
            | Self::Range(h)
            | Self::Hash(h)
            | Self::Exception(h) => Some(h),
            _ => None,
        }
    }

    /// The built-in class this value is an instance of, for values whose
    /// class isn't user-overridable (used by `Object#class`/`is_a?` when the
    /// value has no heap header to consult).
    #[must_use]
    pub const fn immediate_class(&self) -> Option<BuiltinClass> {
        match self {
            Self::Nil => Some(BuiltinClass::NilClass),
            Self::False => Some(BuiltinClass::FalseClass),
            Self::True => Some(BuiltinClass::TrueClass),
            Self::Integer(_) => Some(BuiltinClass::Integer),
            #[cfg(feature = "float")]
            Self::Float(_) => Some(BuiltinClass::Float),
            Self::Symbol(_) => Some(BuiltinClass::Symbol),
            Self::Class(_) => Some(BuiltinClass::Class),
            _ => None,
        }
    }
}

/// Fixed-width on-heap encoding of a [`Value`]: a 1-byte tag followed by an
/// 8-byte payload, matching the tagged-union `mrbc_value` layout upstream.
/// Used wherever a compound heap object (array, hash, range) needs to store
/// `Value`s inside the allocator's byte pool rather than as native Rust
/// enum values.
pub const VALUE_REPR_SIZE: usize = 9;

const TAG_NIL: u8 = 0;
const TAG_FALSE: u8 = 1;
const TAG_TRUE: u8 = 2;
const TAG_INTEGER: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_SYMBOL: u8 = 5;
const TAG_CLASS: u8 = 6;
const TAG_OBJECT: u8 = 7;
const TAG_PROC: u8 = 8;
const TAG_ARRAY: u8 = 9;
const TAG_STRING: u8 = 10;
const TAG_RANGE: u8 = 11;
const TAG_HASH: u8 = 12;
const TAG_EXCEPTION: u8 = 13;

impl Value {
    /// Serializes this value into its fixed-width on-heap representation.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; VALUE_REPR_SIZE] {
        let mut out = [0u8; VALUE_REPR_SIZE];
        let (tag, payload): (u8, i64) = match *self {
            Self::Nil => (TAG_NIL, 0),
            Self::False => (TAG_FALSE, 0),
            Self::True => (TAG_TRUE, 0),
            Self::Integer(n) => (TAG_INTEGER, n as i64),
            #[cfg(feature = "float")]
            Self::Float(n) => (TAG_FLOAT, n.to_bits() as i64),
            Self::Symbol(s) => (TAG_SYMBOL, s.as_u16() as i64),
            Self::Class(c) => (TAG_CLASS, c.as_usize() as i64),
            Self::Object(h) => (TAG_OBJECT, h.0 as i64),
            Self::Proc(h) => (TAG_PROC, h.0 as i64),
            Self::Array(h) => (TAG_ARRAY, h.0 as i64),
            Self::String(h) => (TAG_STRING, h.0 as i64),
            Self::Range(h) => (TAG_RANGE, h.0 as i64),
            Self::Hash(h) => (TAG_HASH, h.0 as i64),
            Self::Exception(h) => (TAG_EXCEPTION, h.0 as i64),
        };
        out[0] = tag;
        out[1..9].copy_from_slice(&payload.to_le_bytes());
        out
    }

    /// Deserializes a value previously produced by [`Value::to_bytes`].
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let tag = bytes[0];
        let payload = i64::from_le_bytes(bytes[1..9].try_into().unwrap());
        match tag {
            TAG_FALSE => Self::False,
            TAG_TRUE => Self::True,
            TAG_INTEGER => Self::Integer(payload as MrbcInt),
            #[cfg(feature = "float")]
            TAG_FLOAT => Self::Float(MrbcFloat::from_bits(payload as u64)),
            TAG_SYMBOL => Self::Symbol(SymId::new(payload as u16)),
            TAG_CLASS => Self::Class(ClassId::new(payload as u16)),
            TAG_OBJECT => Self::Object(Handle::new(payload as u32)),
            TAG_PROC => Self::Proc(Handle::new(payload as u32)),
            TAG_ARRAY => Self::Array(Handle::new(payload as u32)),
            TAG_STRING => Self::String(Handle::new(payload as u32)),
            TAG_RANGE => Self::Range(Handle::new(payload as u32)),
            TAG_HASH => Self::Hash(Handle::new(payload as u32)),
            TAG_EXCEPTION => Self::Exception(Handle::new(payload as u32)),
            _ => Self::Nil,
        }
    }
}

impl core::fmt::Debug for Value {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Nil => write!(f, "nil"),
            Self::False => write!(f, "false"),
            Self::True => write!(f, "true"),
            Self::Integer(n) => write!(f, "{n}"),
            #[cfg(feature = "float")]
            Self::Float(n) => write!(f, "{n}"),
            Self::Symbol(s) => write!(f, ":{}", s.as_u16()),
            Self::Class(c) => write!(f, "Class({})", c.as_usize()),
            Self::Object(h) => write!(f, "Object({h:?})"),
            Self::Proc(h) => write!(f, "Proc({h:?})"),
            Self::Array(h) => write!(f, "Array({h:?})"),
            Self::String(h) => write!(f, "String({h:?})"),
            Self::Range(h) => write!(f, "Range({h:?})"),
            Self::Hash(h) => write!(f, "Hash({h:?})"),
            Self::Exception(h) => write!(f, "Exception({h:?})"),
        }
    }
}
