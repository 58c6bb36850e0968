// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! On-heap object layouts and reference counting.
//!
//! Every heap object starts with a 4-byte [`HeapHeader`] (refcount + owning
//! class) followed by a type-specific payload. There is no garbage
//! collector: [`HeapHeader::retain`]/[`HeapHeader::release`] implement plain
//! reference counting, which is sufficient because the object graph this VM
//! can construct from RITE bytecode has no cycles (arrays/hashes hold
//! `Value`s, never a back-reference to their own container).

use crate::mem::TlsfPool;
use crate::types::{ClassId, Handle, VmId};
use crate::value::{Value, VALUE_REPR_SIZE};

use alloc::vec::Vec;

const HEADER_SIZE: u32 = 4;

/// View over the common 4-byte prefix every heap object carries.
pub struct HeapHeader;

impl HeapHeader {
    #[must_use]
    pub fn refcount(pool: &TlsfPool, handle: Handle) -> u16 {
        u16::from_le_bytes(pool.payload(handle, 2).try_into().unwrap())
    }

    fn set_refcount(pool: &mut TlsfPool, handle: Handle, count: u16) {
        pool.payload_mut(handle, 2).copy_from_slice(&count.to_le_bytes());
    }

    #[must_use]
    pub fn class(pool: &TlsfPool, handle: Handle) -> ClassId {
        let bytes = pool.payload(handle, HEADER_SIZE);
        ClassId::new(u16::from_le_bytes(bytes[2..4].try_into().unwrap()))
    }

    fn write_header(pool: &mut TlsfPool, handle: Handle, refcount: u16, class: ClassId) {
        let buf = pool.payload_mut(handle, HEADER_SIZE);
        buf[0..2].copy_from_slice(&refcount.to_le_bytes());
        buf[2..4].copy_from_slice(&class.as_usize().to_le_bytes()[..2]);
    }

    /// Increments the refcount of a heap value in place. A no-op for
    /// immediate values.
    pub fn retain(pool: &mut TlsfPool, value: Value) {
        if let Some(h) = value.handle() {
            let count = Self::refcount(pool, h);
            Self::set_refcount(pool, h, count + 1);
        }
    }

    /// Decrements the refcount of a heap value, freeing it (and releasing
    /// every `Value` it owns, recursively) once it reaches zero. A no-op
    /// for immediate values.
    pub fn release(pool: &mut TlsfPool, value: Value) {
        let Some(h) = value.handle() else { return };
        let count = Self::refcount(pool, h);
        if count > 1 {
            Self::set_refcount(pool, h, count - 1);
            return;
        }
        match value {
            Value::Array(h) => {
                let len = HeapArray::len(pool, h);
                for i in 0..len {
                    let element = HeapArray::get(pool, h, i);
                    Self::release(pool, element);
                }
            }
            Value::Hash(h) => {
                let len = HeapHash::len(pool, h);
                for i in 0..len {
                    let (key, val) = HeapHash::entry(pool, h, i);
                    Self::release(pool, key);
                    Self::release(pool, val);
                }
            }
            Value::Range(h) => {
                let (start, end) = HeapRange::bounds(pool, h);
                Self::release(pool, start);
                Self::release(pool, end);
            }
            Value::Exception(h) => {
                if let Some(msg) = HeapException::message(pool, h) {
                    Self::release(pool, Value::String(msg));
                }
            }
            Value::Object(h) => {
                // generic objects have no additional owned Values in this VM
                let _ = h;
            }
            _ => {}
        }
        pool.free(h);
    }
}

fn new_object(pool: &mut TlsfPool, vm_id: VmId, class: ClassId, extra: u32) -> Result<Handle, crate::error::AllocError> {
    let handle = pool.alloc(HEADER_SIZE + extra, vm_id)?;
    HeapHeader::write_header(pool, handle, 1, class);
    Ok(handle)
}

/// A heap-allocated, immutable byte string.
pub struct HeapString;

impl HeapString {
    pub fn new(
        pool: &mut TlsfPool,
        class: ClassId,
        vm_id: VmId,
        bytes: &[u8],
    ) -> Result<Handle, crate::error::AllocError> {
        let handle = new_object(pool, vm_id, class, 4 + bytes.len() as u32)?;
        let buf = pool.payload_mut(handle, HEADER_SIZE + 4 + bytes.len() as u32);
        buf[4..8].copy_from_slice(&(bytes.len() as u32).to_le_bytes());
        buf[8..8 + bytes.len()].copy_from_slice(bytes);
        Ok(handle)
    }

    #[must_use]
    pub fn len(pool: &TlsfPool, handle: Handle) -> u32 {
        u32::from_le_bytes(pool.payload(handle, HEADER_SIZE + 4)[4..8].try_into().unwrap())
    }

    #[must_use]
    pub fn as_bytes<'a>(pool: &'a TlsfPool, handle: Handle) -> &'a [u8] {
        let len = Self::len(pool, handle);
        &pool.payload(handle, HEADER_SIZE + 4 + len)[8..]
    }
}

/// A heap-allocated, fixed-length array of [`Value`]s.
pub struct HeapArray;

impl HeapArray {
    fn alloc_size(len: u32) -> u32 {
        4 + len * VALUE_REPR_SIZE as u32
    }

    pub fn new(
        pool: &mut TlsfPool,
        class: ClassId,
        vm_id: VmId,
        elements: &[Value],
    ) -> Result<Handle, crate::error::AllocError> {
        let len = elements.len() as u32;
        let handle = new_object(pool, vm_id, class, Self::alloc_size(len))?;
        {
            let buf = pool.payload_mut(handle, HEADER_SIZE + Self::alloc_size(len));
            buf[4..8].copy_from_slice(&len.to_le_bytes());
        }
        for (i, value) in elements.iter().enumerate() {
            Self::set(pool, handle, i as u32, *value);
            HeapHeader::retain(pool, *value);
        }
        Ok(handle)
    }

    #[must_use]
    pub fn len(pool: &TlsfPool, handle: Handle) -> u32 {
        u32::from_le_bytes(pool.payload(handle, HEADER_SIZE + 4)[4..8].try_into().unwrap())
    }

    #[must_use]
    pub fn get(pool: &TlsfPool, handle: Handle, index: u32) -> Value {
        let len = Self::len(pool, handle);
        let buf = pool.payload(handle, HEADER_SIZE + Self::alloc_size(len));
        let off = (8 + index * VALUE_REPR_SIZE as u32) as usize;
        Value::from_bytes(&buf[off..off + VALUE_REPR_SIZE])
    }

    pub fn set(pool: &mut TlsfPool, handle: Handle, index: u32, value: Value) {
        let len = Self::len(pool, handle);
        let buf = pool.payload_mut(handle, HEADER_SIZE + Self::alloc_size(len));
        let off = (8 + index * VALUE_REPR_SIZE as u32) as usize;
        buf[off..off + VALUE_REPR_SIZE].copy_from_slice(&value.to_bytes());
    }

    #[must_use]
    pub fn to_vec(pool: &TlsfPool, handle: Handle) -> Vec<Value> {
        (0..Self::len(pool, handle)).map(|i| Self::get(pool, handle, i)).collect()
    }
}

/// A heap-allocated association list (linear scan; `MAX_SYMBOLS_COUNT`-scale
/// programs never need anything fancier).
pub struct HeapHash;

impl HeapHash {
    fn alloc_size(len: u32) -> u32 {
        4 + len * (2 * VALUE_REPR_SIZE as u32)
    }

    pub fn new(
        pool: &mut TlsfPool,
        class: ClassId,
        vm_id: VmId,
        entries: &[(Value, Value)],
    ) -> Result<Handle, crate::error::AllocError> {
        let len = entries.len() as u32;
        let handle = new_object(pool, vm_id, class, Self::alloc_size(len))?;
        {
            let buf = pool.payload_mut(handle, HEADER_SIZE + Self::alloc_size(len));
            buf[4..8].copy_from_slice(&len.to_le_bytes());
        }
        for (i, (k, v)) in entries.iter().enumerate() {
            Self::write_entry(pool, handle, i as u32, *k, *v);
            HeapHeader::retain(pool, *k);
            HeapHeader::retain(pool, *v);
        }
        Ok(handle)
    }

    #[must_use]
    pub fn len(pool: &TlsfPool, handle: Handle) -> u32 {
        u32::from_le_bytes(pool.payload(handle, HEADER_SIZE + 4)[4..8].try_into().unwrap())
    }

    #[must_use]
    pub fn entry(pool: &TlsfPool, handle: Handle, index: u32) -> (Value, Value) {
        let len = Self::len(pool, handle);
        let buf = pool.payload(handle, HEADER_SIZE + Self::alloc_size(len));
        let stride = 2 * VALUE_REPR_SIZE as u32;
        let off = (8 + index * stride) as usize;
        let key = Value::from_bytes(&buf[off..off + VALUE_REPR_SIZE]);
        let val = Value::from_bytes(&buf[off + VALUE_REPR_SIZE..off + 2 * VALUE_REPR_SIZE]);
        (key, val)
    }

    fn write_entry(pool: &mut TlsfPool, handle: Handle, index: u32, key: Value, val: Value) {
        let len = Self::len(pool, handle);
        let buf = pool.payload_mut(handle, HEADER_SIZE + Self::alloc_size(len));
        let stride = 2 * VALUE_REPR_SIZE as u32;
        let off = (8 + index * stride) as usize;
        buf[off..off + VALUE_REPR_SIZE].copy_from_slice(&key.to_bytes());
        buf[off + VALUE_REPR_SIZE..off + 2 * VALUE_REPR_SIZE].copy_from_slice(&val.to_bytes());
    }
}

/// A heap-allocated `Range` (`a..b` or `a...b`).
pub struct HeapRange;

impl HeapRange {
    const SIZE: u32 = 2 * VALUE_REPR_SIZE as u32 + 1;

    pub fn new(
        pool: &mut TlsfPool,
        class: ClassId,
        vm_id: VmId,
        start: Value,
        end: Value,
        inclusive: bool,
    ) -> Result<Handle, crate::error::AllocError> {
        let handle = new_object(pool, vm_id, class, Self::SIZE)?;
        let buf = pool.payload_mut(handle, HEADER_SIZE + Self::SIZE);
        buf[4..4 + VALUE_REPR_SIZE].copy_from_slice(&start.to_bytes());
        buf[4 + VALUE_REPR_SIZE..4 + 2 * VALUE_REPR_SIZE].copy_from_slice(&end.to_bytes());
        buf[4 + 2 * VALUE_REPR_SIZE] = u8::from(inclusive);
        HeapHeader::retain(pool, start);
        HeapHeader::retain(pool, end);
        Ok(handle)
    }

    #[must_use]
    pub fn bounds(pool: &TlsfPool, handle: Handle) -> (Value, Value) {
        let buf = pool.payload(handle, HEADER_SIZE + Self::SIZE);
        (
            Value::from_bytes(&buf[4..4 + VALUE_REPR_SIZE]),
            Value::from_bytes(&buf[4 + VALUE_REPR_SIZE..4 + 2 * VALUE_REPR_SIZE]),
        )
    }

    #[must_use]
    pub fn is_inclusive(pool: &TlsfPool, handle: Handle) -> bool {
        pool.payload(handle, HEADER_SIZE + Self::SIZE)[4 + 2 * VALUE_REPR_SIZE] != 0
    }
}

/// A heap-allocated exception object, raised by `RAISE` and caught by a
/// `rescue` block.
pub struct HeapException;

impl HeapException {
    const SIZE: u32 = 4;

    pub fn new(
        pool: &mut TlsfPool,
        vm_id: VmId,
        class: ClassId,
        message: Option<Handle>,
    ) -> Result<Handle, crate::error::AllocError> {
        let handle = new_object(pool, vm_id, class, Self::SIZE)?;
        let buf = pool.payload_mut(handle, HEADER_SIZE + Self::SIZE);
        buf.copy_from_slice(&message.unwrap_or(Handle::NULL).0.to_le_bytes());
        if let Some(msg) = message {
            HeapHeader::retain(pool, Value::String(msg));
        }
        Ok(handle)
    }

    #[must_use]
    pub fn message(pool: &TlsfPool, handle: Handle) -> Option<Handle> {
        let raw = u32::from_le_bytes(pool.payload(handle, HEADER_SIZE + Self::SIZE).try_into().unwrap());
        let h = Handle::new(raw);
        if h.is_null() {
            None
        } else {
            Some(h)
        }
    }
}

/// A heap-allocated closure: a reference to an IREP entry plus the class it
/// was defined in (used for `super`).
pub struct HeapProc;

impl HeapProc {
    const SIZE: u32 = 4;

    pub fn new(
        pool: &mut TlsfPool,
        class: ClassId,
        vm_id: VmId,
        irep_index: u32,
    ) -> Result<Handle, crate::error::AllocError> {
        let handle = new_object(pool, vm_id, class, Self::SIZE)?;
        pool.payload_mut(handle, HEADER_SIZE + Self::SIZE).copy_from_slice(&irep_index.to_le_bytes());
        Ok(handle)
    }

    #[must_use]
    pub fn irep_index(pool: &TlsfPool, handle: Handle) -> u32 {
        u32::from_le_bytes(pool.payload(handle, HEADER_SIZE + Self::SIZE).try_into().unwrap())
    }
}

#[cfg(test)]
mod heap_test;
