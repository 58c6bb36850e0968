// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! RITE 0300 binary loader.
//!
//! Parses the 20-byte binary header, the section table, and the recursive
//! IREP tree out of an in-memory `.mrb` buffer, interning every symbol name
//! it encounters into the shared [`SymbolTable`] and allocating every
//! string literal as a permanent (`alloc_no_free`) heap string so it
//! outlives every task that might still reference it as a constant.

use crate::mem::TlsfPool;
use crate::class::ClassRegistry;
use crate::error::LoadError;
use crate::irep::{Irep, Program};
use crate::symbol::SymbolTable;
use crate::value::heap::HeapString;
use crate::value::Value;

use alloc::vec::Vec;

const IDENT: &[u8; 8] = b"RITE0300";
const BINARY_HEADER_SIZE: usize = 20;
const SECTION_HEADER_SIZE: usize = 12;
const IREP_TAG: &[u8; 4] = b"IREP";
const END_TAG: &[u8; 4] = b"END\0";

const POOL_TAG_STR: u8 = 0;
const POOL_TAG_INT32: u8 = 1;
const POOL_TAG_SSTR: u8 = 2;
const POOL_TAG_INT64: u8 = 3;
const POOL_TAG_FLOAT: u8 = 5;

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], LoadError> {
        let end = self.pos.checked_add(len).ok_or_else(LoadError::truncated_irep)?;
        let slice = self.buf.get(self.pos..end).ok_or_else(LoadError::truncated_irep)?;
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, LoadError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, LoadError> {
        Ok(u16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> Result<u32, LoadError> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64, LoadError> {
        Ok(u64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn bytes(&mut self, len: u32) -> Result<&'a [u8], LoadError> {
        self.take(len as usize)
    }
}

/// Parses a whole `.mrb` buffer into a flattened [`Program`].
///
/// `pool`/`symbols`/`classes` are the process-wide state every loaded
/// program's literal pool and symbol references get installed into.
pub fn load(
    bin: &[u8],
    pool: &mut TlsfPool,
    symbols: &mut SymbolTable,
    classes: &ClassRegistry,
) -> Result<Program, LoadError> {
    if bin.len() < BINARY_HEADER_SIZE {
        return Err(LoadError::truncated_header());
    }
    if &bin[0..8] != IDENT {
        return Err(LoadError::bad_identifier());
    }
    let declared_size = u32::from_be_bytes(bin[8..12].try_into().unwrap());
    if declared_size as usize != bin.len() {
        return Err(LoadError::size_mismatch());
    }

    let mut reader = Reader::new(&bin[BINARY_HEADER_SIZE..]);
    let mut ireps = Vec::new();
    let mut root = None;

    loop {
        if reader.pos + SECTION_HEADER_SIZE > reader.buf.len() {
            return Err(LoadError::truncated_section());
        }
        let tag = reader.take(4)?;
        let section_size = reader.u32()?;
        let _reserved = reader.u32()?;

        if tag == END_TAG {
            break;
        }
        if tag != IREP_TAG {
            return Err(LoadError::unknown_section_tag());
        }
        if (section_size as usize) < SECTION_HEADER_SIZE {
            return Err(LoadError::truncated_section());
        }
        let body_len = section_size as usize - SECTION_HEADER_SIZE;
        let body = reader.take(body_len)?;
        let mut body_reader = Reader::new(body);
        root = Some(parse_irep(&mut body_reader, pool, symbols, classes, 0, &mut ireps)?);
    }

    let root = root.ok_or_else(LoadError::truncated_section)?;
    Ok(Program { ireps, root })
}

const MAX_IREP_DEPTH: u32 = 64;

/// Parses one IREP record, pushes it into the arena, and returns its index.
/// Children are parsed (and pushed) before the parent so depth-first
/// traversal order matches source order, but the parent is always pushed
/// last so its own index is `ireps.len() - 1` at the point of return.
fn parse_irep(
    r: &mut Reader<'_>,
    pool: &mut TlsfPool,
    symbols: &mut SymbolTable,
    classes: &ClassRegistry,
    depth: u32,
    ireps: &mut Vec<Irep>,
) -> Result<u32, LoadError> {
    if depth > MAX_IREP_DEPTH {
        return Err(LoadError::irep_nesting_too_deep());
    }

    let nlocals = r.u16()?;
    let nregs = r.u16()?;
    let rlen = r.u16()?;
    if nregs as usize > crate::config::MAX_REGS_SIZE {
        return Err(LoadError::too_many_registers());
    }

    let code_len = r.u32()?;
    let code = r.bytes(code_len)?.to_vec();

    let pool_len = r.u32()?;
    let mut values = Vec::with_capacity(pool_len as usize);
    for _ in 0..pool_len {
        values.push(parse_pool_value(r, pool, classes)?);
    }

    let sym_len = r.u32()?;
    let mut syms = Vec::with_capacity(sym_len as usize);
    for _ in 0..sym_len {
        let name_len = r.u32()?;
        let name_bytes = r.bytes(name_len)?;
        let name = core::str::from_utf8(name_bytes).map_err(|_| LoadError::truncated_irep())?;
        let id = symbols.intern(pool, name).map_err(|_| LoadError::truncated_irep())?;
        syms.push(id);
    }

    let mut children = Vec::with_capacity(rlen as usize);
    for _ in 0..rlen {
        children.push(parse_irep(r, pool, symbols, classes, depth + 1, ireps)?);
    }

    ireps.push(Irep {
        nlocals,
        nregs,
        syms,
        pool: values,
        code,
        children,
    });
    Ok(ireps.len() as u32 - 1)
}

fn parse_pool_value(r: &mut Reader<'_>, pool: &mut TlsfPool, classes: &ClassRegistry) -> Result<Value, LoadError> {
    let tag = r.u8()?;
    match tag {
        POOL_TAG_STR | POOL_TAG_SSTR => {
            let len = r.u32()?;
            let bytes = r.bytes(len)?;
            let handle = HeapString::new(pool, classes.string_class(), crate::types::VmId::SHARED, bytes)
                .map_err(|_| LoadError::truncated_pool())?;
            Ok(Value::String(handle))
        }
        POOL_TAG_INT32 => {
            let raw = r.u32()? as i32;
            Ok(Value::Integer(raw as crate::config::MrbcInt))
        }
        POOL_TAG_INT64 => {
            let raw = r.u64()? as i64;
            Ok(Value::Integer(raw as crate::config::MrbcInt))
        }
        #[cfg(feature = "float")]
        POOL_TAG_FLOAT => {
            let raw = r.u64()?;
            Ok(Value::Float(f64::from_bits(raw)))
        }
        #[cfg(not(feature = "float"))]
        POOL_TAG_FLOAT => Err(LoadError::unknown_pool_literal_tag()),
        _ => Err(LoadError::unknown_pool_literal_tag()),
    }
}
