// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Two-level segregated fit allocator over a fixed-size pool.
//!
//! Every block lives in-band in the pool: a 12-byte header (packed size +
//! flags, offset of the physical predecessor, owner VM id) followed by the
//! payload. Free blocks store their free-list links in the first 8 bytes of
//! their own payload rather than in a side table, the same trick the
//! upstream allocator uses to avoid a second bookkeeping array. Blocks are
//! addressed by [`Handle`], a `u32` byte offset into the pool rather than a
//! pointer, so the whole allocator is safe, pointer-free Rust.

use crate::config::{TLSF_FLI_COUNT, TLSF_IGNORE_LSBS, TLSF_SLI_BITS};
use crate::error::AllocError;
use crate::types::{Handle, VmId};

use alloc::vec;
use alloc::vec::Vec;

const HEADER_SIZE: u32 = 12;
const GRANULARITY: u32 = 1 << TLSF_IGNORE_LSBS;
const SLI_COUNT: usize = 1 << TLSF_SLI_BITS;
const FLI_COUNT: usize = TLSF_FLI_COUNT as usize;
const FREE_LINK_SIZE: u32 = 8;
const MIN_PAYLOAD: u32 = if FREE_LINK_SIZE > GRANULARITY {
    FREE_LINK_SIZE
} else {
    GRANULARITY
};

const FLAG_FREE: u32 = 0b01;
const FLAG_LAST: u32 = 0b10;
const FLAG_MASK: u32 = 0b11;

/// Allocator usage snapshot, exposed behind the `stats` feature.
#[cfg(feature = "stats")]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub total: usize,
    pub used: usize,
    pub free: usize,
    pub free_block_count: usize,
}

/// A TLSF-style pool allocator tagging every block with the [`VmId`] that
/// owns it, so [`TlsfPool::free_all`] can reclaim an entire task's
/// allocations in one pass without walking any structure outside the pool.
pub struct TlsfPool {
    storage: Vec<u8>,
    fl_bitmap: u32,
    sl_bitmap: [u8; FLI_COUNT],
    free_lists: [[Handle; SLI_COUNT]; FLI_COUNT],
    used: usize,
}

fn round_up(size: u32, align: u32) -> u32 {
    (size + align - 1) & !(align - 1)
}

/// Maps a block size to its `(fl, sl)` free-list class, rounding down
/// (used when *inserting* a block: its real size always qualifies for the
/// class it's filed under).
fn mapping_insert(size: u32) -> (usize, usize) {
    let size = size.max(GRANULARITY);
    let fl = 31 - size.leading_zeros();
    let fl = fl.max(TLSF_SLI_BITS);
    let sl = (size >> (fl - TLSF_SLI_BITS)) & (SLI_COUNT as u32 - 1);
    (fl as usize, sl as usize)
}

/// Maps a requested size to the smallest `(fl, sl)` class guaranteed to
/// contain only blocks big enough to satisfy it (used when *searching*:
/// rounds the size up to the next class boundary first).
fn mapping_search(size: u32) -> (usize, usize) {
    let size = size.max(GRANULARITY);
    let fl = 31 - size.leading_zeros();
    let fl = fl.max(TLSF_SLI_BITS);
    let shift = fl - TLSF_SLI_BITS;
    let round_mask = (1u32 << shift) - 1;
    let rounded = if size & round_mask != 0 {
        (size | round_mask).wrapping_add(1)
    } else {
        size
    };
    mapping_insert(rounded)
}

impl TlsfPool {
    /// Builds a pool over `total_size` bytes of freshly allocated backing
    /// storage. The whole region starts as a single free block.
    #[must_use]
    pub fn new(total_size: usize) -> Self {
        assert!(
            total_size > HEADER_SIZE as usize + MIN_PAYLOAD as usize,
            "pool too small to hold a single block"
        );
        let mut pool = Self {
            storage: vec![0u8; total_size],
            fl_bitmap: 0,
            sl_bitmap: [0; FLI_COUNT],
            free_lists: [[Handle::NULL; SLI_COUNT]; FLI_COUNT],
            used: 0,
        };
        let payload = round_up(total_size as u32 - HEADER_SIZE, GRANULARITY).min(
            // never round the usable payload above what the backing storage holds
            total_size as u32 - HEADER_SIZE,
        );
        let payload = payload - (payload % GRANULARITY);
        pool.write_header(0, payload, FLAG_FREE | FLAG_LAST, Handle::NULL, VmId::SHARED);
        pool.link_free(0, payload);
        pool
    }

    /// Total capacity of the backing pool, in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Bytes currently handed out to live allocations.
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.used
    }

    #[cfg(feature = "stats")]
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let mut free = 0usize;
        let mut free_block_count = 0usize;
        let mut off = 0u32;
        loop {
            let (size, flags) = self.read_size_flags(off);
            if flags & FLAG_FREE != 0 {
                free += size as usize;
                free_block_count += 1;
            }
            if flags & FLAG_LAST != 0 {
                break;
            }
            off += HEADER_SIZE + size;
        }
        PoolStats {
            total: self.storage.len(),
            used: self.used,
            free,
            free_block_count,
        }
    }

    // ---- in-band header access -------------------------------------------------

    fn read_u32(&self, off: u32) -> u32 {
        let off = off as usize;
        u32::from_le_bytes(self.storage[off..off + 4].try_into().unwrap())
    }

    fn write_u32(&mut self, off: u32, value: u32) {
        let off = off as usize;
        self.storage[off..off + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn read_size_flags(&self, block_off: u32) -> (u32, u32) {
        let raw = self.read_u32(block_off);
        (raw & !FLAG_MASK, raw & FLAG_MASK)
    }

    fn write_header(&mut self, block_off: u32, size: u32, flags: u32, prev_phys: Handle, vm_id: VmId) {
        debug_assert_eq!(size & FLAG_MASK, 0, "block size must be flag-aligned");
        self.write_u32(block_off, size | flags);
        self.write_u32(block_off + 4, prev_phys.0);
        self.storage[(block_off + 8) as usize] = vm_id.0;
    }

    fn read_prev_phys(&self, block_off: u32) -> Handle {
        Handle(self.read_u32(block_off + 4))
    }

    fn read_vm_id(&self, block_off: u32) -> VmId {
        VmId(self.storage[(block_off + 8) as usize])
    }

    fn write_vm_id(&mut self, block_off: u32, vm_id: VmId) {
        self.storage[(block_off + 8) as usize] = vm_id.0;
    }

    fn set_flags(&mut self, block_off: u32, flags: u32) {
        let (size, _) = self.read_size_flags(block_off);
        self.write_u32(block_off, size | flags);
    }

    fn payload_off(block_off: u32) -> u32 {
        block_off + HEADER_SIZE
    }

    fn next_phys(&self, block_off: u32) -> Option<u32> {
        let (size, flags) = self.read_size_flags(block_off);
        if flags & FLAG_LAST != 0 {
            None
        } else {
            Some(Self::payload_off(block_off) + size)
        }
    }

    // ---- free list bookkeeping --------------------------------------------------

    fn free_next(&self, block_off: u32) -> Handle {
        Handle(self.read_u32(Self::payload_off(block_off)))
    }

    fn free_prev(&self, block_off: u32) -> Handle {
        Handle(self.read_u32(Self::payload_off(block_off) + 4))
    }

    fn set_free_links(&mut self, block_off: u32, next: Handle, prev: Handle) {
        self.write_u32(Self::payload_off(block_off), next.0);
        self.write_u32(Self::payload_off(block_off) + 4, prev.0);
    }

    fn link_free(&mut self, block_off: u32, size: u32) {
        let (fl, sl) = mapping_insert(size);
        let head = self.free_lists[fl][sl];
        self.set_free_links(block_off, head, Handle::NULL);
        if !head.is_null() {
            let head_off = head.0;
            let next = self.free_next(head_off);
            self.set_free_links(head_off, next, Handle(block_off));
        }
        self.free_lists[fl][sl] = Handle(block_off);
        self.fl_bitmap |= 1 << fl;
        self.sl_bitmap[fl] |= 1 << sl;
    }

    fn unlink_free(&mut self, block_off: u32) {
        let (size, _) = self.read_size_flags(block_off);
        let (fl, sl) = mapping_insert(size);
        let next = self.free_next(block_off);
        let prev = self.free_prev(block_off);

        if !prev.is_null() {
            let prev_next = next;
            self.set_free_links(prev.0, prev_next, self.free_prev(prev.0));
        } else {
            self.free_lists[fl][sl] = next;
        }
        if !next.is_null() {
            let next_prev = prev;
            self.set_free_links(next.0, self.free_next(next.0), next_prev);
        }
        if self.free_lists[fl][sl].is_null() {
            self.sl_bitmap[fl] &= !(1 << sl);
            if self.sl_bitmap[fl] == 0 {
                self.fl_bitmap &= !(1 << fl);
            }
        }
    }

    fn find_free(&self, size: u32) -> Option<(usize, usize)> {
        let (fl, sl) = mapping_search(size);
        let sl_map = self.sl_bitmap[fl] & (!0u8 << sl);
        if sl_map != 0 {
            let sl = sl_map.trailing_zeros() as usize;
            return Some((fl, sl));
        }
        let fl_map = self.fl_bitmap & (!0u32 << (fl + 1));
        if fl_map == 0 {
            return None;
        }
        let fl = fl_map.trailing_zeros() as usize;
        let sl = self.sl_bitmap[fl].trailing_zeros() as usize;
        Some((fl, sl))
    }

    // ---- allocation ---------------------------------------------------------------

    /// Allocates `size` bytes tagged with `vm_id`, available for later bulk
    /// reclamation via [`TlsfPool::free_all`].
    pub fn alloc(&mut self, size: u32, vm_id: VmId) -> Result<Handle, AllocError> {
        self.alloc_internal(size, vm_id)
    }

    /// Allocates `size` bytes that must never be reclaimed by `free_all`
    /// (interned symbol strings, builtin class objects). Tagged as
    /// [`VmId::SHARED`].
    pub fn alloc_no_free(&mut self, size: u32) -> Result<Handle, AllocError> {
        self.alloc_internal(size, VmId::SHARED)
    }

    fn alloc_internal(&mut self, size: u32, vm_id: VmId) -> Result<Handle, AllocError> {
        let want = round_up(size.max(MIN_PAYLOAD), GRANULARITY);
        let (fl, sl) = self.find_free(want).ok_or(AllocError::OutOfMemory)?;
        let block_off = self.free_lists[fl][sl].0;
        self.unlink_free(block_off);

        let (block_size, flags) = self.read_size_flags(block_off);
        let is_last = flags & FLAG_LAST != 0;
        let remainder = block_size - want;

        if remainder >= HEADER_SIZE + MIN_PAYLOAD {
            let new_size = want;
            let split_off = Self::payload_off(block_off) + new_size;
            let split_payload = remainder - HEADER_SIZE;
            let split_flags = FLAG_FREE | if is_last { FLAG_LAST } else { 0 };
            self.write_header(split_off, split_payload, split_flags, Handle(block_off), VmId::SHARED);
            if let Some(next_off) = self.next_phys(split_off) {
                self.write_u32(next_off + 4, split_off);
            }
            self.write_header(block_off, new_size, if is_last { 0 } else { flags & FLAG_LAST }, self.read_prev_phys(block_off), vm_id);
            self.link_free(split_off, split_payload);
        } else {
            self.write_header(block_off, block_size, flags & FLAG_LAST, self.read_prev_phys(block_off), vm_id);
        }

        self.used += Self::payload_off(block_off) as usize - block_off as usize
            + self.read_size_flags(block_off).0 as usize;
        Ok(Handle(Self::payload_off(block_off)))
    }

    /// Releases a previously allocated handle, coalescing with free
    /// physical neighbors.
    pub fn free(&mut self, handle: Handle) {
        let block_off = handle.0 - HEADER_SIZE;
        self.free_block(block_off);
    }

    /// Resizes a live allocation to `new_size` bytes, re-tagging it with
    /// `vm_id`. Shrinking (or asking for no more than the block already
    /// holds) keeps the handle unchanged. Growing absorbs the physical next
    /// block in place when it is free and large enough; otherwise this
    /// allocates a fresh block, copies the old payload over, and frees the
    /// original one, the same alloc-copy-free fallback a TLSF allocator
    /// without a free physical neighbor has to take.
    pub fn realloc(&mut self, handle: Handle, new_size: u32, vm_id: VmId) -> Result<Handle, AllocError> {
        let block_off = handle.0 - HEADER_SIZE;
        let (cur_size, _) = self.read_size_flags(block_off);
        let want = round_up(new_size.max(MIN_PAYLOAD), GRANULARITY);

        if want <= cur_size {
            return Ok(handle);
        }

        if let Some(next_off) = self.next_phys(block_off) {
            let (next_size, next_flags) = self.read_size_flags(next_off);
            let next_is_free = next_flags & FLAG_FREE != 0;
            let next_is_last = next_flags & FLAG_LAST != 0;
            let combined = cur_size + HEADER_SIZE + next_size;

            if next_is_free && combined >= want {
                self.unlink_free(next_off);
                let prev_phys = self.read_prev_phys(block_off);
                let remainder = combined - want;

                if remainder >= HEADER_SIZE + MIN_PAYLOAD {
                    let split_off = Self::payload_off(block_off) + want;
                    let split_payload = remainder - HEADER_SIZE;
                    let split_flags = FLAG_FREE | if next_is_last { FLAG_LAST } else { 0 };
                    self.write_header(split_off, split_payload, split_flags, Handle(block_off), VmId::SHARED);
                    if let Some(after) = self.next_phys(split_off) {
                        self.write_u32(after + 4, split_off);
                    }
                    self.write_header(block_off, want, 0, prev_phys, vm_id);
                    self.link_free(split_off, split_payload);
                } else {
                    let merged_flags = if next_is_last { FLAG_LAST } else { 0 };
                    self.write_header(block_off, combined, merged_flags, prev_phys, vm_id);
                    if let Some(after) = self.next_phys(block_off) {
                        self.write_u32(after + 4, block_off);
                    }
                }

                self.used += (want - cur_size) as usize;
                return Ok(handle);
            }
        }

        let new_handle = self.alloc_internal(new_size, vm_id)?;
        let copy_len = cur_size.min(new_size) as usize;
        let mut tmp = vec![0u8; copy_len];
        tmp.copy_from_slice(&self.payload(handle, copy_len as u32));
        self.payload_mut(new_handle, copy_len as u32).copy_from_slice(&tmp);
        self.free_block(block_off);
        Ok(new_handle)
    }

    fn free_block(&mut self, block_off: u32) {
        let (mut size, mut flags) = self.read_size_flags(block_off);
        debug_assert!(flags & FLAG_FREE == 0, "double free");
        self.used -= Self::payload_off(block_off) as usize - block_off as usize + size as usize;

        if let Some(next_off) = self.next_phys(block_off) {
            let (next_size, next_flags) = self.read_size_flags(next_off);
            if next_flags & FLAG_FREE != 0 {
                self.unlink_free(next_off);
                size += HEADER_SIZE + next_size;
                flags = flags & FLAG_MASK & !FLAG_FREE | (next_flags & FLAG_LAST);
                if let Some(after) = self.next_phys(next_off) {
                    self.write_u32(after + 4, block_off);
                }
            }
        }

        let prev = self.read_prev_phys(block_off);
        if !prev.is_null() {
            let (prev_size, prev_flags) = self.read_size_flags(prev.0);
            if prev_flags & FLAG_FREE != 0 {
                self.unlink_free(prev.0);
                let merged_size = prev_size + HEADER_SIZE + size;
                let merged_flags = (flags & FLAG_LAST) | (prev_flags & 0);
                self.write_header(prev.0, merged_size, merged_flags, self.read_prev_phys(prev.0), VmId::SHARED);
                if let Some(after) = self.next_phys(prev.0) {
                    self.write_u32(after + 4, prev.0);
                }
                self.link_free(prev.0, merged_size);
                return;
            }
        }

        let is_last = flags & FLAG_LAST != 0;
        self.write_header(block_off, size, FLAG_FREE | if is_last { FLAG_LAST } else { 0 }, prev, VmId::SHARED);
        self.link_free(block_off, size);
    }

    /// Reclaims every block tagged with `vm_id` in one pass, without
    /// touching blocks belonging to other VMs or to [`VmId::SHARED`].
    ///
    /// Implemented as two passes over the physical block chain: the first
    /// marks matching used blocks free without coalescing (coalescing
    /// mid-walk would invalidate the "next block" offset the walk relies
    /// on); the second sweeps the whole pool once, merging every run of
    /// adjacent free blocks and rebuilding the free lists from scratch.
    pub fn free_all(&mut self, vm_id: VmId) {
        if vm_id.is_shared() {
            return;
        }
        let mut off = 0u32;
        loop {
            let (size, flags) = self.read_size_flags(off);
            let next = self.next_phys(off);
            if flags & FLAG_FREE == 0 && self.read_vm_id(off) == vm_id {
                self.used -= Self::payload_off(off) as usize - off as usize + size as usize;
                self.write_header(off, size, flags | FLAG_FREE, self.read_prev_phys(off), VmId::SHARED);
            }
            match next {
                Some(next_off) => off = next_off,
                None => break,
            }
        }
        self.coalesce_all();
    }

    fn coalesce_all(&mut self) {
        self.free_lists = [[Handle::NULL; SLI_COUNT]; FLI_COUNT];
        self.fl_bitmap = 0;
        self.sl_bitmap = [0; FLI_COUNT];

        let mut run_start: Option<u32> = None;
        let mut run_size = 0u32;
        let mut run_is_last = false;
        let mut off = 0u32;
        let mut prev_committed = Handle::NULL;

        loop {
            let (size, flags) = self.read_size_flags(off);
            let is_last = flags & FLAG_LAST != 0;
            let next = if is_last { None } else { Some(Self::payload_off(off) + size) };

            if flags & FLAG_FREE != 0 {
                match run_start {
                    Some(_) => run_size += HEADER_SIZE + size,
                    None => {
                        run_start = Some(off);
                        run_size = size;
                    }
                }
                run_is_last = is_last;
            } else {
                if let Some(start) = run_start.take() {
                    self.write_header(start, run_size, FLAG_FREE, prev_committed, VmId::SHARED);
                    self.link_free(start, run_size);
                    prev_committed = Handle(start);
                }
                self.write_u32(off + 4, prev_committed.0);
                prev_committed = Handle(off);
            }

            match next {
                Some(next_off) => off = next_off,
                None => break,
            }
        }
        if let Some(start) = run_start.take() {
            let flags = FLAG_FREE | if run_is_last { FLAG_LAST } else { 0 };
            self.write_header(start, run_size, flags, prev_committed, VmId::SHARED);
            self.link_free(start, run_size);
        }
    }

    /// Owner tag of a live allocation.
    #[must_use]
    pub fn vm_id_of(&self, handle: Handle) -> VmId {
        self.read_vm_id(handle.0 - HEADER_SIZE)
    }

    /// Reassigns the owner tag of a live allocation (used when a value
    /// migrates between VMs, e.g. a shared constant gets copied down into a
    /// freshly spawned task).
    pub fn set_vm_id(&mut self, handle: Handle, vm_id: VmId) {
        self.write_vm_id(handle.0 - HEADER_SIZE, vm_id);
    }

    /// Size, in bytes, of the live allocation's payload.
    #[must_use]
    pub fn size_of(&self, handle: Handle) -> u32 {
        self.read_size_flags(handle.0 - HEADER_SIZE).0
    }

    /// Read-only view into a live allocation's payload.
    #[must_use]
    pub fn payload(&self, handle: Handle, len: u32) -> &[u8] {
        let start = handle.0 as usize;
        &self.storage[start..start + len as usize]
    }

    /// Mutable view into a live allocation's payload.
    pub fn payload_mut(&mut self, handle: Handle, len: u32) -> &mut [u8] {
        let start = handle.0 as usize;
        &mut self.storage[start..start + len as usize]
    }
}

#[cfg(test)]
mod alloc_test;
