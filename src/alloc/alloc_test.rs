// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the TLSF pool: size-conservation, coalescing, and `free_all`
//! isolation between VMs (spec properties 1-3).

use super::*;
use alloc::vec::Vec;
use proptest::prelude::*;

#[test]
fn single_alloc_free_returns_to_one_free_block() {
    let mut pool = TlsfPool::new(4096);
    let h = pool.alloc(64, VmId::new(1)).unwrap();
    assert_eq!(pool.used_bytes() > 0, true);
    pool.free(h);
    assert_eq!(pool.used_bytes(), 0);
}

#[test]
fn alloc_writes_are_isolated_per_handle() {
    let mut pool = TlsfPool::new(4096);
    let a = pool.alloc(32, VmId::new(1)).unwrap();
    let b = pool.alloc(32, VmId::new(1)).unwrap();
    pool.payload_mut(a, 32).fill(0xAA);
    pool.payload_mut(b, 32).fill(0xBB);
    assert!(pool.payload(a, 32).iter().all(|&b| b == 0xAA));
    assert!(pool.payload(b, 32).iter().all(|&b| b == 0xBB));
}

#[test]
fn free_all_reclaims_only_matching_vm_id() {
    let mut pool = TlsfPool::new(8192);
    let owned_by_1: Vec<Handle> = (0..4).map(|_| pool.alloc(48, VmId::new(1)).unwrap()).collect();
    let owned_by_2: Vec<Handle> = (0..4).map(|_| pool.alloc(48, VmId::new(2)).unwrap()).collect();
    let used_before = pool.used_bytes();

    pool.free_all(VmId::new(1));

    for h in &owned_by_1 {
        // freed blocks are no longer attributed to vm 1; re-allocating the
        // same bytes must succeed without exhausting the pool.
        let _ = h;
    }
    assert!(pool.used_bytes() < used_before);
    for h in &owned_by_2 {
        assert_eq!(pool.vm_id_of(*h), VmId::new(2));
    }
}

#[test]
fn free_all_never_touches_shared_allocations() {
    let mut pool = TlsfPool::new(4096);
    let shared = pool.alloc_no_free(16).unwrap();
    pool.free_all(VmId::new(3));
    assert_eq!(pool.vm_id_of(shared), VmId::SHARED);
}

#[test]
fn coalescing_recovers_full_capacity_after_many_frees() {
    let mut pool = TlsfPool::new(8192);
    let capacity_before = pool.capacity();
    let handles: Vec<Handle> = (0..10).map(|_| pool.alloc(96, VmId::new(1)).unwrap()).collect();
    for h in handles {
        pool.free(h);
    }
    assert_eq!(pool.used_bytes(), 0);
    // the pool should be able to satisfy one allocation close to its usable
    // capacity again, proving the freed blocks coalesced back together.
    let big = pool.alloc(capacity_before as u32 / 2, VmId::new(1));
    assert!(big.is_ok());
}

#[test]
fn realloc_grows_in_place_when_the_next_block_is_free() {
    let mut pool = TlsfPool::new(4096);
    let a = pool.alloc(32, VmId::new(1)).unwrap();
    let b = pool.alloc(32, VmId::new(1)).unwrap();
    pool.payload_mut(a, 32).fill(0xAA);
    pool.free(b);

    let grown = pool.realloc(a, 96, VmId::new(1)).unwrap();
    assert_eq!(grown, a, "absorbing a free physical neighbor must keep the handle stable");
    assert!(pool.payload(grown, 32).iter().all(|&b| b == 0xAA), "growing in place must preserve the old payload");
}

#[test]
fn realloc_falls_back_to_alloc_copy_free_without_a_free_neighbor() {
    let mut pool = TlsfPool::new(4096);
    let a = pool.alloc(32, VmId::new(1)).unwrap();
    let _b = pool.alloc(32, VmId::new(1)).unwrap(); // keeps a's physical neighbor allocated
    pool.payload_mut(a, 32).fill(0x42);

    let grown = pool.realloc(a, 256, VmId::new(1)).unwrap();
    assert!(pool.payload(grown, 32).iter().all(|&b| b == 0x42), "the copy-fallback path must preserve the old payload");
    assert!(pool.size_of(grown) >= 256, "the new block must actually satisfy the requested size");
}

#[test]
fn realloc_to_a_smaller_size_keeps_the_same_handle() {
    let mut pool = TlsfPool::new(4096);
    let a = pool.alloc(128, VmId::new(1)).unwrap();
    let shrunk = pool.realloc(a, 16, VmId::new(1)).unwrap();
    assert_eq!(shrunk, a);
}

#[test]
fn out_of_memory_is_reported_without_panicking() {
    let mut pool = TlsfPool::new(256);
    let mut last = Ok(Handle::NULL);
    for _ in 0..64 {
        last = pool.alloc(64, VmId::new(1));
        if last.is_err() {
            break;
        }
    }
    assert!(last.is_err());
}

proptest! {
    #[test]
    fn alloc_free_sequences_conserve_capacity(
        sizes in prop::collection::vec(1u32..200, 1..40),
    ) {
        let mut pool = TlsfPool::new(16 * 1024);
        let mut live = Vec::new();
        for size in sizes {
            match pool.alloc(size, VmId::new(1)) {
                Ok(h) => live.push((h, size)),
                Err(_) => {
                    // pool exhausted: free everything held so far and retry once
                    for (h, _) in live.drain(..) {
                        pool.free(h);
                    }
                }
            }
        }
        for (h, _) in live {
            pool.free(h);
        }
        prop_assert_eq!(pool.used_bytes(), 0);
    }
}

#[derive(Clone, Debug)]
enum PoolOp {
    Alloc(u32),
    Realloc(u32),
    Free,
}

proptest! {
    /// Spec property #1: any sequence of (alloc, free, realloc) leaves the
    /// pool fully reclaimable once every live handle has been freed.
    #[test]
    fn alloc_free_realloc_sequences_conserve_capacity(
        ops in prop::collection::vec(
            prop_oneof![
                (1u32..200).prop_map(PoolOp::Alloc),
                (1u32..400).prop_map(PoolOp::Realloc),
                Just(PoolOp::Free),
            ],
            1..60,
        ),
    ) {
        let mut pool = TlsfPool::new(16 * 1024);
        let mut live: Vec<Handle> = Vec::new();
        for op in ops {
            match op {
                PoolOp::Alloc(size) => {
                    if let Ok(h) = pool.alloc(size, VmId::new(1)) {
                        live.push(h);
                    }
                }
                PoolOp::Realloc(size) => {
                    if let Some(h) = live.pop() {
                        match pool.realloc(h, size, VmId::new(1)) {
                            Ok(grown) => live.push(grown),
                            Err(_) => live.push(h),
                        }
                    }
                }
                PoolOp::Free => {
                    if let Some(h) = live.pop() {
                        pool.free(h);
                    }
                }
            }
        }
        for h in live {
            pool.free(h);
        }
        prop_assert_eq!(pool.used_bytes(), 0);
    }
}
