//! Hammers the two-lock protocol (refcount lock, then free-list lock) from
//! several threads and checks conservation at quiescent points.

mod common;

use common::*;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, VirtualAddress};
use kernel_pmm::PageTableEntry;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

const THREADS: usize = 8;
const ITERS: usize = 2_000;

/// Pages kept out of `init_range`; each thread adopts one with `release_page`.
fn detached_page(t: usize) -> PhysicalAddress {
    let index = (USABLE_PAGES - THREADS + t) as u64;
    PhysicalAddress::new(BASE + (KERNEL_PAGES + index) * PAGE_SIZE)
}

#[test]
fn refcount_traffic_conserves_pages() {
    let pmm = empty_allocator();
    pmm.init_range(PhysicalAddress::new(BASE), detached_page(0));
    let pmm = Arc::new(pmm);
    let start = Arc::new(Barrier::new(THREADS));
    // every page in the pool carries one reference owned by the pool
    let pool = Arc::new(Mutex::new(Vec::<PhysicalAddress>::new()));
    let barrier = Arc::new(Barrier::new(THREADS + 1));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let pmm = Arc::clone(&pmm);
            let pool = Arc::clone(&pool);
            let barrier = Arc::clone(&barrier);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                pmm.release_page(detached_page(t));

                let mut held = Vec::new();
                for i in 0..ITERS {
                    if let Ok(pa) = pmm.allocate_page() {
                        if (i + t) % 7 == 0 {
                            // sole owner hands it straight back
                            pmm.release_page(pa);
                            continue;
                        }
                        pmm.increment(pa).unwrap();
                        pool.lock().unwrap().push(pa);
                        if (i + t) % 3 == 0 && held.len() < 2 {
                            held.push(pa);
                        } else {
                            pmm.decrement_and_maybe_free(pa);
                        }
                    }
                    let shared = pool.lock().unwrap().pop();
                    if let Some(pa) = shared {
                        if i % 5 == 0 {
                            // a short-lived extra mapping
                            pmm.increment(pa).unwrap();
                            pmm.decrement_and_maybe_free(pa);
                        }
                        pmm.decrement_and_maybe_free(pa);
                    }
                }

                barrier.wait(); // quiescent: main checks
                barrier.wait();

                for pa in held {
                    pmm.decrement_and_maybe_free(pa);
                }
            })
        })
        .collect();

    barrier.wait();
    let stats = pmm.stats();
    assert!(stats.is_conserved(), "{stats}");
    assert_eq!(stats.free, pmm.count_free_pages());
    barrier.wait();

    for h in handles {
        h.join().unwrap();
    }

    for pa in pool.lock().unwrap().drain(..) {
        pmm.decrement_and_maybe_free(pa);
    }

    let stats = pmm.stats();
    assert!(stats.is_conserved(), "{stats}");
    assert_eq!(stats.managed, USABLE_PAGES);
    assert_eq!(stats.free, USABLE_PAGES);
    assert_eq!(stats.allocated, 0);
    assert_eq!(stats.references, 0);
}

#[test]
fn concurrent_cow_faults_conserve_pages() {
    let pmm = Arc::new(allocator());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let pmm = Arc::clone(&pmm);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let va = VirtualAddress::new(0x1000_0000 + (t as u64) * 0x1000);
                barrier.wait();
                for i in 0..ITERS / 4 {
                    let Ok(pa) = pmm.allocate_page() else {
                        continue;
                    };
                    let (mut parent, mut child) = (SoftPageTable::new(), SoftPageTable::new());
                    fork_share(&pmm, &mut parent, &mut child, va, pa);

                    let (first, second) = if i % 2 == 0 {
                        (&mut child, &mut parent)
                    } else {
                        (&mut parent, &mut child)
                    };
                    let a = pmm.resolve_cow_fault(first, va);
                    let b = pmm.resolve_cow_fault(second, va);

                    for (pt, result) in [(first, a), (second, b)] {
                        let entry = pt.entry(va).unwrap();
                        match result {
                            Ok(mapped) => {
                                assert_eq!(entry.physical_address(), mapped);
                                assert!(entry.writable() && !entry.copy_on_write());
                            }
                            Err(_) => {
                                assert_eq!(entry.flags(), PageTableEntry::user_cow());
                            }
                        }
                        // unmap
                        pmm.decrement_and_maybe_free(entry.physical_address());
                    }
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    let stats = pmm.stats();
    assert!(stats.is_conserved(), "{stats}");
    assert_eq!(stats.free, USABLE_PAGES);
    assert_eq!(stats.references, 0);
}
