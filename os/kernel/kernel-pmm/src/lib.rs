//! # Physical Page Allocator with Reference Counting and Copy-on-Write
//!
//! This crate hands out, reclaims, and shares fixed-size (4 KiB) physical
//! pages among the kernel and user processes. Pages can be mapped by several
//! address spaces at once; a per-page reference count decides when a page
//! may be reclaimed and whether a write fault on a shared page needs a copy.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │            Copy-on-Write Resolver (cow.rs)          │
//! │    • sole owner: flip mapping writable in place     │
//! │    • shared: allocate, copy, remap, drop old ref    │
//! └────────────┬──────────────────────────┬─────────────┘
//!              │                          │ PageTableOps
//! ┌────────────▼─────────────────────┐  ┌─▼──────────────────────┐
//! │  Reference-Count Manager         │  │ virtual-memory layer   │
//! │  (`pmm.refcount` lock)           │  │ (external)             │
//! └────────────┬─────────────────────┘  └────────────────────────┘
//!              │ count reached zero
//! ┌────────────▼─────────────────────┐
//! │  Free-List Allocator             │
//! │  (`pmm.freelist` lock)           │
//! └──────────────────────────────────┘
//! ```
//!
//! All three live in one explicitly constructed [`PageAllocator`] object with
//! its locks as fields. The kernel creates it once at startup
//! ([`KernelPageAllocator`]) and passes it by shared reference.
//!
//! ## Failure tiers
//!
//! * Recoverable: [`AllocError`], [`RefCountError`], [`CowFault`]. Out of
//!   memory or a bad fault address are expected at runtime; the caller
//!   decides what happens to the process.
//! * Fatal: an [`InvariantViolation`] reported through [`fatal`]. Freeing a
//!   page twice, freeing a page outside the managed window, or touching the
//!   count of a page that is not allocated are kernel bugs.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use kernel_pmm::{KernelPageAllocator, HhdmPhysMapper, MemoryLayout};
//! use kernel_memory_addresses::PhysicalAddress;
//! use kernel_info::memory::PHYS_STOP;
//!
//! # fn kernel_end() -> PhysicalAddress { PhysicalAddress::new(0x8020_0000) }
//! let layout = MemoryLayout::kernel(kernel_end());
//! let pmm = KernelPageAllocator::new(HhdmPhysMapper, layout);
//! pmm.init_range(layout.kernel_end, PhysicalAddress::new(PHYS_STOP));
//!
//! let page = pmm.allocate_page().expect("out of memory");
//! pmm.increment(page).unwrap(); // forked: now mapped twice
//! pmm.decrement_and_maybe_free(page);
//! pmm.decrement_and_maybe_free(page); // last reference: back on the free chain
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod allocator;
mod cow;
mod error;
mod free_list;
mod layout;
pub mod page_table;
pub mod phys_mapper;
mod refcount;
mod stats;

pub use allocator::{ALLOC_JUNK, FREE_JUNK, PageAllocator};
pub use error::{AllocError, CowFault, InvariantViolation, RefCountError, fatal};
pub use layout::MemoryLayout;
pub use page_table::{PageTableEntry, PageTableOps};
pub use phys_mapper::{HhdmPhysMapper, PageFrame, PhysMapper};
pub use stats::{MemoryStats, PageState};

/// The allocator the kernel instantiates for its own RAM window.
pub type KernelPageAllocator =
    PageAllocator<HhdmPhysMapper, { kernel_info::memory::MANAGED_PAGES }>;
