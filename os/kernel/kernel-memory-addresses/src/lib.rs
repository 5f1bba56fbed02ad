//! # Physical and Virtual Memory Address Types
//!
//! Strongly typed wrappers for raw memory addresses used by the physical page
//! allocator and its page-table collaborators.
//!
//! ## Overview
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`MemoryAddress`] | A raw 64-bit address, either physical or virtual. |
//! | [`PhysicalAddress`] | Refers to physical memory (RAM managed by the page allocator). |
//! | [`VirtualAddress`] | Refers to a page-table translated address in some address space. |
//!
//! The kernel manages memory in fixed [`PAGE_SIZE`] units only, so unlike a
//! general paging library there is no page-size type parameter: all rounding
//! and alignment helpers work on 4 KiB pages.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let pa = PhysicalAddress::new(0x8000_1234);
//! assert!(!pa.is_page_aligned());
//! assert_eq!(pa.page_round_down().as_u64(), 0x8000_1000);
//! assert_eq!(pa.page_round_up().as_u64(), 0x8000_2000);
//!
//! let va = VirtualAddress::new(0x4000);
//! assert!(va.is_page_aligned());
//! ```
//!
//! ## Design Notes
//!
//! - The types are `#[repr(transparent)]` and implement `Copy`, `Eq`, `Ord`, and
//!   `Hash`, making them suitable as map keys.
//! - All alignment calculations are `const fn`.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod memory_address;
mod physical_address;
mod virtual_address;

pub use memory_address::MemoryAddress;
pub use physical_address::PhysicalAddress;
pub use virtual_address::VirtualAddress;

/// Size of a page in bytes.
pub const PAGE_SIZE: u64 = 4096;

/// log2([`PAGE_SIZE`]), i.e., number of low bits used for the in-page offset.
pub const PAGE_SHIFT: u32 = 12;

const _: () = assert!(1 << PAGE_SHIFT == PAGE_SIZE);
