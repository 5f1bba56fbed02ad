//! # Memory Layout

use kernel_memory_addresses::PAGE_SIZE;

/// First byte of RAM. The kernel image is loaded here.
pub const PHYS_BASE: u64 = 0x8000_0000;

/// Amount of RAM the page allocator manages.
pub const PHYS_MEMORY_BYTES: u64 = 128 * 1024 * 1024;

/// One past the last byte of managed RAM.
pub const PHYS_STOP: u64 = PHYS_BASE + PHYS_MEMORY_BYTES;

/// Number of page slots in `[PHYS_BASE, PHYS_STOP)`.
///
/// The reference-count table has exactly one entry per slot, including the
/// slots covered by the kernel image.
#[allow(clippy::cast_possible_truncation)]
pub const MANAGED_PAGES: usize = (PHYS_MEMORY_BYTES / PAGE_SIZE) as usize;

/// A simple Higher Half Direct Map (HHDM) base.
/// Anything mapped at [`HHDM_BASE`] + `pa` lets the kernel
/// access physical memory via a fixed offset.
pub const HHDM_BASE: u64 = 0xffff_8880_0000_0000;

const _: () = {
    assert!(PHYS_BASE.is_multiple_of(PAGE_SIZE));
    assert!(PHYS_STOP.is_multiple_of(PAGE_SIZE));
    assert!(PHYS_STOP > PHYS_BASE);
    assert!(MANAGED_PAGES <= u32::MAX as usize);
};
