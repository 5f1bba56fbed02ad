//! Failure tiers of the page allocator.
//!
//! Recoverable conditions are ordinary `Result` errors: the caller (a system
//! call, the fault handler) decides what happens to the requesting process.
//! Broken invariants are [`InvariantViolation`]s and only ever reach
//! [`fatal`], which never returns.

use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use log::error;

/// The free chain is empty.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum AllocError {
    #[error("out of physical pages")]
    Exhausted,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum RefCountError {
    /// Misaligned, outside the managed window, or inside the kernel image.
    #[error("{0} is not a managed page")]
    Invalid(PhysicalAddress),
}

/// A copy-on-write fault that could not be resolved.
///
/// Every variant means the faulting process must be terminated; none of them
/// indicates a kernel bug.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum CowFault {
    #[error("faulting address {0} is not page aligned")]
    Misaligned(VirtualAddress),
    #[error("no valid mapping for {0}")]
    NotMapped(VirtualAddress),
    #[error("mapping for {0} is not copy-on-write")]
    NotCopyOnWrite(VirtualAddress),
    #[error("mapping for {va} points at unmanaged page {pa}")]
    Unmanaged {
        va: VirtualAddress,
        pa: PhysicalAddress,
    },
    #[error("out of memory while copying the page at {0}")]
    OutOfMemory(VirtualAddress),
    #[error("remapping {0} failed; original mapping restored")]
    RemapFailed(VirtualAddress),
}

/// A broken allocator invariant. Always a bug in the caller.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("page address {0} is not page aligned")]
    Misaligned(PhysicalAddress),
    #[error("page address {0} is outside the managed range")]
    OutOfRange(PhysicalAddress),
    #[error("page address {0} lies inside the kernel image")]
    Reserved(PhysicalAddress),
    #[error("reference count of {0} is already zero")]
    NotAllocated(PhysicalAddress),
    #[error("reference count of {0} overflowed")]
    RefCountOverflow(PhysicalAddress),
    #[error("double free of {0}")]
    DoubleFree(PhysicalAddress),
    #[error("release of {pa} which is still shared by {refcount} mappings")]
    ReleaseShared { pa: PhysicalAddress, refcount: u32 },
    #[error("initial reference on {0} which is already live")]
    InitialCountOnLivePage(PhysicalAddress),
    #[error("free list is corrupt (cycle after {0} nodes)")]
    FreeListCorrupt(usize),
    #[error("could not restore mapping for {0} after a failed remap")]
    TornMapping(VirtualAddress),
}

/// Halt on a broken invariant.
///
/// This is the kernel's panic path for the allocator; continuing after any of
/// these would risk handing the same page to two owners.
#[cold]
#[inline(never)]
#[track_caller]
pub fn fatal(violation: InvariantViolation) -> ! {
    error!("pmm: {violation}");
    panic!("pmm: {violation}");
}
