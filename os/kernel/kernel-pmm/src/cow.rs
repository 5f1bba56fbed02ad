//! # Copy-on-write fault resolution
//!
//! After a fork, parent and child map the same physical page read-only with
//! the copy-on-write bit set, and the page's reference count covers both
//! mappings. The first write from either side traps and lands here:
//!
//! ```text
//!            lookup(va)
//!                │
//!        refcount == 1 ? ──yes──► remap same page writable (no copy)
//!                │ no
//!        allocate_page ──Exhausted──► CowFault::OutOfMemory
//!                │
//!          copy old → new
//!                │
//!   invalidate + remap(va → new) ──Err──► restore old, release new, CowFault::RemapFailed
//!                │ ok
//!    decrement_and_maybe_free(old)
//! ```
//!
//! The caller must hold the address space lock for the whole resolution; the
//! `&mut` page table is the proof. No sibling can raise the count of a page
//! this address space maps without that lock, so a count of 1 stays 1.

use crate::allocator::PageAllocator;
use crate::error::{CowFault, InvariantViolation, fatal};
use crate::page_table::{PageTableEntry, PageTableOps};
use crate::phys_mapper::{PhysMapper, copy_page};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use log::{debug, error, warn};

impl<M: PhysMapper, const PAGES: usize> PageAllocator<M, PAGES> {
    /// Give the faulting address space a private, writable copy of the page at `va`.
    ///
    /// Returns the physical page now mapped at `va`: the original one if the
    /// faulting mapping was its only reference, a fresh duplicate otherwise.
    ///
    /// # Errors
    /// A [`CowFault`] tells the caller to terminate the faulting process. On
    /// every error path `va` still maps the original page with its original
    /// flags, and no page has leaked.
    pub fn resolve_cow_fault<P: PageTableOps>(
        &self,
        page_table: &mut P,
        va: VirtualAddress,
    ) -> Result<PhysicalAddress, CowFault> {
        let result = self.resolve(page_table, va);
        if let Err(fault) = &result {
            warn!("cow: {fault}");
        }
        result
    }

    fn resolve<P: PageTableOps>(
        &self,
        page_table: &mut P,
        va: VirtualAddress,
    ) -> Result<PhysicalAddress, CowFault> {
        if !va.is_page_aligned() {
            return Err(CowFault::Misaligned(va));
        }
        let entry = page_table
            .lookup(va)
            .filter(|e| e.valid())
            .ok_or(CowFault::NotMapped(va))?;
        if !entry.copy_on_write() {
            return Err(CowFault::NotCopyOnWrite(va));
        }

        let old = entry.physical_address();
        let refcount = self
            .current_count(old)
            .map_err(|_| CowFault::Unmanaged { va, pa: old })?;

        // A live mapping always holds a reference. A zero count means the page
        // is free or detached and could be handed back as its own copy.
        if refcount == 0 {
            fatal(InvariantViolation::NotAllocated(old));
        }

        if refcount == 1 {
            replace_mapping(page_table, va, entry, old)?;
            debug!("cow: {va} is sole owner of {old}, made writable in place");
            return Ok(old);
        }

        let new = self
            .allocate_page()
            .map_err(|_| CowFault::OutOfMemory(va))?;
        // SAFETY: `new` is exclusively ours; `old` is mapped read-only everywhere.
        unsafe { copy_page(self.mapper(), old, new) };

        if let Err(fault) = replace_mapping(page_table, va, entry, new) {
            self.release_page(new);
            return Err(fault);
        }

        self.decrement_and_maybe_free(old);
        debug!("cow: {va} copied {old} -> {new}");
        Ok(new)
    }
}

/// Point `va` at `pa` with the resolved flags of `original`.
///
/// The old entry is invalidated first so the page-table layer never sees two
/// leaves for one address. If the remap fails, `original` is put back as it
/// was; if even that fails the mapping would be torn, which is fatal.
fn replace_mapping<P: PageTableOps>(
    page_table: &mut P,
    va: VirtualAddress,
    original: PageTableEntry,
    pa: PhysicalAddress,
) -> Result<(), CowFault> {
    page_table.invalidate(va);
    let Err(err) = page_table.remap(va, pa, original.flags().resolved()) else {
        return Ok(());
    };

    warn!("cow: remap of {va} to {pa} failed: {err:?}");
    if let Err(err) = page_table.remap(va, original.physical_address(), original.flags()) {
        error!("cow: restoring {va} failed: {err:?}");
        fatal(InvariantViolation::TornMapping(va));
    }
    Err(CowFault::RemapFailed(va))
}
