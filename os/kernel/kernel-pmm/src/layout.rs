//! The managed physical window and page-number arithmetic.

use crate::error::InvariantViolation;
use kernel_info::memory::PHYS_BASE;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress};

/// Index of a page slot relative to [`MemoryLayout::base`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub(crate) struct PageIndex(u32);

impl PageIndex {
    #[inline]
    pub(crate) const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub(crate) const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Runtime description of the physical window a page allocator manages.
///
/// The window starts at `base` and spans as many pages as the allocator has
/// slots. Everything below `kernel_end` (rounded up to a page) holds the
/// kernel image and is never handed out or taken back.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MemoryLayout {
    pub base: PhysicalAddress,
    pub kernel_end: PhysicalAddress,
}

impl MemoryLayout {
    #[must_use]
    pub const fn new(base: PhysicalAddress, kernel_end: PhysicalAddress) -> Self {
        Self { base, kernel_end }
    }

    /// Layout of the kernel's own RAM window; `kernel_end` comes from the linker.
    #[must_use]
    pub const fn kernel(kernel_end: PhysicalAddress) -> Self {
        Self::new(PhysicalAddress::new(PHYS_BASE), kernel_end)
    }

    /// One past the last managed byte for a window of `pages` slots.
    #[inline]
    pub(crate) const fn end(&self, pages: usize) -> PhysicalAddress {
        self.base.add_pages(pages as u64)
    }

    /// First page above the kernel image.
    #[inline]
    pub(crate) const fn first_usable(&self) -> PhysicalAddress {
        let end = self.kernel_end.page_round_up();
        if end.as_u64() > self.base.as_u64() {
            end
        } else {
            self.base
        }
    }

    /// Number of slots occupied by the kernel image.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) const fn reserved_pages(&self, pages: usize) -> usize {
        let reserved = match self.first_usable().pages_since(self.base) {
            Some(n) => n as usize,
            None => 0,
        };
        if reserved > pages { pages } else { reserved }
    }

    /// Map a page address to its slot, rejecting anything the allocator must not touch.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) const fn index_of(
        &self,
        pa: PhysicalAddress,
        pages: usize,
    ) -> Result<PageIndex, InvariantViolation> {
        if !pa.is_page_aligned() {
            return Err(InvariantViolation::Misaligned(pa));
        }
        if pa.as_u64() < self.base.as_u64() || pa.as_u64() >= self.end(pages).as_u64() {
            return Err(InvariantViolation::OutOfRange(pa));
        }
        if pa.as_u64() < self.first_usable().as_u64() {
            return Err(InvariantViolation::Reserved(pa));
        }
        let index = (pa.as_u64() - self.base.as_u64()) / PAGE_SIZE;
        Ok(PageIndex::new(index as u32))
    }

    #[inline]
    pub(crate) const fn address_of(&self, index: PageIndex) -> PhysicalAddress {
        self.base.add_pages(index.as_usize() as u64)
    }
}
