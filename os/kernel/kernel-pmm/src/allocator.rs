//! # Reference-counted physical page allocator
//!
//! [`PageAllocator`] owns two locks:
//!
//! | Lock             | Guards |
//! |------------------|--------|
//! | `"pmm.refcount"` | the per-page reference counts |
//! | `"pmm.freelist"` | the free chain |
//!
//! ## Lock order
//!
//! `pmm.refcount` is always taken before `pmm.freelist`, and `pmm.freelist`
//! is never held while acquiring `pmm.refcount`. Every transition of a page
//! between "count 0, on the chain" and "count ≥ 1, off the chain" happens with
//! both locks held, so no thread can observe a zero count for a page that is
//! not (yet) free, or a free page whose count is still positive.
//! [`count_free_pages`](PageAllocator::count_free_pages) only needs the chain
//! and takes `pmm.freelist` alone.
//!
//! Scrubbing with junk happens outside `pmm.freelist`: after unlinking on
//! allocation, before linking on release.

use crate::error::{AllocError, InvariantViolation, RefCountError, fatal};
use crate::free_list::{FreeList, Slot};
use crate::layout::{MemoryLayout, PageIndex};
use crate::phys_mapper::{PhysMapper, fill_page};
use crate::refcount::{CountError, RefCountTable};
use crate::stats::{MemoryStats, PageState};
use core::num::NonZeroU32;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress};
use kernel_sync::{SpinLock, SpinLockGuard};
use log::{info, trace};

/// Byte written over a page when it is handed out.
pub const ALLOC_JUNK: u8 = 0x05;

/// Byte written over a page when it is returned to the free chain.
pub const FREE_JUNK: u8 = 0x01;

/// Allocator for `PAGES` physical page slots starting at [`MemoryLayout::base`].
///
/// Create it once at startup and share it by reference.
pub struct PageAllocator<M: PhysMapper, const PAGES: usize> {
    mapper: M,
    layout: MemoryLayout,
    refcounts: SpinLock<RefCountTable<PAGES>>,
    free_list: SpinLock<FreeList<PAGES>>,
}

type CountGuard<'a, const PAGES: usize> = SpinLockGuard<'a, RefCountTable<PAGES>>;

impl<M: PhysMapper, const PAGES: usize> PageAllocator<M, PAGES> {
    const FITS_INDEX: () = assert!(PAGES > 0 && PAGES <= u32::MAX as usize);

    /// An allocator with every slot detached: no page is free or allocated
    /// until [`init_range`](Self::init_range) or [`release_page`](Self::release_page)
    /// hands it over.
    ///
    /// # Panics
    /// Panics if `layout.base` is not page aligned.
    #[must_use]
    pub const fn new(mapper: M, layout: MemoryLayout) -> Self {
        let () = Self::FITS_INDEX;
        assert!(layout.base.is_page_aligned(), "managed window must be page aligned");
        Self {
            mapper,
            layout,
            refcounts: SpinLock::new("pmm.refcount", RefCountTable::new()),
            free_list: SpinLock::new("pmm.freelist", FreeList::new()),
        }
    }

    #[inline]
    #[must_use]
    pub const fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    #[inline]
    #[must_use]
    pub const fn mapper(&self) -> &M {
        &self.mapper
    }

    /// One past the last managed byte.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> PhysicalAddress {
        self.layout.end(PAGES)
    }

    #[inline]
    fn index_of(&self, pa: PhysicalAddress) -> Result<PageIndex, InvariantViolation> {
        self.layout.index_of(pa, PAGES)
    }

    #[inline]
    fn checked_index(&self, pa: PhysicalAddress) -> PageIndex {
        self.index_of(pa).unwrap_or_else(|v| fatal(v))
    }

    /// Release every page in `[start, end)` above the kernel image.
    ///
    /// Each page gets an initial reference that is immediately dropped, so it
    /// lands on the free chain with a count of zero. The range is clamped to
    /// the managed window. Returns the number of pages released.
    pub fn init_range(&self, start: PhysicalAddress, end: PhysicalAddress) -> usize {
        let first = start.max(self.layout.first_usable());
        let Some(mut pa) = first.checked_page_round_up() else {
            return 0;
        };
        let end = end.min(self.end());

        let mut released = 0;
        while end.as_u64().saturating_sub(pa.as_u64()) >= PAGE_SIZE {
            self.set_initial(pa);
            self.decrement_and_maybe_free(pa);
            released += 1;
            pa += PAGE_SIZE;
        }

        info!("pmm: released {released} pages in [{first}, {end})");
        released
    }

    /// Pop a page off the free chain.
    ///
    /// The page leaves with a reference count of exactly 1 and every byte set
    /// to [`ALLOC_JUNK`].
    ///
    /// # Errors
    /// [`AllocError::Exhausted`] if no page is free. Nothing is modified in that case.
    pub fn allocate_page(&self) -> Result<PhysicalAddress, AllocError> {
        let pa = {
            let mut counts = self.refcounts.lock();
            let index = self
                .free_list
                .lock()
                .pop()
                .ok_or(AllocError::Exhausted)?;
            let pa = self.layout.address_of(index);
            if counts.activate(index) != 0 {
                fatal(InvariantViolation::InitialCountOnLivePage(pa));
            }
            pa
        };

        // SAFETY: the page just left the free chain; nobody else can reach it.
        unsafe { fill_page(&self.mapper, pa, ALLOC_JUNK) };
        trace!("pmm: allocated {pa}");
        Ok(pa)
    }

    /// Return a page to the free chain regardless of its count.
    ///
    /// This is the direct counterpart of [`allocate_page`](Self::allocate_page)
    /// for a page with a single owner; shared pages must go through
    /// [`decrement_and_maybe_free`](Self::decrement_and_maybe_free). A page
    /// that was never managed (count 0, not free) is adopted.
    ///
    /// Fatal if `pa` is misaligned, outside the window, inside the kernel
    /// image, still shared, or already free.
    pub fn release_page(&self, pa: PhysicalAddress) {
        let index = self.checked_index(pa);
        let mut counts = self.refcounts.lock();
        let previous = counts.get(index);
        if previous > 1 {
            fatal(InvariantViolation::ReleaseShared {
                pa,
                refcount: previous,
            });
        }
        counts.clear(index);
        self.reclaim(&counts, index);
        if previous == 0 {
            counts.adopt();
        }
    }

    /// Scrub and link a page whose count has just reached zero.
    ///
    /// Taking the count guard keeps the lock order visible at every call site.
    fn reclaim(&self, _counts: &CountGuard<'_, PAGES>, index: PageIndex) {
        let pa = self.layout.address_of(index);
        // SAFETY: the count is zero, so no mapping refers to the page any more.
        unsafe { fill_page(&self.mapper, pa, FREE_JUNK) };
        if !self.free_list.lock().push(index) {
            fatal(InvariantViolation::DoubleFree(pa));
        }
        trace!("pmm: released {pa}");
    }

    /// Give a detached page its first reference.
    ///
    /// Fatal if the address is invalid or the page is already counted or free.
    pub fn set_initial(&self, pa: PhysicalAddress) {
        let index = self.checked_index(pa);
        let mut counts = self.refcounts.lock();
        if counts.get(index) != 0 || self.free_list.lock().contains(index) {
            fatal(InvariantViolation::InitialCountOnLivePage(pa));
        }
        counts.activate(index);
        counts.adopt();
    }

    /// Add a mapping to an allocated page.
    ///
    /// # Errors
    /// [`RefCountError::Invalid`] if `pa` is misaligned, outside the window or
    /// inside the kernel image. Incrementing a page whose count is zero is fatal.
    pub fn increment(&self, pa: PhysicalAddress) -> Result<(), RefCountError> {
        let index = self.index_of(pa).map_err(|_| RefCountError::Invalid(pa))?;
        let mut counts = self.refcounts.lock();
        match counts.increment(index) {
            Ok(_) => Ok(()),
            Err(CountError::Unreferenced) => fatal(InvariantViolation::NotAllocated(pa)),
            Err(CountError::Overflow) => fatal(InvariantViolation::RefCountOverflow(pa)),
        }
    }

    /// Drop one mapping; reclaim the page when it was the last.
    ///
    /// The decrement, the zero check, and the link into the free chain happen
    /// under the count lock, so the page is free by the time anyone can see
    /// its zero count. Returns `true` if the page was reclaimed.
    ///
    /// Fatal if `pa` is invalid or its count is already zero.
    pub fn decrement_and_maybe_free(&self, pa: PhysicalAddress) -> bool {
        let index = self.checked_index(pa);
        let mut counts = self.refcounts.lock();
        let remaining = match counts.decrement(index) {
            Ok(remaining) => remaining,
            Err(_) => fatal(InvariantViolation::NotAllocated(pa)),
        };
        if remaining == 0 {
            self.reclaim(&counts, index);
        }
        remaining == 0
    }

    /// Current reference count of `pa`.
    ///
    /// # Errors
    /// [`RefCountError::Invalid`] if `pa` is not a managed page.
    pub fn current_count(&self, pa: PhysicalAddress) -> Result<u32, RefCountError> {
        let index = self.index_of(pa).map_err(|_| RefCountError::Invalid(pa))?;
        Ok(self.refcounts.lock().get(index))
    }

    /// Tagged view of `pa`'s slot.
    ///
    /// # Errors
    /// [`RefCountError::Invalid`] if `pa` is not a managed page.
    pub fn page_state(&self, pa: PhysicalAddress) -> Result<PageState, RefCountError> {
        let index = self.index_of(pa).map_err(|_| RefCountError::Invalid(pa))?;
        let counts = self.refcounts.lock();
        if let Some(refcount) = NonZeroU32::new(counts.get(index)) {
            return Ok(PageState::Allocated { refcount });
        }
        let state = match self.free_list.lock().slot(index) {
            Slot::Free { next } => PageState::Free {
                next: next.map(|n| self.layout.address_of(n)),
            },
            Slot::Detached => PageState::Detached,
        };
        Ok(state)
    }

    /// Number of pages on the free chain, counted by walking it.
    ///
    /// Diagnostic only: the walk holds the free-list lock for its whole length.
    #[must_use]
    pub fn count_free_pages(&self) -> usize {
        self.free_list
            .lock()
            .walk_len()
            .unwrap_or_else(|visited| fatal(InvariantViolation::FreeListCorrupt(visited)))
    }

    /// The page at the head of the free chain, i.e. the next one
    /// [`allocate_page`](Self::allocate_page) hands out.
    #[must_use]
    pub fn peek_free(&self) -> Option<PhysicalAddress> {
        self.free_list
            .lock()
            .head()
            .map(|index| self.layout.address_of(index))
    }

    /// Consistent snapshot of the accounting, taken under both locks.
    #[must_use]
    pub fn stats(&self) -> MemoryStats {
        let counts = self.refcounts.lock();
        let free = self
            .free_list
            .lock()
            .walk_len()
            .unwrap_or_else(|visited| fatal(InvariantViolation::FreeListCorrupt(visited)));
        MemoryStats {
            slots: PAGES,
            reserved: self.layout.reserved_pages(PAGES),
            managed: counts.managed(),
            free,
            allocated: counts.allocated(),
            shared: counts.shared(),
            references: counts.references(),
        }
    }

    /// Lock counters of the count lock and the free-list lock, in that order.
    #[must_use]
    pub fn lock_stats(&self) -> (kernel_sync::LockStats, kernel_sync::LockStats) {
        (self.refcounts.stats(), self.free_list.stats())
    }
}
