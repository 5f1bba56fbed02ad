use crate::layout::PageIndex;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum CountError {
    /// The count is zero, i.e. the page is not allocated.
    Unreferenced,
    Overflow,
}

/// One reference count per page slot.
///
/// Also tracks how many slots have ever been handed to the allocator, which
/// is the total the conservation check compares against.
pub(crate) struct RefCountTable<const N: usize> {
    counts: [u32; N],
    managed: usize,
}

impl<const N: usize> RefCountTable<N> {
    pub(crate) const fn new() -> Self {
        Self {
            counts: [0; N],
            managed: 0,
        }
    }

    #[inline]
    pub(crate) fn get(&self, index: PageIndex) -> u32 {
        self.counts[index.as_usize()]
    }

    /// Count 0 → 1 for a page leaving the free chain.
    ///
    /// Returns the previous count, which the caller expects to be zero.
    pub(crate) fn activate(&mut self, index: PageIndex) -> u32 {
        core::mem::replace(&mut self.counts[index.as_usize()], 1)
    }

    /// Drop the count to zero. Returns the previous count.
    pub(crate) fn clear(&mut self, index: PageIndex) -> u32 {
        core::mem::take(&mut self.counts[index.as_usize()])
    }

    pub(crate) fn increment(&mut self, index: PageIndex) -> Result<u32, CountError> {
        let count = &mut self.counts[index.as_usize()];
        if *count == 0 {
            return Err(CountError::Unreferenced);
        }
        *count = count.checked_add(1).ok_or(CountError::Overflow)?;
        Ok(*count)
    }

    /// Returns the remaining count.
    pub(crate) fn decrement(&mut self, index: PageIndex) -> Result<u32, CountError> {
        let count = &mut self.counts[index.as_usize()];
        if *count == 0 {
            return Err(CountError::Unreferenced);
        }
        *count -= 1;
        Ok(*count)
    }

    /// Record that one more slot is now under the allocator's control.
    #[inline]
    pub(crate) const fn adopt(&mut self) {
        self.managed += 1;
    }

    #[inline]
    pub(crate) const fn managed(&self) -> usize {
        self.managed
    }

    /// Pages with a nonzero count.
    pub(crate) fn allocated(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }

    /// Pages mapped more than once.
    pub(crate) fn shared(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 1).count()
    }

    /// Sum of all counts, i.e. live mappings.
    pub(crate) fn references(&self) -> u64 {
        self.counts.iter().map(|&c| u64::from(c)).sum()
    }
}
