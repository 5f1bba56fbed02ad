use crate::layout::PageIndex;

/// Free-list view of one page slot.
///
/// Classic allocators reuse the first word of a free page as the link to the
/// next free page. Here the link lives in a side table next to the pages, so
/// a free page's bytes are never reinterpreted and a stale write into a freed
/// page cannot corrupt the chain.
///
/// ```text
/// head ─► [7] Free{next: 3} ─► [3] Free{next: 9} ─► [9] Free{next: None}
///         [0] Detached   [1] Detached   ...   (allocated or never released)
/// ```
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Slot {
    /// Not on the chain: allocated, reserved, or never handed to the allocator.
    Detached,
    /// On the chain.
    Free { next: Option<PageIndex> },
}

/// A LIFO stack of free page slots.
///
/// # Invariants
/// - A slot is [`Slot::Free`] iff it is reachable from `head`.
/// - The chain is acyclic and each slot appears at most once.
pub(crate) struct FreeList<const N: usize> {
    head: Option<PageIndex>,
    slots: [Slot; N],
}

impl<const N: usize> FreeList<N> {
    pub(crate) const fn new() -> Self {
        Self {
            head: None,
            slots: [Slot::Detached; N],
        }
    }

    /// Link `index` in front of the chain.
    ///
    /// Returns `false` without changing anything if the slot is already free.
    #[must_use]
    pub(crate) fn push(&mut self, index: PageIndex) -> bool {
        let slot = &mut self.slots[index.as_usize()];
        if matches!(slot, Slot::Free { .. }) {
            return false;
        }
        *slot = Slot::Free { next: self.head };
        self.head = Some(index);
        true
    }

    /// Unlink the head of the chain.
    pub(crate) fn pop(&mut self) -> Option<PageIndex> {
        let index = self.head?;
        let slot = &mut self.slots[index.as_usize()];
        let Slot::Free { next } = *slot else {
            unreachable!("free-list head {index:?} is not marked free");
        };
        *slot = Slot::Detached;
        self.head = next;
        Some(index)
    }

    #[inline]
    pub(crate) fn slot(&self, index: PageIndex) -> Slot {
        self.slots[index.as_usize()]
    }

    #[inline]
    pub(crate) fn contains(&self, index: PageIndex) -> bool {
        matches!(self.slot(index), Slot::Free { .. })
    }

    #[inline]
    pub(crate) const fn head(&self) -> Option<PageIndex> {
        self.head
    }

    /// Count nodes by walking the chain.
    ///
    /// Returns `Err(visited)` if the walk exceeds the number of slots, which
    /// can only happen if the chain contains a cycle.
    pub(crate) fn walk_len(&self) -> Result<usize, usize> {
        let mut count = 0;
        let mut cursor = self.head;
        while let Some(index) = cursor {
            count += 1;
            if count > N {
                return Err(count);
            }
            cursor = match self.slot(index) {
                Slot::Free { next } => next,
                Slot::Detached => return Err(count),
            };
        }
        Ok(count)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn push_pop_is_lifo() {
        let mut fl = FreeList::<8>::new();
        assert!(fl.push(PageIndex::new(2)));
        assert!(fl.push(PageIndex::new(5)));
        assert_eq!(fl.walk_len(), Ok(2));

        assert_eq!(fl.pop(), Some(PageIndex::new(5)));
        assert_eq!(fl.pop(), Some(PageIndex::new(2)));
        assert_eq!(fl.pop(), None);
        assert_eq!(fl.walk_len(), Ok(0));
    }

    #[test]
    fn push_rejects_duplicates() {
        let mut fl = FreeList::<4>::new();
        assert!(fl.push(PageIndex::new(1)));
        assert!(!fl.push(PageIndex::new(1)));
        assert_eq!(fl.walk_len(), Ok(1));
    }

    #[test]
    fn slots_track_membership() {
        let mut fl = FreeList::<4>::new();
        assert!(fl.push(PageIndex::new(0)));
        assert!(fl.push(PageIndex::new(3)));
        assert_eq!(fl.head(), Some(PageIndex::new(3)));
        assert_eq!(
            fl.slot(PageIndex::new(3)),
            Slot::Free {
                next: Some(PageIndex::new(0))
            }
        );
        assert!(!fl.contains(PageIndex::new(1)));

        fl.pop();
        assert_eq!(fl.slot(PageIndex::new(3)), Slot::Detached);
        assert!(fl.contains(PageIndex::new(0)));
    }

    #[test]
    fn walk_detects_a_cycle() {
        let mut fl = FreeList::<2>::new();
        fl.slots[0] = Slot::Free {
            next: Some(PageIndex::new(1)),
        };
        fl.slots[1] = Slot::Free {
            next: Some(PageIndex::new(0)),
        };
        fl.head = Some(PageIndex::new(0));
        assert_eq!(fl.walk_len(), Err(3));
    }
}
