use core::fmt;
use core::num::NonZeroU32;
use kernel_memory_addresses::PhysicalAddress;

/// Tagged view of one managed page slot.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PageState {
    /// Never released to the allocator.
    Detached,
    /// On the free chain; `next` is the page that follows it.
    Free { next: Option<PhysicalAddress> },
    /// Mapped `refcount` times.
    Allocated { refcount: NonZeroU32 },
}

/// Point-in-time accounting of the managed window.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct MemoryStats {
    /// Slots in the window, including the kernel image.
    pub slots: usize,
    /// Slots occupied by the kernel image.
    pub reserved: usize,
    /// Pages ever released to the allocator.
    pub managed: usize,
    pub free: usize,
    pub allocated: usize,
    /// Allocated pages with more than one mapping.
    pub shared: usize,
    /// Sum of all reference counts.
    pub references: u64,
}

impl MemoryStats {
    /// Every managed page is either free or allocated, never both.
    #[must_use]
    pub const fn is_conserved(&self) -> bool {
        self.free + self.allocated == self.managed
    }
}

impl fmt::Display for MemoryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} free, {} allocated ({} shared, {} refs) of {} managed pages",
            self.free, self.allocated, self.shared, self.references, self.managed
        )
    }
}
