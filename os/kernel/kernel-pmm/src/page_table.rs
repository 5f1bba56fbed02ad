//! # Page-table collaborator interface
//!
//! The allocator does not walk or build page tables. It consumes one leaf
//! entry format ([`PageTableEntry`]) and one narrow trait ([`PageTableOps`])
//! implemented by the virtual-memory layer.

use bitfield_struct::bitfield;
use core::fmt;
use kernel_memory_addresses::{PAGE_SHIFT, PhysicalAddress, VirtualAddress};

/// A leaf page-table entry in RISC-V Sv39 layout.
///
/// ### Bit layout
///
/// | Bits   | Name             | Meaning |
/// |--------|------------------|---------|
/// | 0      | `V`              | Valid entry if set |
/// | 1      | `R`              | Readable |
/// | 2      | `W`              | Writable |
/// | 3      | `X`              | Executable |
/// | 4      | `U`              | User-mode accessible |
/// | 5      | `G`              | Global |
/// | 6      | `A`              | Accessed |
/// | 7      | `D`              | Dirty |
/// | 8      | RSW / `COW`      | Copy-on-write (software) |
/// | 9      | RSW              | Spare software bit |
/// | 10–53  | `PPN`            | Physical page number |
/// | 54–63  | reserved         | Must be zero |
///
/// A copy-on-write mapping is valid and readable but has `W` clear and `COW`
/// set. Once the fault is resolved the pair flips to `W` set, `COW` clear.
///
/// ### Example
/// ```rust
/// # use kernel_pmm::PageTableEntry;
/// # use kernel_memory_addresses::PhysicalAddress;
/// let e = PageTableEntry::user_cow()
///     .with_physical_address(PhysicalAddress::new(0x8000_5000));
/// assert!(e.valid() && e.copy_on_write() && !e.writable());
/// assert_eq!(e.physical_address().as_u64(), 0x8000_5000);
/// ```
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct PageTableEntry {
    pub valid: bool,
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
    pub user: bool,
    pub global: bool,
    pub accessed: bool,
    pub dirty: bool,

    /// Software bit: the page is shared and must be copied before the first write.
    pub copy_on_write: bool,

    /// Second software bit, unused by the allocator.
    pub rsw_spare: bool,

    #[bits(44)]
    ppn: u64,

    #[bits(10)]
    __: u16,
}

impl PageTableEntry {
    #[inline]
    #[must_use]
    pub const fn physical_address(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.ppn() << PAGE_SHIFT)
    }

    #[inline]
    #[must_use]
    pub const fn with_physical_address(self, pa: PhysicalAddress) -> Self {
        self.with_ppn(pa.as_u64() >> PAGE_SHIFT)
    }

    /// The entry with its physical page number cleared.
    #[inline]
    #[must_use]
    pub const fn flags(&self) -> Self {
        self.with_ppn(0)
    }

    /// Flags of a user data page that is private and writable.
    #[inline]
    #[must_use]
    pub const fn user_rw() -> Self {
        Self::new()
            .with_valid(true)
            .with_readable(true)
            .with_writable(true)
            .with_user(true)
    }

    /// Flags of a user data page shared copy-on-write after a fork.
    #[inline]
    #[must_use]
    pub const fn user_cow() -> Self {
        Self::user_rw().with_writable(false).with_copy_on_write(true)
    }

    /// These flags with the copy-on-write marker resolved to a private writable page.
    #[inline]
    #[must_use]
    pub const fn resolved(self) -> Self {
        self.with_writable(true).with_copy_on_write(false)
    }
}

/// What the allocator needs from the virtual-memory layer.
///
/// Taking `&mut self` for mutation is how a caller proves it holds the
/// address space's lock for the duration of a fault.
pub trait PageTableOps {
    type Error: fmt::Debug;

    /// The leaf entry mapping `va`, if any.
    fn lookup(&self, va: VirtualAddress) -> Option<PageTableEntry>;

    /// Remove the leaf entry for `va` (and its TLB entry).
    fn invalidate(&mut self, va: VirtualAddress);

    /// Install a leaf entry for `va` pointing at `pa` with `flags`.
    ///
    /// The physical page number in `flags` is ignored.
    ///
    /// # Errors
    /// Implementation specific, e.g. an intermediate table could not be allocated
    /// or `va` is still mapped.
    fn remap(
        &mut self,
        va: VirtualAddress,
        pa: PhysicalAddress,
        flags: PageTableEntry,
    ) -> Result<(), Self::Error>;
}
