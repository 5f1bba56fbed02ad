use crate::{MemoryAddress, PAGE_SIZE};
use core::fmt;
use core::ops::{Add, AddAssign};

/// Physical memory address.
///
/// A thin wrapper around [`MemoryAddress`] that denotes **physical** addresses.
/// The page allocator hands these out and takes them back; they are never
/// dereferenced directly but go through a `PhysMapper` first.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let pa = PhysicalAddress::new(0x8000_0042);
/// assert_eq!(pa.page_round_down().as_u64(), 0x8000_0000);
/// assert_eq!(pa.page_offset(), 0x42);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(pub(crate) MemoryAddress);

impl PhysicalAddress {
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self::new(0)
    }

    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(MemoryAddress::new(v))
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0.as_u64()
    }

    #[inline]
    #[must_use]
    pub const fn page_offset(self) -> u64 {
        self.0.page_offset()
    }

    #[inline]
    #[must_use]
    pub const fn is_page_aligned(self) -> bool {
        self.0.is_page_aligned()
    }

    #[inline]
    #[must_use]
    pub const fn page_round_down(self) -> Self {
        Self(self.0.page_round_down())
    }

    #[inline]
    #[must_use]
    pub const fn page_round_up(self) -> Self {
        Self(self.0.page_round_up())
    }

    #[inline]
    #[must_use]
    pub const fn checked_page_round_up(self) -> Option<Self> {
        match self.0.checked_page_round_up() {
            Some(a) => Some(Self(a)),
            None => None,
        }
    }

    /// Number of whole pages from `base` to `self`.
    #[inline]
    #[must_use]
    pub const fn pages_since(self, base: Self) -> Option<u64> {
        self.0.pages_since(base.0)
    }

    /// The address `pages` pages above `self`.
    #[inline]
    #[must_use]
    pub const fn add_pages(self, pages: u64) -> Self {
        Self::new(self.as_u64() + pages * PAGE_SIZE)
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA(0x{:016X})", self.as_u64())
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.as_u64())
    }
}

impl From<u64> for PhysicalAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl Add<u64> for PhysicalAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<u64> for PhysicalAddress {
    #[inline]
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}
