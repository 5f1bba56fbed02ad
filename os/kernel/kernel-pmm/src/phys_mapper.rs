//! # Reaching physical memory
//!
//! The allocator never dereferences a [`PhysicalAddress`] directly. Scrubbing
//! and copy-on-write duplication go through a [`PhysMapper`], which converts
//! a physical address to a pointer in the current address space. The kernel
//! uses its higher-half direct map ([`HhdmPhysMapper`]); host tests back
//! "physical" memory with ordinary heap frames.

use kernel_info::memory::HHDM_BASE;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress};

/// The bytes of one physical page.
#[allow(clippy::cast_possible_truncation)]
pub type PageFrame = [u8; PAGE_SIZE as usize];

/// Convert physical addresses into usable references.
///
/// # Safety
/// Implementations must return a pointer to memory that really backs `pa`
/// and stays valid for as long as the allocator manages that page.
pub unsafe trait PhysMapper {
    /// Convert a *physical* address to a mutable reference in the current address space.
    ///
    /// # Safety
    /// - `pa` must be mapped and writable through this mapper.
    /// - The caller must have exclusive access to the `size_of::<T>()` bytes
    ///   at `pa` for the lifetime `'a`.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;
}

/// [`PhysMapper`] for kernels with a higher-half direct map (HHDM): every
/// physical address is visible at `HHDM_BASE + pa`.
#[derive(Debug, Copy, Clone, Default)]
pub struct HhdmPhysMapper;

impl HhdmPhysMapper {
    /// Virtual address through which `pa` is reachable.
    #[inline]
    #[must_use]
    pub const fn virtual_address(pa: PhysicalAddress) -> u64 {
        HHDM_BASE + pa.as_u64()
    }
}

// SAFETY: the boot code maps all managed RAM at HHDM_BASE before the allocator is created.
unsafe impl PhysMapper for HhdmPhysMapper {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let va = Self::virtual_address(pa) as *mut T;
        // SAFETY: Caller must ensure the physical address is valid and mapped via HHDM.
        unsafe { &mut *va }
    }
}

/// Overwrite a whole page with `junk`.
///
/// # Safety
/// The caller must own the page at `pa` exclusively.
pub(crate) unsafe fn fill_page<M: PhysMapper>(mapper: &M, pa: PhysicalAddress, junk: u8) {
    let frame: &mut PageFrame = unsafe { mapper.phys_to_mut::<PageFrame>(pa) };
    frame.fill(junk);
}

/// Copy the page at `src` into the page at `dst`.
///
/// # Safety
/// `src` must not be written concurrently and `dst` must be owned exclusively.
/// The two pages must be distinct.
pub(crate) unsafe fn copy_page<M: PhysMapper>(
    mapper: &M,
    src: PhysicalAddress,
    dst: PhysicalAddress,
) {
    debug_assert_ne!(src, dst);
    let from: &PageFrame = unsafe { mapper.phys_to_mut::<PageFrame>(src) };
    let to: &mut PageFrame = unsafe { mapper.phys_to_mut::<PageFrame>(dst) };
    to.copy_from_slice(from);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hhdm_offsets_physical_addresses() {
        let pa = PhysicalAddress::new(0x8000_1000);
        assert_eq!(
            HhdmPhysMapper::virtual_address(pa),
            0xffff_8880_8000_1000
        );
    }
}
