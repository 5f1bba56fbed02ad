#![allow(dead_code)]

use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, VirtualAddress};
use kernel_pmm::{MemoryLayout, PageAllocator, PageFrame, PageTableEntry, PageTableOps, PhysMapper};
use std::cell::UnsafeCell;
use std::collections::BTreeMap;

/// Slots in every test allocator.
pub const PAGES: usize = 32;

/// Where "RAM" starts for tests.
pub const BASE: u64 = 0x8000_0000;

/// Pages taken by the pretend kernel image.
pub const KERNEL_PAGES: u64 = 2;

pub type TestAllocator = PageAllocator<HostMemory, PAGES>;

#[repr(C, align(4096))]
struct Frame(PageFrame);

/// Heap-backed stand-in for physical RAM at `[base, base + frames * PAGE_SIZE)`.
pub struct HostMemory {
    base: u64,
    frames: Box<[UnsafeCell<Frame>]>,
}

// SAFETY: the allocator hands out each page to one owner at a time.
unsafe impl Sync for HostMemory {}

impl HostMemory {
    pub fn new(base: u64, frames: usize) -> Self {
        let frames = (0..frames)
            .map(|_| UnsafeCell::new(Frame([0; PAGE_SIZE as usize])))
            .collect();
        Self { base, frames }
    }

    fn frame_ptr(&self, pa: PhysicalAddress) -> *mut u8 {
        let offset = pa.as_u64().checked_sub(self.base).expect("below host memory");
        let index = (offset / PAGE_SIZE) as usize;
        assert!(index < self.frames.len(), "{pa} beyond host memory");
        let frame = self.frames[index].get().cast::<u8>();
        unsafe { frame.add(pa.page_offset() as usize) }
    }

    /// Copy of a page's bytes.
    pub fn read(&self, pa: PhysicalAddress) -> Vec<u8> {
        let ptr = self.frame_ptr(pa.page_round_down());
        unsafe { std::slice::from_raw_parts(ptr, PAGE_SIZE as usize).to_vec() }
    }

    pub fn write(&self, pa: PhysicalAddress, bytes: &[u8]) {
        assert!(pa.page_offset() as usize + bytes.len() <= PAGE_SIZE as usize);
        let ptr = self.frame_ptr(pa);
        unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, bytes.len()) };
    }
}

unsafe impl PhysMapper for HostMemory {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        unsafe { &mut *self.frame_ptr(pa).cast::<T>() }
    }
}

pub fn layout() -> MemoryLayout {
    MemoryLayout::new(
        PhysicalAddress::new(BASE),
        PhysicalAddress::new(BASE + KERNEL_PAGES * PAGE_SIZE - 0x10),
    )
}

/// An allocator with nothing released yet.
pub fn empty_allocator() -> TestAllocator {
    PageAllocator::new(HostMemory::new(BASE, PAGES), layout())
}

/// An allocator with the whole window above the kernel image released.
pub fn allocator() -> TestAllocator {
    let pmm = empty_allocator();
    pmm.init_range(PhysicalAddress::new(BASE), pmm.end());
    pmm
}

pub const USABLE_PAGES: usize = PAGES - KERNEL_PAGES as usize;

pub fn all_bytes(page: &[u8], value: u8) -> bool {
    page.iter().all(|&b| b == value)
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SoftPageTableError {
    AlreadyMapped(VirtualAddress),
    Injected,
}

/// Single-level software page table.
///
/// Mirrors the hardware rule that installing a leaf over a live one is an
/// error, and can be told to fail the next `n` remaps.
#[derive(Default)]
pub struct SoftPageTable {
    entries: BTreeMap<u64, PageTableEntry>,
    fail_remaps: usize,
    pub remaps: usize,
    pub invalidations: usize,
}

impl SoftPageTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(&mut self, va: VirtualAddress, pa: PhysicalAddress, flags: PageTableEntry) {
        self.entries
            .insert(va.as_u64(), flags.with_physical_address(pa));
    }

    pub fn fail_next_remaps(&mut self, n: usize) {
        self.fail_remaps = n;
    }

    pub fn entry(&self, va: VirtualAddress) -> Option<PageTableEntry> {
        self.entries.get(&va.as_u64()).copied()
    }
}

impl PageTableOps for SoftPageTable {
    type Error = SoftPageTableError;

    fn lookup(&self, va: VirtualAddress) -> Option<PageTableEntry> {
        self.entry(va)
    }

    fn invalidate(&mut self, va: VirtualAddress) {
        self.invalidations += 1;
        self.entries.remove(&va.as_u64());
    }

    fn remap(
        &mut self,
        va: VirtualAddress,
        pa: PhysicalAddress,
        flags: PageTableEntry,
    ) -> Result<(), Self::Error> {
        self.remaps += 1;
        if self.fail_remaps > 0 {
            self.fail_remaps -= 1;
            return Err(SoftPageTableError::Injected);
        }
        if self.entries.get(&va.as_u64()).is_some_and(|e| e.valid()) {
            return Err(SoftPageTableError::AlreadyMapped(va));
        }
        self.map(va, pa, flags);
        Ok(())
    }
}

/// Share `pa` between two address spaces the way fork does: both mappings
/// read-only and copy-on-write, one extra reference.
pub fn fork_share(
    pmm: &TestAllocator,
    parent: &mut SoftPageTable,
    child: &mut SoftPageTable,
    va: VirtualAddress,
    pa: PhysicalAddress,
) {
    parent.map(va, pa, PageTableEntry::user_cow());
    child.map(va, pa, PageTableEntry::user_cow());
    pmm.increment(pa).unwrap();
}
