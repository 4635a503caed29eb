use std::cell::RefCell;
use std::fmt;

use types::{
    allocatable_physical_address, PhysicalAddress, MEMSIZE_PHYSICAL, NPAGES, PAGE_SIZE,
};

/// Byte pattern written into freshly allocated pages and into pages whose
/// last owner released them, so stale data is recognizable in dumps.
pub const ALLOC_FILL: u8 = 0xCC;

/// Per-frame bookkeeping. `refcount == 0` means the frame is free.
#[derive(Clone, Copy, Debug, Default)]
struct PageInfo {
    refcount: u32,
}

/// Simulated physical memory plus its page-frame allocator.
///
/// Design at a glance:
/// - Physical memory is a single `Vec<u8>` (`backing`). Frames are 4 KiB
///   slices into it, addressed by frame number.
/// - Each frame carries a reference count; the count is mutated only by
///   `alloc`/`retain`/`release`, never by callers directly.
/// - `alloc` is a linear first-fit scan from physical zero. O(memory
///   size) per call, acceptable for a 2 MiB machine; no free list is
///   kept.
/// - Page tables are stored inside ordinary frames; the cursor in
///   `vmiter` reads and writes them through the `load_u32`/`store_u32`
///   accessors here.
pub struct PhysicalMemory {
    backing: RefCell<Vec<u8>>,
    pages: RefCell<Vec<PageInfo>>,
}

impl PhysicalMemory {
    pub fn new() -> Self {
        Self {
            backing: RefCell::new(vec![0u8; MEMSIZE_PHYSICAL]),
            pages: RefCell::new(vec![PageInfo::default(); NPAGES]),
        }
    }

    /// Allocate one page. Fails for requests larger than a page and when
    /// no allocatable frame is free; smaller requests still consume a
    /// whole page. The returned page is filled with `ALLOC_FILL`.
    pub fn alloc(&self, sz: usize) -> Option<PhysicalAddress> {
        if sz > PAGE_SIZE {
            return None;
        }
        let mut pages = self.pages.borrow_mut();
        for pn in 0..NPAGES {
            let pa = PhysicalAddress::from_page_number(pn);
            if allocatable_physical_address(pa) && pages[pn].refcount == 0 {
                pages[pn].refcount = 1;
                drop(pages);
                self.fill_page(pa, ALLOC_FILL);
                return Some(pa);
            }
        }
        None
    }

    /// Add an owner to an in-use frame (fork's read-only sharing).
    pub fn retain(&self, pa: PhysicalAddress) {
        let mut pages = self.pages.borrow_mut();
        let info = &mut pages[pa.page_number()];
        assert!(info.refcount > 0, "retain of free frame {:?}", pa);
        info.refcount += 1;
    }

    /// Drop one owner of a frame. Only when the last owner is gone is the
    /// page scrubbed and made allocatable again.
    pub fn release(&self, pa: PhysicalAddress) {
        let mut pages = self.pages.borrow_mut();
        let info = &mut pages[pa.page_number()];
        assert!(info.refcount > 0, "release of free frame {:?}", pa);
        info.refcount -= 1;
        let now_free = info.refcount == 0;
        drop(pages);
        if now_free {
            self.fill_page(pa, ALLOC_FILL);
        }
    }

    pub fn refcount(&self, pa: PhysicalAddress) -> u32 {
        self.pages.borrow()[pa.page_number()].refcount
    }

    /// Frames the allocator could still hand out.
    pub fn free_page_count(&self) -> usize {
        let pages = self.pages.borrow();
        (0..NPAGES)
            .filter(|&pn| {
                allocatable_physical_address(PhysicalAddress::from_page_number(pn))
                    && pages[pn].refcount == 0
            })
            .count()
    }

    /// Fill the whole page holding `pa`.
    pub fn fill_page(&self, pa: PhysicalAddress, byte: u8) {
        let start = pa.align_down().as_usize();
        self.backing.borrow_mut()[start..start + PAGE_SIZE].fill(byte);
    }

    pub fn zero_page(&self, pa: PhysicalAddress) {
        self.fill_page(pa, 0);
    }

    /// Copy one whole page of bytes.
    pub fn copy_page(&self, dst: PhysicalAddress, src: PhysicalAddress) {
        let s = src.align_down().as_usize();
        let d = dst.align_down().as_usize();
        self.backing.borrow_mut().copy_within(s..s + PAGE_SIZE, d);
    }

    pub fn write(&self, pa: PhysicalAddress, data: &[u8]) {
        let start = pa.as_usize();
        let mut backing = self.backing.borrow_mut();
        if start + data.len() > backing.len() {
            panic!("write out of bounds: pa = {:?} len = {}", pa, data.len());
        }
        backing[start..start + data.len()].copy_from_slice(data);
    }

    pub fn read(&self, pa: PhysicalAddress, len: usize) -> Vec<u8> {
        let start = pa.as_usize();
        let backing = self.backing.borrow();
        if start + len > backing.len() {
            panic!("read out of bounds: pa = {:?} len = {}", pa, len);
        }
        backing[start..start + len].to_vec()
    }

    pub fn load_u32(&self, pa: PhysicalAddress) -> u32 {
        let start = pa.as_usize();
        let backing = self.backing.borrow();
        if start + 4 > backing.len() {
            panic!("load u32 out of bounds: pa = {:?}", pa);
        }
        u32::from_le_bytes(backing[start..start + 4].try_into().unwrap())
    }

    pub fn store_u32(&self, pa: PhysicalAddress, val: u32) {
        let start = pa.as_usize();
        let mut backing = self.backing.borrow_mut();
        if start + 4 > backing.len() {
            panic!("store u32 out of bounds: pa = {:?}", pa);
        }
        backing[start..start + 4].copy_from_slice(&val.to_le_bytes());
    }

    /// Hex dump of the page holding `pa`, for log output.
    pub fn dump_page(&self, pa: PhysicalAddress) -> String {
        let start = pa.align_down().as_usize();
        hex::encode(&self.backing.borrow()[start..start + PAGE_SIZE])
    }
}

impl Default for PhysicalMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PhysicalMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicalMemory")
            .field("free_pages", &self.free_page_count())
            .finish()
    }
}
