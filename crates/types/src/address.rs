use core::fmt;

/// log2 of the page size.
pub const PAGE_SHIFT: usize = 12;
/// Fixed page size (4 KiB) for both physical frames and virtual pages.
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;

/// A virtual address inside one process's address space.
///
/// Split Sv32-style into two 10-bit page-table indices plus a 12-bit
/// page offset: `vpn1` indexes the root table, `vpn0` the second level.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VirtualAddress(pub u32);

impl VirtualAddress {
    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Byte offset within the page.
    pub fn offset(self) -> usize {
        (self.0 as usize) & (PAGE_SIZE - 1)
    }

    /// Root page-table index.
    pub fn vpn1(self) -> usize {
        ((self.0 >> 22) & 0x3ff) as usize
    }

    /// Second-level page-table index.
    pub fn vpn0(self) -> usize {
        ((self.0 >> 12) & 0x3ff) as usize
    }

    pub fn align_down(self) -> Self {
        Self(self.0 & !(PAGE_SIZE as u32 - 1))
    }

    pub fn is_page_aligned(self) -> bool {
        self.offset() == 0
    }

    /// The address one page further on.
    pub fn step_page(self) -> Self {
        Self(self.0.wrapping_add(PAGE_SIZE as u32))
    }
}

impl fmt::Debug for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// A physical address into the simulated memory backing. Frame numbers
/// are the integer handles by which page frames (including page-table
/// pages) are addressed.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PhysicalAddress(pub u32);

impl PhysicalAddress {
    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// The frame number holding this address.
    pub fn page_number(self) -> usize {
        self.as_usize() >> PAGE_SHIFT
    }

    pub fn from_page_number(pn: usize) -> Self {
        Self((pn << PAGE_SHIFT) as u32)
    }

    pub fn align_down(self) -> Self {
        Self(self.0 & !(PAGE_SIZE as u32 - 1))
    }

    pub fn is_page_aligned(self) -> bool {
        self.0 as usize & (PAGE_SIZE - 1) == 0
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}
