use types::{PhysicalAddress, PAGE_SIZE};

/// Present bit.
pub const PTE_P: u32 = 1 << 0;
/// Writable bit.
pub const PTE_W: u32 = 1 << 1;
/// User-accessible bit.
pub const PTE_U: u32 = 1 << 2;
/// Mask of the flag bits (the page offset of the encoded address).
pub const PTE_FLAGS: u32 = PAGE_SIZE as u32 - 1;

/// Encoded page-table entry: a page-aligned physical address in the high
/// bits, permission flags in the low bits. Entries in a second-level
/// table are leaves; entries in a root table point at second-level table
/// frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pte(pub u32);

impl Pte {
    pub fn new(pa: PhysicalAddress, perm: u32) -> Self {
        debug_assert!(pa.is_page_aligned());
        Self(pa.as_u32() | (perm & PTE_FLAGS))
    }

    pub fn pa(self) -> PhysicalAddress {
        PhysicalAddress(self.0 & !PTE_FLAGS)
    }

    pub fn perm(self) -> u32 {
        self.0 & PTE_FLAGS
    }

    pub fn present(self) -> bool {
        self.0 & PTE_P != 0
    }

    pub fn writable(self) -> bool {
        self.0 & PTE_W != 0
    }

    pub fn user(self) -> bool {
        self.0 & PTE_U != 0
    }
}
