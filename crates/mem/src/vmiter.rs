use thiserror::Error;
use types::{PhysicalAddress, VirtualAddress, PAGE_SIZE};

use crate::phys::PhysicalMemory;
use crate::pte::{Pte, PTE_P};

/// Failure installing a mapping.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    /// No free frame was available to grow the page table.
    #[error("out of physical pages for page-table growth")]
    TableExhausted,
}

/// Cursor positioned at one virtual address within one page table.
///
/// The table is the two-level structure stored in physical frames: the
/// root frame is indexed by `vpn1` and points at second-level frames
/// indexed by `vpn0`. Queries report the leaf mapping under the cursor;
/// `map`/`try_map` install one, allocating table frames as needed.
pub struct VmIter<'m> {
    mem: &'m PhysicalMemory,
    root: PhysicalAddress,
    va: VirtualAddress,
}

impl<'m> VmIter<'m> {
    pub fn new(mem: &'m PhysicalMemory, root: PhysicalAddress) -> Self {
        Self::at(mem, root, VirtualAddress(0))
    }

    pub fn at(mem: &'m PhysicalMemory, root: PhysicalAddress, va: VirtualAddress) -> Self {
        Self { mem, root, va }
    }

    pub fn va(&self) -> VirtualAddress {
        self.va
    }

    /// Reposition the cursor.
    pub fn find(&mut self, va: VirtualAddress) {
        self.va = va;
    }

    /// Advance by one page.
    pub fn step(&mut self) {
        self.va = self.va.step_page();
    }

    fn l1_entry_pa(&self) -> PhysicalAddress {
        PhysicalAddress(self.root.as_u32() + (self.va.vpn1() * 4) as u32)
    }

    fn l1(&self) -> Pte {
        Pte(self.mem.load_u32(self.l1_entry_pa()))
    }

    fn leaf(&self) -> Pte {
        let l1 = self.l1();
        if !l1.present() {
            return Pte::default();
        }
        let entry = PhysicalAddress(l1.pa().as_u32() + (self.va.vpn0() * 4) as u32);
        Pte(self.mem.load_u32(entry))
    }

    /// Physical address the cursor's virtual address translates to, if
    /// the mapping is present. Carries the page offset through.
    pub fn pa(&self) -> Option<PhysicalAddress> {
        let leaf = self.leaf();
        leaf.present()
            .then(|| PhysicalAddress(leaf.pa().as_u32() + self.va.offset() as u32))
    }

    /// Permission flags of the leaf entry; 0 when nothing is mapped.
    pub fn perm(&self) -> u32 {
        self.leaf().perm()
    }

    pub fn present(&self) -> bool {
        self.leaf().present()
    }

    pub fn writable(&self) -> bool {
        let leaf = self.leaf();
        leaf.present() && leaf.writable()
    }

    pub fn user(&self) -> bool {
        let leaf = self.leaf();
        leaf.present() && leaf.user()
    }

    /// Install a mapping for the page under the cursor. Aborts if the
    /// table cannot be grown; only trusted boot-time setup may use this.
    pub fn map(&mut self, pa: PhysicalAddress, perm: u32) {
        self.try_map(pa, perm)
            .expect("page-table growth failed during trusted setup");
    }

    /// Install a mapping, reporting failure instead of aborting when no
    /// frame is available for table growth, so the caller can roll back.
    pub fn try_map(&mut self, pa: PhysicalAddress, perm: u32) -> Result<(), MapError> {
        let mut l1 = self.l1();
        if !l1.present() {
            let table = self.mem.alloc(PAGE_SIZE).ok_or(MapError::TableExhausted)?;
            self.mem.zero_page(table);
            l1 = Pte::new(table, PTE_P);
            self.mem.store_u32(self.l1_entry_pa(), l1.0);
        }
        let entry = PhysicalAddress(l1.pa().as_u32() + (self.va.vpn0() * 4) as u32);
        self.mem.store_u32(entry, Pte::new(pa.align_down(), perm).0);
        Ok(())
    }
}
