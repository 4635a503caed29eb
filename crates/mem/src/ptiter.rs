use types::{PhysicalAddress, PAGE_SIZE};

use crate::phys::PhysicalMemory;
use crate::pte::Pte;

/// Iterates the second-level table frames reachable from one root table
/// frame. Address-space teardown releases each yielded frame, then the
/// root itself; the root is not yielded here.
pub struct PtIter<'m> {
    mem: &'m PhysicalMemory,
    root: PhysicalAddress,
    index: usize,
}

impl<'m> PtIter<'m> {
    pub fn new(mem: &'m PhysicalMemory, root: PhysicalAddress) -> Self {
        Self { mem, root, index: 0 }
    }
}

impl Iterator for PtIter<'_> {
    type Item = PhysicalAddress;

    fn next(&mut self) -> Option<PhysicalAddress> {
        while self.index < PAGE_SIZE / 4 {
            let entry = PhysicalAddress(self.root.as_u32() + (self.index * 4) as u32);
            self.index += 1;
            let pte = Pte(self.mem.load_u32(entry));
            if pte.present() {
                return Some(pte.pa());
            }
        }
        None
    }
}
