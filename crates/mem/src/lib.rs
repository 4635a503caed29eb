//! Physical memory and page tables for the simulated machine.
//!
//! Physical memory is one contiguous byte buffer carved into 4 KiB
//! frames, each with a reference count that is the sole lifetime
//! authority for the frame. Page tables live inside ordinary frames and
//! are addressed by physical address, so nothing in here holds a
//! language-level reference into a page table.

pub mod phys;
pub use phys::{PhysicalMemory, ALLOC_FILL};

pub mod pte;
pub use pte::{Pte, PTE_P, PTE_U, PTE_W};

pub mod vmiter;
pub use vmiter::{MapError, VmIter};

pub mod ptiter;
pub use ptiter::PtIter;
