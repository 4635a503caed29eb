//! Physical and virtual memory layout of the simulated machine.
//!
//!  +-------------- Base Memory --------------+
//!  v                                         v
//! +-----+--------------------+----------------+--------------------+---/
//! |     | Kernel      Kernel |       :    I/O | App 1        App 1 | ...
//! |     | Code + Data  Stack |  ...  : Memory | Code + Data  Stack |
//! +-----+--------------------+----------------+--------------------+---/
//! 0  0x40000              0x80000 0xA0000 0x100000
//!                                             ^
//!                                      PROC_START_ADDR

use crate::address::{PhysicalAddress, PAGE_SIZE};

/// Total simulated physical memory.
pub const MEMSIZE_PHYSICAL: usize = 0x20_0000;

/// Number of physical page frames.
pub const NPAGES: usize = MEMSIZE_PHYSICAL / PAGE_SIZE;

/// Top of per-process virtual memory; the stack page sits just below.
pub const MEMSIZE_VIRTUAL: usize = 0x30_0000;

/// First virtual address of per-process private memory. Everything below
/// is the kernel's shared low-memory region, mirrored into every address
/// space.
pub const PROC_START_ADDR: usize = 0x10_0000;

/// Kernel code, data, and stack occupy this physical range.
pub const KERNEL_START_ADDR: usize = 0x4_0000;
pub const KERNEL_END_ADDR: usize = 0x8_0000;

/// The console page, user-accessible in every address space so the
/// external visualizer has somewhere to draw.
pub const CONSOLE_ADDR: usize = 0xB_8000;

/// Process table capacity. Slot 0 is reserved and never used.
pub const NPROC: usize = 16;

/// Whether the frame at `pa` may ever be handed out by the page
/// allocator. Page zero, the kernel image and stack, and the console
/// page never are.
pub fn allocatable_physical_address(pa: PhysicalAddress) -> bool {
    let pa = pa.as_usize();
    pa != 0
        && !(KERNEL_START_ADDR..KERNEL_END_ADDR).contains(&pa)
        && pa != CONSOLE_ADDR
        && pa < MEMSIZE_PHYSICAL
}
