pub mod address;
pub use address::{PhysicalAddress, VirtualAddress, PAGE_SHIFT, PAGE_SIZE};

pub mod layout;
pub use layout::*;

pub mod registers;
pub use registers::Register;

/// Process identifier: an index into the fixed-capacity process table.
pub type Pid = usize;
