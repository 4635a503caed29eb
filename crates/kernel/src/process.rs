use core::fmt;

use types::{PhysicalAddress, Pid, Register};

/// Lifecycle state of one process-table slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcState {
    /// Slot unused.
    Free,
    /// Eligible for scheduling.
    Runnable,
    /// Faulted in user mode; terminal until the slot is reclaimed.
    Broken,
}

/// Saved user-visible register file: 32 general-purpose registers plus
/// the program counter to resume at.
#[derive(Clone, Copy, Default)]
pub struct TrapFrame {
    pub regs: [u32; 32],
    pub pc: u32,
}

impl TrapFrame {
    pub fn get(&self, r: Register) -> u32 {
        self.regs[r as usize]
    }

    pub fn set(&mut self, r: Register, val: u32) {
        if r != Register::Zero {
            self.regs[r as usize] = val;
        }
    }
}

impl fmt::Debug for TrapFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrapFrame")
            .field("pc", &format_args!("0x{:08x}", self.pc))
            .field("a0", &format_args!("0x{:08x}", self.get(Register::A0)))
            .field("sp", &format_args!("0x{:08x}", self.get(Register::Sp)))
            .finish()
    }
}

/// One process-table slot: identity, lifecycle state, saved registers,
/// and the exclusively-owned root page-table frame.
#[derive(Debug)]
pub struct Process {
    pub pid: Pid,
    pub state: ProcState,
    pub regs: TrapFrame,
    pub pagetable: Option<PhysicalAddress>,
}

impl Process {
    pub fn free(pid: Pid) -> Self {
        Self {
            pid,
            state: ProcState::Free,
            regs: TrapFrame::default(),
            pagetable: None,
        }
    }
}
