use log::{debug, error};
use thiserror::Error;
use types::{Pid, VirtualAddress};

use crate::kernel::Kernel;
use crate::platform::Signal;
use crate::process::{ProcState, TrapFrame};

/// Access type of a faulting memory operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

/// Privilege mode a fault was taken from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CpuMode {
    User,
    Kernel,
}

/// Decoded page-fault report.
#[derive(Clone, Copy, Debug)]
pub struct PageFault {
    pub addr: VirtualAddress,
    pub access: AccessKind,
    pub mode: CpuMode,
    /// True when the mapping was present but the access was not
    /// permitted; false when the page was missing outright.
    pub present: bool,
}

/// Non-syscall trap classes delivered to the dispatcher.
#[derive(Clone, Copy, Debug)]
pub enum Exception {
    Timer,
    PageFault(PageFault),
}

/// Why the kernel stopped for good.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HaltReason {
    #[error("kernel page fault for {addr} ({access:?} {problem}, pc=0x{pc:08x})")]
    KernelPageFault {
        addr: VirtualAddress,
        access: AccessKind,
        problem: &'static str,
        pc: u32,
    },
    #[error("unexpected system call {0}")]
    UnexpectedSyscall(u32),
    #[error("process {0} called panic")]
    UserPanic(Pid),
    #[error("keyboard interrupt")]
    KeyboardInterrupt,
}

/// Outcome of a trap handler: resume one process, or stop the machine.
/// The hosted rendition of a context switch and of a kernel panic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Control {
    Resume(Pid),
    Halt(HaltReason),
}

impl Kernel {
    /// Exception entry point (timer interrupts and faults). `regs` is the
    /// interrupted process's register state at trap time; it is saved
    /// into the current descriptor before anything else happens.
    pub fn exception(&mut self, regs: &TrapFrame, exc: Exception) -> Control {
        self.save_current_regs(regs);

        // Show the memory state, unless this is a kernel fault.
        let kernel_fault = matches!(
            exc,
            Exception::PageFault(pf) if pf.mode == CpuMode::Kernel
        );
        if !kernel_fault {
            self.memshow();
        }
        if self.platform.check_keyboard() == Signal::Halt {
            return Control::Halt(HaltReason::KeyboardInterrupt);
        }

        match exc {
            Exception::Timer => {
                self.ticks += 1;
                self.platform.ack_timer();
                // Preemption always flows through the scheduler; a tick
                // never resumes the interrupted process directly.
                self.schedule()
            }
            Exception::PageFault(pf) => self.page_fault(pf),
        }
    }

    fn page_fault(&mut self, pf: PageFault) -> Control {
        let problem = if pf.present {
            "protection problem"
        } else {
            "missing page"
        };
        let pc = self.current_proc().regs.pc;
        if pf.mode == CpuMode::Kernel {
            error!(
                "kernel page fault for {} ({:?} {}, pc=0x{:08x})",
                pf.addr, pf.access, problem, pc
            );
            return Control::Halt(HaltReason::KernelPageFault {
                addr: pf.addr,
                access: pf.access,
                problem,
                pc,
            });
        }
        debug!(
            "process {} page fault for {} ({:?} {}, pc=0x{:08x})",
            self.current, pf.addr, pf.access, problem, pc
        );
        self.current_proc_mut().state = ProcState::Broken;
        self.resume_or_schedule()
    }
}
