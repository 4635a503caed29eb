use log::{debug, error, info};
use mem::{MapError, VmIter, PTE_P, PTE_U, PTE_W};
use thiserror::Error;
use types::{
    PhysicalAddress, Pid, Register, VirtualAddress, MEMSIZE_VIRTUAL, NPROC, PAGE_SIZE,
    PROC_START_ADDR,
};

use crate::kernel::Kernel;
use crate::platform::Signal;
use crate::process::{ProcState, TrapFrame};
use crate::trap::{Control, HaltReason};

/// Syscall codes, passed in register a7.
pub const SYSCALL_PANIC: u32 = 1;
pub const SYSCALL_GETPID: u32 = 2;
pub const SYSCALL_YIELD: u32 = 3;
pub const SYSCALL_PAGE_ALLOC: u32 = 4;
pub const SYSCALL_FORK: u32 = 5;
pub const SYSCALL_EXIT: u32 = 6;

/// Failure indicator returned to user code in a0 (-1 as u32).
pub const SYSCALL_ERROR: u32 = u32::MAX;

/// Why building a forked child's address space stopped.
#[derive(Debug, Error)]
enum ForkError {
    #[error("no free physical page")]
    OutOfPages,
    #[error(transparent)]
    Table(#[from] MapError),
}

impl Kernel {
    /// Syscall entry point. The code is read from a7, the argument from
    /// a0, and the result is returned to the caller in a0.
    pub fn syscall(&mut self, regs: &TrapFrame) -> Control {
        self.save_current_regs(regs);
        self.memshow();
        if self.platform.check_keyboard() == Signal::Halt {
            return Control::Halt(HaltReason::KeyboardInterrupt);
        }

        let code = self.current_proc().regs.get(Register::A7);
        match code {
            SYSCALL_PANIC => {
                error!("process {} called panic", self.current);
                Control::Halt(HaltReason::UserPanic(self.current))
            }
            SYSCALL_GETPID => {
                let pid = self.current;
                self.set_return(pid as u32);
                self.run(pid)
            }
            SYSCALL_YIELD => {
                self.set_return(0);
                self.schedule()
            }
            SYSCALL_PAGE_ALLOC => {
                let addr = VirtualAddress(self.current_proc().regs.get(Register::A0));
                let ret = match self.sys_page_alloc(addr) {
                    Ok(()) => 0,
                    Err(()) => SYSCALL_ERROR,
                };
                self.set_return(ret);
                let cur = self.current;
                self.run(cur)
            }
            SYSCALL_FORK => {
                let ret = match self.sys_fork() {
                    Some(child) => child as u32,
                    None => SYSCALL_ERROR,
                };
                self.set_return(ret);
                let cur = self.current;
                self.run(cur)
            }
            SYSCALL_EXIT => {
                self.sys_exit();
                self.schedule()
            }
            other => {
                error!("unexpected system call {}", other);
                Control::Halt(HaltReason::UnexpectedSyscall(other))
            }
        }
    }

    /// Map one fresh zero-filled page at `addr` in the caller's address
    /// space. Fails for addresses outside the user range, unaligned
    /// addresses, and resource exhaustion; never fatal.
    fn sys_page_alloc(&self, addr: VirtualAddress) -> Result<(), ()> {
        let a = addr.as_usize();
        if a < PROC_START_ADDR || a >= MEMSIZE_VIRTUAL || !addr.is_page_aligned() {
            return Err(());
        }
        let pa = self.mem.alloc(PAGE_SIZE).ok_or(())?;
        self.mem.zero_page(pa);
        let root = self
            .current_proc()
            .pagetable
            .expect("current process has no page table");
        let mut it = VmIter::at(&self.mem, root, addr);
        let old = it.pa();
        if it.try_map(pa, PTE_P | PTE_W | PTE_U).is_err() {
            self.mem.release(pa);
            return Err(());
        }
        // Remapping an already-populated address drops the old page.
        if let Some(old) = old {
            self.mem.release(old);
        }
        Ok(())
    }

    /// Duplicate the calling process into the lowest free slot. The child
    /// resumes as if it had called fork and received 0; the parent gets
    /// the child's pid, or the failure indicator with no side effects.
    fn sys_fork(&mut self) -> Option<Pid> {
        let child = (1..NPROC).find(|&pid| self.ptable[pid].state == ProcState::Free)?;
        let parent = self.current;
        let parent_root = self.ptable[parent]
            .pagetable
            .expect("current process has no page table");

        let child_root = self.mem.alloc(PAGE_SIZE)?;
        self.mem.zero_page(child_root);
        self.ptable[child].pagetable = Some(child_root);

        if let Err(e) = self.fork_copy(parent_root, child_root) {
            debug!("fork by process {}: {}; rolling back child {}", parent, e, child);
            self.exit_proc(child);
            return None;
        }

        self.ptable[child].regs = self.ptable[parent].regs;
        self.ptable[child].regs.set(Register::A0, 0);
        self.ptable[child].state = ProcState::Runnable;
        info!("process {} forked child {}", parent, child);
        Some(child)
    }

    /// Build the child's address space: mirror the kernel's low-memory
    /// mappings, give the child private copies of writable user pages,
    /// and share read-only pages by reference count.
    fn fork_copy(
        &self,
        parent_root: PhysicalAddress,
        child_root: PhysicalAddress,
    ) -> Result<(), ForkError> {
        let mem = &self.mem;

        let mut child_it = VmIter::new(mem, child_root);
        let mut kernel_it = VmIter::new(mem, self.kernel_pagetable);
        while kernel_it.va().as_usize() < PROC_START_ADDR {
            if let Some(pa) = kernel_it.pa() {
                child_it.try_map(pa, kernel_it.perm())?;
            }
            kernel_it.step();
            child_it.step();
        }

        let user_start = VirtualAddress(PROC_START_ADDR as u32);
        let mut parent_it = VmIter::at(mem, parent_root, user_start);
        child_it.find(user_start);
        while parent_it.va().as_usize() < MEMSIZE_VIRTUAL {
            if parent_it.user() && parent_it.writable() {
                let pa = parent_it.pa().expect("writable mapping without frame");
                let copy = mem.alloc(PAGE_SIZE).ok_or(ForkError::OutOfPages)?;
                mem.copy_page(copy, pa);
                if let Err(e) = child_it.try_map(copy, parent_it.perm()) {
                    mem.release(copy);
                    return Err(e.into());
                }
            } else if parent_it.present() {
                let pa = parent_it.pa().expect("present mapping without frame");
                child_it.try_map(pa, parent_it.perm())?;
                mem.retain(pa);
            }
            parent_it.step();
            child_it.step();
        }
        Ok(())
    }

    fn sys_exit(&mut self) {
        let pid = self.current;
        info!("process {} exited", pid);
        self.exit_proc(pid);
    }
}
