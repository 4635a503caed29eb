use log::{debug, info};
use mem::{PhysicalMemory, PtIter, VmIter, PTE_P, PTE_U, PTE_W};
use thiserror::Error;
use types::{
    PhysicalAddress, Pid, Register, VirtualAddress, CONSOLE_ADDR, MEMSIZE_PHYSICAL,
    MEMSIZE_VIRTUAL, NPROC, PAGE_SIZE, PROC_START_ADDR,
};

use crate::loader::ProgramImage;
use crate::platform::{NoopPlatform, Platform, Signal};
use crate::process::{ProcState, Process, TrapFrame};
use crate::trap::{Control, HaltReason};

/// Timer interrupt frequency (interrupts per second). Only the memshow
/// rotation depends on it; scheduling does not.
pub const HZ: u64 = 100;

/// Why launching a process at boot failed. The slot is rolled back to
/// Free before this is reported.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum SetupError {
    #[error("no free process slot")]
    ProcessTableFull,
    #[error("no free physical page")]
    OutOfPages,
}

/// The kernel: process table, physical memory, and the trap/scheduling
/// core. One instance is one machine.
///
/// Design at a glance:
/// - physical frames and every page table live in `mem`; page-table
///   frames are addressed by physical address, never by reference;
/// - `ptable` is a fixed arena indexed by pid, `current` an index into
///   it; slot 0 is never used;
/// - interrupts are masked while kernel code runs, so a single logical
///   thread owns all of this and no locking exists anywhere.
#[derive(Debug)]
pub struct Kernel {
    pub(crate) mem: PhysicalMemory,
    pub(crate) ptable: Vec<Process>,
    pub(crate) current: Pid,
    pub(crate) ticks: u64,
    pub(crate) kernel_pagetable: PhysicalAddress,
    pub(crate) platform: Box<dyn Platform>,
    show_slot: usize,
    last_show_ticks: u64,
}

impl Kernel {
    pub fn new(platform: Box<dyn Platform>) -> Self {
        let mem = PhysicalMemory::new();

        // Kernel page table: identity map of all physical memory. The
        // console page and everything from PROC_START_ADDR up are
        // user-visible, the rest is kernel-only, page zero stays
        // unmapped.
        let kernel_pagetable = mem
            .alloc(PAGE_SIZE)
            .expect("no frame for the kernel page table");
        mem.zero_page(kernel_pagetable);
        {
            let mut it = VmIter::new(&mem, kernel_pagetable);
            while it.va().as_usize() < MEMSIZE_PHYSICAL {
                let va = it.va().as_usize();
                let pa = PhysicalAddress(it.va().as_u32());
                if va >= PROC_START_ADDR || va == CONSOLE_ADDR {
                    it.map(pa, PTE_P | PTE_W | PTE_U);
                } else if va != 0 {
                    it.map(pa, PTE_P | PTE_W);
                }
                it.step();
            }
        }

        let ptable = (0..NPROC).map(Process::free).collect();
        info!(
            "kernel memory initialized, {} free pages",
            mem.free_page_count()
        );
        Self {
            mem,
            ptable,
            current: 0,
            ticks: 1,
            kernel_pagetable,
            platform,
            show_slot: 0,
            last_show_ticks: 0,
        }
    }

    /// Load `image` into the lowest free slot and mark it runnable. On
    /// failure the slot and every page allocated for it are rolled back.
    pub fn launch(&mut self, image: &dyn ProgramImage) -> Result<Pid, SetupError> {
        let pid = (1..NPROC)
            .find(|&p| self.ptable[p].state == ProcState::Free)
            .ok_or(SetupError::ProcessTableFull)?;
        info!("setting up process {}", pid);
        match self.process_setup(pid, image) {
            Ok(()) => {
                self.ptable[pid].state = ProcState::Runnable;
                Ok(pid)
            }
            Err(e) => {
                self.exit_proc(pid);
                Err(e)
            }
        }
    }

    fn process_setup(&mut self, pid: Pid, image: &dyn ProgramImage) -> Result<(), SetupError> {
        let root = self.mem.alloc(PAGE_SIZE).ok_or(SetupError::OutOfPages)?;
        self.mem.zero_page(root);
        self.ptable[pid].pagetable = Some(root);
        self.ptable[pid].regs = TrapFrame::default();

        let mem = &self.mem;

        // Mirror the kernel's low-memory mappings so kernel code stays
        // resolvable during traps.
        let mut it = VmIter::new(mem, root);
        let mut kernel_it = VmIter::new(mem, self.kernel_pagetable);
        while kernel_it.va().as_usize() < PROC_START_ADDR {
            if let Some(pa) = kernel_it.pa() {
                it.try_map(pa, kernel_it.perm())
                    .map_err(|_| SetupError::OutOfPages)?;
            }
            kernel_it.step();
            it.step();
        }

        // Allocate and map each segment's pages, honoring the writable
        // flag; the span beyond the segment's data is left zeroed.
        for seg in image.segments() {
            let perm = if seg.writable {
                PTE_P | PTE_W | PTE_U
            } else {
                PTE_P | PTE_U
            };
            it.find(seg.va.align_down());
            while it.va().as_usize() < seg.va.as_usize() + seg.mem_size {
                debug_assert!(!it.present(), "segments must not share a page");
                let pa = mem.alloc(PAGE_SIZE).ok_or(SetupError::OutOfPages)?;
                mem.zero_page(pa);
                if it.try_map(pa, perm).is_err() {
                    mem.release(pa);
                    return Err(SetupError::OutOfPages);
                }
                it.step();
            }
        }

        // Copy code and data into place.
        for seg in image.segments() {
            self.write_bytes(pid, seg.va, seg.data);
        }

        // One stack page at the top of the virtual range.
        let stack_va = VirtualAddress((MEMSIZE_VIRTUAL - PAGE_SIZE) as u32);
        let stack_pa = mem.alloc(PAGE_SIZE).ok_or(SetupError::OutOfPages)?;
        mem.zero_page(stack_pa);
        it.find(stack_va);
        if it.try_map(stack_pa, PTE_P | PTE_W | PTE_U).is_err() {
            mem.release(stack_pa);
            return Err(SetupError::OutOfPages);
        }

        let regs = &mut self.ptable[pid].regs;
        regs.pc = image.entry().as_u32();
        regs.set(Register::Sp, MEMSIZE_VIRTUAL as u32);
        Ok(())
    }

    /// Release every user-range page the process maps (dropping one
    /// owner from shared frames), its page-table pages, and its root,
    /// then return the slot to Free. Doubles as the fork rollback path.
    pub(crate) fn exit_proc(&mut self, pid: Pid) {
        if let Some(root) = self.ptable[pid].pagetable.take() {
            let mut it = VmIter::at(&self.mem, root, VirtualAddress(PROC_START_ADDR as u32));
            while it.va().as_usize() < MEMSIZE_VIRTUAL {
                if let Some(pa) = it.pa() {
                    self.mem.release(pa);
                }
                it.step();
            }
            for table in PtIter::new(&self.mem, root) {
                self.mem.release(table);
            }
            self.mem.release(root);
        }
        self.ptable[pid].state = ProcState::Free;
    }

    /// Start the machine by switching to the first runnable process.
    pub fn start(&mut self) -> Control {
        let pid = (1..NPROC)
            .find(|&p| self.ptable[p].state == ProcState::Runnable)
            .expect("no runnable process at boot");
        self.run(pid)
    }

    /// Transfer control to `pid`.
    pub(crate) fn run(&mut self, pid: Pid) -> Control {
        assert!(
            self.ptable[pid].state == ProcState::Runnable,
            "run of non-runnable process {}",
            pid
        );
        self.current = pid;
        Control::Resume(pid)
    }

    /// Round-robin: scan circularly from the slot after the current one
    /// for the next runnable process. With nothing runnable, keep
    /// spinning; the keyboard is polled every iteration and the
    /// visualizer invoked periodically, so the machine stays observable
    /// and interruptible while effectively deadlocked.
    pub(crate) fn schedule(&mut self) -> Control {
        let mut pid = self.current;
        let mut spins: u32 = 1;
        loop {
            pid = (pid + 1) % NPROC;
            if self.ptable[pid].state == ProcState::Runnable {
                return self.run(pid);
            }
            if self.platform.check_keyboard() == Signal::Halt {
                return Control::Halt(HaltReason::KeyboardInterrupt);
            }
            if spins % (1 << 12) == 0 {
                self.memshow();
                debug!("idle, {} spins", spins);
            }
            spins = spins.wrapping_add(1);
        }
    }

    pub(crate) fn resume_or_schedule(&mut self) -> Control {
        if self.ptable[self.current].state == ProcState::Runnable {
            self.run(self.current)
        } else {
            self.schedule()
        }
    }

    pub(crate) fn save_current_regs(&mut self, regs: &TrapFrame) {
        self.ptable[self.current].regs = *regs;
    }

    pub(crate) fn set_return(&mut self, val: u32) {
        self.ptable[self.current].regs.set(Register::A0, val);
    }

    pub(crate) fn current_proc(&self) -> &Process {
        &self.ptable[self.current]
    }

    pub(crate) fn current_proc_mut(&mut self) -> &mut Process {
        &mut self.ptable[self.current]
    }

    /// Rotate the displayed process every half second of ticks, skipping
    /// dead slots, and hand it to the external visualizer.
    pub(crate) fn memshow(&mut self) {
        if self.last_show_ticks == 0 || self.ticks - self.last_show_ticks >= HZ / 2 {
            self.last_show_ticks = self.ticks;
            self.show_slot = (self.show_slot + 1) % NPROC;
        }
        let mut shown = None;
        for _ in 0..NPROC {
            let p = &self.ptable[self.show_slot];
            if p.state != ProcState::Free && p.pagetable.is_some() {
                shown = Some(self.show_slot);
                break;
            }
            self.show_slot = (self.show_slot + 1) % NPROC;
        }
        self.platform.memshow(shown.map(|i| &self.ptable[i]));
    }

    // --- queries and memory access for harnesses and tests ---

    pub fn memory(&self) -> &PhysicalMemory {
        &self.mem
    }

    pub fn process(&self, pid: Pid) -> &Process {
        &self.ptable[pid]
    }

    pub fn current(&self) -> Pid {
        self.current
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Translate `va` through `pid`'s page table.
    pub fn translate(&self, pid: Pid, va: VirtualAddress) -> Option<PhysicalAddress> {
        let root = self.ptable[pid].pagetable?;
        VmIter::at(&self.mem, root, va).pa()
    }

    /// Write bytes into `pid`'s address space through its page table,
    /// page by page. The range must already be mapped; permission bits
    /// do not apply to the kernel.
    pub fn write_bytes(&self, pid: Pid, va: VirtualAddress, data: &[u8]) {
        let mut va = va;
        let mut off = 0;
        while off < data.len() {
            let pa = self
                .translate(pid, va)
                .expect("write_bytes: unmapped virtual address");
            let n = (PAGE_SIZE - va.offset()).min(data.len() - off);
            self.mem.write(pa, &data[off..off + n]);
            off += n;
            va = VirtualAddress(va.as_u32() + n as u32);
        }
    }

    /// Read bytes out of `pid`'s address space through its page table.
    pub fn read_bytes(&self, pid: Pid, va: VirtualAddress, len: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(len);
        let mut va = va;
        while out.len() < len {
            let pa = self
                .translate(pid, va)
                .expect("read_bytes: unmapped virtual address");
            let n = (PAGE_SIZE - va.offset()).min(len - out.len());
            out.extend_from_slice(&self.mem.read(pa, n));
            va = VirtualAddress(va.as_u32() + n as u32);
        }
        out
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new(Box::new(NoopPlatform))
    }
}
