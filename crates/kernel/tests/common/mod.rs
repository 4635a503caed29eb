#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;

use kernel::{
    Control, Kernel, NoopPlatform, Platform, Process, Signal, StaticImage, TrapFrame,
};
use types::{Pid, Register, VirtualAddress, PROC_START_ADDR};

pub const CODE_VA: u32 = PROC_START_ADDR as u32;
pub const DATA_VA: u32 = PROC_START_ADDR as u32 + 0x1000;

/// A little two-segment program: one read-only code page, two writable
/// data pages (the second is all bss).
pub fn test_image() -> StaticImage {
    StaticImage::new(VirtualAddress(CODE_VA))
        .segment(VirtualAddress(CODE_VA), 0x1000, b"\x13\x00\x00\x00code", false)
        .segment(VirtualAddress(DATA_VA), 0x2000, b"initial data", true)
}

/// Boot a kernel with `n` copies of the test image in slots 1..=n and
/// switch to process 1.
pub fn boot(n: usize) -> Kernel {
    let mut k = Kernel::new(Box::new(NoopPlatform));
    let image = test_image();
    for _ in 0..n {
        k.launch(&image).expect("launch");
    }
    assert_eq!(k.start(), Control::Resume(1));
    k
}

/// Trapframe for a syscall from the current process: its saved register
/// state with the code in a7 and the argument in a0.
pub fn sysframe(k: &Kernel, code: u32, arg: u32) -> TrapFrame {
    let mut regs = k.process(k.current()).regs;
    regs.set(Register::A7, code);
    regs.set(Register::A0, arg);
    regs
}

/// The pid a `Control::Resume` hands control to.
pub fn resumed(c: &Control) -> Pid {
    match c {
        Control::Resume(pid) => *pid,
        Control::Halt(r) => panic!("kernel halted: {r}"),
    }
}

/// Return value the last syscall left in `pid`'s a0.
pub fn retval(k: &Kernel, pid: Pid) -> u32 {
    k.process(pid).regs.get(Register::A0)
}

/// Fire a timer interrupt on behalf of the current process and report
/// who runs next.
pub fn tick(k: &mut Kernel) -> Pid {
    let regs = k.process(k.current()).regs;
    resumed(&k.exception(&regs, kernel::Exception::Timer))
}

/// Shared handles onto a `CountingPlatform`'s tallies; the platform box
/// itself is owned by the kernel.
#[derive(Clone, Debug, Default)]
pub struct Counters {
    pub timer_acks: Rc<Cell<usize>>,
    pub keyboard_polls: Rc<Cell<usize>>,
    pub memshows: Rc<Cell<usize>>,
}

/// Platform that counts callbacks and can request a halt after a fixed
/// number of keyboard polls.
#[derive(Debug, Default)]
pub struct CountingPlatform {
    pub counters: Counters,
    pub halt_after_polls: Option<usize>,
}

impl Platform for CountingPlatform {
    fn ack_timer(&mut self) {
        let c = &self.counters.timer_acks;
        c.set(c.get() + 1);
    }

    fn check_keyboard(&mut self) -> Signal {
        let c = &self.counters.keyboard_polls;
        c.set(c.get() + 1);
        match self.halt_after_polls {
            Some(n) if c.get() >= n => Signal::Halt,
            _ => Signal::Continue,
        }
    }

    fn memshow(&mut self, _proc: Option<&Process>) {
        let c = &self.counters.memshows;
        c.set(c.get() + 1);
    }
}
