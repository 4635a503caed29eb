//! Process and memory management for a tiny time-sliced kernel, run as a
//! hosted simulation.
//!
//! The kernel owns a fixed process table and the simulated physical
//! memory. Traps re-enter it through [`Kernel::exception`] and
//! [`Kernel::syscall`]; both return a [`Control`] telling the harness
//! which process to resume, or why the machine halted. Hardware-facing
//! services (interrupt controller, keyboard, visualizer) sit behind the
//! [`Platform`] trait and are not implemented here.

pub mod process;
pub use process::{ProcState, Process, TrapFrame};

pub mod loader;
pub use loader::{ProgramImage, Segment, StaticImage};

pub mod platform;
pub use platform::{NoopPlatform, Platform, Signal};

pub mod trap;
pub use trap::{AccessKind, Control, CpuMode, Exception, HaltReason, PageFault};

pub mod syscall;
pub use syscall::{
    SYSCALL_ERROR, SYSCALL_EXIT, SYSCALL_FORK, SYSCALL_GETPID, SYSCALL_PAGE_ALLOC,
    SYSCALL_PANIC, SYSCALL_YIELD,
};

pub mod kernel;
pub use kernel::{Kernel, SetupError, HZ};
