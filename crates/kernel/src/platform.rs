use std::fmt::Debug;

use crate::process::Process;

/// Result of polling the external interrupt source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    Continue,
    /// Operator-initiated abort; the kernel halts unconditionally.
    Halt,
}

/// Narrow, side-effecting services the kernel calls but does not
/// implement: the interrupt controller, keyboard polling, and the
/// console memory visualizer. Called on every trap and on every
/// scheduler iteration, so the machine stays observable and externally
/// interruptible even while idle.
pub trait Platform: Debug {
    /// Acknowledge a timer interrupt at the interrupt controller.
    fn ack_timer(&mut self) {}

    /// Poll for an operator interrupt.
    fn check_keyboard(&mut self) -> Signal {
        Signal::Continue
    }

    /// Show the memory map of one process, or of nothing when no slot is
    /// live. Purely observational; never influences scheduling.
    fn memshow(&mut self, _proc: Option<&Process>) {}
}

/// Platform that ignores every notification and never interrupts.
#[derive(Debug, Default)]
pub struct NoopPlatform;

impl Platform for NoopPlatform {}
