/// Register names the kernel interprets inside a saved trapframe. The
/// trapframe itself keeps the full 32-register file; syscalls use the
/// fixed convention below.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Register {
    Zero = 0, // x0: hardwired zero
    Ra = 1,   // x1: return address
    Sp = 2,   // x2: stack pointer
    A0 = 10,  // x10: syscall argument / return value
    A1 = 11,  // x11: scratch argument
    A7 = 17,  // x17: syscall code
}
