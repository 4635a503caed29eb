mod common;

use common::{boot, resumed, retval, sysframe, tick};
use kernel::{
    AccessKind, Control, CpuMode, Exception, HaltReason, PageFault, ProcState,
    SYSCALL_ERROR, SYSCALL_GETPID, SYSCALL_PAGE_ALLOC, SYSCALL_PANIC,
};
use types::{Register, VirtualAddress, MEMSIZE_VIRTUAL, PAGE_SIZE, PROC_START_ADDR};

fn user_fault(addr: u32) -> Exception {
    Exception::PageFault(PageFault {
        addr: VirtualAddress(addr),
        access: AccessKind::Write,
        mode: CpuMode::User,
        present: false,
    })
}

#[test]
fn getpid_is_a_pure_query() {
    let mut k = boot(3);
    tick(&mut k); // now running process 2

    let free = k.memory().free_page_count();
    let tf = sysframe(&k, SYSCALL_GETPID, 0);
    assert_eq!(resumed(&k.syscall(&tf)), 2);
    assert_eq!(retval(&k, 2), 2);
    assert_eq!(k.memory().free_page_count(), free);
}

#[test]
fn page_alloc_maps_a_fresh_zeroed_page() {
    let mut k = boot(1);
    let va = (PROC_START_ADDR + 0x10_000) as u32;

    assert_eq!(k.translate(1, VirtualAddress(va)), None);
    let tf = sysframe(&k, SYSCALL_PAGE_ALLOC, va);
    assert_eq!(resumed(&k.syscall(&tf)), 1);
    assert_eq!(retval(&k, 1), 0);

    let pa = k.translate(1, VirtualAddress(va)).expect("mapped");
    assert_eq!(k.memory().refcount(pa), 1);
    assert!(k.read_bytes(1, VirtualAddress(va), PAGE_SIZE).iter().all(|&x| x == 0));

    // The page is private and writable.
    k.write_bytes(1, VirtualAddress(va), b"heap");
    assert_eq!(k.read_bytes(1, VirtualAddress(va), 4), b"heap".to_vec());
}

#[test]
fn page_alloc_rejects_bad_addresses() {
    let mut k = boot(1);
    let bad = [
        (PROC_START_ADDR as u32) - 0x1000,      // below the user range
        MEMSIZE_VIRTUAL as u32,                 // above it
        (PROC_START_ADDR as u32) + 0x10_123,    // unaligned
    ];
    for addr in bad {
        let free = k.memory().free_page_count();
        let tf = sysframe(&k, SYSCALL_PAGE_ALLOC, addr);
        assert_eq!(resumed(&k.syscall(&tf)), 1);
        assert_eq!(retval(&k, 1), SYSCALL_ERROR, "addr {addr:#x}");
        assert_eq!(k.memory().free_page_count(), free);
    }
}

#[test]
fn page_alloc_fails_without_free_pages() {
    let mut k = boot(1);
    while k.memory().alloc(PAGE_SIZE).is_some() {}

    let tf = sysframe(&k, SYSCALL_PAGE_ALLOC, (PROC_START_ADDR + 0x10_000) as u32);
    assert_eq!(resumed(&k.syscall(&tf)), 1);
    assert_eq!(retval(&k, 1), SYSCALL_ERROR);
}

#[test]
fn user_fault_breaks_only_the_offender() {
    let mut k = boot(2);
    let regs = k.process(1).regs;
    let next = resumed(&k.exception(&regs, user_fault(0xdead_beef)));
    assert_eq!(next, 2);
    assert_eq!(k.process(1).state, ProcState::Broken);
    assert_eq!(k.process(2).state, ProcState::Runnable);

    // The machine keeps scheduling the survivor.
    assert_eq!(tick(&mut k), 2);
}

#[test]
fn kernel_fault_halts_the_machine() {
    let mut k = boot(2);
    let regs = k.process(1).regs;
    let fault = Exception::PageFault(PageFault {
        addr: VirtualAddress(0x4_1000),
        access: AccessKind::Read,
        mode: CpuMode::Kernel,
        present: true,
    });
    match k.exception(&regs, fault) {
        Control::Halt(HaltReason::KernelPageFault { addr, .. }) => {
            assert_eq!(addr, VirtualAddress(0x4_1000));
        }
        other => panic!("expected a kernel halt, got {other:?}"),
    }
}

#[test]
fn panic_syscall_halts_the_machine() {
    let mut k = boot(1);
    let tf = sysframe(&k, SYSCALL_PANIC, 0);
    assert_eq!(k.syscall(&tf), Control::Halt(HaltReason::UserPanic(1)));
}

#[test]
fn unknown_syscalls_are_fatal() {
    let mut k = boot(1);
    let tf = sysframe(&k, 0xbeef, 0);
    assert_eq!(k.syscall(&tf), Control::Halt(HaltReason::UnexpectedSyscall(0xbeef)));
}

#[test]
fn trapframes_are_saved_into_the_descriptor() {
    let mut k = boot(2);
    let mut regs = k.process(1).regs;
    regs.pc = 0x10_0040;
    regs.set(Register::A1, 0x1234);
    k.exception(&regs, Exception::Timer);
    assert_eq!(k.process(1).regs.pc, 0x10_0040);
    assert_eq!(k.process(1).regs.get(Register::A1), 0x1234);
}
