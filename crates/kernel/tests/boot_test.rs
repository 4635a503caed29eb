mod common;

use common::{boot, test_image, CODE_VA, DATA_VA};
use kernel::{Kernel, NoopPlatform, ProcState, SetupError, StaticImage};
use types::{
    PhysicalAddress, Register, VirtualAddress, CONSOLE_ADDR, KERNEL_START_ADDR,
    MEMSIZE_VIRTUAL, NPROC, PAGE_SIZE,
};

#[test]
fn boot_populates_the_process_table() {
    let k = boot(4);

    assert_eq!(k.process(0).state, ProcState::Free);
    for pid in 1..=4 {
        let p = k.process(pid);
        assert_eq!(p.state, ProcState::Runnable);
        assert_eq!(p.pid, pid);
        assert!(p.pagetable.is_some());
        assert_eq!(p.regs.pc, CODE_VA);
        assert_eq!(p.regs.get(Register::Sp), MEMSIZE_VIRTUAL as u32);
    }
    for pid in 5..NPROC {
        assert_eq!(k.process(pid).state, ProcState::Free);
    }
    assert_eq!(k.current(), 1);
}

#[test]
fn kernel_low_memory_is_mirrored_into_every_process() {
    let k = boot(2);

    for pid in 1..=2 {
        // The console page is identity-mapped and user-visible.
        let console = VirtualAddress(CONSOLE_ADDR as u32);
        assert_eq!(
            k.translate(pid, console),
            Some(PhysicalAddress(CONSOLE_ADDR as u32))
        );

        // Kernel code is resolvable but kernel-only.
        let kcode = VirtualAddress(KERNEL_START_ADDR as u32);
        assert_eq!(
            k.translate(pid, kcode),
            Some(PhysicalAddress(KERNEL_START_ADDR as u32))
        );

        // The zero page stays unmapped.
        assert_eq!(k.translate(pid, VirtualAddress(0)), None);
    }
}

#[test]
fn program_segments_are_loaded_with_their_permissions() {
    let k = boot(1);
    let root = k.process(1).pagetable.unwrap();

    let code = mem::VmIter::at(k.memory(), root, VirtualAddress(CODE_VA));
    assert!(code.present() && code.user() && !code.writable());

    let data = mem::VmIter::at(k.memory(), root, VirtualAddress(DATA_VA));
    assert!(data.present() && data.user() && data.writable());

    assert_eq!(
        k.read_bytes(1, VirtualAddress(DATA_VA), 12),
        b"initial data".to_vec()
    );
    // The bss page beyond the segment data is zero-filled.
    let bss = k.read_bytes(1, VirtualAddress(DATA_VA + 0x1000), PAGE_SIZE);
    assert!(bss.iter().all(|&x| x == 0));

    // One writable user stack page at the top of the virtual range.
    let stack_va = VirtualAddress((MEMSIZE_VIRTUAL - PAGE_SIZE) as u32);
    let stack = mem::VmIter::at(k.memory(), root, stack_va);
    assert!(stack.present() && stack.user() && stack.writable());
}

#[test]
fn processes_do_not_share_writable_pages_at_boot() {
    let k = boot(2);
    let one = k.translate(1, VirtualAddress(DATA_VA)).unwrap();
    let two = k.translate(2, VirtualAddress(DATA_VA)).unwrap();
    assert_ne!(one, two);

    k.write_bytes(1, VirtualAddress(DATA_VA), b"proc one's bytes");
    assert_eq!(k.read_bytes(2, VirtualAddress(DATA_VA), 12), b"initial data");
}

#[test]
fn launch_failure_rolls_the_slot_back() {
    let mut k = Kernel::new(Box::new(NoopPlatform));
    // Leave too few frames for another full address space.
    while k.memory().free_page_count() > 3 {
        k.memory().alloc(PAGE_SIZE).unwrap();
    }
    let free_before = k.memory().free_page_count();

    let err = k.launch(&test_image()).unwrap_err();
    assert_eq!(err, SetupError::OutOfPages);
    assert_eq!(k.process(1).state, ProcState::Free);
    assert_eq!(k.process(1).pagetable, None);
    assert_eq!(k.memory().free_page_count(), free_before);
}

#[test]
#[should_panic(expected = "segments must not share a page")]
fn segments_sharing_a_page_are_rejected_in_debug_builds() {
    let image = StaticImage::new(VirtualAddress(CODE_VA))
        .segment(VirtualAddress(CODE_VA), 0x1000, b"code", false)
        .segment(VirtualAddress(CODE_VA + 0x800), 0x1000, b"data", true);
    let mut k = Kernel::new(Box::new(NoopPlatform));
    let _ = k.launch(&image);
}

#[test]
fn launch_fails_cleanly_when_the_table_is_full() {
    let mut k = Kernel::new(Box::new(NoopPlatform));
    let image = test_image();
    for _ in 1..NPROC {
        k.launch(&image).unwrap();
    }
    assert_eq!(k.launch(&image), Err(SetupError::ProcessTableFull));
}
