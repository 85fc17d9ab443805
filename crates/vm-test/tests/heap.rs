/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use p6_vm::heap::HeapBlock;
use p6_vm::{CheckFlags, TrapCode, Vm, VmState};
use p6_vm_test::util::{GLOBALS_END, ProgramBuilder, global, run_checked};
use p6_vm_types::exception::{ExceptionCode, FatalCode};
use p6_vm_types::opcode::OpCode;
use p6_vm_types::standard::StandardProc;
use p6_vm_types::{ADR_SIZE, Address};
use squirrel_prng::squirrel_noise5;

const SLOTS: u32 = 12;

fn add_new(builder: &mut ProgramBuilder, slot: u32, len: i32) {
    builder.add_q(OpCode::Lao, global(Address::from(slot)), "");
    builder.add_ldci(len, "");
    builder.add_csp(StandardProc::New, "");
}

fn add_dispose(builder: &mut ProgramBuilder, slot: u32, len: i32) {
    builder.add_q(OpCode::Ldoa, global(Address::from(slot)), "");
    builder.add_ldci(len, "");
    builder.add_csp(StandardProc::Dsp, "");
}

/// A random interleaving of allocations and disposals. Returns the program
/// and which slots still hold a block at the end.
fn churn(seed: u32, steps: u32, dispose_all: bool) -> (Vec<u8>, Vec<Option<i32>>) {
    let mut builder = ProgramBuilder::new();
    builder.add_main();
    let mut slots: Vec<Option<i32>> = vec![None; SLOTS as usize];
    for step in 0..steps {
        let noise = squirrel_noise5(step, seed);
        let slot = noise % SLOTS;
        match slots[slot as usize] {
            Some(len) => {
                add_dispose(&mut builder, slot, len);
                slots[slot as usize] = None;
            }
            None => {
                let len = ((noise >> 8) % 64) as i32 + 1;
                add_new(&mut builder, slot, len);
                slots[slot as usize] = Some(len);
            }
        }
    }
    if dispose_all {
        for (slot, len) in slots.iter_mut().enumerate() {
            if let Some(len) = len.take() {
                add_dispose(&mut builder, slot as u32, len);
            }
        }
    }
    builder.add(OpCode::Retp, "");
    (builder.build(), slots)
}

fn assert_chain_covers_heap(vm: &Vm) -> Vec<HeapBlock> {
    let blocks = vm.heap_blocks().expect("heap walk");
    let total: Address = blocks.iter().map(|block| block.len).sum();
    assert_eq!(total, vm.np() - vm.gbtop());
    for pair in blocks.windows(2) {
        assert_eq!(pair[0].addr + pair[0].len, pair[1].addr);
    }
    blocks
}

fn assert_live_blocks(vm: &Vm, blocks: &[HeapBlock], slots: &[Option<i32>]) {
    for (slot, len) in slots.iter().enumerate() {
        let Some(len) = len else { continue };
        let pointer = vm
            .memory()
            .get_adr(global(slot as Address))
            .expect("slot pointer");
        let block = blocks
            .iter()
            .find(|block| block.addr + ADR_SIZE == pointer)
            .expect("pointer at the start of a block");
        assert!(block.allocated);
        assert!(block.len >= Address::from(*len) + ADR_SIZE);
    }
}

#[test_log::test]
fn random_churn_keeps_the_chain_intact() {
    for seed in [1, 7, 1234, 0xC0FFEE] {
        let (image, slots) = churn(seed, 200, false);
        let run = run_checked(&image, CheckFlags::default());
        assert_eq!(run.state(), &VmState::Stopped, "seed {seed}");

        let blocks = assert_chain_covers_heap(&run.vm);
        for pair in blocks.windows(2) {
            assert!(
                pair[0].allocated || pair[1].allocated,
                "adjacent free blocks after coalescing (seed {seed})"
            );
        }
        if let Some(last) = blocks.last() {
            assert!(last.allocated, "free space left at the top (seed {seed})");
        }
        assert_live_blocks(&run.vm, &blocks, &slots);
    }
}

#[test_log::test]
fn random_churn_under_strict_dispose() {
    let checks = CheckFlags {
        recycle: false,
        check_reuse: true,
        ..CheckFlags::default()
    };
    for seed in [3, 99] {
        let (image, slots) = churn(seed, 150, false);
        let run = run_checked(&image, checks);
        assert_eq!(run.state(), &VmState::Stopped, "seed {seed}");
        let blocks = assert_chain_covers_heap(&run.vm);
        assert!(
            blocks
                .iter()
                .any(|block| !block.allocated && block.len == ADR_SIZE),
            "freed markers are kept"
        );
        assert_live_blocks(&run.vm, &blocks, &slots);
    }
}

#[test_log::test]
fn disposing_everything_returns_the_heap() {
    let (image, _) = churn(42, 120, true);
    let mut run = run_checked(&image, CheckFlags::default());
    assert_eq!(run.state(), &VmState::Stopped);
    assert_eq!(run.vm.np(), GLOBALS_END);
    assert_eq!(run.vm.heap_blocks(), Ok(Vec::new()));

    run.vm.coalesce().expect("coalesce");
    assert_eq!(run.vm.np(), GLOBALS_END);
}

#[test_log::test]
fn coalesce_is_idempotent() {
    let (image, _) = churn(5, 80, false);
    let mut run = run_checked(&image, CheckFlags::default());
    let before = run.vm.heap_blocks().expect("heap walk");
    run.vm.coalesce().expect("coalesce");
    let once = run.vm.heap_blocks().expect("heap walk");
    run.vm.coalesce().expect("coalesce");
    let twice = run.vm.heap_blocks().expect("heap walk");
    assert_eq!(before, once);
    assert_eq!(once, twice);
}

fn double_dispose(checks: CheckFlags) -> VmState {
    let mut builder = ProgramBuilder::new();
    builder.add_main();
    add_new(&mut builder, 0, 8);
    add_new(&mut builder, 1, 8);
    add_dispose(&mut builder, 0, 8);
    add_dispose(&mut builder, 0, 8);
    builder.add(OpCode::Retp, "");
    let mut run = run_checked(&builder.build(), checks);
    std::mem::replace(&mut run.vm.state, VmState::Normal)
}

#[test_log::test]
fn second_dispose_is_detected() {
    assert_eq!(
        double_dispose(CheckFlags::default()),
        VmState::Trap(TrapCode::Fatal(FatalCode::BlockAlreadyFreed))
    );
    assert_eq!(
        double_dispose(CheckFlags {
            recycle: false,
            check_reuse: true,
            ..CheckFlags::default()
        }),
        VmState::Trap(TrapCode::Fatal(FatalCode::BlockAlreadyFreed))
    );
}

#[test_log::test]
fn dispose_of_nil_and_of_nothing() {
    let mut builder = ProgramBuilder::new();
    builder.add_main();
    builder.add(OpCode::Ldcn, "");
    builder.add_ldci(4, "");
    builder.add_csp(StandardProc::Dsp, "");
    builder.add(OpCode::Retp, "");
    let run = run_checked(&builder.build(), CheckFlags::default());
    assert_eq!(
        run.state(),
        &VmState::Trap(TrapCode::Fatal(FatalCode::DisposeOfNilPointer))
    );

    let mut builder = ProgramBuilder::new();
    builder.add_main();
    builder.add_ldci(0, "");
    builder.add_ldci(4, "");
    builder.add_csp(StandardProc::Dsp, "");
    builder.add(OpCode::Retp, "");
    let run = run_checked(&builder.build(), CheckFlags::default());
    assert_eq!(
        run.state(),
        &VmState::Trap(TrapCode::Fatal(FatalCode::DisposeOfUninitializedPointer))
    );
}

#[test_log::test]
fn negative_allocation() {
    let mut builder = ProgramBuilder::new();
    builder.add_main();
    add_new(&mut builder, 0, -1);
    builder.add(OpCode::Retp, "");
    let run = run_checked(&builder.build(), CheckFlags::default());
    assert_eq!(
        run.state(),
        &VmState::Trap(TrapCode::Unhandled(ExceptionCode::SpaceAllocateNegative))
    );
}

#[test_log::test]
fn fresh_block_is_undefined() {
    let mut builder = ProgramBuilder::new();
    builder.add_main();
    add_new(&mut builder, 0, 4);
    builder.add_q(OpCode::Ldoa, global(0), "");
    builder.add_q(OpCode::Indi, 0, "");
    builder.add(OpCode::Retp, "");
    let run = run_checked(&builder.build(), CheckFlags::default());
    assert_eq!(
        run.state(),
        &VmState::Trap(TrapCode::Fatal(FatalCode::UndefinedLocationAccess))
    );
}

#[test_log::test]
fn pointer_used_after_strict_dispose() {
    let mut builder = ProgramBuilder::new();
    builder.add_main();
    add_new(&mut builder, 0, 8);
    add_dispose(&mut builder, 0, 8);
    builder.add_q(OpCode::Ldoa, global(0), "");
    builder.add_q(OpCode::Chka, 1, "");
    builder.add(OpCode::Retp, "");
    let run = run_checked(
        &builder.build(),
        CheckFlags {
            recycle: false,
            check_reuse: true,
            ..CheckFlags::default()
        },
    );
    assert_eq!(
        run.state(),
        &VmState::Trap(TrapCode::Fatal(FatalCode::PointerUsedAfterDispose))
    );
}
