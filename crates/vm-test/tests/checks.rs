/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use p6_vm::{CheckFlags, TrapCode, VmState};
use p6_vm_test::util::{ProgramBuilder, global, run, run_checked};
use p6_vm_types::exception::{ExceptionCode, FatalCode};
use p6_vm_types::opcode::OpCode;

fn fatal(code: FatalCode) -> VmState {
    VmState::Trap(TrapCode::Fatal(code))
}

fn unhandled(code: ExceptionCode) -> VmState {
    VmState::Trap(TrapCode::Unhandled(code))
}

/// Runs `body` inside the main block and returns the final state.
fn state_of(checks: CheckFlags, body: impl FnOnce(&mut ProgramBuilder)) -> VmState {
    let mut builder = ProgramBuilder::new();
    builder.add_main();
    body(&mut builder);
    builder.add(OpCode::Retp, "");
    run_checked(&builder.build(), checks).vm.state
}

fn check_pointer(push: impl FnOnce(&mut ProgramBuilder), q: i64) -> VmState {
    state_of(CheckFlags::default(), |builder| {
        push(builder);
        builder.add_q(OpCode::Chka, q, "");
        builder.add_q(OpCode::Dmp, 4, "");
    })
}

#[test_log::test]
fn pointer_checks() {
    assert_eq!(
        check_pointer(|builder| builder.add_ldci(0, ""), 1),
        fatal(FatalCode::UninitializedPointer)
    );
    assert_eq!(
        check_pointer(|builder| builder.add(OpCode::Ldcn, ""), 1),
        fatal(FatalCode::DereferenceOfNilPointer)
    );
    assert_eq!(
        check_pointer(|builder| builder.add(OpCode::Ldcn, ""), 0),
        VmState::Stopped,
        "nil may be compared"
    );
    assert_eq!(
        check_pointer(|builder| builder.add_q(OpCode::Lao, 5, ""), 1),
        fatal(FatalCode::BadPointerValue)
    );
}

#[test_log::test]
fn undefined_reads() {
    let read = |builder: &mut ProgramBuilder| {
        builder.add_q(OpCode::Ldoi, global(0), "");
        builder.add_q(OpCode::Sroi, global(1), "");
    };
    assert_eq!(
        state_of(CheckFlags::default(), read),
        fatal(FatalCode::UndefinedLocationAccess)
    );

    let mut builder = ProgramBuilder::new();
    builder.add_main();
    read(&mut builder);
    builder.add(OpCode::Retp, "");
    let run = run_checked(
        &builder.build(),
        CheckFlags {
            check_defined: false,
            ..CheckFlags::default()
        },
    );
    assert_eq!(run.state(), &VmState::Stopped);
    assert_eq!(run.vm.memory().get_int(global(1)), Ok(0));
}

/// Packs four bytes starting at element 2 of an eight byte array in globals 0 and 1.
fn pack_from(builder: &mut ProgramBuilder) {
    builder.add_q(OpCode::Lao, global(0), "unpacked array");
    builder.add_ldci(2, "first element");
    builder.add_q(OpCode::Lao, global(4), "packed array");
    builder.add_qq(OpCode::Pck, 4, 8, "");
}

#[test_log::test]
fn packing_reads_only_defined_elements() {
    assert_eq!(
        state_of(CheckFlags::default(), pack_from),
        fatal(FatalCode::UndefinedLocationAccess)
    );

    let mut builder = ProgramBuilder::new();
    builder.add_main();
    builder.add_ldci(0x0403_0201, "");
    builder.add_q(OpCode::Sroi, global(0), "");
    builder.add_ldci(0x0807_0605, "");
    builder.add_q(OpCode::Sroi, global(1), "");
    pack_from(&mut builder);
    builder.add(OpCode::Retp, "");
    let run = run(&builder.build(), "");
    assert_eq!(run.state(), &VmState::Stopped);
    assert_eq!(run.vm.memory().get_int(global(4)), Ok(0x0605_0403));
}

#[test_log::test]
fn unbalanced_return() {
    let mut builder = ProgramBuilder::new();
    builder.add_main();
    let call = builder.add_call(0);
    builder.add(OpCode::Retp, "");
    builder.patch_here(call);
    builder.add_entry(0);
    builder.add_ldci(1, "left behind");
    builder.add(OpCode::Retp, "");

    let run = run(&builder.build(), "");
    assert_eq!(run.state(), &fatal(FatalCode::StackBalance));
}

fn add_max_plus_one(builder: &mut ProgramBuilder) {
    builder.add_ldci(i32::MAX, "");
    builder.add_ldci(1, "");
    builder.add(OpCode::Adi, "");
    builder.add_q(OpCode::Sroi, global(0), "");
}

#[test_log::test]
fn overflow_is_checked_or_wraps() {
    assert_eq!(
        state_of(CheckFlags::default(), add_max_plus_one),
        unhandled(ExceptionCode::IntegerValueOverflow)
    );

    let mut builder = ProgramBuilder::new();
    builder.add_main();
    add_max_plus_one(&mut builder);
    builder.add(OpCode::Retp, "");
    let run = run_checked(
        &builder.build(),
        CheckFlags {
            check_overflow: false,
            ..CheckFlags::default()
        },
    );
    assert_eq!(run.state(), &VmState::Stopped);
    assert_eq!(run.vm.memory().get_int(global(0)), Ok(i32::MIN));
}

fn check_range(value: i32) -> VmState {
    state_of(CheckFlags::default(), |builder| {
        builder.add_ldci(1, "low");
        builder.add_q(OpCode::Sroi, global(0), "");
        builder.add_ldci(10, "high");
        builder.add_q(OpCode::Sroi, global(1), "");
        builder.add_ldci(value, "");
        builder.add_q(OpCode::Chki, global(0), "");
        builder.add_q(OpCode::Sroi, global(2), "");
    })
}

#[test_log::test]
fn range_check() {
    assert_eq!(check_range(1), VmState::Stopped);
    assert_eq!(check_range(10), VmState::Stopped);
    assert_eq!(check_range(0), unhandled(ExceptionCode::ValueOutOfRange));
    assert_eq!(check_range(11), unhandled(ExceptionCode::ValueOutOfRange));
}

#[test_log::test]
fn running_off_the_end() {
    let image = ProgramBuilder::new().build();
    let run = run(&image, "");
    assert_eq!(run.state(), &fatal(FatalCode::PcOutOfRange));
}

#[test_log::test]
fn unknown_opcode() {
    let mut image = ProgramBuilder::new().build();
    image.push(255);
    let run = run(&image, "");
    assert_eq!(run.state(), &fatal(FatalCode::InvalidInstruction));
}

#[test_log::test]
fn set_element_out_of_range() {
    assert_eq!(
        state_of(CheckFlags::default(), |builder| {
            builder.add_ldci(256, "");
            builder.add(OpCode::Sgs, "");
        }),
        unhandled(ExceptionCode::SetElementOutOfRange)
    );
}

#[test_log::test]
fn zero_divide_in_mod_and_div() {
    for op in [OpCode::Dvi, OpCode::Mod] {
        let state = state_of(CheckFlags::default(), |builder| {
            builder.add_ldci(7, "");
            builder.add_ldci(0, "");
            builder.add(op, "");
            builder.add_q(OpCode::Sroi, global(0), "");
        });
        let expected = if op == OpCode::Dvi {
            ExceptionCode::ZeroDivide
        } else {
            ExceptionCode::InvalidDivisorToMod
        };
        assert_eq!(state, unhandled(expected), "{op}");
    }
}

#[test_log::test]
fn mod_result_is_never_negative() {
    let mut builder = ProgramBuilder::new();
    builder.add_main();
    builder.add_ldci(-7, "");
    builder.add_ldci(3, "");
    builder.add(OpCode::Mod, "");
    builder.add_q(OpCode::Sroi, global(0), "");
    builder.add_ldci(7, "");
    builder.add_ldci(3, "");
    builder.add(OpCode::Mod, "");
    builder.add_q(OpCode::Sroi, global(1), "");
    builder.add(OpCode::Retp, "");
    let run = run(&builder.build(), "");
    assert_eq!(run.state(), &VmState::Stopped);
    assert_eq!(run.vm.memory().get_int(global(0)), Ok(2));
    assert_eq!(run.vm.memory().get_int(global(1)), Ok(1));

    let state = state_of(
        CheckFlags {
            check_overflow: false,
            ..CheckFlags::default()
        },
        |builder| {
            builder.add_ldci(7, "");
            builder.add_ldci(-2, "");
            builder.add(OpCode::Mod, "");
            builder.add_q(OpCode::Sroi, global(0), "");
        },
    );
    assert_eq!(state, unhandled(ExceptionCode::InvalidDivisorToMod));
}

/// Compares the eight bytes at globals 0 and 1 against the eight at globals 2 and 3.
fn compare_strings(builder: &mut ProgramBuilder, op: OpCode) {
    builder.add_q(OpCode::Lao, global(0), "");
    builder.add_q(OpCode::Lao, global(2), "");
    builder.add_q(op, 8, "");
    builder.add_q(OpCode::Srob, global(4), "");
}

#[test_log::test]
fn string_compare_stops_at_first_difference() {
    let mut builder = ProgramBuilder::new();
    builder.add_main();
    builder.add_ldci(0x0403_0201, "");
    builder.add_q(OpCode::Sroi, global(0), "");
    builder.add_ldci(0x0403_0901, "");
    builder.add_q(OpCode::Sroi, global(2), "");
    compare_strings(&mut builder, OpCode::Lesm);
    builder.add(OpCode::Retp, "");
    let run = run(&builder.build(), "");
    assert_eq!(run.state(), &VmState::Stopped);
    assert_eq!(run.vm.memory().get_byte(global(4)), Ok(1));

    let state = state_of(CheckFlags::default(), |builder| {
        builder.add_ldci(0x0403_0201, "");
        builder.add_q(OpCode::Sroi, global(0), "");
        builder.add_ldci(0x0403_0201, "");
        builder.add_q(OpCode::Sroi, global(2), "");
        compare_strings(builder, OpCode::Equm);
    });
    assert_eq!(state, fatal(FatalCode::UndefinedLocationAccess));
}
