/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use p6_vm::{TrapCode, VmState};
use p6_vm_instr_build::PatchPosition;
use p6_vm_test::util::{ProgramBuilder, global, run};
use p6_vm_types::Address;
use p6_vm_types::exception::{ExceptionCode, FatalCode};
use p6_vm_types::opcode::OpCode;
use p6_vm_types::standard::StandardProc;

const THROWN: i32 = 0x1_2345;

/// Opens a guarded block and returns the patch for its handler.
fn begin_guard(builder: &mut ProgramBuilder) -> PatchPosition {
    builder.add_q_placeholder(OpCode::Bge, "guard")
}

/// Ends the guarded part, and starts the handler which stores the caught
/// value in `slot`.
fn handler(builder: &mut ProgramBuilder, guard: PatchPosition, slot: Address) -> PatchPosition {
    builder.add(OpCode::Ede, "");
    let done = builder.add_q_placeholder(OpCode::Ujp, "");
    builder.patch_here(guard);
    builder.add(OpCode::Dupa, "");
    builder.add_q(OpCode::Sroa, global(slot), "caught");
    done
}

fn add_throw(builder: &mut ProgramBuilder, value: i32) {
    builder.add_ldci(value, "");
    builder.add_csp(StandardProc::Thw, "");
}

#[test_log::test]
fn thrown_value_reaches_the_handler() {
    let mut builder = ProgramBuilder::new();
    builder.add_main();
    let guard = begin_guard(&mut builder);
    add_throw(&mut builder, THROWN);
    let done = handler(&mut builder, guard, 0);
    builder.add(OpCode::Ede, "");
    builder.patch_here(done);
    builder.add(OpCode::Retp, "");

    let run = run(&builder.build(), "");
    assert_eq!(run.state(), &VmState::Stopped);
    assert_eq!(run.vm.memory().get_adr(global(0)), Ok(Address::from(THROWN)));
    assert_eq!(run.vm.guard(), (0, 0, 0));
}

#[test_log::test]
fn block_without_throw_leaves_handler_untouched() {
    let mut builder = ProgramBuilder::new();
    builder.add_main();
    let guard = begin_guard(&mut builder);
    builder.add_ldci(7, "");
    builder.add_q(OpCode::Sroi, global(1), "");
    let done = handler(&mut builder, guard, 0);
    builder.add(OpCode::Ede, "");
    builder.patch_here(done);
    builder.add(OpCode::Retp, "");

    let run = run(&builder.build(), "");
    assert_eq!(run.state(), &VmState::Stopped);
    assert_eq!(run.vm.memory().get_int(global(1)), Ok(7));
    assert!(!run.vm.memory().is_defined(global(0)));
}

#[test_log::test]
fn inner_handler_rethrows_to_outer() {
    let mut builder = ProgramBuilder::new();
    builder.add_main();
    let outer = begin_guard(&mut builder);
    let inner = begin_guard(&mut builder);
    add_throw(&mut builder, THROWN);
    let inner_done = handler(&mut builder, inner, 0);
    builder.add(OpCode::Mse, "pass it on");
    builder.patch_here(inner_done);
    let outer_done = handler(&mut builder, outer, 1);
    builder.add(OpCode::Ede, "");
    builder.patch_here(outer_done);
    builder.add(OpCode::Retp, "");

    let run = run(&builder.build(), "");
    assert_eq!(run.state(), &VmState::Stopped);
    let memory = run.vm.memory();
    assert_eq!(memory.get_adr(global(0)), Ok(Address::from(THROWN)));
    assert_eq!(memory.get_adr(global(1)), Ok(Address::from(THROWN)));
    assert_eq!(run.vm.guard(), (0, 0, 0));
}

#[test_log::test]
fn handler_in_caller_catches_fault_in_callee() {
    let mut builder = ProgramBuilder::new();
    builder.add_main();
    let guard = begin_guard(&mut builder);
    let call = builder.add_call(0);
    let done = handler(&mut builder, guard, 0);
    builder.add(OpCode::Ede, "");
    builder.patch_here(done);
    builder.add(OpCode::Retp, "");

    builder.patch_here(call);
    builder.add_entry(4);
    builder.add_ldci(3, "");
    builder.add_ldci(0, "");
    builder.add(OpCode::Mod, "");
    builder.add(OpCode::Retp, "");

    let run = run(&builder.build(), "");
    assert_eq!(run.state(), &VmState::Stopped);
    let code = Address::from(ExceptionCode::InvalidDivisorToMod.code());
    assert_eq!(
        run.vm.memory().get_adr(global(0)),
        Ok(run.vm.pctop() + code)
    );
}

#[test_log::test]
fn unhandled_exception_traps() {
    let mut builder = ProgramBuilder::new();
    builder.add_main();
    builder.add_ldci(1, "");
    builder.add_ldci(0, "");
    builder.add(OpCode::Dvi, "");
    builder.add(OpCode::Retp, "");

    let mut run = run(&builder.build(), "");
    assert_eq!(
        run.state(),
        &VmState::Trap(TrapCode::Unhandled(ExceptionCode::ZeroDivide))
    );
    assert_eq!(run.finish(), 1);
    let output = run.output();
    assert!(output.contains("*** Runtime error"), "{output}");
    assert!(output.contains("Zero divide"), "{output}");
    assert!(output.ends_with("Program aborted\nprogram complete\n"), "{output}");
}

#[test_log::test]
fn unhandled_program_value() {
    let mut builder = ProgramBuilder::new();
    builder.add_main();
    add_throw(&mut builder, THROWN);
    builder.add(OpCode::Retp, "");

    let run = run(&builder.build(), "");
    assert_eq!(
        run.state(),
        &VmState::Trap(TrapCode::Fatal(FatalCode::UnhandledException))
    );
}

#[test_log::test]
fn rethrow_without_outer_block_traps_with_original_code() {
    let mut builder = ProgramBuilder::new();
    builder.add_main();
    let guard = begin_guard(&mut builder);
    builder.add_ldci(i32::MAX, "");
    builder.add_ldci(1, "");
    builder.add(OpCode::Adi, "");
    let done = handler(&mut builder, guard, 0);
    builder.add(OpCode::Mse, "");
    builder.patch_here(done);
    builder.add(OpCode::Retp, "");

    let run = run(&builder.build(), "");
    assert_eq!(
        run.state(),
        &VmState::Trap(TrapCode::Unhandled(ExceptionCode::IntegerValueOverflow))
    );
}

#[test_log::test]
fn fatal_errors_bypass_handlers() {
    let mut builder = ProgramBuilder::new();
    builder.add_main();
    let guard = begin_guard(&mut builder);
    builder.add_q(OpCode::Ldoi, global(3), "never stored");
    builder.add_q(OpCode::Dmp, 4, "");
    let done = handler(&mut builder, guard, 0);
    builder.add(OpCode::Ede, "");
    builder.patch_here(done);
    builder.add(OpCode::Retp, "");

    let run = run(&builder.build(), "");
    assert_eq!(
        run.state(),
        &VmState::Trap(TrapCode::Fatal(FatalCode::UndefinedLocationAccess))
    );
}
