/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use p6_vm::VmState;
use p6_vm_test::util::{ProgramBuilder, global, run};
use p6_vm_types::prelude::*;

/// First parameter or local, just below the mark.
const FIRST_BELOW_MARK: i64 = -(MARK_SIZE + INT_SIZE);

#[test_log::test]
fn function_result_is_left_on_the_stack() {
    let mut builder = ProgramBuilder::new();
    builder.add_main();
    builder.add_p(OpCode::Mst, 0, "");
    builder.add_ldci(20, "argument");
    let call = builder.add_pq_placeholder(OpCode::Cup, INT_SIZE as u8, "");
    builder.add_q(OpCode::Sroi, global(0), "result");
    builder.add(OpCode::Retp, "");

    builder.patch_here(call);
    builder.add_entry(INT_SIZE);
    builder.add_pq(OpCode::Lodi, 0, FIRST_BELOW_MARK, "argument");
    builder.add_ldci(22, "");
    builder.add(OpCode::Adi, "");
    builder.add_pq(OpCode::Stri, 0, -INT_SIZE, "result slot");
    builder.add(OpCode::Reti, "");

    let run = run(&builder.build(), "");
    assert_eq!(run.state(), &VmState::Stopped);
    assert_eq!(run.vm.memory().get_int(global(0)), Ok(42));
}

#[test_log::test]
fn outer_variable_through_static_link() {
    let mut builder = ProgramBuilder::new();
    let main = builder.add_call(0);
    builder.add(OpCode::Stp, "");
    builder.patch_here(main);
    builder.add_entry(INT_SIZE);
    builder.add_ldci(9, "");
    builder.add_pq(OpCode::Stri, 0, FIRST_BELOW_MARK, "local of main");
    let call = builder.add_call(0);
    builder.add(OpCode::Retp, "");

    builder.patch_here(call);
    builder.add_entry(0);
    builder.add_pq(OpCode::Lodi, 1, FIRST_BELOW_MARK, "one level up");
    builder.add_q(OpCode::Sroi, global(0), "");
    builder.add(OpCode::Retp, "");

    let run = run(&builder.build(), "");
    assert_eq!(run.state(), &VmState::Stopped);
    assert_eq!(run.vm.memory().get_int(global(0)), Ok(9));
}

#[test_log::test]
fn set_membership_and_equality() {
    let mut builder = ProgramBuilder::new();
    builder.add_main();
    for (slot, element) in [(0, 4), (1, 6), (2, 9)] {
        builder.add_ldci(element, "");
        builder.add_ldci(2, "");
        builder.add_ldci(5, "");
        builder.add(OpCode::Rgs, "");
        builder.add_ldci(9, "");
        builder.add(OpCode::Sgs, "");
        builder.add(OpCode::Uni, "");
        builder.add(OpCode::Inn, "");
        builder.add_q(OpCode::Srob, global(slot), "");
    }
    builder.add_ldcs(&[2, 3, 4, 5, 9], "");
    builder.add_ldci(2, "");
    builder.add_ldci(5, "");
    builder.add(OpCode::Rgs, "");
    builder.add_ldci(9, "");
    builder.add(OpCode::Sgs, "");
    builder.add(OpCode::Uni, "");
    builder.add(OpCode::Equs, "");
    builder.add_q(OpCode::Srob, global(3), "");
    builder.add(OpCode::Retp, "");

    let run = run(&builder.build(), "");
    assert_eq!(run.state(), &VmState::Stopped);
    let memory = run.vm.memory();
    assert_eq!(memory.get_byte(global(0)), Ok(1));
    assert_eq!(memory.get_byte(global(1)), Ok(0));
    assert_eq!(memory.get_byte(global(2)), Ok(1));
    assert_eq!(memory.get_byte(global(3)), Ok(1));
}

#[test_log::test]
fn reversed_range_builds_the_same_set() {
    let mut builder = ProgramBuilder::new();
    builder.add_main();
    builder.add_ldci(5, "");
    builder.add_ldci(3, "");
    builder.add(OpCode::Rgs, "");
    builder.add_ldci(3, "");
    builder.add_ldci(5, "");
    builder.add(OpCode::Rgs, "");
    builder.add(OpCode::Equs, "");
    builder.add_q(OpCode::Srob, global(0), "");
    builder.add_ldci(4, "");
    builder.add_ldci(9, "");
    builder.add_ldci(2, "");
    builder.add(OpCode::Rgs, "");
    builder.add(OpCode::Inn, "");
    builder.add_q(OpCode::Srob, global(1), "");
    builder.add(OpCode::Retp, "");

    let run = run(&builder.build(), "");
    assert_eq!(run.state(), &VmState::Stopped);
    assert_eq!(run.vm.memory().get_byte(global(0)), Ok(1));
    assert_eq!(run.vm.memory().get_byte(global(1)), Ok(1));
}
