/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use p6_vm::{CheckFlags, VmState};
use p6_vm_test::util::{ProgramBuilder, RunOptions, global, load, run, run_checked};
use p6_vm_types::exception::ExceptionCode;
use p6_vm_types::opcode::OpCode;
use p6_vm_types::standard::StandardProc;
use p6_vm_types::{Address, STORE_CAPACITY};

#[test_log::test]
fn string_address_plus_literal() {
    let mut builder = ProgramBuilder::new();
    builder.add_lca(b"abc", "3 byte string");
    builder.add_ldci(42, "");
    builder.add(OpCode::Adi, "");
    builder.add(OpCode::Stp, "");
    let image = builder.build();

    // lnp, lca, ldci, adi and stp come to 17 bytes, the string follows
    assert_eq!(&image[17..], b"abc");

    let run = run(&image, "");
    assert_eq!(run.state(), &VmState::Stopped);
    assert_eq!(run.vm.top_int(), Ok(42 + 17));
}

fn new_dispose_new(checks: CheckFlags) -> (Address, Address) {
    let mut builder = ProgramBuilder::new();
    builder.add_main();
    builder.add_q(OpCode::Lao, global(0), "");
    builder.add_ldci(16, "");
    builder.add_csp(StandardProc::New, "");
    builder.add_q(OpCode::Ldoa, global(0), "");
    builder.add_ldci(16, "");
    builder.add_csp(StandardProc::Dsp, "");
    builder.add_q(OpCode::Lao, global(1), "");
    builder.add_ldci(8, "");
    builder.add_csp(StandardProc::New, "");
    builder.add(OpCode::Retp, "");

    let run = run_checked(&builder.build(), checks);
    assert_eq!(run.state(), &VmState::Stopped);
    let memory = run.vm.memory();
    (
        memory.get_adr(global(0)).expect("first pointer"),
        memory.get_adr(global(1)).expect("second pointer"),
    )
}

#[test_log::test]
fn disposed_block_is_reused_by_default() {
    let (first, second) = new_dispose_new(CheckFlags::default());
    assert_eq!(first, second);
}

#[test_log::test]
fn strict_dispose_never_hands_out_the_same_address() {
    let (first, second) = new_dispose_new(CheckFlags {
        recycle: false,
        check_reuse: true,
        ..CheckFlags::default()
    });
    assert_ne!(first, second);

    let (first, second) = new_dispose_new(CheckFlags {
        no_recycle_partial: true,
        ..CheckFlags::default()
    });
    assert_ne!(first, second);
    assert!(second > first);
}

#[test_log::test]
fn zero_divide_two_calls_deep_unwinds_to_handler() {
    let mut builder = ProgramBuilder::new();
    builder.add_main();
    let guard = builder.add_q_placeholder(OpCode::Bge, "");
    let guarded = builder.position();
    let outer_call = builder.add_call(0);
    builder.add(OpCode::Ede, "");
    let done = builder.add_q_placeholder(OpCode::Ujp, "");

    builder.patch_here(guard);
    let handler = builder.position();
    builder.add(OpCode::Dupa, "");
    builder.add_q(OpCode::Sroa, global(0), "exception value");
    builder.add(OpCode::Ede, "");
    builder.patch_here(done);
    builder.add(OpCode::Retp, "");

    builder.patch_here(outer_call);
    builder.add_entry(0);
    let inner_call = builder.add_call(0);
    builder.add(OpCode::Retp, "");

    builder.patch_here(inner_call);
    builder.add_entry(0);
    builder.add_ldci(1, "");
    builder.add_ldci(0, "");
    builder.add(OpCode::Dvi, "");
    builder.add(OpCode::Retp, "");

    let image = builder.build();
    let mut run = load(&image, RunOptions::default());

    let mut guard_sp = None;
    for _ in 0..100 {
        if run.vm.pc() == guarded {
            guard_sp = Some(run.vm.sp());
        }
        if run.vm.pc() == handler {
            break;
        }
        assert!(!run.vm.step(), "stopped before reaching the handler");
    }
    assert_eq!(run.vm.pc(), handler);
    assert_eq!(Some(run.vm.sp()), guard_sp);
    assert_eq!(run.vm.mp(), STORE_CAPACITY);

    run.vm.execute();
    assert_eq!(run.state(), &VmState::Stopped);
    let pctop = run.vm.pctop();
    assert_eq!(
        run.vm.memory().get_adr(global(0)),
        Ok(pctop + Address::from(ExceptionCode::ZeroDivide.code()))
    );
    assert_eq!(run.vm.guard(), (0, 0, 0));
}

fn fielded_read_program() -> Vec<u8> {
    let mut builder = ProgramBuilder::new();
    builder.add_main();
    builder.add_input();
    builder.add_q(OpCode::Lao, global(0), "");
    builder.add_ldci(8, "field width");
    builder.add_csp(StandardProc::Rdif, "");
    builder.add_csp(StandardProc::Eln, "");
    builder.add_q(OpCode::Srob, global(1), "");
    builder.add_input();
    builder.add_csp(StandardProc::Rln, "");
    builder.add_q(OpCode::Lao, global(2), "");
    builder.add_csp(StandardProc::Rdc, "");
    builder.add_q(OpCode::Dmp, 4, "drop the file");
    builder.add(OpCode::Retp, "");
    builder.build()
}

#[test_log::test]
fn fielded_integer_read_consumes_the_field() {
    let run = run(&fielded_read_program(), "  -123  \nX");
    assert_eq!(run.state(), &VmState::Stopped);
    let memory = run.vm.memory();
    assert_eq!(memory.get_int(global(0)), Ok(-123));
    assert_eq!(memory.get_byte(global(1)), Ok(1), "at end of line");
    assert_eq!(memory.get_byte(global(2)), Ok(b'X'));
}

#[test_log::test]
fn fielded_integer_read_rejects_trailing_text() {
    let run = run(&fielded_read_program(), "  -12x  \nX");
    assert_eq!(
        run.state(),
        &VmState::Trap(p6_vm::TrapCode::Unhandled(ExceptionCode::FieldNotBlank))
    );
}
