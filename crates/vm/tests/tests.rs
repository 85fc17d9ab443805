/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use p6_vm::prelude::*;
use std::io::{Cursor, sink};
use std::path::PathBuf;

fn create() -> Vm {
    let streams = HostStreams::new(
        Box::new(Cursor::new(Vec::new())),
        Box::new(sink()),
        Box::new(sink()),
    );
    Vm::new(VmSetup {
        checks: CheckFlags::default(),
        command_line: CommandLine::new::<&str>(&[]).expect("empty command line"),
        prd_path: PathBuf::from("prd"),
        prr_path: PathBuf::from("prr"),
        streams,
        debug_stats_enabled: false,
        debug_opcodes_enabled: false,
    })
}

#[test_log::test]
fn load_and_stop() {
    let mut vm = create();
    // lnp 0x10000, stp
    let deck = ":06000000000000000014000001003A4F\n:00000000000000000600\n";
    vm.load_deck(deck).expect("valid deck");
    assert_eq!(vm.pctop(), 6);
    assert_eq!(vm.execute(), &VmState::Stopped);
    assert_eq!(vm.np(), 0x1_0000);
    assert_eq!(vm.exit_code(), 0);
}

#[test_log::test]
fn empty_program_runs_off_the_end() {
    let mut vm = create();
    vm.load_deck(":00000000000000000000\n").expect("valid deck");
    assert_ne!(vm.execute(), &VmState::Stopped);
    assert_eq!(vm.exit_code(), 1);
}
