/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use assert_cmd::prelude::*;
use p6_vm_instr_build::image_to_deck;
use p6_vm_test::util::ProgramBuilder;
use p6_vm_types::opcode::OpCode;
use p6_vm_types::standard::StandardProc;
use predicates::prelude::*;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

fn hello_deck() -> String {
    let mut builder = ProgramBuilder::new();
    builder.add_main();
    builder.add_output();
    builder.add_lca(b"hello", "");
    builder.add_ldci(5, "");
    builder.add_ldci(5, "");
    builder.add_csp(StandardProc::Wrs, "");
    builder.add_csp(StandardProc::Wln, "");
    builder.add_q(OpCode::Dmp, 4, "");
    builder.add(OpCode::Retp, "");
    image_to_deck(&builder.build())
}

fn zero_divide_deck() -> String {
    let mut builder = ProgramBuilder::new();
    builder.add_main();
    builder.add_ldci(1, "");
    builder.add_ldci(0, "");
    builder.add(OpCode::Dvi, "");
    builder.add(OpCode::Retp, "");
    image_to_deck(&builder.build())
}

fn write_deck(dir: &Path, deck: &str) -> Result<PathBuf, Box<dyn Error>> {
    let path = dir.join("prog.p6");
    fs::write(&path, deck)?;
    Ok(path)
}

#[test]
fn runs_a_deck() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let deck = write_deck(dir.path(), &hello_deck())?;

    let mut cmd = Command::cargo_bin("pmach")?;
    cmd.arg(&deck);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("P6 Pascal mach interpreter"))
        .stdout(predicate::str::contains("hello\n"))
        .stdout(predicate::str::ends_with("program complete\n"));

    Ok(())
}

#[test]
fn quiet_run_prints_only_program_output() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let deck = write_deck(dir.path(), &hello_deck())?;

    let mut cmd = Command::cargo_bin("pmach")?;
    cmd.arg("--quiet").arg(&deck);
    cmd.assert()
        .success()
        .stdout("hello\n\nprogram complete\n");

    Ok(())
}

#[test]
fn runtime_error_aborts() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let deck = write_deck(dir.path(), &zero_divide_deck())?;

    let mut cmd = Command::cargo_bin("pmach")?;
    cmd.arg("--quiet").arg(&deck);
    cmd.assert()
        .code(1)
        .stdout(predicate::str::contains("*** Runtime error"))
        .stdout(predicate::str::contains("Zero divide"))
        .stdout(predicate::str::contains("Program aborted"));

    Ok(())
}

#[test]
fn rejects_a_broken_deck() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let mut deck = hello_deck();
    deck.truncate(deck.len() / 2);
    let deck = write_deck(dir.path(), &deck)?;

    let mut cmd = Command::cargo_bin("pmach")?;
    cmd.arg("--quiet").arg(&deck);
    cmd.assert()
        .code(1)
        .stdout(predicate::str::contains("*** Invalid code deck"));

    Ok(())
}

#[test]
fn disassembles() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let deck = write_deck(dir.path(), &hello_deck())?;

    let mut cmd = Command::cargo_bin("pmach")?;
    cmd.arg("--quiet").arg("--disasm").arg(&deck);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("lnp"))
        .stdout(predicate::str::contains("wrs"))
        .stdout(predicate::str::contains("program complete").not());

    Ok(())
}

#[test]
fn command_line_too_long() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let deck = write_deck(dir.path(), &hello_deck())?;

    let mut cmd = Command::cargo_bin("pmach")?;
    cmd.arg("--quiet").arg(&deck).arg("x".repeat(300));
    cmd.assert()
        .code(1)
        .stdout(predicate::str::contains(
            "*** Too many/too long command line parameters",
        ));

    Ok(())
}

#[test]
fn missing_code_file() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;

    let mut cmd = Command::cargo_bin("pmach")?;
    cmd.arg("--quiet").arg(dir.path().join("absent.p6"));
    cmd.assert()
        .code(1)
        .stdout(predicate::str::contains("*** Cannot open file"));

    Ok(())
}
