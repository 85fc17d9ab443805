/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use p6_vm::command::CommandLine;
use p6_vm::host::HostStreams;
use p6_vm::{CheckFlags, Vm, VmSetup, VmState};
use p6_vm_instr_build::{InstructionBuilder, PatchPosition};
use p6_vm_types::opcode::OpCode;
use p6_vm_types::{Address, MARK_SIZE, standard_files};
use std::cell::RefCell;
use std::io::{self, Cursor, Write};
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::rc::Rc;

/// Test programs keep their variables here, well above any code image.
pub const GLOBALS: Address = 0x1_0000;
/// Where the heap of a test program starts.
pub const GLOBALS_END: Address = 0x2_0000;

/// Address of global variable slot `index`, one address-sized word each.
#[must_use]
pub const fn global(index: Address) -> Address {
    GLOBALS + index * 4
}

/// A writer whose contents stay readable after the machine took ownership
/// of it.
#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// An instruction builder that starts with `lnp` and can refer to the
/// header files, whose addresses are only known once the image is complete.
pub struct ProgramBuilder {
    builder: InstructionBuilder,
    lnp: PatchPosition,
    header_refs: Vec<(PatchPosition, Address)>,
}

impl Default for ProgramBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramBuilder {
    #[must_use]
    pub fn new() -> Self {
        let mut builder = InstructionBuilder::new();
        let lnp = builder.add_q_placeholder(OpCode::Lnp, "heap starts after the globals");
        Self {
            builder,
            lnp,
            header_refs: Vec::new(),
        }
    }

    /// Pushes the address of a header file variable.
    pub fn add_header_file(&mut self, file: u8) {
        let patch = self.builder.add_q_placeholder(OpCode::Lao, "header file");
        self.header_refs
            .push((patch, standard_files::offset_of(file)));
    }

    pub fn add_output(&mut self) {
        self.add_header_file(standard_files::OUTPUT);
    }

    pub fn add_input(&mut self) {
        self.add_header_file(standard_files::INPUT);
    }

    /// `mst 0` followed by a `cup` whose entry point is patched later.
    pub fn add_call(&mut self, parameter_size: u8) -> PatchPosition {
        self.builder.add_p(OpCode::Mst, 0, "");
        self.builder
            .add_pq_placeholder(OpCode::Cup, parameter_size, "call")
    }

    /// Procedure prologue. `below_mark` covers the parameters and the locals.
    pub fn add_entry(&mut self, below_mark: Address) {
        self.builder
            .add_q(OpCode::Ents, -(MARK_SIZE + below_mark), "");
        self.builder.add_q(OpCode::Ente, 0, "");
    }

    /// Calls the main block, which starts right after, and stops when it
    /// returns.
    pub fn add_main(&mut self) {
        let call = self.add_call(0);
        self.builder.add(OpCode::Stp, "");
        self.builder.patch_here(call);
        self.add_entry(0);
    }

    #[must_use]
    pub fn build(mut self) -> Vec<u8> {
        self.builder.patch(self.lnp, GLOBALS_END);
        let code_end = self.builder.code_end();
        for (patch, offset) in std::mem::take(&mut self.header_refs) {
            self.builder.patch(patch, code_end + offset);
        }
        self.builder.build()
    }
}

impl Deref for ProgramBuilder {
    type Target = InstructionBuilder;

    fn deref(&self) -> &Self::Target {
        &self.builder
    }
}

impl DerefMut for ProgramBuilder {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.builder
    }
}

pub struct RunOptions {
    pub checks: CheckFlags,
    pub input: String,
    pub args: Vec<String>,
    pub prd: PathBuf,
    pub prr: PathBuf,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            checks: CheckFlags::default(),
            input: String::new(),
            args: Vec::new(),
            prd: PathBuf::from("prd"),
            prr: PathBuf::from("prr"),
        }
    }
}

pub struct Run {
    pub vm: Vm,
    pub output: SharedBuffer,
    pub error: SharedBuffer,
}

impl Run {
    #[must_use]
    pub const fn state(&self) -> &VmState {
        &self.vm.state
    }

    #[must_use]
    pub fn output(&self) -> String {
        self.output.text()
    }

    /// Runs `finish` and returns the exit status.
    pub fn finish(&mut self) -> i32 {
        self.vm.finish()
    }
}

/// Creates a machine with in-memory streams and the image loaded.
///
/// # Panics
/// If the image or the arguments do not fit.
#[must_use]
pub fn load(image: &[u8], options: RunOptions) -> Run {
    let output = SharedBuffer::default();
    let error = SharedBuffer::default();
    let streams = HostStreams::new(
        Box::new(Cursor::new(options.input.into_bytes())),
        Box::new(output.clone()),
        Box::new(error.clone()),
    );
    let mut vm = Vm::new(VmSetup {
        checks: options.checks,
        command_line: CommandLine::new(&options.args).expect("command line fits"),
        prd_path: options.prd,
        prr_path: options.prr,
        streams,
        debug_stats_enabled: false,
        debug_opcodes_enabled: false,
    });
    vm.load_code(image).expect("image fits in the store");
    Run { vm, output, error }
}

#[must_use]
pub fn run_with(image: &[u8], options: RunOptions) -> Run {
    let mut run = load(image, options);
    run.vm.execute();
    run
}

#[must_use]
pub fn run(image: &[u8], input: &str) -> Run {
    run_with(
        image,
        RunOptions {
            input: input.to_string(),
            ..RunOptions::default()
        },
    )
}

#[must_use]
pub fn run_checked(image: &[u8], checks: CheckFlags) -> Run {
    run_with(
        image,
        RunOptions {
            checks,
            ..RunOptions::default()
        },
    )
}

fn trim_lines(text: &str) -> String {
    text.lines()
        .map(|line| {
            // Ignore comments that starts with ;
            line.split(';').next().unwrap_or("").trim()
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn compare_line_outputs(encountered: &str, expected: &str) {
    let encountered_trimmed = trim_lines(encountered);
    let expected_trimmed = trim_lines(expected);

    eprintln!("{encountered}");
    assert_eq!(encountered_trimmed, expected_trimmed);
}

pub fn compare_hex_outputs(memory: &[u8], expected_hex: &str) {
    let encountered_hexed = hexify::format_hex(memory);
    let expected_hex_trimmed = expected_hex.trim();

    compare_line_outputs(&encountered_hexed, expected_hex_trimmed);
}

/// Compares the disassembly of an image, ignoring `;` comments and
/// surrounding blanks.
pub fn compare_disasm(image: &[u8], expected: &str) {
    compare_line_outputs(&p6_vm_disasm::disasm_no_color(image, 0), expected);
}
