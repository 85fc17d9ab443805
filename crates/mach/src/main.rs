/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use p6_vm::command::CommandLine;
use p6_vm::deck::parse_deck;
use p6_vm::host::HostStreams;
use p6_vm::{CheckFlags, Vm, VmSetup};
use pico_args::Arguments;
use std::ffi::OsString;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt};

const MAJOR_VERSION: u32 = 0;
const MINOR_VERSION: u32 = 1;

pub fn init_logger() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::OFF.into())
        .from_env_lossy();

    fmt()
        .with_env_filter(filter)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .init();
}

fn print_usage<W: Write>(mut out: W) {
    let _ = write!(
        out,
        "\
Usage: pmach [OPTIONS] <codefile> [<params>]...\n\n\
Options:\n\
  --quiet                 (no banner or progress lines)\n\
  --disasm                (print the loaded code and exit)\n\
  --no-check-overflow     (skip arithmetic overflow checks)\n\
  --no-check-defined      (skip undefined store checks)\n\
  --strict-dispose        (keep disposed blocks and check pointers against them)\n\
  --no-recycle-partial    (never recycle disposed blocks)\n\
  --iso7185               (reject field widths below one)\n\
  --prd <path>            (file read by the prd header file, default `prd`)\n\
  --prr <path>            (file written by the prr header file, default `prr`)\n\
  --dump-heap             (list heap blocks after the run)\n\
  -h, --help              (print this help and exit)\n"
    );
}

struct Options {
    quiet: bool,
    disasm: bool,
    dump_heap: bool,
    checks: CheckFlags,
    prd: PathBuf,
    prr: PathBuf,
    code_file: PathBuf,
    params: Vec<String>,
}

fn parse_options(mut args: Arguments) -> Result<Options, String> {
    let quiet = args.contains("--quiet");
    let disasm = args.contains("--disasm");
    let dump_heap = args.contains("--dump-heap");
    let strict_dispose = args.contains("--strict-dispose");
    let checks = CheckFlags {
        check_overflow: !args.contains("--no-check-overflow"),
        check_defined: !args.contains("--no-check-defined"),
        recycle: !strict_dispose,
        check_reuse: strict_dispose,
        no_recycle_partial: args.contains("--no-recycle-partial"),
        iso7185: args.contains("--iso7185"),
    };
    let prd = args
        .opt_value_from_str::<_, PathBuf>("--prd")
        .map_err(|e| format!("invalid value for `--prd`: {e}"))?
        .unwrap_or_else(|| PathBuf::from("prd"));
    let prr = args
        .opt_value_from_str::<_, PathBuf>("--prr")
        .map_err(|e| format!("invalid value for `--prr`: {e}"))?
        .unwrap_or_else(|| PathBuf::from("prr"));
    let code_file: PathBuf = args
        .free_from_str()
        .map_err(|_| "Usage: pmach <codefile> [<params>]...".to_string())?;
    let params = args
        .finish()
        .into_iter()
        .map(|param: OsString| param.to_string_lossy().into_owned())
        .collect();
    Ok(Options {
        quiet,
        disasm,
        dump_heap,
        checks,
        prd,
        prr,
        code_file,
        params,
    })
}

fn dump_heap(vm: &Vm) {
    match vm.heap_blocks() {
        Ok(blocks) => {
            println!("Heap blocks:");
            for block in blocks {
                println!(
                    "{:08X}: {:8} {}",
                    block.addr,
                    block.len,
                    if block.allocated { "allocated" } else { "free" }
                );
            }
        }
        Err(fault) => println!("*** Heap could not be walked: {fault:?}"),
    }
}

fn main() -> ExitCode {
    let mut args = Arguments::from_env();

    if args.contains(["-h", "--help"]) {
        print_usage(io::stdout());
        return ExitCode::from(1);
    }

    let options = match parse_options(args) {
        Ok(options) => options,
        Err(message) => {
            println!("*** {message}");
            print_usage(io::stderr());
            return ExitCode::from(1);
        }
    };

    init_logger();

    if !options.quiet {
        println!("P6 Pascal mach interpreter vs. {MAJOR_VERSION}.{MINOR_VERSION}");
        println!();
    }

    let command_line = match CommandLine::new(&options.params) {
        Ok(command_line) => command_line,
        Err(err) => {
            println!("*** {err}");
            return ExitCode::from(1);
        }
    };

    let Ok(deck) = fs::read_to_string(&options.code_file) else {
        println!("*** Cannot open file {}", options.code_file.display());
        return ExitCode::from(1);
    };

    if options.disasm {
        return match parse_deck(&deck) {
            Ok(image) => {
                if io::stdout().is_terminal() {
                    print!("{}", p6_vm_disasm::disasm_color(&image, 0));
                } else {
                    print!("{}", p6_vm_disasm::disasm_no_color(&image, 0));
                }
                ExitCode::SUCCESS
            }
            Err(err) => {
                error!(%err, "code deck rejected");
                println!("\n*** Invalid code deck");
                ExitCode::from(1)
            }
        };
    }

    if !options.quiet {
        println!("loading program");
    }

    let mut vm = Vm::new(VmSetup {
        checks: options.checks,
        command_line,
        prd_path: options.prd,
        prr_path: options.prr,
        streams: HostStreams::default(),
        debug_stats_enabled: false,
        debug_opcodes_enabled: false,
    });

    if let Err(err) = vm.load_deck(&deck) {
        error!(%err, "code deck rejected");
        println!("\n*** Invalid code deck");
        let code = vm.finish();
        return ExitCode::from(code as u8);
    }

    if !options.quiet {
        println!("Running program");
        println!();
    }

    vm.execute();

    if options.dump_heap {
        dump_heap(&vm);
    }

    let code = vm.finish();
    ExitCode::from(code as u8)
}
