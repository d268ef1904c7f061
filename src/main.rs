//! provrb assembly runner.
//!
//! Assembles a `.pvb` source file (or loads a binary image) and runs it.
//!
//! # Usage
//! ```text
//! provrb [OPTIONS] <file.pvb | image.pvbc | ->
//! ```
//!
//! # Arguments
//! - `file`: Source file, binary image, or `-` to read source from stdin
//!
//! # Options
//! - `--embedded`: Use the embedded profile (small limits, pin I/O)
//! - `--stack-dialect`: Arithmetic pops its operands from the stack
//! - `--backward-labels`: Labels must be declared before they are referenced
//! - `-o, --output <image>`: Write a binary image instead of running
//! - `--listing`: Print the program listing before running
//! - `--registers`: Print the register file after the run
//! - `-q, --quiet`: Hide log timestamps
//!
//! # Exit status
//! The program's `exit` code, 0 when it runs off its last instruction, the
//! error class code on failure, and 64 for bad arguments.

use provrb::utils::log::{self, SHOW_TIMESTAMP};
use provrb::virtual_machine::assembler::assemble_source_with;
use provrb::virtual_machine::config::{
    AssemblerConfig, Dialect, LabelResolution, MachineConfig, Profile,
};
use provrb::virtual_machine::errors::VMError;
use provrb::virtual_machine::program::Program;
use provrb::virtual_machine::vm::{NoHardware, SimulatedPins, StdConsole, VM};
use provrb::{debug, error, info};
use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;
use std::sync::atomic::Ordering;

const EXIT_USAGE: i32 = 64;

struct Options {
    input: String,
    output: Option<String>,
    profile: Profile,
    dialect: Dialect,
    label_resolution: LabelResolution,
    listing: bool,
    registers: bool,
}

fn main() {
    log::init_from_env();

    let args: Vec<String> = env::args().collect();
    let options = parse_args(&args);

    let program = match load_program(&options) {
        Ok(program) => program,
        Err(err) => {
            // Assembly diagnostics have already been logged by the assembler.
            if err.location().is_none() {
                error!("{err}");
            }
            process::exit(err.exit_code());
        }
    };

    if let Some(output) = &options.output {
        if let Err(err) = program.save(output) {
            error!("{err}");
            process::exit(err.exit_code());
        }
        info!(
            "Assembled {} -> {} ({} instructions)",
            options.input,
            output,
            program.len()
        );
        return;
    }

    if options.listing {
        print!("{}", program.listing());
    }

    let config = MachineConfig::for_profile(options.profile);
    let mut vm = VM::new(&program, config);
    let mut console = StdConsole;
    let result = match options.profile {
        Profile::Desktop => vm.run(&mut console, &mut NoHardware),
        Profile::Embedded => vm.run(&mut console, &mut SimulatedPins::new()),
    };

    if options.registers {
        print!("{}", vm.register_dump());
    }

    match result {
        Ok(outcome) => {
            debug!("{:?} after {} cycles", outcome, vm.cycles());
            process::exit(outcome.code());
        }
        Err(err) => {
            error!("{} at instruction {}: {}", err.kind().label(), vm.pc(), err);
            process::exit(err.exit_code());
        }
    }
}

fn parse_args(args: &[String]) -> Options {
    let program = args.first().map(String::as_str).unwrap_or("provrb");
    let mut input: Option<String> = None;
    let mut options = Options {
        input: String::new(),
        output: None,
        profile: Profile::Desktop,
        dialect: Dialect::Register,
        label_resolution: LabelResolution::Forward,
        listing: false,
        registers: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_usage(program);
                process::exit(0);
            }
            "--embedded" => options.profile = Profile::Embedded,
            "--stack-dialect" => options.dialect = Dialect::Stack,
            "--backward-labels" => options.label_resolution = LabelResolution::BackwardOnly,
            "--listing" => options.listing = true,
            "--registers" => options.registers = true,
            "--quiet" | "-q" => SHOW_TIMESTAMP.store(false, Ordering::Relaxed),
            k @ ("--output" | "-o") => {
                i += 1;
                if i >= args.len() {
                    error!("{k} requires an argument");
                    process::exit(EXIT_USAGE);
                }
                options.output = Some(args[i].clone());
            }
            other if other.starts_with('-') && other != "-" => {
                error!("Unexpected argument: {}\n", other);
                print_usage(program);
                process::exit(EXIT_USAGE);
            }
            path => {
                if input.is_some() {
                    error!("Only one input file may be given, found extra '{path}'");
                    process::exit(EXIT_USAGE);
                }
                input = Some(path.to_string());
            }
        }
        i += 1;
    }

    match input {
        Some(input) => options.input = input,
        None => {
            print_usage(program);
            process::exit(EXIT_USAGE);
        }
    }
    options
}

/// Reads the input and turns it into a program, by image decoding or assembly.
fn load_program(options: &Options) -> Result<Program, VMError> {
    let (name, data) = if options.input == "-" {
        let mut data = Vec::new();
        io::stdin()
            .read_to_end(&mut data)
            .map_err(|e| VMError::Io {
                path: "<stdin>".to_string(),
                source: e.to_string(),
            })?;
        ("<stdin>".to_string(), data)
    } else {
        let data = fs::read(&options.input).map_err(|e| VMError::Io {
            path: options.input.clone(),
            source: e.to_string(),
        })?;
        (options.input.clone(), data)
    };

    if Program::is_image(&data) {
        debug!("{name} is a program image");
        return Program::from_image(&data);
    }

    let source = String::from_utf8(data).map_err(|_| VMError::Io {
        path: name.clone(),
        source: "source is not valid UTF-8".to_string(),
    })?;
    let config = AssemblerConfig::for_profile(options.profile)
        .with_dialect(options.dialect)
        .with_label_resolution(options.label_resolution);
    assemble_source_with(&source, &name, &config)
}

const USAGE: &str = "\
provrb assembly runner

USAGE:
    {program} [OPTIONS] <file.pvb | image.pvbc | ->

ARGS:
    <file>    Source file or binary image; '-' reads source from stdin

OPTIONS:
    --embedded            Use the embedded profile (small limits, pin I/O)
    --stack-dialect       Arithmetic pops its operands from the stack
    --backward-labels     Labels must be declared before they are referenced
    -o, --output <image>  Write a binary image instead of running
    --listing             Print the program listing before running
    --registers           Print the register file after the run
    -q, --quiet           Hide log timestamps
    -h, --help            Print this help message

ENVIRONMENT:
    PROVRB_LOG            Minimum log level: debug, info, warn or error

EXAMPLES:
    # Assemble and run
    {program} demos/hello.pvb

    # Build an image, then run it
    {program} demos/countdown.pvb -o countdown.pvbc
    {program} countdown.pvbc
";

fn print_usage(program: &str) {
    info!("{}", USAGE.replace("{program}", program));
}
