use std::convert::TryFrom;
use std::fmt;

use clap::{App, Arg, ArgMatches};
use itertools::Itertools;
use slog::{o, Discard, Drain, Logger};
use slog_term::{FullFormat, TermDecorator};

use cpu16::{
    bytecode,
    compiler::{self, Strictness},
    error::AssemblyError,
    instruction::Instruction,
    symbolic,
};

enum Error {
    Read(String, std::io::Error),
    Write(String, std::io::Error),
    EmptyInput,
    Assembly(AssemblyError),
}

impl From<AssemblyError> for Error {
    fn from(e: AssemblyError) -> Error {
        Error::Assembly(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Read(path, e) => write!(f, "could not read {}: {}", path, e),
            Error::Write(path, e) => write!(f, "could not write {}: {}", path, e),
            Error::EmptyInput => write!(f, "the input file is empty"),
            Error::Assembly(e) => write!(f, "{}", e),
        }
    }
}

fn parse_arguments() -> ArgMatches<'static> {
    App::new("cpu16asm")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Assembles cpu16 source into an ADDR VALUE object file")
        .arg(Arg::with_name("input")
             .help("File containing assembly source")
             .value_name("INPUT")
             .required(true)
             .index(1))
        .arg(Arg::with_name("output")
             .help("Object file to write")
             .value_name("OUTPUT")
             .required(true)
             .index(2))
        .arg(Arg::with_name("strict")
             .help("Treat undefined labels, unknown mnemonics and oversized immediates as errors")
             .long("strict"))
        .arg(Arg::with_name("listing")
             .help("Print every assembled word with its disassembly")
             .long("listing"))
        .arg(Arg::with_name("verbose")
             .help("Log the assembler passes")
             .long("verbose")
             .short("v"))
        .get_matches()
}

fn logger(verbose: bool) -> Logger {
    if !verbose {
        return Logger::root(Discard, o!());
    }

    let decorator = TermDecorator::new().build();
    let drain = FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    Logger::root(drain, o!())
}

fn listing(program: &bytecode::Program) -> String {
    program
        .records
        .iter()
        .map(|record| {
            let text = match Instruction::try_from(record.value) {
                Ok(instruction) => instruction.to_string(),
                Err(_) => String::from("?"),
            };

            match program.source_line(record.address) {
                Some(line) => format!("{:04X} {:04X}  {:<24} ; line {}", record.address, record.value, text, line),
                None => format!("{:04X} {:04X}  {}", record.address, record.value, text),
            }
        })
        .join("\n")
}

fn assemble(args: &ArgMatches) -> Result<(), Error> {
    let input = args.value_of("input").unwrap_or_default();
    let output = args.value_of("output").unwrap_or_default();

    let strictness = if args.is_present("strict") {
        Strictness::Strict
    } else {
        Strictness::Lenient
    };

    let source = std::fs::read_to_string(input).map_err(|e| Error::Read(input.to_string(), e))?;

    let line_count = source.lines().count();
    println!("Lines read: {}", line_count);

    if source.trim().is_empty() {
        return Err(Error::EmptyInput);
    }

    let logger = logger(args.is_present("verbose"));

    let symbolic = symbolic::Program::parse(&source)?;
    let program = compiler::compile_with_logger(&symbolic, logger, strictness)?;

    if args.is_present("listing") {
        println!("{}", listing(&program));
    }

    std::fs::write(output, program.to_object()).map_err(|e| Error::Write(output.to_string(), e))?;

    println!(
        "Done: {} words, {} labels. Wrote {}.",
        program.records.len(),
        program.symbol_table.len(),
        output,
    );

    Ok(())
}

fn main() {
    let args = parse_arguments();

    if let Err(error) = assemble(&args) {
        eprintln!("error: {}", error);
        std::process::exit(1);
    }
}
