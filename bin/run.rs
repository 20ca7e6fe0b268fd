use std::fmt;
use std::io::BufRead;

use clap::{App, Arg, ArgMatches};
use slog::{o, Discard, Drain, Logger};
use slog_term::{FullFormat, TermDecorator};

use cpu16::{
    bytecode,
    emulator::{Context, Emulator, ExecutionError, LoadError, Memory, StdIo},
    inspector::StateDump,
};

enum Error {
    IO(String, std::io::Error),
    Parse(String),
    Load(LoadError),
    Breakpoint(String),
    Execution(ExecutionError),
}

impl From<LoadError> for Error {
    fn from(e: LoadError) -> Error {
        Error::Load(e)
    }
}

impl From<ExecutionError> for Error {
    fn from(e: ExecutionError) -> Error {
        Error::Execution(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::IO(path, e) => write!(f, "could not open {}: {}", path, e),
            Error::Parse(e) => write!(f, "invalid object file {}", e),
            Error::Load(e) => write!(f, "{}", e),
            Error::Breakpoint(arg) => write!(f, "invalid breakpoint address `{}`", arg),
            Error::Execution(e) => write!(f, "{}", e),
        }
    }
}

fn parse_arguments() -> ArgMatches<'static> {
    App::new("cpu16run")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Executes a cpu16 object file")
        .arg(Arg::with_name("object")
             .help("Object file with ADDR VALUE records")
             .value_name("OBJECT")
             .required(true)
             .index(1))
        .arg(Arg::with_name("breakpoints")
             .help("Hexadecimal addresses to pause at")
             .value_name("BREAKPOINT")
             .multiple(true)
             .index(2))
        .arg(Arg::with_name("verbose")
             .help("Trace every executed instruction")
             .long("verbose")
             .short("v"))
        .get_matches()
}

fn parse_breakpoint(arg: &str) -> Result<u16, Error> {
    let digits = arg
        .strip_prefix("0x")
        .or_else(|| arg.strip_prefix("0X"))
        .unwrap_or(arg);

    u16::from_str_radix(digits, 16).map_err(|_| Error::Breakpoint(arg.to_string()))
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

/// Prints the state and waits for Enter.
fn pause(context: &Context, memory: &Memory) {
    println!("Breakpoint at 0x{:04X}", context.pc());
    print!("{}", StateDump::new(context, memory));
    println!("Press Enter to continue...");

    let mut line = String::new();
    let _ = std::io::stdin().lock().read_line(&mut line);
}

fn run(args: &ArgMatches) -> Result<(), Error> {
    let path = args.value_of("object").unwrap_or_default();

    let breakpoints = args
        .values_of("breakpoints")
        .into_iter()
        .flatten()
        .map(parse_breakpoint)
        .collect::<Result<Vec<_>, _>>()?;

    let file = std::fs::read_to_string(path).map_err(|e| Error::IO(path.to_string(), e))?;

    let program = bytecode::Program::parse(&file)
        .map_err(|e| Error::Parse(e.verbose(&file).to_string()))?;

    let mut memory = Memory::default();
    memory.load_program(&program)?;

    let mut emulator = Emulator::new(memory, StdIo)
        .with_logger(logger(args.is_present("verbose")))
        .with_breakpoints(breakpoints);

    emulator.set_breakpoint_handler(pause);

    let result = emulator.run();

    print!("{}", StateDump::of(&emulator));

    result?;

    Ok(())
}

fn main() {
    let args = parse_arguments();

    if let Err(error) = run(&args) {
        eprintln!("error: {}", error);
        std::process::exit(1);
    }
}
