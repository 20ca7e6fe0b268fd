//! Parsing and writing the `ADDR VALUE` object format.

mod parser;
mod program;

pub use self::parser::{ErrorKind, ParseError};
pub use self::program::{Program, Record};
