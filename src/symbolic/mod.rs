//! Parsing and storing symbolic assembly programs.

pub mod ast;
pub mod parser;
pub mod program;
pub mod token;

pub use self::ast::{Mnemonic, Operand, Statement};
pub use self::program::{Program, SourceLine};
