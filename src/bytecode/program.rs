use std::collections::HashMap;
use std::fmt;

use super::parser::{parse_object_file, ParseError};
use crate::symbol_table::SymbolTable;

/// A single `ADDR VALUE` line of an object file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub address: u16,
    pub value: u16,
}

/// An assembled program.
///
/// Programs produced by the compiler carry the symbol table and a map from addresses to
/// source lines. Programs read from an object file only have the records.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub records: Vec<Record>,
    pub symbol_table: SymbolTable,
    pub source_map: HashMap<u16, usize>,
}

impl Program {
    /// Parses the text of an object file.
    pub fn parse(input: &str) -> Result<Program, ParseError> {
        Ok(Program {
            records: parse_object_file(input)?,
            ..Program::default()
        })
    }

    /// The source line an address was assembled from, if known.
    pub fn source_line(&self, address: u16) -> Option<usize> {
        self.source_map.get(&address).copied()
    }

    /// Renders the object file text, one upper-case `AAAA VVVV` record per line.
    pub fn to_object(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for record in &self.records {
            writeln!(f, "{:04X} {:04X}", record.address, record.value)?;
        }

        Ok(())
    }
}
