use logos::Logos;

use super::ast::Statement;
use super::parser::Parser;
use super::token::Token;
use crate::compiler::Strictness;
use crate::error::{AssemblyError, AssemblyErrorKind};

/// One non-empty line of source after comment stripping.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceLine {
    /// 1-based line number in the original text.
    pub number: usize,
    pub label: Option<String>,
    /// `None` for a line that only carries a label. Such a line occupies no slot.
    pub statement: Option<Statement>,
}

impl SourceLine {
    pub fn occupies_slot(&self) -> bool {
        self.statement.is_some()
    }
}

/// A parsed assembly program, in source order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Program {
    pub lines: Vec<SourceLine>,
}

/// A label must lex as a single identifier, so register names like `sp` or `r1` are rejected.
fn is_identifier(label: &str) -> bool {
    let mut tokens = Token::lexer(label);

    matches!((tokens.next(), tokens.next()), (Some(Token::Identifier(_)), None))
}

fn parse_line(number: usize, text: &str) -> Result<Option<SourceLine>, AssemblyError> {
    let text = match text.find(';') {
        Some(comment) => &text[..comment],
        None => text,
    };

    let text = text.trim();

    if text.is_empty() {
        return Ok(None);
    }

    let (label, body) = match text.find(':') {
        Some(colon) => {
            let label = text[..colon].trim();

            if !is_identifier(label) {
                return Err(AssemblyError::new(
                    number,
                    AssemblyErrorKind::InvalidLabel(label.to_string()),
                ));
            }

            (Some(label.to_string()), text[colon + 1..].trim())
        }
        None => (None, text),
    };

    let statement = if body.is_empty() {
        None
    } else {
        Some(Parser::parse_statement(number, body)?)
    };

    Ok(Some(SourceLine {
        number,
        label,
        statement,
    }))
}

impl Program {
    /// Parses assembly source. Stops at the first line that can not be parsed.
    pub fn parse(input: &str) -> Result<Program, AssemblyError> {
        let mut lines = Vec::new();

        for (index, text) in input.lines().enumerate() {
            if let Some(line) = parse_line(index + 1, text)? {
                lines.push(line);
            }
        }

        Ok(Program { lines })
    }

    /// Number of words the program assembles into.
    pub fn instruction_count(&self) -> usize {
        self.lines.iter().filter(|line| line.occupies_slot()).count()
    }

    pub fn compile(&self) -> Result<crate::bytecode::Program, AssemblyError> {
        crate::compiler::compile(self)
    }

    pub fn compile_strict(&self) -> Result<crate::bytecode::Program, AssemblyError> {
        crate::compiler::compile_with_logger(self, None, Strictness::Strict)
    }
}
