//! Error types shared by the parsers and the assembler.

use std::fmt::{self, Display};

use nom::error::ErrorKind as NomErrorKind;
use thiserror::Error;

use crate::codec::FieldError;

#[derive(Debug, Clone, PartialEq)]
enum InnerError<Kind> {
    Incomplete,
    Context(&'static str),
    Other(Kind),
    Nom(NomErrorKind),
}

impl<Kind: Display> fmt::Display for InnerError<Kind> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InnerError::Context(ctx) => write!(f, "invalid {}", ctx),
            InnerError::Nom(_) => write!(f, "unexpected input"),
            InnerError::Other(kind) => fmt::Display::fmt(kind, f),
            InnerError::Incomplete => write!(f, "expected more input"),
        }
    }
}

/// Error type that contains the reason of the error and the unconsumed input.
///
/// The first entry of the stack is the innermost failure. For location information see
/// [ParseError::verbose].
#[derive(Clone, Debug, PartialEq)]
pub struct ParseError<Kind> {
    stack: Vec<(String, InnerError<Kind>)>,
}

impl<Kind> ParseError<Kind> {
    pub(crate) fn from_kind(input: &str, kind: Kind) -> ParseError<Kind> {
        ParseError {
            stack: vec![(input.to_string(), InnerError::Other(kind))],
        }
    }

    pub(crate) fn incomplete() -> ParseError<Kind> {
        ParseError {
            stack: vec![(String::new(), InnerError::Incomplete)],
        }
    }

    /// Returns the domain specific reason of the error, if the error has one.
    pub fn kind(&self) -> Option<&Kind> {
        self.stack.iter().find_map(|(_, inner)| match inner {
            InnerError::Other(kind) => Some(kind),
            _ => None,
        })
    }

    /// Calculates the error location from the unconsumed input and the original input buffer.
    ///
    /// # Parameters
    /// - `input`: The original input buffer or an exact copy of it.
    pub fn verbose(self, input: &str) -> VerboseParseError<Kind> {
        let (rest, kind) = self
            .stack
            .into_iter()
            .next()
            .unwrap_or((String::new(), InnerError::Incomplete));

        let offset = input.len().saturating_sub(rest.len());
        let consumed = &input[..offset];

        let line = consumed.matches('\n').count() + 1;
        let column = consumed
            .rfind('\n')
            .map(|newline| offset - newline)
            .unwrap_or(offset + 1);

        let rest = input[offset..]
            .lines()
            .next()
            .unwrap_or("")
            .chars()
            .take(20)
            .collect();

        VerboseParseError {
            line,
            column,
            kind,
            rest,
        }
    }
}

impl<Kind: Display> fmt::Display for ParseError<Kind> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (input, kind) = &self.stack[0];
        let snippet: String = input.lines().next().unwrap_or("").chars().take(20).collect();

        write!(f, "{} at: '{}'", kind, snippet)
    }
}

impl<Kind: Display + fmt::Debug> std::error::Error for ParseError<Kind> {}

impl<Kind> nom::error::ParseError<&str> for ParseError<Kind> {
    fn from_error_kind(input: &str, kind: NomErrorKind) -> Self {
        ParseError {
            stack: vec![(input.to_string(), InnerError::Nom(kind))],
        }
    }

    fn append(input: &str, kind: NomErrorKind, mut other: Self) -> Self {
        other.stack.push((input.to_string(), InnerError::Nom(kind)));
        other
    }

    fn add_context(input: &str, ctx: &'static str, mut other: Self) -> Self {
        other.stack.push((input.to_string(), InnerError::Context(ctx)));
        other
    }
}

/// Error type containing location information in addition to the reason of the error.
///
/// Created from a [ParseError] with [ParseError::verbose].
#[derive(Clone, Debug)]
pub struct VerboseParseError<Kind> {
    /// The line number of the error location, starting from 1.
    pub line: usize,
    /// The column number of the error location, starting from 1.
    pub column: usize,
    kind: InnerError<Kind>,
    rest: String,
}

impl<Kind: Display> fmt::Display for VerboseParseError<Kind> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "at line {} col {}: {}, at '{}'",
            self.line, self.column, self.kind, self.rest
        )
    }
}

fn hint(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(suggestion) => format!(", did you mean `{}`?", suggestion),
        None => String::new(),
    }
}

/// Reasons for rejecting a line of assembly source.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssemblyErrorKind {
    #[error("invalid register `{0}`")]
    InvalidRegister(String),

    #[error("invalid immediate `{0}`")]
    InvalidImmediate(String),

    #[error("invalid label name `{0}`")]
    InvalidLabel(String),

    #[error("expected {expected}, found `{found}`")]
    UnexpectedToken { expected: &'static str, found: String },

    #[error("expected {0}, found end of line")]
    UnexpectedEnd(&'static str),

    #[error("label `{label}` is already defined on line {first}")]
    DuplicateLabel { label: String, first: usize },

    #[error("undefined label `{label}`{}", hint(.suggestion))]
    UndefinedLabel { label: String, suggestion: Option<String> },

    #[error("unknown mnemonic `{mnemonic}`{}", hint(.suggestion))]
    UnknownMnemonic { mnemonic: String, suggestion: Option<String> },

    #[error("program does not fit in the 16-bit address space")]
    ProgramTooLarge,

    #[error(transparent)]
    Field(#[from] FieldError),
}

/// An [AssemblyErrorKind] together with the 1-based source line it was found on.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("line {line}: {kind}")]
pub struct AssemblyError {
    pub line: usize,
    pub kind: AssemblyErrorKind,
}

impl AssemblyError {
    pub fn new(line: usize, kind: AssemblyErrorKind) -> AssemblyError {
        AssemblyError { line, kind }
    }
}
