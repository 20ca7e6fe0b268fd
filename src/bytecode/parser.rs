use std::collections::HashSet;
use std::fmt;
use std::result::Result as StdResult;

use nom::{
    bytes::complete::take_while_m_n,
    character::complete::{line_ending, space0, space1},
    combinator::{map, map_res},
    error::context,
    sequence::separated_pair,
    IResult,
};

use super::program::Record;

/// Object format specific reasons for a [ParseError].
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    /// The same address appears on two lines.
    DuplicateAddress(u16),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::DuplicateAddress(address) => {
                write!(f, "address {:04X} is defined more than once", address)
            }
        }
    }
}

pub type ParseError = crate::error::ParseError<ErrorKind>;
type Result<'a, T> = IResult<&'a str, T, ParseError>;

fn sp(input: &str) -> Result<&str> {
    space0(input)
}

fn newline(input: &str) -> Result<&str> {
    line_ending(input)
}

fn take_hex_word(input: &str) -> Result<u16> {
    map_res(
        take_while_m_n(4, 4, |c: char| c.is_ascii_hexdigit()),
        |s| u16::from_str_radix(s, 16),
    )(input)
}

fn parse_record(input: &str) -> Result<Record> {
    context(
        "record",
        map(
            separated_pair(take_hex_word, space1, take_hex_word),
            |(address, value)| Record { address, value },
        ),
    )(input)
}

fn parse_records(mut input: &str) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    let mut seen = HashSet::new();

    loop {
        let (rest, _) = sp(input)?;

        if rest.is_empty() {
            return Ok((rest, records));
        }

        if let Ok((rest, _)) = newline(rest) {
            input = rest;
            continue;
        }

        let (after, record) = parse_record(rest)?;

        if !seen.insert(record.address) {
            let kind = ErrorKind::DuplicateAddress(record.address);
            return Err(nom::Err::Failure(ParseError::from_kind(rest, kind)));
        }

        records.push(record);

        let (after, _) = sp(after)?;

        if after.is_empty() {
            return Ok((after, records));
        }

        let (after, _) = context("end of line", newline)(after)?;
        input = after;
    }
}

pub(crate) fn parse_object_file(input: &str) -> StdResult<Vec<Record>, ParseError> {
    match parse_records(input) {
        Ok((_, records)) => Ok(records),
        Err(nom::Err::Error(err)) | Err(nom::Err::Failure(err)) => Err(err),
        Err(nom::Err::Incomplete(_)) => Err(ParseError::incomplete()),
    }
}
