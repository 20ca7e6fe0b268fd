//! Tokens and a tokenizer for the body of a source line.

use logos::{Lexer, Logos};

use std::fmt;

/// Enumeration of all tokens that can appear after the label of a line.
#[derive(Logos, Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Input that matches none of the other variants.
    #[error]
    #[regex(r"[ \t\f\r\n]+", logos::skip)]
    Error,

    /// A register index. `R0`-`R15`, `SP` (`R14`) or `PC` (`R15`).
    ///
    /// The index is not validated by the lexer, `R99` is a register token with index 99.
    #[regex("[rR][0-9]+", register_index)]
    #[regex("(?i)sp", stack_pointer)]
    #[regex("(?i)pc", program_counter)]
    Register(u32),

    /// A decimal or `0x` prefixed hexadecimal number with an optional minus sign.
    #[regex("-?[0-9]+", decimal)]
    #[regex("-?0[xX][0-9a-fA-F]+", hexadecimal)]
    Number(i64),

    /// The literal marker (`#`) that may precede an immediate.
    #[token("#")]
    Hash,

    /// Token (`,`) that separates the operands of an instruction.
    #[token(",")]
    Comma,

    /// Token (`[`) that begins a memory operand. (Eg. `[R2, #4]`)
    #[token("[")]
    BracketOpen,

    /// Token (`]`) that ends a memory operand.
    #[token("]")]
    BracketClose,

    /// A mnemonic or a label.
    #[regex("[A-Za-z_][A-Za-z0-9_]*", Lexer::slice)]
    Identifier(&'a str),
}

fn register_index<'a>(lex: &mut Lexer<'a, Token<'a>>) -> Option<u32> {
    lex.slice()[1..].parse().ok()
}

fn stack_pointer<'a>(_lex: &mut Lexer<'a, Token<'a>>) -> Option<u32> {
    Some(14)
}

fn program_counter<'a>(_lex: &mut Lexer<'a, Token<'a>>) -> Option<u32> {
    Some(15)
}

fn decimal<'a>(lex: &mut Lexer<'a, Token<'a>>) -> Option<i64> {
    lex.slice().parse().ok()
}

fn hexadecimal<'a>(lex: &mut Lexer<'a, Token<'a>>) -> Option<i64> {
    let slice = lex.slice();

    let (negative, digits) = match slice.strip_prefix('-') {
        Some(rest) => (true, &rest[2..]),
        None => (false, &slice[2..]),
    };

    let value = i64::from_str_radix(digits, 16).ok()?;

    Some(if negative { -value } else { value })
}

impl<'t> fmt::Display for Token<'t> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::Error => write!(f, "<error>"),
            Token::Register(index) => write!(f, "R{}", index),
            Token::Number(value) => write!(f, "{}", value),
            Token::Hash => write!(f, "#"),
            Token::Comma => write!(f, ","),
            Token::BracketOpen => write!(f, "["),
            Token::BracketClose => write!(f, "]"),
            Token::Identifier(name) => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        Token::lexer(input).collect()
    }

    #[test]
    fn test_instruction_tokens() {
        assert_eq!(
            tokens("LDR r1, [SP, #-0x2]"),
            vec![
                Token::Identifier("LDR"),
                Token::Register(1),
                Token::Comma,
                Token::BracketOpen,
                Token::Register(14),
                Token::Comma,
                Token::Hash,
                Token::Number(-2),
                Token::BracketClose,
            ]
        );
    }

    #[test]
    fn test_register_like_identifiers() {
        assert_eq!(tokens("R1a"), vec![Token::Identifier("R1a")]);
        assert_eq!(tokens("spin"), vec![Token::Identifier("spin")]);
        assert_eq!(tokens("pc"), vec![Token::Register(15)]);
        assert_eq!(tokens("R99"), vec![Token::Register(99)]);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(tokens("42 -7 0x1F 0XfF"), vec![
            Token::Number(42),
            Token::Number(-7),
            Token::Number(0x1F),
            Token::Number(0xFF),
        ]);
    }
}
