//! Parser turning the body of a source line into a [Statement].

use std::convert::TryFrom;

use logos::Logos;

use super::ast::{Mnemonic, Operand, Statement};
use super::token::Token;
use crate::codec::FieldError;
use crate::error::{AssemblyError, AssemblyErrorKind};
use crate::instruction::Register;

type Result<T> = std::result::Result<T, AssemblyErrorKind>;

/// Parser for a single line body. The label, if any, has already been removed.
pub struct Parser<'a> {
    tokens: Vec<(Token<'a>, &'a str)>,
    position: usize,
}

impl<'a> Parser<'a> {
    pub fn new(body: &'a str) -> Parser<'a> {
        let mut lexer = Token::lexer(body);
        let mut tokens = Vec::new();

        while let Some(token) = lexer.next() {
            tokens.push((token, lexer.slice()));
        }

        Parser {
            tokens,
            position: 0,
        }
    }

    /// Parses a whole line body.
    ///
    /// # Parameters
    /// - `line`: The 1-based source line, used for error reporting.
    pub fn parse_statement(line: usize, body: &'a str) -> std::result::Result<Statement, AssemblyError> {
        Parser::new(body)
            .statement()
            .map_err(|kind| AssemblyError::new(line, kind))
    }

    fn peek(&self) -> Option<&(Token<'a>, &'a str)> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<(Token<'a>, &'a str)> {
        let token = self.tokens.get(self.position).cloned();

        if token.is_some() {
            self.position += 1;
        }

        token
    }

    fn eat(&mut self, expected: &Token<'a>) -> bool {
        match self.peek() {
            Some((token, _)) if token == expected => {
                self.position += 1;
                true
            }
            _ => false,
        }
    }

    fn statement(&mut self) -> Result<Statement> {
        let (first, text) = match self.peek() {
            Some(token) => token.clone(),
            None => return Err(AssemblyErrorKind::UnexpectedEnd("instruction")),
        };

        let statement = match first {
            Token::Number(_) => Statement::Word(self.word()?),
            Token::Identifier(word) => match Mnemonic::lookup(word) {
                Some(mnemonic) => {
                    self.position += 1;
                    self.operands(mnemonic)?
                }
                None => return Ok(Statement::Unknown(word.to_string())),
            },
            _ => return Ok(Statement::Unknown(text.to_string())),
        };

        self.end()?;

        Ok(statement)
    }

    fn operands(&mut self, mnemonic: Mnemonic) -> Result<Statement> {
        if let Some(op) = mnemonic.alu_op() {
            let (rd, rm, rn) = self.three_registers()?;
            return Ok(Statement::Alu { op, rd, rm, rn });
        }

        if let Some(op) = mnemonic.immediate_op() {
            let rd = self.register()?;
            self.comma()?;
            let rm = self.register()?;
            self.comma()?;
            let immediate = self.immediate()?;
            return Ok(Statement::AluImmediate { op, rd, rm, immediate });
        }

        if let Some(condition) = mnemonic.jump_condition() {
            let target = self.operand()?;
            return Ok(Statement::Jump { condition, target });
        }

        let statement = match mnemonic {
            Mnemonic::Mov => {
                let rd = self.register()?;
                self.comma()?;
                let value = self.operand()?;
                Statement::Move { rd, value }
            }
            Mnemonic::Cmp => {
                let rm = self.register()?;
                self.comma()?;
                let rn = self.register()?;
                Statement::Compare { rm, rn }
            }
            Mnemonic::Ldr => {
                let rd = self.register()?;
                self.comma()?;
                let (base, offset) = self.memory()?;
                Statement::Load { rd, base, offset }
            }
            Mnemonic::Str => {
                let rs = self.register()?;
                self.comma()?;
                let (base, offset) = self.memory()?;
                Statement::Store { rs, base, offset }
            }
            Mnemonic::Push => Statement::Push { rs: self.register()? },
            Mnemonic::Pop => Statement::Pop { rd: self.register()? },
            Mnemonic::Halt => Statement::Halt,
            other => unreachable!("mnemonic {} has no operand parser", other),
        };

        Ok(statement)
    }

    fn three_registers(&mut self) -> Result<(Register, Register, Register)> {
        let rd = self.register()?;
        self.comma()?;
        let rm = self.register()?;
        self.comma()?;
        let rn = self.register()?;

        Ok((rd, rm, rn))
    }

    fn register(&mut self) -> Result<Register> {
        match self.next() {
            Some((Token::Register(index), text)) => {
                Register::new(index).map_err(|_| AssemblyErrorKind::InvalidRegister(text.to_string()))
            }
            Some((Token::Identifier(text), _)) | Some((Token::Error, text)) => {
                Err(AssemblyErrorKind::InvalidRegister(text.to_string()))
            }
            Some((_, text)) => Err(AssemblyErrorKind::UnexpectedToken {
                expected: "register",
                found: text.to_string(),
            }),
            None => Err(AssemblyErrorKind::UnexpectedEnd("register")),
        }
    }

    fn comma(&mut self) -> Result<()> {
        self.expect(Token::Comma, "`,`")
    }

    fn expect(&mut self, expected: Token<'a>, description: &'static str) -> Result<()> {
        match self.next() {
            Some((token, _)) if token == expected => Ok(()),
            Some((_, text)) => Err(AssemblyErrorKind::UnexpectedToken {
                expected: description,
                found: text.to_string(),
            }),
            None => Err(AssemblyErrorKind::UnexpectedEnd(description)),
        }
    }

    fn number(&mut self) -> Result<i32> {
        match self.next() {
            Some((Token::Number(value), text)) => {
                i32::try_from(value).map_err(|_| AssemblyErrorKind::InvalidImmediate(text.to_string()))
            }
            Some((Token::Error, text)) | Some((Token::Identifier(text), _)) => {
                Err(AssemblyErrorKind::InvalidImmediate(text.to_string()))
            }
            Some((_, text)) => Err(AssemblyErrorKind::UnexpectedToken {
                expected: "immediate",
                found: text.to_string(),
            }),
            None => Err(AssemblyErrorKind::UnexpectedEnd("immediate")),
        }
    }

    /// `#42`, `42`, `#0x2A`
    fn immediate(&mut self) -> Result<i32> {
        self.eat(&Token::Hash);
        self.number()
    }

    /// An immediate or a label, with an optional `#`.
    fn operand(&mut self) -> Result<Operand> {
        self.eat(&Token::Hash);

        match self.peek() {
            Some((Token::Identifier(label), _)) => {
                let label = label.to_string();
                self.position += 1;
                Ok(Operand::Label(label))
            }
            _ => self.number().map(Operand::Immediate),
        }
    }

    /// `[Rm, #offset]` or `[Rm]`
    fn memory(&mut self) -> Result<(Register, i32)> {
        self.expect(Token::BracketOpen, "`[`")?;
        let base = self.register()?;

        let offset = if self.eat(&Token::Comma) {
            self.immediate()?
        } else {
            0
        };

        self.expect(Token::BracketClose, "`]`")?;

        Ok((base, offset))
    }

    /// A raw data word, accepted as either a signed or an unsigned 16-bit number.
    fn word(&mut self) -> Result<u16> {
        let value = self.number()?;

        if value < i16::min_value() as i32 || value > u16::max_value() as i32 {
            return Err(FieldError::ImmediateOutOfRange { value, width: 16 }.into());
        }

        Ok(value as u16)
    }

    fn end(&mut self) -> Result<()> {
        match self.next() {
            None => Ok(()),
            Some((_, text)) => Err(AssemblyErrorKind::UnexpectedToken {
                expected: "end of line",
                found: text.to_string(),
            }),
        }
    }
}
