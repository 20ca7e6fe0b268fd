//! Parsed form of a source line.

use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;

use crate::instruction::{AluOp, Condition, ImmediateOp, Register};

/// Every mnemonic understood by the assembler.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Mnemonic {
    Mov,
    Add,
    Sub,
    And,
    Or,
    Addi,
    Subi,
    Shr,
    Shl,
    Cmp,
    Jmp,
    Jeq,
    Jne,
    Jlt,
    Jge,
    Ldr,
    Str,
    Push,
    Pop,
    Halt,
}

const MNEMONIC_NAMES: [(&str, Mnemonic); 20] = [
    ("MOV", Mnemonic::Mov),
    ("ADD", Mnemonic::Add),
    ("SUB", Mnemonic::Sub),
    ("AND", Mnemonic::And),
    ("OR", Mnemonic::Or),
    ("ADDI", Mnemonic::Addi),
    ("SUBI", Mnemonic::Subi),
    ("SHR", Mnemonic::Shr),
    ("SHL", Mnemonic::Shl),
    ("CMP", Mnemonic::Cmp),
    ("JMP", Mnemonic::Jmp),
    ("JEQ", Mnemonic::Jeq),
    ("JNE", Mnemonic::Jne),
    ("JLT", Mnemonic::Jlt),
    ("JGE", Mnemonic::Jge),
    ("LDR", Mnemonic::Ldr),
    ("STR", Mnemonic::Str),
    ("PUSH", Mnemonic::Push),
    ("POP", Mnemonic::Pop),
    ("HALT", Mnemonic::Halt),
];

lazy_static! {
    static ref MNEMONICS: HashMap<&'static str, Mnemonic> = MNEMONIC_NAMES.iter().copied().collect();
}

impl Mnemonic {
    /// Looks up a mnemonic, ignoring case.
    pub fn lookup(word: &str) -> Option<Mnemonic> {
        MNEMONICS.get(word.to_uppercase().as_str()).copied()
    }

    /// The known mnemonic closest to `word`.
    pub fn suggest(word: &str) -> Option<&'static str> {
        crate::utils::closest(word, MNEMONIC_NAMES.iter().map(|(name, _)| *name))
    }

    pub fn name(&self) -> &'static str {
        MNEMONIC_NAMES
            .iter()
            .find(|(_, mnemonic)| mnemonic == self)
            .map(|(name, _)| *name)
            .unwrap_or("?")
    }

    pub(crate) fn alu_op(&self) -> Option<AluOp> {
        match self {
            Mnemonic::Add => Some(AluOp::Add),
            Mnemonic::Sub => Some(AluOp::Subtract),
            Mnemonic::And => Some(AluOp::And),
            Mnemonic::Or => Some(AluOp::Or),
            _ => None,
        }
    }

    pub(crate) fn immediate_op(&self) -> Option<ImmediateOp> {
        match self {
            Mnemonic::Addi => Some(ImmediateOp::Add),
            Mnemonic::Subi => Some(ImmediateOp::Subtract),
            Mnemonic::Shr => Some(ImmediateOp::ShiftRight),
            Mnemonic::Shl => Some(ImmediateOp::ShiftLeft),
            _ => None,
        }
    }

    /// `Some(None)` for `JMP`, `Some(Some(condition))` for the conditional jumps.
    pub(crate) fn jump_condition(&self) -> Option<Option<Condition>> {
        match self {
            Mnemonic::Jmp => Some(None),
            Mnemonic::Jeq => Some(Some(Condition::Equal)),
            Mnemonic::Jne => Some(Some(Condition::NotEqual)),
            Mnemonic::Jlt => Some(Some(Condition::Less)),
            Mnemonic::Jge => Some(Some(Condition::GreaterOrEqual)),
            _ => None,
        }
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An immediate operand that may need the symbol table to be resolved.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Immediate(i32),
    Label(String),
}

/// A line body after operand parsing, before label resolution.
///
/// Immediates are kept as written; range checks happen in the second pass.
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    /// A raw data word.
    Word(u16),

    /// Anything that does not start with a known mnemonic.
    Unknown(String),

    Move { rd: Register, value: Operand },

    Alu { op: AluOp, rd: Register, rm: Register, rn: Register },

    AluImmediate { op: ImmediateOp, rd: Register, rm: Register, immediate: i32 },

    Compare { rm: Register, rn: Register },

    /// `JMP` when `condition` is `None`. A numeric target is an absolute address.
    Jump { condition: Option<Condition>, target: Operand },

    Load { rd: Register, base: Register, offset: i32 },

    Store { rs: Register, base: Register, offset: i32 },

    Push { rs: Register },

    Pop { rd: Register },

    Halt,
}
