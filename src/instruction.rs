//! Types for representing instructions and their parts.

use std::convert::TryFrom;
use std::fmt;

use thiserror::Error;

use crate::codec::{
    self, FieldError, CONDITION_SHIFT, IMMEDIATE_SHIFT, OPCODE_SHIFT, RD_SHIFT, REGISTER_WIDTH,
    RM_SHIFT, RN_SHIFT,
};

/// The word that stops the processor.
pub const HALT_WORD: u16 = 0xFFFF;

/// One of the sixteen general purpose registers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Register(u8);

impl Register {
    /// The stack pointer, `R14`.
    pub const SP: Register = Register(14);

    /// The program counter, `R15`.
    pub const PC: Register = Register(15);

    /// Creates a register from its index, failing if the index is outside `0..=15`.
    pub fn new<T: Into<i64>>(index: T) -> Result<Register, FieldError> {
        codec::encode_register_field(index).map(|field| Register(field as u8))
    }

    /// Creates a register from the low four bits of a field value.
    pub fn from_field(field: u16) -> Register {
        Register((field & 0xF) as u8)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }

    fn field(&self) -> u16 {
        self.0 as u16
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// Condition codes of the conditional jump family, in encoding order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    /// `JEQ`, taken if the zero flag is set.
    Equal,
    /// `JNE`, taken if the zero flag is clear.
    NotEqual,
    /// `JLT`, taken if the zero flag is clear and the carry flag is set.
    Less,
    /// `JGE`, taken if the zero flag is set or the carry flag is clear.
    GreaterOrEqual,
}

impl Condition {
    pub fn from_bits(bits: u16) -> Condition {
        match bits & 0b11 {
            0 => Condition::Equal,
            1 => Condition::NotEqual,
            2 => Condition::Less,
            _ => Condition::GreaterOrEqual,
        }
    }

    pub fn as_bits(&self) -> u16 {
        match self {
            Condition::Equal => 0,
            Condition::NotEqual => 1,
            Condition::Less => 2,
            Condition::GreaterOrEqual => 3,
        }
    }

    /// Evaluates the condition against the zero and carry flags.
    pub fn holds(&self, zero: bool, carry: bool) -> bool {
        match self {
            Condition::Equal => zero,
            Condition::NotEqual => !zero,
            Condition::Less => !zero && carry,
            Condition::GreaterOrEqual => zero || !carry,
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Condition::Equal => "JEQ",
            Condition::NotEqual => "JNE",
            Condition::Less => "JLT",
            Condition::GreaterOrEqual => "JGE",
        }
    }
}

/// Operations of the register-register ALU family.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Subtract,
    And,
    Or,
}

/// Operations of the register-immediate ALU family.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ImmediateOp {
    Add,
    Subtract,
    ShiftRight,
    ShiftLeft,
}

/// The opcode nibble, stored in bits 0-3 of every instruction word.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OpCode {
    Jump,
    Branch,
    Load,
    Store,
    Move,
    Add,
    AddImmediate,
    Subtract,
    SubtractImmediate,
    And,
    Or,
    ShiftRight,
    ShiftLeft,
    Compare,
    Push,
    /// Also used by [HALT](Instruction::Halt), which is the all-ones word.
    Pop,
}

impl OpCode {
    pub fn as_nibble(&self) -> u16 {
        match self {
            OpCode::Jump => 0x0,
            OpCode::Branch => 0x1,
            OpCode::Load => 0x2,
            OpCode::Store => 0x3,
            OpCode::Move => 0x4,
            OpCode::Add => 0x5,
            OpCode::AddImmediate => 0x6,
            OpCode::Subtract => 0x7,
            OpCode::SubtractImmediate => 0x8,
            OpCode::And => 0x9,
            OpCode::Or => 0xA,
            OpCode::ShiftRight => 0xB,
            OpCode::ShiftLeft => 0xC,
            OpCode::Compare => 0xD,
            OpCode::Push => 0xE,
            OpCode::Pop => 0xF,
        }
    }

    pub fn from_nibble(nibble: u16) -> Option<OpCode> {
        let opcode = match nibble {
            0x0 => OpCode::Jump,
            0x1 => OpCode::Branch,
            0x2 => OpCode::Load,
            0x3 => OpCode::Store,
            0x4 => OpCode::Move,
            0x5 => OpCode::Add,
            0x6 => OpCode::AddImmediate,
            0x7 => OpCode::Subtract,
            0x8 => OpCode::SubtractImmediate,
            0x9 => OpCode::And,
            0xA => OpCode::Or,
            0xB => OpCode::ShiftRight,
            0xC => OpCode::ShiftLeft,
            0xD => OpCode::Compare,
            0xE => OpCode::Push,
            0xF => OpCode::Pop,
            _ => return None,
        };

        Some(opcode)
    }
}

/// Every field of an instruction word, extracted regardless of the opcode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Fields {
    pub opcode: u16,
    pub rd: Register,
    pub rm: Register,
    pub rn: Register,
    /// Bits 4-7, the ALU and load offset.
    pub imm4: u16,
    /// Bits 12-15, the store offset.
    pub imm4_high: u16,
    pub imm8: i16,
    pub imm10: i16,
    pub imm12: i16,
    pub condition: Condition,
}

impl Fields {
    pub fn unpack(word: u16) -> Fields {
        Fields {
            opcode: codec::field(word, OPCODE_SHIFT, 4),
            rd: Register::from_field(codec::field(word, RD_SHIFT, REGISTER_WIDTH)),
            rm: Register::from_field(codec::field(word, RM_SHIFT, REGISTER_WIDTH)),
            rn: Register::from_field(codec::field(word, RN_SHIFT, REGISTER_WIDTH)),
            imm4: codec::field(word, IMMEDIATE_SHIFT, 4),
            imm4_high: codec::field(word, RD_SHIFT, 4),
            imm8: codec::decode_immediate(codec::field(word, IMMEDIATE_SHIFT, 8), 8),
            imm10: codec::decode_immediate(codec::field(word, IMMEDIATE_SHIFT, 10), 10),
            imm12: codec::decode_immediate(codec::field(word, IMMEDIATE_SHIFT, 12), 12),
            condition: Condition::from_bits(codec::field(word, CONDITION_SHIFT, 2)),
        }
    }
}

/// A decoded instruction.
///
/// Immediates are stored the way the processor consumes them: jump offsets and the `MOV`
/// operand are sign extended, memory offsets and ALU immediates are unsigned.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// `JMP`: adds `offset` to the already incremented program counter.
    Jump { offset: i16 },

    /// `JEQ`, `JNE`, `JLT`, `JGE`: like [Jump](Instruction::Jump), if the condition holds.
    Branch { condition: Condition, offset: i16 },

    /// `LDR Rd, [Rm, #offset]`
    Load { rd: Register, base: Register, offset: u16 },

    /// `STR Rn, [Rm, #offset]`
    Store { rs: Register, base: Register, offset: u16 },

    /// `MOV Rd, #immediate`
    Move { rd: Register, immediate: i16 },

    /// `ADD`, `SUB`, `AND`, `OR`: `Rd = Rm op Rn`.
    Alu { op: AluOp, rd: Register, rm: Register, rn: Register },

    /// `ADDI`, `SUBI`, `SHR`, `SHL`: `Rd = Rm op immediate`.
    AluImmediate { op: ImmediateOp, rd: Register, rm: Register, immediate: u16 },

    /// `CMP Rm, Rn`: sets the flags like `SUB` without storing the result.
    Compare { rm: Register, rn: Register },

    /// `PUSH Rn`
    Push { rs: Register },

    /// `POP Rd`
    Pop { rd: Register },

    /// `HALT`
    Halt,
}

impl Instruction {
    pub fn opcode(&self) -> OpCode {
        match self {
            Instruction::Jump { .. } => OpCode::Jump,
            Instruction::Branch { .. } => OpCode::Branch,
            Instruction::Load { .. } => OpCode::Load,
            Instruction::Store { .. } => OpCode::Store,
            Instruction::Move { .. } => OpCode::Move,
            Instruction::Alu { op, .. } => match op {
                AluOp::Add => OpCode::Add,
                AluOp::Subtract => OpCode::Subtract,
                AluOp::And => OpCode::And,
                AluOp::Or => OpCode::Or,
            },
            Instruction::AluImmediate { op, .. } => match op {
                ImmediateOp::Add => OpCode::AddImmediate,
                ImmediateOp::Subtract => OpCode::SubtractImmediate,
                ImmediateOp::ShiftRight => OpCode::ShiftRight,
                ImmediateOp::ShiftLeft => OpCode::ShiftLeft,
            },
            Instruction::Compare { .. } => OpCode::Compare,
            Instruction::Push { .. } => OpCode::Push,
            Instruction::Pop { .. } | Instruction::Halt => OpCode::Pop,
        }
    }

    /// The assembly mnemonic of the instruction.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Jump { .. } => "JMP",
            Instruction::Branch { condition, .. } => condition.mnemonic(),
            Instruction::Load { .. } => "LDR",
            Instruction::Store { .. } => "STR",
            Instruction::Move { .. } => "MOV",
            Instruction::Alu { op, .. } => match op {
                AluOp::Add => "ADD",
                AluOp::Subtract => "SUB",
                AluOp::And => "AND",
                AluOp::Or => "OR",
            },
            Instruction::AluImmediate { op, .. } => match op {
                ImmediateOp::Add => "ADDI",
                ImmediateOp::Subtract => "SUBI",
                ImmediateOp::ShiftRight => "SHR",
                ImmediateOp::ShiftLeft => "SHL",
            },
            Instruction::Compare { .. } => "CMP",
            Instruction::Push { .. } => "PUSH",
            Instruction::Pop { .. } => "POP",
            Instruction::Halt => "HALT",
        }
    }

    /// Packs the instruction into a word. Immediates wider than their field are truncated.
    pub fn encode(&self) -> u16 {
        use codec::place;

        let opcode = place(self.opcode().as_nibble(), OPCODE_SHIFT, 4);

        let operands = match *self {
            Instruction::Halt => return HALT_WORD,
            Instruction::Jump { offset } => place(offset as u16, IMMEDIATE_SHIFT, 12),
            Instruction::Branch { condition, offset } => {
                place(condition.as_bits(), CONDITION_SHIFT, 2)
                    | place(offset as u16, IMMEDIATE_SHIFT, 10)
            }
            Instruction::Load { rd, base, offset } => {
                place(rd.field(), RD_SHIFT, 4)
                    | place(base.field(), RM_SHIFT, 4)
                    | place(offset, IMMEDIATE_SHIFT, 4)
            }
            Instruction::Store { rs, base, offset } => {
                place(offset, RD_SHIFT, 4)
                    | place(base.field(), RM_SHIFT, 4)
                    | place(rs.field(), RN_SHIFT, 4)
            }
            Instruction::Move { rd, immediate } => {
                place(rd.field(), RD_SHIFT, 4) | place(immediate as u16, IMMEDIATE_SHIFT, 8)
            }
            Instruction::Alu { rd, rm, rn, .. } => {
                place(rd.field(), RD_SHIFT, 4)
                    | place(rm.field(), RM_SHIFT, 4)
                    | place(rn.field(), RN_SHIFT, 4)
            }
            Instruction::AluImmediate { rd, rm, immediate, .. } => {
                place(rd.field(), RD_SHIFT, 4)
                    | place(rm.field(), RM_SHIFT, 4)
                    | place(immediate, IMMEDIATE_SHIFT, 4)
            }
            Instruction::Compare { rm, rn } => {
                place(rm.field(), RM_SHIFT, 4) | place(rn.field(), RN_SHIFT, 4)
            }
            Instruction::Push { rs } => place(rs.field(), RN_SHIFT, 4),
            Instruction::Pop { rd } => place(rd.field(), RD_SHIFT, 4),
        };

        operands | opcode
    }
}

/// Error returned when a word does not decode into an [Instruction].
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum DecodeError {
    #[error("unknown opcode {opcode:#x} in word {word:#06x}")]
    UnknownOpcode { word: u16, opcode: u16 },
}

impl TryFrom<u16> for Instruction {
    type Error = DecodeError;

    fn try_from(word: u16) -> Result<Instruction, DecodeError> {
        if word == HALT_WORD {
            return Ok(Instruction::Halt);
        }

        let fields = Fields::unpack(word);

        let opcode = OpCode::from_nibble(fields.opcode).ok_or(DecodeError::UnknownOpcode {
            word,
            opcode: fields.opcode,
        })?;

        let Fields { rd, rm, rn, imm4, .. } = fields;

        let instruction = match opcode {
            OpCode::Jump => Instruction::Jump { offset: fields.imm12 },
            OpCode::Branch => Instruction::Branch {
                condition: fields.condition,
                offset: fields.imm10,
            },
            OpCode::Load => Instruction::Load { rd, base: rm, offset: imm4 },
            OpCode::Store => Instruction::Store { rs: rn, base: rm, offset: fields.imm4_high },
            OpCode::Move => Instruction::Move { rd, immediate: fields.imm8 },
            OpCode::Add => Instruction::Alu { op: AluOp::Add, rd, rm, rn },
            OpCode::Subtract => Instruction::Alu { op: AluOp::Subtract, rd, rm, rn },
            OpCode::And => Instruction::Alu { op: AluOp::And, rd, rm, rn },
            OpCode::Or => Instruction::Alu { op: AluOp::Or, rd, rm, rn },
            OpCode::AddImmediate => Instruction::AluImmediate {
                op: ImmediateOp::Add,
                rd,
                rm,
                immediate: imm4,
            },
            OpCode::SubtractImmediate => Instruction::AluImmediate {
                op: ImmediateOp::Subtract,
                rd,
                rm,
                immediate: imm4,
            },
            OpCode::ShiftRight => Instruction::AluImmediate {
                op: ImmediateOp::ShiftRight,
                rd,
                rm,
                immediate: imm4,
            },
            OpCode::ShiftLeft => Instruction::AluImmediate {
                op: ImmediateOp::ShiftLeft,
                rd,
                rm,
                immediate: imm4,
            },
            OpCode::Compare => Instruction::Compare { rm, rn },
            OpCode::Push => Instruction::Push { rs: rn },
            OpCode::Pop => Instruction::Pop { rd },
        };

        Ok(instruction)
    }
}

impl From<Instruction> for u16 {
    fn from(instruction: Instruction) -> u16 {
        instruction.encode()
    }
}

fn signed_offset(offset: i16) -> String {
    if offset < 0 {
        offset.to_string()
    } else {
        format!("+{}", offset)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mnemonic = self.mnemonic();

        match *self {
            Instruction::Halt => write!(f, "{}", mnemonic),
            Instruction::Jump { offset } | Instruction::Branch { offset, .. } => {
                write!(f, "{} {}", mnemonic, signed_offset(offset))
            }
            Instruction::Load { rd, base, offset } => {
                write!(f, "{} {}, [{}, #{}]", mnemonic, rd, base, offset)
            }
            Instruction::Store { rs, base, offset } => {
                write!(f, "{} {}, [{}, #{}]", mnemonic, rs, base, offset)
            }
            Instruction::Move { rd, immediate } => write!(f, "{} {}, #{}", mnemonic, rd, immediate),
            Instruction::Alu { rd, rm, rn, .. } => {
                write!(f, "{} {}, {}, {}", mnemonic, rd, rm, rn)
            }
            Instruction::AluImmediate { rd, rm, immediate, .. } => {
                write!(f, "{} {}, {}, #{}", mnemonic, rd, rm, immediate)
            }
            Instruction::Compare { rm, rn } => write!(f, "{} {}, {}", mnemonic, rm, rn),
            Instruction::Push { rs } => write!(f, "{} {}", mnemonic, rs),
            Instruction::Pop { rd } => write!(f, "{} {}", mnemonic, rd),
        }
    }
}
