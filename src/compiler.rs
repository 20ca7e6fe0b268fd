//! Two-pass compilation from assembly source to bytecode.
//!
//! The first pass assigns an address to every label, the second encodes every line using
//! those addresses. Problems that the assembler can paper over (undefined labels, unknown
//! mnemonics, immediates that do not fit their field) are handled according to [Strictness].

use std::collections::HashMap;

use itertools::Itertools;
use slog::{debug, o, trace, warn, Discard, Logger};

use crate::bytecode::{self, Record};
use crate::codec::{self, FieldError};
use crate::error::{AssemblyError, AssemblyErrorKind};
use crate::instruction::Instruction;
use crate::symbol_table::SymbolTable;
use crate::symbolic::{self, Mnemonic, Operand, Statement};

/// Number of addressable instruction slots.
const ADDRESS_SPACE: usize = 1 << 16;

/// What to do with problems the assembler can recover from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strictness {
    /// Log a warning and encode a fallback: `0` for an undefined label, the zero word for an
    /// unknown mnemonic and the low bits of an immediate that does not fit.
    Lenient,

    /// Fail the compilation.
    Strict,
}

impl Default for Strictness {
    fn default() -> Strictness {
        Strictness::Lenient
    }
}

type Encoder = fn(i32, u32) -> Result<u16, FieldError>;

struct Assembler {
    logger: Logger,
    strictness: Strictness,
    symbol_table: SymbolTable,
}

impl Assembler {
    fn first_pass(&mut self, program: &symbolic::Program) -> Result<(), AssemblyError> {
        let mut counter: usize = 0;

        for line in &program.lines {
            if let Some(label) = &line.label {
                if counter >= ADDRESS_SPACE {
                    return Err(AssemblyError::new(line.number, AssemblyErrorKind::ProgramTooLarge));
                }

                let address = counter as u16;

                if let Err(existing) = self.symbol_table.define_symbol(line.number, label, address) {
                    let first = self.symbol_table.get_symbol(existing).defined().unwrap_or(0);

                    return Err(AssemblyError::new(
                        line.number,
                        AssemblyErrorKind::DuplicateLabel {
                            label: label.clone(),
                            first,
                        },
                    ));
                }

                trace!(self.logger, "define label"; "label" => label, "address" => address);
            }

            if line.occupies_slot() {
                counter += 1;

                if counter > ADDRESS_SPACE {
                    return Err(AssemblyError::new(line.number, AssemblyErrorKind::ProgramTooLarge));
                }
            }
        }

        Ok(())
    }

    fn second_pass(
        &mut self,
        program: &symbolic::Program,
    ) -> Result<(Vec<Record>, HashMap<u16, usize>), AssemblyError> {
        let mut records = Vec::with_capacity(program.instruction_count());
        let mut source_map = HashMap::new();
        let mut address: u16 = 0;

        for line in &program.lines {
            let statement = match &line.statement {
                Some(statement) => statement,
                None => continue,
            };

            let value = self.encode(line.number, address, statement)?;

            trace!(self.logger, "append word";
                "line" => line.number,
                "address" => address,
                "value" => format!("{:04X}", value));

            records.push(Record { address, value });
            source_map.insert(address, line.number);

            // The first pass has already rejected programs that would wrap around.
            address = address.wrapping_add(1);
        }

        Ok((records, source_map))
    }

    /// Fails in strict mode, otherwise logs the problem and continues with `fallback`.
    fn recover<T>(&self, line: usize, kind: AssemblyErrorKind, fallback: T) -> Result<T, AssemblyError> {
        match self.strictness {
            Strictness::Strict => Err(AssemblyError::new(line, kind)),
            Strictness::Lenient => {
                warn!(self.logger, "{}", kind; "line" => line);
                Ok(fallback)
            }
        }
    }

    fn field(&self, line: usize, value: i32, width: u32, encoder: Encoder) -> Result<u16, AssemblyError> {
        match encoder(value, width) {
            Ok(bits) => Ok(bits),
            Err(error) => self.recover(line, error.into(), codec::truncate(value, width)),
        }
    }

    /// Resolves an operand to a number. `None` for an undefined label in lenient mode.
    fn resolve(&mut self, line: usize, operand: &Operand) -> Result<Option<i32>, AssemblyError> {
        let label = match operand {
            Operand::Immediate(value) => return Ok(Some(*value)),
            Operand::Label(label) => label,
        };

        self.symbol_table.reference_symbol(line, label);

        if let Some(address) = self.symbol_table.address_of(label) {
            return Ok(Some(address as i32));
        }

        let kind = AssemblyErrorKind::UndefinedLabel {
            label: label.clone(),
            suggestion: self.symbol_table.suggest(label).map(String::from),
        };

        self.recover(line, kind, None)
    }

    fn encode(&mut self, line: usize, address: u16, statement: &Statement) -> Result<u16, AssemblyError> {
        let instruction = match statement {
            Statement::Word(value) => return Ok(*value),
            Statement::Unknown(mnemonic) => {
                let kind = AssemblyErrorKind::UnknownMnemonic {
                    mnemonic: mnemonic.clone(),
                    suggestion: Mnemonic::suggest(mnemonic).map(String::from),
                };

                return self.recover(line, kind, 0);
            }
            Statement::Move { rd, value } => {
                let bits = match self.resolve(line, value)? {
                    Some(value) => self.field(line, value, 8, codec::encode_bits)?,
                    None => 0,
                };

                Instruction::Move {
                    rd: *rd,
                    immediate: codec::decode_immediate(bits, 8),
                }
            }
            Statement::Alu { op, rd, rm, rn } => Instruction::Alu {
                op: *op,
                rd: *rd,
                rm: *rm,
                rn: *rn,
            },
            Statement::AluImmediate { op, rd, rm, immediate } => Instruction::AluImmediate {
                op: *op,
                rd: *rd,
                rm: *rm,
                immediate: self.field(line, *immediate, 4, codec::encode_unsigned)?,
            },
            Statement::Compare { rm, rn } => Instruction::Compare { rm: *rm, rn: *rn },
            Statement::Jump { condition, target } => {
                let width = if condition.is_some() { 10 } else { 12 };

                let offset = match self.resolve(line, target)? {
                    Some(target) => {
                        let offset = target - (address as i32 + 1);
                        let bits = self.field(line, offset, width, codec::encode_signed)?;
                        codec::decode_immediate(bits, width)
                    }
                    None => 0,
                };

                match condition {
                    Some(condition) => Instruction::Branch {
                        condition: *condition,
                        offset,
                    },
                    None => Instruction::Jump { offset },
                }
            }
            Statement::Load { rd, base, offset } => Instruction::Load {
                rd: *rd,
                base: *base,
                offset: self.field(line, *offset, 4, codec::encode_unsigned)?,
            },
            Statement::Store { rs, base, offset } => Instruction::Store {
                rs: *rs,
                base: *base,
                offset: self.field(line, *offset, 4, codec::encode_unsigned)?,
            },
            Statement::Push { rs } => Instruction::Push { rs: *rs },
            Statement::Pop { rd } => Instruction::Pop { rd: *rd },
            Statement::Halt => Instruction::Halt,
        };

        Ok(instruction.encode())
    }
}

/// Compiles the given assembly program into bytecode, leniently and without logging.
pub fn compile(program: &symbolic::Program) -> Result<bytecode::Program, AssemblyError> {
    compile_with_logger(program, None, Strictness::default())
}

pub fn compile_with_logger<L>(
    program: &symbolic::Program,
    logger: L,
    strictness: Strictness,
) -> Result<bytecode::Program, AssemblyError>
where
    L: Into<Option<Logger>>,
{
    let logger = logger
        .into()
        .unwrap_or_else(|| Logger::root(Discard, o!()))
        .new(o!("stage" => "compilation"));

    let mut assembler = Assembler {
        logger,
        strictness,
        symbol_table: SymbolTable::new(),
    };

    assembler.first_pass(program)?;
    let (records, source_map) = assembler.second_pass(program)?;

    let unreferenced = assembler
        .symbol_table
        .iter()
        .filter(|symbol| symbol.references().is_empty())
        .map(|symbol| symbol.label())
        .join(", ");

    if !unreferenced.is_empty() {
        debug!(assembler.logger, "labels never referenced"; "labels" => unreferenced);
    }

    Ok(bytecode::Program {
        records,
        symbol_table: assembler.symbol_table,
        source_map,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{Condition, Register};
    use std::convert::TryFrom;

    fn assemble(source: &str) -> bytecode::Program {
        compile(&symbolic::Program::parse(source).unwrap()).unwrap()
    }

    fn strict(source: &str) -> Result<bytecode::Program, AssemblyError> {
        symbolic::Program::parse(source).unwrap().compile_strict()
    }

    fn decode(program: &bytecode::Program, index: usize) -> Instruction {
        Instruction::try_from(program.records[index].value).unwrap()
    }

    #[test]
    fn test_label_addresses() {
        let program = assemble(
            r#"
            ; labels on their own line take no slot
            start:
                MOV R1, #3
            loop:
                SUBI R1, R1, #1
                HALT
            end:
            "#,
        );

        assert_eq!(program.symbol_table.address_of("start"), Some(0));
        assert_eq!(program.symbol_table.address_of("loop"), Some(1));
        assert_eq!(program.symbol_table.address_of("end"), Some(3));
        assert_eq!(program.records.len(), 3);
        assert_eq!(program.source_map.get(&1), Some(&6));
    }

    #[test]
    fn test_forward_branch_offset() {
        let program = assemble(
            r#"
                JMP target
                MOV R0, #0
                MOV R0, #0
                MOV R0, #0
                MOV R0, #0
            target: HALT
            "#,
        );

        assert_eq!(decode(&program, 0), Instruction::Jump { offset: 4 });
    }

    #[test]
    fn test_backward_branch_offset() {
        let program = assemble(
            r#"
            back:   MOV R0, #0
                    MOV R0, #0
                    MOV R0, #0
                    JNE back
            "#,
        );

        assert_eq!(
            decode(&program, 3),
            Instruction::Branch {
                condition: Condition::NotEqual,
                offset: -4,
            }
        );
    }

    #[test]
    fn test_numeric_jump_target_is_absolute() {
        let program = assemble("MOV R0, #0\nJMP 0");
        assert_eq!(decode(&program, 1), Instruction::Jump { offset: -2 });
    }

    #[test]
    fn test_move_label_address() {
        let program = assemble("MOV R2, data\nHALT\ndata: 0x1234");

        assert_eq!(
            decode(&program, 0),
            Instruction::Move {
                rd: Register::new(2).unwrap(),
                immediate: 2,
            }
        );
        assert_eq!(program.records[2].value, 0x1234);
    }

    #[test]
    fn test_duplicate_label() {
        let error = strict("a: HALT\nb: HALT\na: HALT").unwrap_err();

        assert_eq!(
            error,
            AssemblyError::new(
                3,
                AssemblyErrorKind::DuplicateLabel {
                    label: "a".into(),
                    first: 1,
                }
            )
        );

        // Duplicates are never recoverable.
        assert!(compile(&symbolic::Program::parse("a: HALT\na: HALT").unwrap()).is_err());
    }

    #[test]
    fn test_undefined_label() {
        let program = assemble("loop: JMP lop");
        assert_eq!(program.records[0].value, 0x0000);

        let error = strict("loop: JMP lop").unwrap_err();
        assert_eq!(
            error.kind,
            AssemblyErrorKind::UndefinedLabel {
                label: "lop".into(),
                suggestion: Some("loop".into()),
            }
        );
    }

    #[test]
    fn test_unknown_mnemonic() {
        let program = assemble("NOP\nHALT");
        assert_eq!(program.records[0].value, 0x0000);
        assert_eq!(program.records[1].value, 0xFFFF);

        let error = strict("HALT\nHLT").unwrap_err();
        assert_eq!(error.line, 2);
        assert_eq!(
            error.kind,
            AssemblyErrorKind::UnknownMnemonic {
                mnemonic: "HLT".into(),
                suggestion: Some("HALT".into()),
            }
        );
    }

    #[test]
    fn test_immediate_out_of_range() {
        let program = assemble("ADDI R1, R1, #17");
        assert_eq!(
            decode(&program, 0),
            Instruction::AluImmediate {
                op: crate::instruction::ImmediateOp::Add,
                rd: Register::new(1).unwrap(),
                rm: Register::new(1).unwrap(),
                immediate: 1,
            }
        );

        let error = strict("ADDI R1, R1, #17").unwrap_err();
        assert_eq!(
            error.kind,
            AssemblyErrorKind::Field(FieldError::ImmediateOutOfRange { value: 17, width: 4 })
        );

        assert!(strict("MOV R1, #-129").is_err());
        assert!(strict("MOV R1, #255").is_ok());
        assert!(strict("LDR R1, [R2, #-1]").is_err());
    }

    #[test]
    fn test_deterministic_output() {
        let source = "x: MOV R1, y\ny: ADD R1, R1, R1\nz: JMP x\nHALT";

        assert_eq!(assemble(source).to_string(), assemble(source).to_string());
    }

    #[test]
    fn test_every_family_decodes_to_its_source() {
        use crate::instruction::{AluOp, ImmediateOp};

        let program = assemble(
            r#"
            ADD R1, R2, R3
            SUB R4, R5, R6
            AND R7, R8, R9
            OR R10, R11, R12
            ADDI R1, R1, #15
            SUBI R2, R3, #1
            SHR R4, R5, #2
            SHL R6, R7, #3
            LDR R1, [R2, #4]
            STR R3, [SP, #15]
            LDR R5, [R6]
            MOV R8, #-128
            CMP R9, R10
            PUSH R11
            POP PC
            JMP end
            JGE end
            JLT end
        end: HALT
            "#,
        );

        let r = |index: u8| Register::new(index).unwrap();

        let expected = vec![
            Instruction::Alu { op: AluOp::Add, rd: r(1), rm: r(2), rn: r(3) },
            Instruction::Alu { op: AluOp::Subtract, rd: r(4), rm: r(5), rn: r(6) },
            Instruction::Alu { op: AluOp::And, rd: r(7), rm: r(8), rn: r(9) },
            Instruction::Alu { op: AluOp::Or, rd: r(10), rm: r(11), rn: r(12) },
            Instruction::AluImmediate { op: ImmediateOp::Add, rd: r(1), rm: r(1), immediate: 15 },
            Instruction::AluImmediate { op: ImmediateOp::Subtract, rd: r(2), rm: r(3), immediate: 1 },
            Instruction::AluImmediate { op: ImmediateOp::ShiftRight, rd: r(4), rm: r(5), immediate: 2 },
            Instruction::AluImmediate { op: ImmediateOp::ShiftLeft, rd: r(6), rm: r(7), immediate: 3 },
            Instruction::Load { rd: r(1), base: r(2), offset: 4 },
            Instruction::Store { rs: r(3), base: Register::SP, offset: 15 },
            Instruction::Load { rd: r(5), base: r(6), offset: 0 },
            Instruction::Move { rd: r(8), immediate: -128 },
            Instruction::Compare { rm: r(9), rn: r(10) },
            Instruction::Push { rs: r(11) },
            Instruction::Pop { rd: Register::PC },
            Instruction::Jump { offset: 2 },
            Instruction::Branch { condition: Condition::GreaterOrEqual, offset: 1 },
            Instruction::Branch { condition: Condition::Less, offset: 0 },
            Instruction::Halt,
        ];

        assert_eq!(program.records.len(), expected.len());

        for (index, instruction) in expected.iter().enumerate() {
            assert_eq!(&decode(&program, index), instruction, "word {}", index);
        }

        assert_eq!(program.records[9].value >> 12, 15);
    }
}
