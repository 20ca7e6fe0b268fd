//! [Emulator] for executing [bytecode programs](crate::bytecode::Program).

use std::collections::{BTreeSet, VecDeque};
use std::convert::TryFrom;
use std::io::{BufRead, Read, Write};

use slog::{debug, o, trace, warn, Discard, Logger};
use thiserror::Error;

use crate::bytecode;
use crate::instruction::{AluOp, ImmediateOp, Instruction, Register};

/// Default number of words of physical memory.
pub const MEMORY_SIZE: usize = 0x2000;

/// Reading from this address reads a character.
pub const CHAR_INPUT_PORT: u16 = 0xF000;
/// Storing to this address prints a character.
pub const CHAR_OUTPUT_PORT: u16 = 0xF001;
/// Reading from this address reads a signed integer.
pub const INT_INPUT_PORT: u16 = 0xF002;
/// Storing to this address prints a signed integer.
pub const INT_OUTPUT_PORT: u16 = 0xF003;

/// Physical memory can not overlap the I/O ports.
const MAX_MEMORY_SIZE: usize = CHAR_INPUT_PORT as usize;

/// Fatal conditions that stop the execution.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("invalid access to physical memory at {address:#06X}")]
    MemoryViolation { address: u16 },

    #[error("unknown instruction {word:#06X} at PC={pc:#06X}")]
    UnknownInstruction { word: u16, pc: u16 },
}

/// Error returned by [Memory::load_program].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("record for address {address:#06X} does not fit in {size} words of memory")]
pub struct LoadError {
    pub address: u16,
    pub size: usize,
}

/// The Zero and Carry flags.
///
/// Only arithmetic, logical and compare instructions change them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub zero: bool,
    pub carry: bool,
}

/// Contains the register state of the processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    /// The general purpose registers. `R14` is the stack pointer and `R15` the program counter.
    pub r: [u16; 16],

    /// The instruction register: the last fetched word.
    pub ir: u16,

    pub flags: Flags,
}

impl Context {
    /// The initial state: every register zero except the stack pointer.
    pub fn new(stack_top: u16) -> Context {
        let mut r = [0; 16];
        r[Register::SP.index()] = stack_top;

        Context {
            r,
            ir: 0,
            flags: Flags::default(),
        }
    }

    pub fn register(&self, register: Register) -> u16 {
        self.r[register.index()]
    }

    pub fn set_register(&mut self, register: Register, value: u16) {
        self.r[register.index()] = value;
    }

    pub fn pc(&self) -> u16 {
        self.register(Register::PC)
    }

    pub fn sp(&self) -> u16 {
        self.register(Register::SP)
    }
}

/// Word addressed physical memory.
///
/// Tracks which cells have been touched by `LDR` and `STR` for the state dump. Stack
/// operations and instruction fetches are not tracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    cells: Vec<u16>,
    accessed: Vec<bool>,
}

impl Default for Memory {
    fn default() -> Memory {
        Memory::new(MEMORY_SIZE)
    }
}

impl Memory {
    /// Creates zeroed memory of `size` words. Sizes reaching into the I/O ports are clamped.
    pub fn new(size: usize) -> Memory {
        let size = std::cmp::min(size, MAX_MEMORY_SIZE);

        Memory {
            cells: vec![0; size],
            accessed: vec![false; size],
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The address one past the last cell. The stack grows down from here.
    pub fn top(&self) -> u16 {
        self.cells.len() as u16
    }

    pub fn cells(&self) -> &[u16] {
        &self.cells
    }

    /// Fails with [ExecutionError::MemoryViolation] outside physical memory.
    pub fn check(&self, address: u16) -> Result<(), ExecutionError> {
        if (address as usize) < self.cells.len() {
            Ok(())
        } else {
            Err(ExecutionError::MemoryViolation { address })
        }
    }

    /// Reads a word without marking it as accessed.
    pub fn read(&self, address: u16) -> Result<u16, ExecutionError> {
        self.check(address)?;
        Ok(self.cells[address as usize])
    }

    /// Writes a word without marking it as accessed.
    pub fn write(&mut self, address: u16, value: u16) -> Result<(), ExecutionError> {
        self.check(address)?;
        self.cells[address as usize] = value;
        Ok(())
    }

    /// Reads a word on behalf of `LDR`.
    pub fn load(&mut self, address: u16) -> Result<u16, ExecutionError> {
        let value = self.read(address)?;
        self.accessed[address as usize] = true;
        Ok(value)
    }

    /// Writes a word on behalf of `STR`.
    pub fn store(&mut self, address: u16, value: u16) -> Result<(), ExecutionError> {
        self.write(address, value)?;
        self.accessed[address as usize] = true;
        Ok(())
    }

    pub fn is_accessed(&self, address: u16) -> bool {
        self.accessed.get(address as usize).copied().unwrap_or(false)
    }

    /// Writes every record of `program` into memory. Stops at the first record that does not fit.
    pub fn load_program(&mut self, program: &bytecode::Program) -> Result<(), LoadError> {
        for record in &program.records {
            self.write(record.address, record.value).map_err(|_| LoadError {
                address: record.address,
                size: self.cells.len(),
            })?;
        }

        Ok(())
    }
}

/// Interface to the memory mapped console devices.
pub trait InputOutput {
    /// Called when `LDR` reads [CHAR_INPUT_PORT].
    fn read_char(&mut self) -> u16;

    /// Called when `STR` writes [CHAR_OUTPUT_PORT].
    fn write_char(&mut self, value: u16);

    /// Called when `LDR` reads [INT_INPUT_PORT].
    fn read_int(&mut self) -> u16;

    /// Called when `STR` writes [INT_OUTPUT_PORT].
    fn write_int(&mut self, value: u16);
}

impl<T: InputOutput + ?Sized> InputOutput for &mut T {
    fn read_char(&mut self) -> u16 {
        (**self).read_char()
    }

    fn write_char(&mut self, value: u16) {
        (**self).write_char(value)
    }

    fn read_int(&mut self) -> u16 {
        (**self).read_int()
    }

    fn write_int(&mut self, value: u16) {
        (**self).write_int(value)
    }
}

/// Called by the emulator before executing an instruction at a breakpoint.
///
/// Execution resumes when `pause` returns.
pub trait BreakpointHandler {
    fn pause(&mut self, context: &Context, memory: &Memory);
}

impl<F> BreakpointHandler for F
where
    F: FnMut(&Context, &Memory),
{
    fn pause(&mut self, context: &Context, memory: &Memory) {
        self(context, memory)
    }
}

/// Result of a single [Emulator::step].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Running,
    Halted,
}

/// Utility struct for implementing methods in the context of emulating a single instruction.
struct InstructionEmulationContext<'e, IO> {
    /// The emulator in whose context the instruction is being emulated.
    emulator: &'e mut Emulator<IO>,

    /// The instruction that we are currently emulating.
    instruction: Instruction,
}

impl<'e, IO: InputOutput> InstructionEmulationContext<'e, IO> {
    fn get(&self, register: Register) -> u16 {
        self.emulator.context.register(register)
    }

    fn set(&mut self, register: Register, value: u16) {
        self.emulator.context.set_register(register, value);
    }

    fn flags(&mut self) -> &mut Flags {
        &mut self.emulator.context.flags
    }

    fn add(&mut self, a: u16, b: u16) -> u16 {
        let (result, carry) = a.overflowing_add(b);
        *self.flags() = Flags { zero: result == 0, carry };
        result
    }

    /// Carry is the borrow.
    fn subtract(&mut self, a: u16, b: u16) -> u16 {
        let result = a.wrapping_sub(b);
        *self.flags() = Flags { zero: result == 0, carry: a < b };
        result
    }

    fn logical(&mut self, result: u16) -> u16 {
        self.flags().zero = result == 0;
        result
    }

    fn jump(&mut self, offset: i16) {
        let pc = self.get(Register::PC).wrapping_add(offset as u16);
        self.set(Register::PC, pc);
    }

    fn load(&mut self, rd: Register, address: u16) -> Result<(), ExecutionError> {
        let value = match address {
            CHAR_INPUT_PORT => self.emulator.io.read_char(),
            INT_INPUT_PORT => self.emulator.io.read_int(),
            CHAR_OUTPUT_PORT | INT_OUTPUT_PORT => {
                warn!(self.emulator.logger, "load from an output port ignored";
                    "address" => format!("{:04X}", address));
                return Ok(());
            }
            _ => self.emulator.memory.load(address)?,
        };

        self.set(rd, value);

        Ok(())
    }

    fn store(&mut self, address: u16, value: u16) -> Result<(), ExecutionError> {
        match address {
            CHAR_OUTPUT_PORT => self.emulator.io.write_char(value),
            INT_OUTPUT_PORT => self.emulator.io.write_int(value),
            CHAR_INPUT_PORT | INT_INPUT_PORT => {
                warn!(self.emulator.logger, "store to an input port ignored";
                    "address" => format!("{:04X}", address));
            }
            _ => self.emulator.memory.store(address, value)?,
        }

        Ok(())
    }

    /// Execute the instruction. The program counter already points to the next word.
    ///
    /// # Returns
    /// A fatal error if the instruction accesses memory outside the physical memory. All checks
    /// happen before any state is modified.
    fn emulate(&mut self) -> Result<(), ExecutionError> {
        match self.instruction {
            Instruction::Halt => unreachable!("halt is handled by Emulator::step"),

            Instruction::Jump { offset } => self.jump(offset),

            Instruction::Branch { condition, offset } => {
                let Flags { zero, carry } = self.emulator.context.flags;

                if condition.holds(zero, carry) {
                    self.jump(offset);
                }
            }

            Instruction::Move { rd, immediate } => self.set(rd, immediate as u16),

            Instruction::Alu { op, rd, rm, rn } => {
                let (a, b) = (self.get(rm), self.get(rn));

                let result = match op {
                    AluOp::Add => self.add(a, b),
                    AluOp::Subtract => self.subtract(a, b),
                    AluOp::And => self.logical(a & b),
                    AluOp::Or => self.logical(a | b),
                };

                self.set(rd, result);
            }

            Instruction::AluImmediate { op, rd, rm, immediate } => {
                let a = self.get(rm);

                let result = match op {
                    ImmediateOp::Add => self.add(a, immediate),
                    ImmediateOp::Subtract => self.subtract(a, immediate),
                    ImmediateOp::ShiftRight => self.logical(a.checked_shr(immediate as u32).unwrap_or(0)),
                    ImmediateOp::ShiftLeft => self.logical(a.checked_shl(immediate as u32).unwrap_or(0)),
                };

                self.set(rd, result);
            }

            Instruction::Compare { rm, rn } => {
                let (a, b) = (self.get(rm), self.get(rn));
                self.subtract(a, b);
            }

            Instruction::Load { rd, base, offset } => {
                let address = self.get(base).wrapping_add(offset);
                self.load(rd, address)?;
            }

            Instruction::Store { rs, base, offset } => {
                let address = self.get(base).wrapping_add(offset);
                let value = self.get(rs);
                self.store(address, value)?;
            }

            Instruction::Push { rs } => {
                let sp = self.get(Register::SP).wrapping_sub(1);
                self.emulator.memory.check(sp)?;

                self.set(Register::SP, sp);

                // Pushing SP stores the decremented value.
                let value = self.get(rs);
                self.emulator.memory.write(sp, value)?;
            }

            Instruction::Pop { rd } => {
                let sp = self.get(Register::SP);
                let value = self.emulator.memory.read(sp)?;

                self.set(rd, value);

                let sp = self.get(Register::SP).wrapping_add(1);
                self.set(Register::SP, sp);
            }
        }

        Ok(())
    }
}

/// A machine: memory, registers, an I/O handler and optional breakpoints.
pub struct Emulator<IO> {
    /// The memory of the emulated machine.
    pub memory: Memory,

    /// The execution context, which includes the registers and flags of the CPU.
    pub context: Context,

    /// Interface for the memory mapped I/O ports.
    pub io: IO,

    /// True if the execution has been halted.
    pub halted: bool,

    /// Number of fetched instructions.
    pub cycles: u64,

    breakpoints: BTreeSet<u16>,
    breakpoint_handler: Option<Box<dyn BreakpointHandler>>,
    logger: Logger,
}

impl<IO: InputOutput> Emulator<IO> {
    /// Create a new emulator.
    ///
    /// # Parameters
    /// - `memory`: A [Memory] object which has the program.
    /// - `io`: An [IO handler](InputOutput).
    pub fn new(memory: Memory, io: IO) -> Emulator<IO> {
        Emulator {
            context: Context::new(memory.top()),
            memory,
            io,
            halted: false,
            cycles: 0,
            breakpoints: BTreeSet::new(),
            breakpoint_handler: None,
            logger: Logger::root(Discard, o!()),
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.set_logger(logger);
        self
    }

    pub fn set_logger(&mut self, logger: Logger) {
        self.logger = logger.new(o!("stage" => "emulation"));
    }

    pub fn with_breakpoints<I>(mut self, breakpoints: I) -> Self
    where
        I: IntoIterator<Item = u16>,
    {
        self.breakpoints.extend(breakpoints);
        self
    }

    pub fn add_breakpoint(&mut self, address: u16) {
        self.breakpoints.insert(address);
    }

    pub fn breakpoints(&self) -> impl Iterator<Item = u16> + '_ {
        self.breakpoints.iter().copied()
    }

    pub fn set_breakpoint_handler<H>(&mut self, handler: H)
    where
        H: BreakpointHandler + 'static,
    {
        self.breakpoint_handler = Some(Box::new(handler));
    }

    /// Fetches the instruction at the program counter without executing it.
    pub fn current_instruction(&self) -> Result<Instruction, ExecutionError> {
        let pc = self.context.pc();
        let word = self.memory.read(pc)?;

        Instruction::try_from(word).map_err(|_| ExecutionError::UnknownInstruction { word, pc })
    }

    /// Fetches the next instruction, increments the program counter and executes the instruction.
    ///
    /// On error the program counter is left on the faulting instruction and nothing else is
    /// changed.
    pub fn step(&mut self) -> Result<Status, ExecutionError> {
        if self.halted {
            return Ok(Status::Halted);
        }

        let pc = self.context.pc();

        if self.breakpoints.contains(&pc) {
            debug!(self.logger, "breakpoint"; "pc" => format!("{:04X}", pc));

            if let Some(handler) = self.breakpoint_handler.as_mut() {
                handler.pause(&self.context, &self.memory);
            }
        }

        let word = self.memory.read(pc)?;
        self.context.ir = word;
        self.cycles += 1;

        let instruction = Instruction::try_from(word)
            .map_err(|_| ExecutionError::UnknownInstruction { word, pc })?;

        trace!(self.logger, "execute";
            "pc" => format!("{:04X}", pc),
            "instruction" => %instruction);

        if instruction == Instruction::Halt {
            debug!(self.logger, "halted"; "cycles" => self.cycles);
            self.halted = true;
            return Ok(Status::Halted);
        }

        self.context.set_register(Register::PC, pc.wrapping_add(1));

        let mut ctx = InstructionEmulationContext {
            emulator: self,
            instruction,
        };

        if let Err(error) = ctx.emulate() {
            self.context.set_register(Register::PC, pc);
            return Err(error);
        }

        Ok(Status::Running)
    }

    /// Executes the program until it halts or a fatal error occurs.
    pub fn run(&mut self) -> Result<(), ExecutionError> {
        while !self.halted {
            self.step()?;
        }

        Ok(())
    }
}

/// Something written to an output port of [TestIo].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Char(u16),
    Int(u16),
}

/// An IO handler for testing purposes.
///
/// Reads input values from a pre-determined input buffer and
/// appends printed values to an output buffer. Reading from an exhausted buffer gives 0xFFFF.
#[derive(Debug, Clone, Default)]
pub struct TestIo {
    input_buffer: VecDeque<u16>,
    output_buffer: Vec<Output>,
}

impl TestIo {
    pub fn new() -> TestIo {
        TestIo::default()
    }

    pub fn with_input<I: IntoIterator<Item = u16>>(input: I) -> TestIo {
        TestIo {
            input_buffer: input.into_iter().collect(),
            output_buffer: Vec::new(),
        }
    }

    pub fn input(&mut self, value: u16) {
        self.input_buffer.push_back(value);
    }

    pub fn output(&self) -> &[Output] {
        &self.output_buffer[..]
    }

    /// The characters written so far, as a string.
    pub fn text(&self) -> String {
        self.output_buffer
            .iter()
            .filter_map(|output| match output {
                Output::Char(value) => std::char::from_u32(*value as u32),
                Output::Int(_) => None,
            })
            .collect()
    }

    /// The integers written so far, as signed values.
    pub fn integers(&self) -> Vec<i16> {
        self.output_buffer
            .iter()
            .filter_map(|output| match output {
                Output::Int(value) => Some(*value as i16),
                Output::Char(_) => None,
            })
            .collect()
    }

    fn next_input(&mut self) -> u16 {
        self.input_buffer.pop_front().unwrap_or(0xFFFF)
    }
}

impl InputOutput for TestIo {
    fn read_char(&mut self) -> u16 {
        self.next_input()
    }

    fn write_char(&mut self, value: u16) {
        self.output_buffer.push(Output::Char(value));
    }

    fn read_int(&mut self) -> u16 {
        self.next_input()
    }

    fn write_int(&mut self, value: u16) {
        self.output_buffer.push(Output::Int(value));
    }
}

/// An IO handler that uses the terminal.
///
/// Every transfer is echoed as an `IN x` or `OUT x` line. If an error occurs while reading,
/// the port reads as 0xFFFF.
pub struct StdIo;

impl InputOutput for StdIo {
    fn read_char(&mut self) -> u16 {
        let _ = std::io::stdout().flush();

        let value = std::io::stdin()
            .bytes()
            .next()
            .and_then(Result::ok)
            .map(u16::from)
            .unwrap_or(0xFFFF);

        println!("IN {}", (value as u8) as char);

        value
    }

    fn write_char(&mut self, value: u16) {
        println!("OUT {}", (value as u8) as char);
    }

    fn read_int(&mut self) -> u16 {
        let _ = std::io::stdout().flush();

        let mut line = String::new();

        let value = match std::io::stdin().lock().read_line(&mut line) {
            Ok(_) => line.trim().parse::<i16>().map(|value| value as u16).unwrap_or(0xFFFF),
            Err(_) => 0xFFFF,
        };

        println!("IN {}", value as i16);

        value
    }

    fn write_int(&mut self, value: u16) {
        println!("OUT {}", value as i16);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Condition;
    use std::cell::RefCell;
    use std::rc::Rc;

    macro_rules! assert_register {
        ($emulator:expr, $register:expr, $value:expr) => {
            assert_eq!($emulator.context.r[$register], $value, "Register {} != {}", $register, $value);
        };
    }

    fn r(index: u8) -> Register {
        Register::new(index).unwrap()
    }

    fn emulator(program: &[Instruction]) -> Emulator<TestIo> {
        let mut memory = Memory::default();

        for (address, instruction) in program.iter().enumerate() {
            memory.write(address as u16, instruction.encode()).unwrap();
        }

        Emulator::new(memory, TestIo::new())
    }

    fn mov(index: u8, immediate: i16) -> Instruction {
        Instruction::Move { rd: r(index), immediate }
    }

    #[test]
    fn test_halt_only() {
        let mut emulator = Emulator::new(Memory::default(), TestIo::new());
        emulator.memory.write(0, 0xFFFF).unwrap();

        assert_eq!(emulator.step(), Ok(Status::Halted));
        emulator.run().unwrap();

        assert!(emulator.halted);
        assert_eq!(emulator.cycles, 1);
        assert_eq!(emulator.context, Context { ir: 0xFFFF, ..Context::new(0x2000) });
    }

    #[test]
    fn test_add_flags() {
        let mut emulator = emulator(&[
            Instruction::Alu { op: AluOp::Add, rd: r(0), rm: r(1), rn: r(2) },
            Instruction::Halt,
        ]);

        emulator.context.r[1] = 0xFFFF;
        emulator.context.r[2] = 0x0001;
        emulator.run().unwrap();

        assert_register!(emulator, 0, 0);
        assert_eq!(emulator.context.flags, Flags { zero: true, carry: true });
    }

    #[test]
    fn test_sub_flags() {
        let mut emulator = emulator(&[
            Instruction::Alu { op: AluOp::Subtract, rd: r(0), rm: r(1), rn: r(2) },
            Instruction::Halt,
        ]);

        emulator.context.r[1] = 3;
        emulator.context.r[2] = 5;
        emulator.run().unwrap();

        assert_register!(emulator, 0, 0xFFFE);
        assert_eq!(emulator.context.flags, Flags { zero: false, carry: true });
    }

    #[test]
    fn test_logical_keeps_carry() {
        let mut emulator = emulator(&[
            Instruction::Alu { op: AluOp::Subtract, rd: r(0), rm: r(0), rn: r(1) },
            Instruction::Alu { op: AluOp::And, rd: r(2), rm: r(0), rn: r(3) },
            Instruction::AluImmediate { op: ImmediateOp::ShiftLeft, rd: r(4), rm: r(1), immediate: 3 },
            Instruction::Halt,
        ]);

        emulator.context.r[1] = 1;
        emulator.run().unwrap();

        assert_register!(emulator, 2, 0);
        assert_register!(emulator, 4, 8);
        assert_eq!(emulator.context.flags, Flags { zero: false, carry: true });
    }

    #[test]
    fn test_move_sign_extends() {
        let mut emulator = emulator(&[mov(3, -5), Instruction::Halt]);
        emulator.context.flags = Flags { zero: true, carry: true };
        emulator.run().unwrap();

        assert_register!(emulator, 3, 0xFFFB);
        assert_eq!(emulator.context.flags, Flags { zero: true, carry: true });
    }

    #[test]
    fn test_push_pop() {
        let mut emulator = emulator(&[
            Instruction::Push { rs: r(3) },
            Instruction::Pop { rd: r(4) },
            Instruction::Halt,
        ]);

        emulator.context.r[3] = 0xBEEF;

        emulator.step().unwrap();
        assert_eq!(emulator.context.sp(), 0x1FFF);
        assert_eq!(emulator.memory.read(0x1FFF), Ok(0xBEEF));

        emulator.run().unwrap();
        assert_eq!(emulator.context.sp(), 0x2000);
        assert_register!(emulator, 4, 0xBEEF);
        assert!(!emulator.memory.is_accessed(0x1FFF));
    }

    #[test]
    fn test_pop_empty_stack() {
        let mut emulator = emulator(&[mov(1, 7), Instruction::Pop { rd: r(1) }]);

        emulator.step().unwrap();
        let before = emulator.context.clone();

        assert_eq!(emulator.step(), Err(ExecutionError::MemoryViolation { address: 0x2000 }));
        assert_eq!(emulator.context, Context { ir: emulator.context.ir, ..before });
        assert_eq!(emulator.context.pc(), 1);
    }

    #[test]
    fn test_store_out_of_bounds() {
        let mut emulator = emulator(&[Instruction::Store { rs: r(1), base: r(2), offset: 1 }]);
        emulator.context.r[1] = 0x1234;
        emulator.context.r[2] = 0x1FFF;

        assert_eq!(emulator.run(), Err(ExecutionError::MemoryViolation { address: 0x2000 }));
        assert_eq!(emulator.context.pc(), 0);
        assert!(emulator.memory.cells().iter().skip(1).all(|cell| *cell == 0));
    }

    #[test]
    fn test_load_marks_access() {
        let mut emulator = emulator(&[
            Instruction::Load { rd: r(1), base: r(2), offset: 2 },
            Instruction::Halt,
        ]);
        emulator.memory.write(0x100, 42).unwrap();
        emulator.context.r[2] = 0xFE;
        emulator.run().unwrap();

        assert_register!(emulator, 1, 42);
        assert!(emulator.memory.is_accessed(0x100));
        assert!(!emulator.memory.is_accessed(0));
    }

    #[test]
    fn test_io_ports() {
        let mut emulator = emulator(&[
            mov(2, -1),
            Instruction::Load { rd: r(1), base: r(3), offset: 0 },
            Instruction::Store { rs: r(1), base: r(3), offset: 1 },
            Instruction::Load { rd: r(4), base: r(3), offset: 2 },
            Instruction::Store { rs: r(4), base: r(3), offset: 3 },
            Instruction::Load { rd: r(5), base: r(3), offset: 1 },
            Instruction::Store { rs: r(5), base: r(3), offset: 0 },
            Instruction::Halt,
        ]);

        emulator.io = TestIo::with_input(vec![b'x' as u16, (-7i16) as u16]);
        emulator.context.r[3] = CHAR_INPUT_PORT;
        emulator.context.r[5] = 99;
        emulator.run().unwrap();

        assert_eq!(emulator.io.text(), "x");
        assert_eq!(emulator.io.integers(), vec![-7]);
        assert_register!(emulator, 5, 99);
        assert_eq!(emulator.io.output().len(), 2);
    }

    #[test]
    fn test_unmapped_high_address() {
        let mut emulator = emulator(&[Instruction::Load { rd: r(1), base: r(2), offset: 4 }]);
        emulator.context.r[2] = CHAR_INPUT_PORT;

        assert_eq!(emulator.run(), Err(ExecutionError::MemoryViolation { address: 0xF004 }));
    }

    #[test]
    fn test_countdown_branch() {
        let mut emulator = emulator(&[
            mov(1, 3),
            mov(2, 0),
            Instruction::AluImmediate { op: ImmediateOp::Subtract, rd: r(1), rm: r(1), immediate: 1 },
            Instruction::AluImmediate { op: ImmediateOp::Add, rd: r(2), rm: r(2), immediate: 2 },
            Instruction::Compare { rm: r(1), rn: r(0) },
            Instruction::Branch { condition: Condition::NotEqual, offset: -4 },
            Instruction::Halt,
        ]);

        emulator.run().unwrap();

        assert_register!(emulator, 1, 0);
        assert_register!(emulator, 2, 6);
        assert_eq!(emulator.context.pc(), 6);
    }

    #[test]
    fn test_pc_out_of_bounds() {
        let mut emulator = Emulator::new(Memory::new(16), TestIo::new());
        emulator.memory.write(0, Instruction::Jump { offset: 20 }.encode()).unwrap();

        emulator.step().unwrap();
        assert_eq!(emulator.step(), Err(ExecutionError::MemoryViolation { address: 21 }));
    }

    #[test]
    fn test_breakpoint_handler() {
        let hits = Rc::new(RefCell::new(Vec::new()));
        let recorded = hits.clone();

        let mut emulator = emulator(&[mov(1, 1), mov(1, 2), mov(1, 3), Instruction::Halt])
            .with_breakpoints(vec![1, 3]);

        emulator.set_breakpoint_handler(move |context: &Context, _: &Memory| {
            recorded.borrow_mut().push((context.pc(), context.r[1]));
        });

        emulator.run().unwrap();

        assert_eq!(*hits.borrow(), vec![(1, 1), (3, 3)]);
    }

    #[test]
    fn test_load_program() {
        let program = bytecode::Program::parse("0000 4014\n0001 FFFF\n").unwrap();
        let mut memory = Memory::default();

        memory.load_program(&program).unwrap();
        assert_eq!(&memory.cells()[..2], &[0x4014, 0xFFFF]);

        let program = bytecode::Program::parse("2000 0001\n").unwrap();
        assert_eq!(
            memory.load_program(&program),
            Err(LoadError { address: 0x2000, size: 0x2000 })
        );
    }
}
