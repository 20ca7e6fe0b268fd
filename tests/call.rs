use cpu16::{
    bytecode,
    emulator::{Emulator, ExecutionError, Memory, TestIo, MEMORY_SIZE},
    instruction::Register,
    symbolic,
};

use slog::{o, Drain, Logger};
use slog_term::{FullFormat, PlainSyncDecorator};

fn compile_program() -> bytecode::Program {
    let source_code = include_str!("call.asm");

    symbolic::Program::parse(source_code)
        .expect("could not parse the source code")
        .compile()
        .expect("could not compile the source code")
}

fn load(program: &bytecode::Program) -> Emulator<TestIo> {
    let mut memory = Memory::default();
    memory.load_program(program).unwrap();

    Emulator::new(memory, TestIo::new())
}

#[test]
fn test_call_through_stack() {
    let program = compile_program();

    let decorator = PlainSyncDecorator::new(std::io::stdout());
    let drain = FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let logger = Logger::root(drain, o!());

    let mut emulator = load(&program).with_logger(logger);

    emulator.run().expect("error while executing the program");

    assert_eq!(emulator.context.r[1], 42);
    assert_eq!(emulator.context.r[5], 4);
    assert_eq!(emulator.context.sp(), MEMORY_SIZE as u16);
    assert_eq!(emulator.context.pc(), 4);
    assert_eq!(emulator.cycles, 7);

    // The return address is still below the stack pointer.
    assert_eq!(emulator.memory.read(0x1FFF), Ok(4));
    assert!(!emulator.memory.is_accessed(0x1FFF));
}

#[test]
fn test_push_pop_restores_stack_pointer() {
    let program = symbolic::Program::parse("PUSH R3\nPOP R4\nHALT")
        .unwrap()
        .compile()
        .unwrap();

    for value in &[0u16, 1, 0x8000, 0xFFFF] {
        let mut emulator = load(&program);
        emulator.context.r[3] = *value;

        emulator.run().unwrap();

        assert_eq!(emulator.context.sp(), 0x2000);
        assert_eq!(emulator.context.r[4], *value);
        assert_eq!(emulator.context.r[3], *value);
    }
}

#[test]
fn test_stack_overflow_has_no_side_effect() {
    let program = symbolic::Program::parse("PUSH R1\nHALT")
        .unwrap()
        .compile()
        .unwrap();

    let mut emulator = load(&program);
    emulator.context.set_register(Register::SP, 0);
    emulator.context.r[1] = 0xABCD;

    let before = emulator.memory.clone();

    assert_eq!(emulator.run(), Err(ExecutionError::MemoryViolation { address: 0xFFFF }));
    assert_eq!(emulator.context.sp(), 0);
    assert_eq!(emulator.context.pc(), 0);
    assert!(!emulator.halted);
    assert_eq!(emulator.memory, before);
}
