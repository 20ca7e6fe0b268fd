use cpu16::{
    bytecode,
    emulator::{Emulator, Memory, TestIo},
    inspector::StateDump,
    instruction::{Condition, Instruction, Register},
    symbolic,
};

use std::convert::TryFrom;

fn compile_program() -> bytecode::Program {
    let source_code = include_str!("countdown.asm");

    let program = symbolic::Program::parse(source_code)
        .expect("could not parse the source code");

    program.compile()
        .expect("could not compile the source code")
}

#[test]
fn test_countdown_object_file() {
    let program = compile_program();

    assert_eq!(program.to_object(), include_str!("countdown.hex"));

    assert_eq!(program.symbol_table.address_of("start"), Some(0));
    assert_eq!(program.symbol_table.address_of("loop"), Some(3));
    assert_eq!(program.symbol_table.len(), 2);
}

#[test]
fn test_countdown_is_deterministic() {
    assert_eq!(compile_program().to_object(), compile_program().to_object());
}

#[test]
fn test_countdown_decodes() {
    let program = bytecode::Program::parse(include_str!("countdown.hex")).unwrap();

    let instructions = program
        .records
        .iter()
        .map(|record| Instruction::try_from(record.value).unwrap())
        .collect::<Vec<_>>();

    assert_eq!(instructions[1], Instruction::Move { rd: Register::new(3).unwrap(), immediate: -16 });
    assert_eq!(instructions[6], Instruction::Branch { condition: Condition::NotEqual, offset: -4 });
    assert_eq!(instructions[8], Instruction::Halt);

    assert_eq!(instructions[3].to_string(), "STR R1, [R3, #3]");
}

#[test]
fn test_countdown_emulate() {
    let program = bytecode::Program::parse(include_str!("countdown.hex")).unwrap();

    let mut memory = Memory::default();
    memory.load_program(&program).unwrap();

    let mut io = TestIo::new();
    let mut emulator = Emulator::new(memory, &mut io);

    emulator.run().expect("error while executing the program");

    assert_eq!(emulator.context.r[1], 0);
    assert_eq!(emulator.context.r[3], 0xF000);
    assert_eq!(emulator.context.pc(), 8);
    assert!(emulator.context.flags.zero);
    assert_eq!(emulator.cycles, 3 + 3 * 4 + 2);

    let dump = StateDump::of(&emulator).to_string();
    assert!(dump.contains("R3 = 0xF000\n"));
    assert!(dump.contains("Z = 1\nC = 0\n"));
    assert!(dump.ends_with("[ 0x000F ] = 0x0000\n"));

    drop(emulator);
    assert_eq!(io.integers(), vec![3, 2, 1]);
}
