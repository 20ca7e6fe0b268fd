//! A crate for a small 16-bit, word addressed instruction set: an assembler, an object file
//! format and an emulator.
//!
//! Currently this crate provides the functionality to:
//! - Parse symbolic assembly with labels and comments.
//! - Compile it in two passes into 16-bit instruction words.
//! - Read and write the `ADDR VALUE` object format.
//! - Execute the words with memory mapped console I/O and breakpoints.
//! - Dump the processor state.
//!
//! # Example
//! ```
//! use cpu16::{
//!     symbolic::Program,
//!     emulator::{Emulator, Memory, TestIo},
//! };
//!
//! // Counts down from three and prints every value.
//! let symbolic_source = r#"
//!         MOV  R1, #3
//!         MOV  R2, #0
//!         MOV  R3, #-16       ; R3 = 0xFFF0
//!         SHL  R3, R3, #8     ; R3 = 0xF000, the I/O ports
//! loop:   STR  R1, [R3, #3]   ; print R1
//!         SUBI R1, R1, #1
//!         CMP  R1, R2
//!         JNE  loop
//!         HALT
//! "#;
//!
//! // Parse the symbolic assembly.
//! let symbolic = Program::parse(symbolic_source).unwrap();
//!
//! // Translate it into bytecode.
//! let compiled = symbolic.compile().unwrap();
//!
//! let mut memory = Memory::default();
//! memory.load_program(&compiled).unwrap();
//!
//! // Execute the bytecode with buffered I/O.
//! let mut emulator = Emulator::new(memory, TestIo::new());
//! emulator.run().unwrap();
//!
//! assert_eq!(emulator.io.integers(), vec![3, 2, 1]);
//! ```
//!
//! # Executables
//!
//! Built with the `tools` feature.
//!
//! ## `cpu16asm`
//!
//! ```text
//! cpu16asm countdown.asm countdown.hex --listing
//! ```
//!
//! ## `cpu16run`
//!
//! ```text
//! cpu16run countdown.hex 0x0004
//! ```
pub mod bytecode;
pub mod codec;
pub mod compiler;
pub mod emulator;
pub mod error;
pub mod inspector;
pub mod instruction;
pub mod symbol_table;
pub mod symbolic;

mod utils;
