//! Human readable dump of the processor state.

use std::fmt;

use crate::emulator::{Context, Emulator, Memory};

/// Registers, flags, the memory cells touched by loads and stores, and the live stack.
///
/// ```text
/// R0 = 0x0000
/// ...
/// R15 = 0x0004
/// Z = 1
/// C = 0
/// [ 0x0010 ] = 0x002A
/// [ 0x1FFF ] = 0x0007
/// ```
pub struct StateDump<'a> {
    context: &'a Context,
    memory: &'a Memory,
}

impl<'a> StateDump<'a> {
    pub fn new(context: &'a Context, memory: &'a Memory) -> StateDump<'a> {
        StateDump { context, memory }
    }

    pub fn of<IO>(emulator: &'a Emulator<IO>) -> StateDump<'a> {
        StateDump::new(&emulator.context, &emulator.memory)
    }

    /// Addresses between the stack pointer and the top of memory, if anything has been pushed.
    fn stack(&self) -> Option<std::ops::Range<usize>> {
        let sp = self.context.sp() as usize;
        let top = self.memory.len();

        if sp >= top {
            None
        } else {
            Some(sp..top)
        }
    }

    /// Accessed cells outside the live stack, in address order.
    pub fn touched(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        let stack = self.stack();

        self.memory
            .cells()
            .iter()
            .enumerate()
            .filter(move |(address, _)| !stack.as_ref().map_or(false, |s| s.contains(address)))
            .filter(move |(address, _)| self.memory.is_accessed(*address as u16))
            .map(|(address, value)| (address as u16, *value))
    }

    /// Stack cells from the top of memory down to the stack pointer.
    pub fn stack_cells(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        self.stack()
            .into_iter()
            .flat_map(|range| range.rev())
            .map(move |address| (address as u16, self.memory.cells()[address]))
    }
}

impl<'a> fmt::Display for StateDump<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (index, value) in self.context.r.iter().enumerate() {
            writeln!(f, "R{} = 0x{:04X}", index, value)?;
        }

        writeln!(f, "Z = {}", self.context.flags.zero as u8)?;
        writeln!(f, "C = {}", self.context.flags.carry as u8)?;

        for (address, value) in self.touched().chain(self.stack_cells()) {
            writeln!(f, "[ 0x{:04X} ] = 0x{:04X}", address, value)?;
        }

        Ok(())
    }
}
