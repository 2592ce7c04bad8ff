//! CPU core trait.

use crate::Bus;

/// An instruction-stepped CPU core.
///
/// The bus is passed in, not owned, so the machine can keep the clock,
/// memory and peripherals together and hand them to the CPU one instruction
/// at a time.
pub trait Cpu {
    /// The type used for register inspection.
    type Registers;

    /// Run one instruction boundary: events, interrupt check, one opcode.
    fn step<B: Bus>(&mut self, bus: &mut B);

    /// Returns the current program counter.
    ///
    /// Returns `u32` so wider address buses fit. 16-bit CPUs zero-extend.
    fn pc(&self) -> u32;

    /// Returns a snapshot of all registers for inspection.
    fn registers(&self) -> Self::Registers;

    /// Returns true if the CPU is halted.
    fn is_halted(&self) -> bool;

    /// Deliver a non-maskable interrupt now.
    fn nmi<B: Bus>(&mut self, bus: &mut B);

    /// Reset the CPU to its power-on state.
    fn reset(&mut self);
}
