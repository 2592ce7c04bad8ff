//! Z80 CPU core.
//!
//! Each call to `Cpu::step()` executes one instruction (or one DD/FD
//! prefix). The bus charges every cycle, so the CPU itself keeps no clock.

mod alu;
mod cpu;
mod flags;
mod registers;

pub use cpu::Z80;
pub use flags::{CF, HF, NF, PF, SF, XF, YF, ZF};
pub use registers::{RegPair, Registers};
