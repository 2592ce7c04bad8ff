//! Core traits for cycle-counted emulation.
//!
//! Time is owned by the bus. Every memory or port access the CPU makes goes
//! through [`Bus`], and the bus charges the cycles for it. Nothing else moves
//! the clock except explicit internal delays.

mod bus;
mod cpu;
mod observable;

pub use bus::Bus;
pub use cpu::Cpu;
pub use observable::{Observable, Value};
