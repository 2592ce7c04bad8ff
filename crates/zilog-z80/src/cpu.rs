//! Z80 CPU core, stepped one instruction at a time.
//!
//! The CPU owns only its registers. Every cycle it spends is charged by the
//! bus: opcode fetches, memory and I/O cycles through the access methods,
//! and internal cycles through `Bus::delay`. On an uncontended bus each
//! instruction therefore costs exactly its documented T-state count.

mod cb;
mod ed;
mod execute;

use emu_core::{Bus, Cpu, Observable, Value};

use crate::flags::{CF, HF, NF, PF, SF, ZF};
use crate::registers::Registers;

/// Which register an H/L/(HL) operand refers to.
///
/// DD and FD are executed as separate prefix steps that select IX or IY for
/// the opcode that follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Index {
    Hl,
    Ix,
    Iy,
}

/// Zilog Z80 CPU.
pub struct Z80 {
    pub(crate) regs: Registers,
    /// Index substitution selected by a DD/FD prefix, consumed by the next opcode.
    index: Index,
    /// The last opcode executed was EI or DI.
    ///
    /// The interrupt check is skipped for exactly one instruction after
    /// either, so a `EI; RET` pair always completes.
    after_ei_di: bool,
    /// Last opcode fetched, for inspection.
    opcode: u8,
}

impl Z80 {
    /// Create a CPU in its power-on state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            regs: Registers::power_on(),
            index: Index::Hl,
            after_ei_di: false,
            opcode: 0,
        }
    }

    /// Register file.
    #[must_use]
    pub fn regs(&self) -> &Registers {
        &self.regs
    }

    /// Mutable register file for harnesses that seed CPU state directly.
    #[cfg(feature = "test-utils")]
    pub fn regs_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    /// True between a DD/FD prefix and the opcode it modifies.
    #[must_use]
    pub fn prefix_pending(&self) -> bool {
        self.index != Index::Hl
    }

    /// Whether a maskable interrupt would be taken at this boundary.
    fn accepts_interrupt(&self) -> bool {
        self.regs.iff1 && !self.after_ei_di && self.index == Index::Hl
    }

    /// Acknowledge a maskable interrupt.
    ///
    /// Nothing drives the data bus during the acknowledge on the SAM, so it
    /// floats to 0xFF: RST 38h in IM 0, and vector low byte 0xFF in IM 2.
    fn accept_interrupt<B: Bus>(&mut self, bus: &mut B) {
        self.leave_halt();
        self.regs.iff1 = false;
        self.regs.iff2 = false;
        self.inc_r();
        bus.delay(7);
        self.push(bus, self.regs.pc);
        self.regs.pc = if self.regs.im == 2 {
            let vector = (u16::from(self.regs.i) << 8) | 0xFF;
            bus.read_word(vector)
        } else {
            0x0038
        };
        self.regs.wz = self.regs.pc;
    }

    /// Step PC past a HALT so the handler returns to the next instruction.
    fn leave_halt(&mut self) {
        if self.regs.halted {
            self.regs.halted = false;
            self.regs.pc = self.regs.pc.wrapping_add(1);
        }
    }

    fn inc_r(&mut self) {
        self.regs.r = (self.regs.r & 0x80) | (self.regs.r.wrapping_add(1) & 0x7F);
    }

    /// M1 cycle: fetch an opcode byte at PC and bump R.
    fn fetch_opcode<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let op = bus.fetch(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        self.inc_r();
        op
    }

    fn imm8<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let v = bus.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        v
    }

    fn imm16<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let v = bus.read_word(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(2);
        v
    }

    fn push<B: Bus>(&mut self, bus: &mut B, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write(self.regs.sp, hi);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write(self.regs.sp, lo);
    }

    fn pop<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let v = bus.read_word(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(2);
        v
    }

    fn a(&self) -> u8 {
        self.regs.a()
    }

    fn f(&self) -> u8 {
        self.regs.f()
    }

    fn set_a(&mut self, value: u8) {
        self.regs.set_a(value);
    }

    fn set_f(&mut self, value: u8) {
        self.regs.set_f(value);
    }

    fn index_reg(&self, index: Index) -> u16 {
        match index {
            Index::Hl => self.regs.hl.get(),
            Index::Ix => self.regs.ix.get(),
            Index::Iy => self.regs.iy.get(),
        }
    }

    fn set_index_reg(&mut self, index: Index, value: u16) {
        match index {
            Index::Hl => self.regs.hl.set(value),
            Index::Ix => self.regs.ix.set(value),
            Index::Iy => self.regs.iy.set(value),
        }
    }

    /// 8-bit register by its 3-bit encoding (B C D E H L - A).
    ///
    /// Code 6 is the memory operand and must be handled by the caller.
    fn reg8(&self, r: u8, index: Index) -> u8 {
        match r & 7 {
            0 => self.regs.bc.hi(),
            1 => self.regs.bc.lo(),
            2 => self.regs.de.hi(),
            3 => self.regs.de.lo(),
            4 => (self.index_reg(index) >> 8) as u8,
            5 => self.index_reg(index) as u8,
            7 => self.a(),
            _ => unreachable!("(HL) operand decoded as a register"),
        }
    }

    fn set_reg8(&mut self, r: u8, index: Index, value: u8) {
        match r & 7 {
            0 => self.regs.bc.set_hi(value),
            1 => self.regs.bc.set_lo(value),
            2 => self.regs.de.set_hi(value),
            3 => self.regs.de.set_lo(value),
            4 => {
                let v = (self.index_reg(index) & 0x00FF) | (u16::from(value) << 8);
                self.set_index_reg(index, v);
            }
            5 => {
                let v = (self.index_reg(index) & 0xFF00) | u16::from(value);
                self.set_index_reg(index, v);
            }
            7 => self.set_a(value),
            _ => unreachable!("(HL) operand decoded as a register"),
        }
    }

    /// Register pair by its 2-bit encoding (BC DE HL SP).
    fn reg16(&self, p: u8, index: Index) -> u16 {
        match p & 3 {
            0 => self.regs.bc.get(),
            1 => self.regs.de.get(),
            2 => self.index_reg(index),
            _ => self.regs.sp,
        }
    }

    fn set_reg16(&mut self, p: u8, index: Index, value: u16) {
        match p & 3 {
            0 => self.regs.bc.set(value),
            1 => self.regs.de.set(value),
            2 => self.set_index_reg(index, value),
            _ => self.regs.sp = value,
        }
    }

    /// Register pair for PUSH/POP (BC DE HL AF).
    fn reg16_af(&self, p: u8, index: Index) -> u16 {
        if p & 3 == 3 {
            self.regs.af.get()
        } else {
            self.reg16(p, index)
        }
    }

    fn set_reg16_af(&mut self, p: u8, index: Index, value: u16) {
        if p & 3 == 3 {
            self.regs.af.set(value);
        } else {
            self.set_reg16(p, index, value);
        }
    }

    /// Address of the memory operand: HL, or IX/IY plus a displacement.
    ///
    /// The indexed form reads the displacement byte and spends five internal
    /// cycles on the addition.
    fn operand_addr<B: Bus>(&mut self, bus: &mut B, index: Index) -> u16 {
        if index == Index::Hl {
            return self.regs.hl.get();
        }
        let d = self.imm8(bus) as i8;
        bus.delay(5);
        let addr = self.index_reg(index).wrapping_add(d as u16);
        self.regs.wz = addr;
        addr
    }

    /// Condition code by its 3-bit encoding (NZ Z NC C PO PE P M).
    fn condition(&self, cc: u8) -> bool {
        let f = self.f();
        match cc & 7 {
            0 => f & ZF == 0,
            1 => f & ZF != 0,
            2 => f & CF == 0,
            3 => f & CF != 0,
            4 => f & PF == 0,
            5 => f & PF != 0,
            6 => f & SF == 0,
            _ => f & SF != 0,
        }
    }

    fn jump_relative(&mut self, offset: u8) {
        self.regs.pc = self.regs.pc.wrapping_add(offset as i8 as u16);
        self.regs.wz = self.regs.pc;
    }
}

impl Default for Z80 {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu for Z80 {
    type Registers = Registers;

    /// One instruction boundary.
    ///
    /// Pending events are drained first so an interrupt that fell due during
    /// the previous instruction is seen here, never one instruction later.
    fn step<B: Bus>(&mut self, bus: &mut B) {
        bus.check_events();

        if bus.int_active() && self.accepts_interrupt() {
            self.accept_interrupt(bus);
        }
        self.after_ei_di = false;

        let op = self.fetch_opcode(bus);
        self.opcode = op;
        let index = std::mem::replace(&mut self.index, Index::Hl);
        self.execute(bus, op, index);
    }

    fn pc(&self) -> u32 {
        u32::from(self.regs.pc)
    }

    fn registers(&self) -> Registers {
        self.regs
    }

    fn is_halted(&self) -> bool {
        self.regs.halted
    }

    fn nmi<B: Bus>(&mut self, bus: &mut B) {
        self.leave_halt();
        self.index = Index::Hl;
        self.regs.iff1 = false;
        self.inc_r();
        bus.delay(5);
        self.push(bus, self.regs.pc);
        self.regs.pc = 0x0066;
        self.regs.wz = self.regs.pc;
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Observable for Z80 {
    fn query(&self, path: &str) -> Option<Value> {
        let r = &self.regs;
        let f = r.f();
        let value: Value = match path {
            "pc" => r.pc.into(),
            "sp" => r.sp.into(),
            "af" => r.af.get().into(),
            "bc" => r.bc.get().into(),
            "de" => r.de.get().into(),
            "hl" => r.hl.get().into(),
            "ix" => r.ix.get().into(),
            "iy" => r.iy.get().into(),
            "wz" => r.wz.into(),
            "a" => r.a().into(),
            "f" => f.into(),
            "b" => r.bc.hi().into(),
            "c" => r.bc.lo().into(),
            "d" => r.de.hi().into(),
            "e" => r.de.lo().into(),
            "h" => r.hl.hi().into(),
            "l" => r.hl.lo().into(),
            "i" => r.i.into(),
            "r" => r.r.into(),
            "im" => r.im.into(),
            "iff1" => r.iff1.into(),
            "iff2" => r.iff2.into(),
            "halted" => r.halted.into(),
            "opcode" => self.opcode.into(),
            "flags.s" => (f & SF != 0).into(),
            "flags.z" => (f & ZF != 0).into(),
            "flags.h" => (f & HF != 0).into(),
            "flags.pv" => (f & PF != 0).into(),
            "flags.n" => (f & NF != 0).into(),
            "flags.c" => (f & CF != 0).into(),
            _ => return None,
        };
        Some(value)
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "pc", "sp", "af", "bc", "de", "hl", "ix", "iy", "wz", "a", "f", "b", "c", "d", "e",
            "h", "l", "i", "r", "im", "iff1", "iff2", "halted", "opcode", "flags.s", "flags.z",
            "flags.h", "flags.pv", "flags.n", "flags.c",
        ]
    }
}
