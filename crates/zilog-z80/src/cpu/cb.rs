//! CB-prefixed rotates, shifts and bit operations, including DDCB/FDCB.

use emu_core::Bus;

use super::{Index, Z80};
use crate::alu;
use crate::flags::{CF, HF, PF, SF, XF, YF, ZF};

impl Z80 {
    pub(super) fn execute_cb<B: Bus>(&mut self, bus: &mut B, index: Index) {
        if index != Index::Hl {
            self.execute_indexed_cb(bus, index);
            return;
        }

        let op = self.fetch_opcode(bus);
        let r = op & 7;
        let y = (op >> 3) & 7;

        if r == 6 {
            let addr = self.regs.hl.get();
            let v = bus.read(addr);
            bus.delay(1);
            match op >> 6 {
                1 => self.bit(y, v, (self.regs.wz >> 8) as u8),
                _ => {
                    let result = self.cb_result(op, v);
                    bus.write(addr, result);
                }
            }
        } else {
            let v = self.reg8(r, Index::Hl);
            match op >> 6 {
                1 => self.bit(y, v, v),
                _ => {
                    let result = self.cb_result(op, v);
                    self.set_reg8(r, Index::Hl, result);
                }
            }
        }
    }

    /// DD CB d op / FD CB d op.
    ///
    /// The displacement comes before the opcode, and neither byte is an M1
    /// cycle. Non-BIT forms also copy the result into the register named by
    /// the low three bits unless they are 6.
    fn execute_indexed_cb<B: Bus>(&mut self, bus: &mut B, index: Index) {
        let d = self.imm8(bus) as i8;
        let op = self.imm8(bus);
        bus.delay(2);
        let addr = self.index_reg(index).wrapping_add(d as u16);
        self.regs.wz = addr;

        let v = bus.read(addr);
        bus.delay(1);
        if op >> 6 == 1 {
            self.bit((op >> 3) & 7, v, (addr >> 8) as u8);
            return;
        }

        let result = self.cb_result(op, v);
        bus.write(addr, result);
        let r = op & 7;
        if r != 6 {
            self.set_reg8(r, Index::Hl, result);
        }
    }

    /// Result of a shift, RES or SET. Shifts also update F.
    fn cb_result(&mut self, op: u8, v: u8) -> u8 {
        let y = (op >> 3) & 7;
        match op >> 6 {
            0 => {
                let (r, f) = alu::shift(y, v, self.f());
                self.set_f(f);
                r
            }
            2 => v & !(1 << y),
            _ => v | (1 << y),
        }
    }

    /// BIT y,v. Bits 3 and 5 of F come from `xy`, which depends on the
    /// addressing form.
    fn bit(&mut self, y: u8, v: u8, xy: u8) {
        let set = v & (1 << y) != 0;
        let mut f = (self.f() & CF) | HF | (xy & (YF | XF));
        if !set {
            f |= ZF | PF;
        }
        if set && y == 7 {
            f |= SF;
        }
        self.set_f(f);
    }
}
