//! ED-prefixed opcodes.
//!
//! Unassigned ED opcodes execute as 8 T-state NOPs. A DD/FD prefix before
//! ED has no effect on it.

use emu_core::Bus;

use super::{Index, Z80};
use crate::alu;
use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF, sz53, sz53p};

impl Z80 {
    pub(super) fn execute_ed<B: Bus>(&mut self, bus: &mut B) {
        let op = self.fetch_opcode(bus);
        match op {
            // IN r,(C); 0x70 only sets flags
            0x40 | 0x48 | 0x50 | 0x58 | 0x60 | 0x68 | 0x70 | 0x78 => {
                let port = self.regs.bc.get();
                let v = bus.io_read(port);
                let r = (op >> 3) & 7;
                if r != 6 {
                    self.set_reg8(r, Index::Hl, v);
                }
                self.set_f((self.f() & CF) | sz53p(v));
                self.regs.wz = port.wrapping_add(1);
            }

            // OUT (C),r; 0x71 outputs zero
            0x41 | 0x49 | 0x51 | 0x59 | 0x61 | 0x69 | 0x71 | 0x79 => {
                let port = self.regs.bc.get();
                let r = (op >> 3) & 7;
                let v = if r == 6 { 0 } else { self.reg8(r, Index::Hl) };
                bus.io_write(port, v);
                self.regs.wz = port.wrapping_add(1);
            }

            // SBC HL,rr / ADC HL,rr
            0x42 | 0x52 | 0x62 | 0x72 | 0x4A | 0x5A | 0x6A | 0x7A => {
                bus.delay(7);
                let hl = self.regs.hl.get();
                let rr = self.reg16(op >> 4, Index::Hl);
                let carry = self.f() & CF != 0;
                let (r, f) = if op & 0x08 == 0 {
                    alu::sbc16(hl, rr, carry)
                } else {
                    alu::adc16(hl, rr, carry)
                };
                self.regs.wz = hl.wrapping_add(1);
                self.regs.hl.set(r);
                self.set_f(f);
            }

            // LD (nn),rr
            0x43 | 0x53 | 0x63 | 0x73 => {
                let nn = self.imm16(bus);
                bus.write_word(nn, self.reg16(op >> 4, Index::Hl));
                self.regs.wz = nn.wrapping_add(1);
            }

            // LD rr,(nn)
            0x4B | 0x5B | 0x6B | 0x7B => {
                let nn = self.imm16(bus);
                let v = bus.read_word(nn);
                self.set_reg16(op >> 4, Index::Hl, v);
                self.regs.wz = nn.wrapping_add(1);
            }

            // NEG
            0x44 | 0x4C | 0x54 | 0x5C | 0x64 | 0x6C | 0x74 | 0x7C => {
                let (r, f) = alu::sub8(0, self.a(), false);
                self.set_a(r);
                self.set_f(f);
            }

            // RETN / RETI
            0x45 | 0x4D | 0x55 | 0x5D | 0x65 | 0x6D | 0x75 | 0x7D => {
                self.regs.iff1 = self.regs.iff2;
                self.regs.pc = self.pop(bus);
                self.regs.wz = self.regs.pc;
            }

            // IM 0 / IM 1 / IM 2
            0x46 | 0x4E | 0x66 | 0x6E => self.regs.im = 0,
            0x56 | 0x76 => self.regs.im = 1,
            0x5E | 0x7E => self.regs.im = 2,

            // LD I,A / LD R,A
            0x47 => {
                bus.delay(1);
                self.regs.i = self.a();
            }
            0x4F => {
                bus.delay(1);
                self.regs.r = self.a();
            }

            // LD A,I / LD A,R
            0x57 | 0x5F => {
                bus.delay(1);
                let v = if op == 0x57 { self.regs.i } else { self.regs.r };
                self.set_a(v);
                let mut f = (self.f() & CF) | sz53(v);
                if self.regs.iff2 {
                    f |= PF;
                }
                self.set_f(f);
            }

            // RRD / RLD
            0x67 | 0x6F => {
                let addr = self.regs.hl.get();
                let v = bus.read(addr);
                bus.delay(4);
                let a = self.a();
                let (new_a, new_v) = if op == 0x67 {
                    ((a & 0xF0) | (v & 0x0F), (a << 4) | (v >> 4))
                } else {
                    ((a & 0xF0) | (v >> 4), (v << 4) | (a & 0x0F))
                };
                bus.write(addr, new_v);
                self.set_a(new_a);
                self.set_f((self.f() & CF) | sz53p(new_a));
                self.regs.wz = addr.wrapping_add(1);
            }

            // LDI / LDD / LDIR / LDDR
            0xA0 | 0xA8 | 0xB0 | 0xB8 => self.block_load(bus, op),

            // CPI / CPD / CPIR / CPDR
            0xA1 | 0xA9 | 0xB1 | 0xB9 => self.block_compare(bus, op),

            // INI / IND / INIR / INDR
            0xA2 | 0xAA | 0xB2 | 0xBA => self.block_in(bus, op),

            // OUTI / OUTD / OTIR / OTDR
            0xA3 | 0xAB | 0xB3 | 0xBB => self.block_out(bus, op),

            _ => {}
        }
    }

    /// Step for a block instruction: bit 3 of the opcode selects decrement.
    fn block_step(op: u8) -> u16 {
        if op & 0x08 == 0 { 1 } else { 0xFFFF }
    }

    /// Rewind PC onto the ED prefix so a repeating block op runs again.
    fn block_repeat<B: Bus>(&mut self, bus: &mut B) {
        bus.delay(5);
        self.regs.pc = self.regs.pc.wrapping_sub(2);
        self.regs.wz = self.regs.pc.wrapping_add(1);
    }

    fn block_load<B: Bus>(&mut self, bus: &mut B, op: u8) {
        let step = Self::block_step(op);
        let hl = self.regs.hl.get();
        let de = self.regs.de.get();
        let v = bus.read(hl);
        bus.write(de, v);
        bus.delay(2);
        self.regs.hl.set(hl.wrapping_add(step));
        self.regs.de.set(de.wrapping_add(step));
        let bc = self.regs.bc.get().wrapping_sub(1);
        self.regs.bc.set(bc);

        let n = v.wrapping_add(self.a());
        let mut f = (self.f() & (SF | ZF | CF)) | (n & XF) | ((n << 4) & YF);
        if bc != 0 {
            f |= PF;
        }
        self.set_f(f);

        if op & 0x10 != 0 && bc != 0 {
            self.block_repeat(bus);
        }
    }

    fn block_compare<B: Bus>(&mut self, bus: &mut B, op: u8) {
        let step = Self::block_step(op);
        let hl = self.regs.hl.get();
        let v = bus.read(hl);
        bus.delay(5);
        self.regs.hl.set(hl.wrapping_add(step));
        self.regs.wz = self.regs.wz.wrapping_add(step);
        let bc = self.regs.bc.get().wrapping_sub(1);
        self.regs.bc.set(bc);

        let a = self.a();
        let r = a.wrapping_sub(v);
        let half = (a & 0x0F) < (v & 0x0F);
        let n = r.wrapping_sub(u8::from(half));
        let mut f = (self.f() & CF) | NF | (r & SF) | (n & XF) | ((n << 4) & YF);
        if r == 0 {
            f |= ZF;
        }
        if half {
            f |= HF;
        }
        if bc != 0 {
            f |= PF;
        }
        self.set_f(f);

        if op & 0x10 != 0 && bc != 0 && r != 0 {
            self.block_repeat(bus);
        }
    }

    fn block_in<B: Bus>(&mut self, bus: &mut B, op: u8) {
        let step = Self::block_step(op);
        bus.delay(1);
        let port = self.regs.bc.get();
        let v = bus.io_read(port);
        let hl = self.regs.hl.get();
        bus.write(hl, v);
        self.regs.hl.set(hl.wrapping_add(step));
        self.regs.wz = port.wrapping_add(step);
        let b = self.regs.bc.hi().wrapping_sub(1);
        self.regs.bc.set_hi(b);

        let k = u16::from(v) + u16::from(self.regs.bc.lo().wrapping_add(step as u8));
        self.block_io_flags(v, k, b);

        if op & 0x10 != 0 && b != 0 {
            self.block_repeat(bus);
        }
    }

    fn block_out<B: Bus>(&mut self, bus: &mut B, op: u8) {
        let step = Self::block_step(op);
        bus.delay(1);
        let hl = self.regs.hl.get();
        let v = bus.read(hl);
        let b = self.regs.bc.hi().wrapping_sub(1);
        self.regs.bc.set_hi(b);
        let port = self.regs.bc.get();
        bus.io_write(port, v);
        self.regs.hl.set(hl.wrapping_add(step));
        self.regs.wz = port.wrapping_add(step);

        let k = u16::from(v) + u16::from(self.regs.hl.lo());
        self.block_io_flags(v, k, b);

        if op & 0x10 != 0 && b != 0 {
            self.block_repeat(bus);
        }
    }

    /// Flags shared by the block I/O instructions.
    fn block_io_flags(&mut self, v: u8, k: u16, b: u8) {
        let mut f = sz53(b);
        if v & 0x80 != 0 {
            f |= NF;
        }
        if k > 0xFF {
            f |= HF | CF;
        }
        f |= sz53p((k as u8 & 7) ^ b) & PF;
        self.set_f(f);
    }
}
