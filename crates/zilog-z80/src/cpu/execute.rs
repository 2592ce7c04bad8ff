//! Unprefixed opcodes, with IX/IY substitution after a DD/FD prefix.

use emu_core::Bus;

use super::{Index, Z80};
use crate::alu;
use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF};

impl Z80 {
    /// Execute one opcode that has already been fetched.
    ///
    /// `index` is the substitution for H, L, HL and (HL) selected by a
    /// preceding DD/FD prefix.
    pub(super) fn execute<B: Bus>(&mut self, bus: &mut B, op: u8, index: Index) {
        match op {
            // NOP
            0x00 => {}

            // LD rr,nn
            0x01 | 0x11 | 0x21 | 0x31 => {
                let v = self.imm16(bus);
                self.set_reg16(op >> 4, index, v);
            }

            // LD (BC),A / LD (DE),A
            0x02 | 0x12 => {
                let addr = if op == 0x02 {
                    self.regs.bc.get()
                } else {
                    self.regs.de.get()
                };
                let a = self.a();
                bus.write(addr, a);
                self.regs.wz = (u16::from(a) << 8) | (addr.wrapping_add(1) & 0xFF);
            }

            // LD A,(BC) / LD A,(DE)
            0x0A | 0x1A => {
                let addr = if op == 0x0A {
                    self.regs.bc.get()
                } else {
                    self.regs.de.get()
                };
                let v = bus.read(addr);
                self.set_a(v);
                self.regs.wz = addr.wrapping_add(1);
            }

            // INC rr / DEC rr
            0x03 | 0x13 | 0x23 | 0x33 | 0x0B | 0x1B | 0x2B | 0x3B => {
                bus.delay(2);
                let p = op >> 4;
                let v = self.reg16(p, index);
                let v = if op & 0x08 == 0 {
                    v.wrapping_add(1)
                } else {
                    v.wrapping_sub(1)
                };
                self.set_reg16(p, index, v);
            }

            // INC (HL) / DEC (HL)
            0x34 | 0x35 => {
                let addr = self.operand_addr(bus, index);
                let v = bus.read(addr);
                bus.delay(1);
                let (r, f) = if op == 0x34 {
                    alu::inc8(v, self.f())
                } else {
                    alu::dec8(v, self.f())
                };
                bus.write(addr, r);
                self.set_f(f);
            }

            // INC r
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x3C => {
                let r = op >> 3;
                let (v, f) = alu::inc8(self.reg8(r, index), self.f());
                self.set_reg8(r, index, v);
                self.set_f(f);
            }

            // DEC r
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x3D => {
                let r = op >> 3;
                let (v, f) = alu::dec8(self.reg8(r, index), self.f());
                self.set_reg8(r, index, v);
                self.set_f(f);
            }

            // LD (HL),n
            0x36 => {
                if index == Index::Hl {
                    let n = self.imm8(bus);
                    bus.write(self.regs.hl.get(), n);
                } else {
                    // Displacement and operand are both read before the add
                    let d = self.imm8(bus) as i8;
                    let n = self.imm8(bus);
                    bus.delay(2);
                    let addr = self.index_reg(index).wrapping_add(d as u16);
                    self.regs.wz = addr;
                    bus.write(addr, n);
                }
            }

            // LD r,n
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x3E => {
                let n = self.imm8(bus);
                self.set_reg8(op >> 3, index, n);
            }

            // RLCA / RRCA / RLA / RRA
            0x07 | 0x0F | 0x17 | 0x1F => {
                let a = self.a();
                let f = self.f();
                let (r, carry) = match op {
                    0x07 => (a.rotate_left(1), a >> 7),
                    0x0F => (a.rotate_right(1), a & 1),
                    0x17 => ((a << 1) | (f & CF), a >> 7),
                    _ => ((a >> 1) | ((f & CF) << 7), a & 1),
                };
                self.set_a(r);
                self.set_f((f & (SF | ZF | PF)) | (r & (YF | XF)) | carry);
            }

            // EX AF,AF'
            0x08 => self.regs.ex_af(),

            // ADD HL,rr
            0x09 | 0x19 | 0x29 | 0x39 => {
                bus.delay(7);
                let hl = self.index_reg(index);
                let rr = self.reg16(op >> 4, index);
                let (r, f) = alu::add16(hl, rr, self.f());
                self.regs.wz = hl.wrapping_add(1);
                self.set_index_reg(index, r);
                self.set_f(f);
            }

            // DJNZ e
            0x10 => {
                bus.delay(1);
                let e = self.imm8(bus);
                let b = self.regs.bc.hi().wrapping_sub(1);
                self.regs.bc.set_hi(b);
                if b != 0 {
                    bus.delay(5);
                    self.jump_relative(e);
                }
            }

            // JR e
            0x18 => {
                let e = self.imm8(bus);
                bus.delay(5);
                self.jump_relative(e);
            }

            // JR cc,e
            0x20 | 0x28 | 0x30 | 0x38 => {
                let e = self.imm8(bus);
                if self.condition((op >> 3) & 3) {
                    bus.delay(5);
                    self.jump_relative(e);
                }
            }

            // LD (nn),HL
            0x22 => {
                let nn = self.imm16(bus);
                bus.write_word(nn, self.index_reg(index));
                self.regs.wz = nn.wrapping_add(1);
            }

            // LD HL,(nn)
            0x2A => {
                let nn = self.imm16(bus);
                let v = bus.read_word(nn);
                self.set_index_reg(index, v);
                self.regs.wz = nn.wrapping_add(1);
            }

            // DAA
            0x27 => {
                let (r, f) = alu::daa(self.a(), self.f());
                self.set_a(r);
                self.set_f(f);
            }

            // CPL
            0x2F => {
                let r = !self.a();
                self.set_a(r);
                let f = (self.f() & (SF | ZF | PF | CF)) | HF | NF | (r & (YF | XF));
                self.set_f(f);
            }

            // SCF
            0x37 => {
                let f = (self.f() & (SF | ZF | PF)) | (self.a() & (YF | XF)) | CF;
                self.set_f(f);
            }

            // CCF
            0x3F => {
                let old = self.f();
                let mut f = (old & (SF | ZF | PF)) | (self.a() & (YF | XF));
                if old & CF != 0 {
                    f |= HF;
                } else {
                    f |= CF;
                }
                self.set_f(f);
            }

            // LD (nn),A
            0x32 => {
                let nn = self.imm16(bus);
                let a = self.a();
                bus.write(nn, a);
                self.regs.wz = (u16::from(a) << 8) | (nn.wrapping_add(1) & 0xFF);
            }

            // LD A,(nn)
            0x3A => {
                let nn = self.imm16(bus);
                let v = bus.read(nn);
                self.set_a(v);
                self.regs.wz = nn.wrapping_add(1);
            }

            // HALT: re-executes as a NOP until an interrupt moves PC on
            0x76 => {
                self.regs.halted = true;
                self.regs.pc = self.regs.pc.wrapping_sub(1);
            }

            // LD r,r' / LD r,(HL) / LD (HL),r
            0x40..=0x7F => {
                let dst = (op >> 3) & 7;
                let src = op & 7;
                if src == 6 {
                    let addr = self.operand_addr(bus, index);
                    let v = bus.read(addr);
                    self.set_reg8(dst, Index::Hl, v);
                } else if dst == 6 {
                    let addr = self.operand_addr(bus, index);
                    bus.write(addr, self.reg8(src, Index::Hl));
                } else {
                    let v = self.reg8(src, index);
                    self.set_reg8(dst, index, v);
                }
            }

            // ALU A,r / ALU A,(HL)
            0x80..=0xBF => {
                let v = if op & 7 == 6 {
                    let addr = self.operand_addr(bus, index);
                    bus.read(addr)
                } else {
                    self.reg8(op, index)
                };
                self.alu_a(op >> 3, v);
            }

            // RET cc
            0xC0 | 0xC8 | 0xD0 | 0xD8 | 0xE0 | 0xE8 | 0xF0 | 0xF8 => {
                bus.delay(1);
                if self.condition(op >> 3) {
                    self.regs.pc = self.pop(bus);
                    self.regs.wz = self.regs.pc;
                }
            }

            // POP rr
            0xC1 | 0xD1 | 0xE1 | 0xF1 => {
                let v = self.pop(bus);
                self.set_reg16_af(op >> 4, index, v);
            }

            // JP cc,nn
            0xC2 | 0xCA | 0xD2 | 0xDA | 0xE2 | 0xEA | 0xF2 | 0xFA => {
                let nn = self.imm16(bus);
                self.regs.wz = nn;
                if self.condition(op >> 3) {
                    self.regs.pc = nn;
                }
            }

            // JP nn
            0xC3 => {
                let nn = self.imm16(bus);
                self.regs.pc = nn;
                self.regs.wz = nn;
            }

            // CALL cc,nn
            0xC4 | 0xCC | 0xD4 | 0xDC | 0xE4 | 0xEC | 0xF4 | 0xFC => {
                let nn = self.imm16(bus);
                self.regs.wz = nn;
                if self.condition(op >> 3) {
                    bus.delay(1);
                    self.push(bus, self.regs.pc);
                    self.regs.pc = nn;
                }
            }

            // PUSH rr
            0xC5 | 0xD5 | 0xE5 | 0xF5 => {
                bus.delay(1);
                let v = self.reg16_af(op >> 4, index);
                self.push(bus, v);
            }

            // ALU A,n
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                let n = self.imm8(bus);
                self.alu_a(op >> 3, n);
            }

            // RST p
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                bus.delay(1);
                self.push(bus, self.regs.pc);
                self.regs.pc = u16::from(op & 0x38);
                self.regs.wz = self.regs.pc;
            }

            // RET
            0xC9 => {
                self.regs.pc = self.pop(bus);
                self.regs.wz = self.regs.pc;
            }

            // CB prefix
            0xCB => self.execute_cb(bus, index),

            // CALL nn
            0xCD => {
                let nn = self.imm16(bus);
                bus.delay(1);
                self.push(bus, self.regs.pc);
                self.regs.pc = nn;
                self.regs.wz = nn;
            }

            // OUT (n),A
            0xD3 => {
                let n = self.imm8(bus);
                let a = self.a();
                let port = (u16::from(a) << 8) | u16::from(n);
                bus.io_write(port, a);
                self.regs.wz = (u16::from(a) << 8) | u16::from(n.wrapping_add(1));
            }

            // IN A,(n)
            0xDB => {
                let n = self.imm8(bus);
                let port = (u16::from(self.a()) << 8) | u16::from(n);
                let v = bus.io_read(port);
                self.set_a(v);
                self.regs.wz = port.wrapping_add(1);
            }

            // EXX
            0xD9 => self.regs.exx(),

            // DD / FD prefixes
            0xDD => self.index = Index::Ix,
            0xFD => self.index = Index::Iy,

            // EX (SP),HL
            0xE3 => {
                let sp = self.regs.sp;
                let lo = bus.read(sp);
                let hi = bus.read(sp.wrapping_add(1));
                bus.delay(1);
                let [old_lo, old_hi] = self.index_reg(index).to_le_bytes();
                bus.write(sp.wrapping_add(1), old_hi);
                bus.write(sp, old_lo);
                bus.delay(2);
                let v = u16::from_le_bytes([lo, hi]);
                self.set_index_reg(index, v);
                self.regs.wz = v;
            }

            // JP (HL)
            0xE9 => self.regs.pc = self.index_reg(index),

            // EX DE,HL is never affected by a prefix
            0xEB => std::mem::swap(&mut self.regs.de, &mut self.regs.hl),

            // ED prefix
            0xED => self.execute_ed(bus),

            // DI / EI
            0xF3 | 0xFB => {
                let enable = op == 0xFB;
                self.regs.iff1 = enable;
                self.regs.iff2 = enable;
                self.after_ei_di = true;
            }

            // LD SP,HL
            0xF9 => {
                bus.delay(2);
                self.regs.sp = self.index_reg(index);
            }
        }
    }

    /// Accumulator operation selected by bits 3-5 of the opcode.
    fn alu_a(&mut self, op: u8, value: u8) {
        let (r, f) = alu::alu_op(op, self.a(), value, self.f());
        self.set_a(r);
        self.set_f(f);
    }
}
