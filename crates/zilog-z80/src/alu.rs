//! Z80 arithmetic and logic.
//!
//! Pure functions: operands in, `(result, flags)` out. The caller decides
//! which flags survive from the old F.

use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF, sz53, sz53p};

/// ADD/ADC.
#[must_use]
pub fn add8(a: u8, b: u8, carry: bool) -> (u8, u8) {
    let c = u8::from(carry);
    let sum = u16::from(a) + u16::from(b) + u16::from(c);
    let r = sum as u8;
    let mut f = sz53(r);
    if (a & 0x0F) + (b & 0x0F) + c > 0x0F {
        f |= HF;
    }
    if (a ^ b) & 0x80 == 0 && (a ^ r) & 0x80 != 0 {
        f |= PF;
    }
    if sum > 0xFF {
        f |= CF;
    }
    (r, f)
}

/// SUB/SBC.
#[must_use]
pub fn sub8(a: u8, b: u8, carry: bool) -> (u8, u8) {
    let c = i16::from(carry);
    let diff = i16::from(a) - i16::from(b) - c;
    let r = diff as u8;
    let mut f = sz53(r) | NF;
    if i16::from(a & 0x0F) - i16::from(b & 0x0F) - c < 0 {
        f |= HF;
    }
    if (a ^ b) & 0x80 != 0 && (a ^ r) & 0x80 != 0 {
        f |= PF;
    }
    if diff < 0 {
        f |= CF;
    }
    (r, f)
}

/// CP: flags of SUB, but bits 3 and 5 come from the operand.
#[must_use]
pub fn cp8(a: u8, b: u8) -> u8 {
    let (_, f) = sub8(a, b, false);
    (f & !(YF | XF)) | (b & (YF | XF))
}

#[must_use]
pub fn and8(a: u8, b: u8) -> (u8, u8) {
    let r = a & b;
    (r, sz53p(r) | HF)
}

#[must_use]
pub fn or8(a: u8, b: u8) -> (u8, u8) {
    let r = a | b;
    (r, sz53p(r))
}

#[must_use]
pub fn xor8(a: u8, b: u8) -> (u8, u8) {
    let r = a ^ b;
    (r, sz53p(r))
}

/// The eight accumulator operations selected by bits 3-5 of 0x80-0xBF and
/// the immediate forms.
#[must_use]
pub fn alu_op(op: u8, a: u8, b: u8, f: u8) -> (u8, u8) {
    let carry = f & CF != 0;
    match op & 7 {
        0 => add8(a, b, false),
        1 => add8(a, b, carry),
        2 => sub8(a, b, false),
        3 => sub8(a, b, carry),
        4 => and8(a, b),
        5 => xor8(a, b),
        6 => or8(a, b),
        _ => (a, cp8(a, b)),
    }
}

/// INC r. Carry is preserved from `f`.
#[must_use]
pub fn inc8(v: u8, f: u8) -> (u8, u8) {
    let r = v.wrapping_add(1);
    let mut flags = (f & CF) | sz53(r);
    if v & 0x0F == 0x0F {
        flags |= HF;
    }
    if v == 0x7F {
        flags |= PF;
    }
    (r, flags)
}

/// DEC r. Carry is preserved from `f`.
#[must_use]
pub fn dec8(v: u8, f: u8) -> (u8, u8) {
    let r = v.wrapping_sub(1);
    let mut flags = (f & CF) | sz53(r) | NF;
    if v & 0x0F == 0 {
        flags |= HF;
    }
    if v == 0x80 {
        flags |= PF;
    }
    (r, flags)
}

/// ADD HL,rr. S, Z and P/V are preserved from `f`.
#[must_use]
pub fn add16(a: u16, b: u16, f: u8) -> (u16, u8) {
    let sum = u32::from(a) + u32::from(b);
    let r = sum as u16;
    let mut flags = (f & (SF | ZF | PF)) | ((r >> 8) as u8 & (YF | XF));
    if (a & 0x0FFF) + (b & 0x0FFF) > 0x0FFF {
        flags |= HF;
    }
    if sum > 0xFFFF {
        flags |= CF;
    }
    (r, flags)
}

/// ADC HL,rr.
#[must_use]
pub fn adc16(a: u16, b: u16, carry: bool) -> (u16, u8) {
    let c = u32::from(carry);
    let sum = u32::from(a) + u32::from(b) + c;
    let r = sum as u16;
    let mut flags = (r >> 8) as u8 & (SF | YF | XF);
    if r == 0 {
        flags |= ZF;
    }
    if u32::from(a & 0x0FFF) + u32::from(b & 0x0FFF) + c > 0x0FFF {
        flags |= HF;
    }
    if (a ^ b) & 0x8000 == 0 && (a ^ r) & 0x8000 != 0 {
        flags |= PF;
    }
    if sum > 0xFFFF {
        flags |= CF;
    }
    (r, flags)
}

/// SBC HL,rr.
#[must_use]
pub fn sbc16(a: u16, b: u16, carry: bool) -> (u16, u8) {
    let c = i32::from(carry);
    let diff = i32::from(a) - i32::from(b) - c;
    let r = diff as u16;
    let mut flags = NF | ((r >> 8) as u8 & (SF | YF | XF));
    if r == 0 {
        flags |= ZF;
    }
    if i32::from(a & 0x0FFF) - i32::from(b & 0x0FFF) - c < 0 {
        flags |= HF;
    }
    if (a ^ b) & 0x8000 != 0 && (a ^ r) & 0x8000 != 0 {
        flags |= PF;
    }
    if diff < 0 {
        flags |= CF;
    }
    (r, flags)
}

/// DAA.
#[must_use]
pub fn daa(a: u8, f: u8) -> (u8, u8) {
    let subtract = f & NF != 0;
    let mut carry = f & CF != 0;
    let mut correction = 0u8;
    if f & HF != 0 || a & 0x0F > 9 {
        correction |= 0x06;
    }
    if carry || a > 0x99 {
        correction |= 0x60;
        carry = true;
    }
    let r = if subtract {
        a.wrapping_sub(correction)
    } else {
        a.wrapping_add(correction)
    };
    let half = if subtract {
        f & HF != 0 && a & 0x0F < 6
    } else {
        a & 0x0F > 9
    };
    let mut flags = sz53p(r) | (f & NF);
    if half {
        flags |= HF;
    }
    if carry {
        flags |= CF;
    }
    (r, flags)
}

/// CB-table rotates and shifts, selected by bits 3-5 of the opcode:
/// RLC, RRC, RL, RR, SLA, SRA, SLL, SRL.
#[must_use]
pub fn shift(op: u8, v: u8, f: u8) -> (u8, u8) {
    let carry_in = f & CF;
    let (r, carry) = match op & 7 {
        0 => (v.rotate_left(1), v >> 7),
        1 => (v.rotate_right(1), v & 1),
        2 => ((v << 1) | carry_in, v >> 7),
        3 => ((v >> 1) | (carry_in << 7), v & 1),
        4 => (v << 1, v >> 7),
        5 => ((v >> 1) | (v & 0x80), v & 1),
        6 => ((v << 1) | 1, v >> 7),
        _ => (v >> 1, v & 1),
    };
    (r, sz53p(r) | carry)
}
