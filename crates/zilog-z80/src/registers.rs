//! Z80 register set.

/// A 16-bit register pair with byte views.
///
/// The halves are computed with shifts and masks, so the layout never
/// depends on host byte order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegPair(pub u16);

impl RegPair {
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }

    pub fn set(&mut self, value: u16) {
        self.0 = value;
    }

    /// High byte (B of BC, H of HL, ...).
    #[must_use]
    pub const fn hi(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// Low byte (C of BC, L of HL, ...).
    #[must_use]
    pub const fn lo(self) -> u8 {
        self.0 as u8
    }

    pub fn set_hi(&mut self, value: u8) {
        self.0 = (self.0 & 0x00FF) | (u16::from(value) << 8);
    }

    pub fn set_lo(&mut self, value: u8) {
        self.0 = (self.0 & 0xFF00) | u16::from(value);
    }
}

/// Z80 registers.
///
/// Also used as the inspection snapshot returned by `Cpu::registers()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    pub af: RegPair,
    pub bc: RegPair,
    pub de: RegPair,
    pub hl: RegPair,

    // Shadow set, swapped in by EX AF,AF' and EXX
    pub af_alt: RegPair,
    pub bc_alt: RegPair,
    pub de_alt: RegPair,
    pub hl_alt: RegPair,

    pub ix: RegPair,
    pub iy: RegPair,
    pub sp: u16,
    pub pc: u16,
    pub i: u8,
    /// Memory refresh counter. Bit 7 is only changed by LD R,A.
    pub r: u8,

    /// WZ/MEMPTR. Leaks into the undocumented flag bits of BIT n,(HL).
    pub wz: u16,

    pub iff1: bool,
    pub iff2: bool,
    pub im: u8,
    pub halted: bool,
}

impl Registers {
    /// Power-on register state.
    ///
    /// The index registers come up as 0xFFFF and F has only the zero flag
    /// set, matching what real SAM hardware shows after power-on.
    #[must_use]
    pub fn power_on() -> Self {
        Self {
            af: RegPair::new(u16::from(crate::flags::ZF)),
            ix: RegPair::new(0xFFFF),
            iy: RegPair::new(0xFFFF),
            sp: 0xFFFF,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn a(&self) -> u8 {
        self.af.hi()
    }

    pub fn set_a(&mut self, value: u8) {
        self.af.set_hi(value);
    }

    #[must_use]
    pub const fn f(&self) -> u8 {
        self.af.lo()
    }

    pub fn set_f(&mut self, value: u8) {
        self.af.set_lo(value);
    }

    /// Swap AF with AF'.
    pub fn ex_af(&mut self) {
        std::mem::swap(&mut self.af, &mut self.af_alt);
    }

    /// Swap BC, DE and HL with their shadows.
    pub fn exx(&mut self) {
        std::mem::swap(&mut self.bc, &mut self.bc_alt);
        std::mem::swap(&mut self.de, &mut self.de_alt);
        std::mem::swap(&mut self.hl, &mut self.hl_alt);
    }
}
