//! SAM memory paging.
//!
//! The 64K address space is four 16K sections, A to D. LMPR pages internal
//! RAM into A and B (page n and n+1), HMPR into C and D. ROM0 overlays A
//! unless LMPR bit 5 is set, ROM1 overlays D when LMPR bit 6 is set. With
//! HMPR bit 7 set, C and D come from external memory through LEPR and HEPR.

use crate::config::MainMemory;
use crate::error::SamError;

pub const PAGE_SIZE: usize = 0x4000;
pub const ROM_SIZE: usize = 0x8000;
/// External memory pages per megabyte.
pub const EXTERNAL_PAGES_PER_MB: usize = 64;

/// LMPR (port 250) bits.
pub mod lmpr {
    pub const PAGE: u8 = 0x1F;
    /// RAM instead of ROM0 in section A.
    pub const ROM0_OFF: u8 = 0x20;
    /// ROM1 in section D.
    pub const ROM1_ON: u8 = 0x40;
    /// Section A write protect.
    pub const WPRAM: u8 = 0x80;
}

/// HMPR (port 251) bits.
pub mod hmpr {
    pub const PAGE: u8 = 0x1F;
    /// Mode 3 CLUT bits for colours 0-3.
    pub const MD3S: u8 = 0x60;
    /// External memory in sections C and D.
    pub const MCNTRL: u8 = 0x80;
}

/// What a section is mapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Internal(u8),
    External(u8),
    Rom(u8),
    /// Nothing fitted: reads float high, writes vanish.
    Absent,
}

/// Paged SAM memory.
pub struct Memory {
    ram: Vec<u8>,
    external: Vec<u8>,
    rom: Vec<u8>,
    internal_pages: usize,
    external_pages: usize,
    lmpr: u8,
    hmpr: u8,
    lepr: u8,
    hepr: u8,
    sections: [Page; 4],
}

impl Memory {
    /// Create memory with the given ROM, which must be exactly 32K.
    pub fn new(main: MainMemory, external_mb: u8, rom: &[u8]) -> Result<Self, SamError> {
        if rom.len() != ROM_SIZE {
            return Err(SamError::RomSize {
                expected: ROM_SIZE,
                actual: rom.len(),
            });
        }
        let external_pages = usize::from(external_mb) * EXTERNAL_PAGES_PER_MB;
        let mut memory = Self {
            ram: vec![0; main.pages() * PAGE_SIZE],
            external: vec![0; external_pages * PAGE_SIZE],
            rom: rom.to_vec(),
            internal_pages: main.pages(),
            external_pages,
            lmpr: 0,
            hmpr: 0,
            lepr: 0,
            hepr: 0,
            sections: [Page::Absent; 4],
        };
        memory.remap();
        Ok(memory)
    }

    /// Return the paging registers to their power-on values.
    pub fn reset(&mut self) {
        self.lmpr = 0;
        self.hmpr = 0;
        self.lepr = 0;
        self.hepr = 0;
        self.remap();
    }

    #[must_use]
    pub fn read(&self, addr: u16) -> u8 {
        let offset = usize::from(addr) & (PAGE_SIZE - 1);
        match self.sections[usize::from(addr >> 14)] {
            Page::Internal(p) => self.ram[usize::from(p) * PAGE_SIZE + offset],
            Page::External(p) => self.external[usize::from(p) * PAGE_SIZE + offset],
            Page::Rom(p) => self.rom[usize::from(p) * PAGE_SIZE + offset],
            Page::Absent => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        let section = usize::from(addr >> 14);
        if section == 0 && self.lmpr & lmpr::WPRAM != 0 {
            return;
        }
        let offset = usize::from(addr) & (PAGE_SIZE - 1);
        match self.sections[section] {
            Page::Internal(p) => self.ram[usize::from(p) * PAGE_SIZE + offset] = value,
            Page::External(p) => self.external[usize::from(p) * PAGE_SIZE + offset] = value,
            Page::Rom(_) | Page::Absent => {}
        }
    }

    /// True if `addr` maps to internal RAM, which the video shares.
    #[must_use]
    pub fn is_contended(&self, addr: u16) -> bool {
        matches!(self.sections[usize::from(addr >> 14)], Page::Internal(_))
    }

    /// Mapping of section 0-3 (A-D).
    #[must_use]
    pub fn section(&self, section: usize) -> Page {
        self.sections[section & 3]
    }

    /// Contents of an internal RAM page, if fitted.
    #[must_use]
    pub fn internal_page(&self, page: u8) -> Option<&[u8]> {
        let start = usize::from(page) * PAGE_SIZE;
        self.ram.get(start..start + PAGE_SIZE)
    }

    #[must_use]
    pub fn lmpr(&self) -> u8 {
        self.lmpr
    }

    pub fn set_lmpr(&mut self, value: u8) {
        self.lmpr = value;
        self.remap();
    }

    #[must_use]
    pub fn hmpr(&self) -> u8 {
        self.hmpr
    }

    pub fn set_hmpr(&mut self, value: u8) {
        self.hmpr = value;
        self.remap();
    }

    #[must_use]
    pub fn lepr(&self) -> u8 {
        self.lepr
    }

    pub fn set_lepr(&mut self, value: u8) {
        self.lepr = value;
        self.remap();
    }

    #[must_use]
    pub fn hepr(&self) -> u8 {
        self.hepr
    }

    pub fn set_hepr(&mut self, value: u8) {
        self.hepr = value;
        self.remap();
    }

    fn internal(&self, page: u8) -> Page {
        let page = page & lmpr::PAGE;
        if usize::from(page) < self.internal_pages {
            Page::Internal(page)
        } else {
            Page::Absent
        }
    }

    fn external(&self, page: u8) -> Page {
        if usize::from(page) < self.external_pages {
            Page::External(page)
        } else {
            Page::Absent
        }
    }

    fn remap(&mut self) {
        let low = self.lmpr & lmpr::PAGE;
        let high = self.hmpr & hmpr::PAGE;

        self.sections[0] = if self.lmpr & lmpr::ROM0_OFF == 0 {
            Page::Rom(0)
        } else {
            self.internal(low)
        };
        self.sections[1] = self.internal(low.wrapping_add(1));

        if self.hmpr & hmpr::MCNTRL == 0 {
            self.sections[2] = self.internal(high);
            self.sections[3] = self.internal(high.wrapping_add(1));
        } else {
            self.sections[2] = self.external(self.lepr);
            self.sections[3] = self.external(self.hepr);
        }

        if self.lmpr & lmpr::ROM1_ON != 0 {
            self.sections[3] = Page::Rom(1);
        }
    }
}
