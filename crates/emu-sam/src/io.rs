//! ASIC port decoding and the peripherals behind it.
//!
//! Ports are decoded on the low byte, with the high byte as extra address
//! lines where the hardware uses them (keyboard rows, palette index, sound
//! chip register select).
//!
//! | port    | read                          | write                     |
//! |---------|-------------------------------|---------------------------|
//! | 128/129 | LEPR/HEPR                     | LEPR/HEPR                 |
//! | 224-231 | drive 1 FDC                   | drive 1 FDC               |
//! | 240-247 | drive 2 FDC                   | drive 2 FDC               |
//! | 248     | LPEN (HPEN with A8 set)       | palette entry A8-A11      |
//! | 249     | interrupt status, keys 5-7    | line interrupt line       |
//! | 250     | LMPR                          | LMPR                      |
//! | 251     | HMPR                          | HMPR                      |
//! | 252     | VMPR                          | VMPR                      |
//! | 253     | MIDI in (not fitted)          | MIDI out                  |
//! | 254     | keyboard, EAR (mouse at FFFE) | border, SOFF              |
//! | 255     | sound chip                    | sound chip                |

use log::trace;

use crate::bus::{
    MIDI_TRANSMIT_TIME, MOUSE_RESET_TIME, SCREEN_LINES, SamBus, TOP_BORDER_LINES,
    TSTATES_PER_LINE, int,
};
use crate::events::EventKind;
use crate::memory::Memory;

pub const LEPR_PORT: u8 = 128;
pub const HEPR_PORT: u8 = 129;
/// Blue Alpha sampler.
pub const SAMPLER_PORT: u8 = 127;
pub const CLUT_PORT: u8 = 248;
pub const STATUS_PORT: u8 = 249;
pub const LMPR_PORT: u8 = 250;
pub const HMPR_PORT: u8 = 251;
pub const VMPR_PORT: u8 = 252;
pub const MIDI_PORT: u8 = 253;
pub const KEYBOARD_PORT: u8 = 254;
pub const SOUND_PORT: u8 = 255;

/// Border port bit that blanks the screen in modes 3 and 4.
pub const BORDER_SOFF: u8 = 0x80;
/// LPEN bit showing the MIDI transmitter is busy.
pub const LPEN_TXFMST: u8 = 0x02;

/// SAA 1099 sound chip. Address writes come in on port 0x1FF, data on 0x0FF.
pub trait SoundChip {
    /// Register write, `frame_cycles` into the current frame.
    fn out(&mut self, _port: u16, _value: u8, _frame_cycles: u64) {}

    /// Generate the frame's samples.
    fn update(&mut self) {}
}

/// What the display needs at the end of a frame.
pub struct Screen<'a> {
    pub memory: &'a Memory,
    pub vmpr: u8,
    pub border: u8,
    pub clut: &'a [u8; 16],
}

pub trait Display {
    fn end_frame(&mut self, _screen: &Screen<'_>) {}
}

pub trait InputSource {
    /// Poll the host; called once per frame, mid-frame.
    fn update(&mut self) {}

    /// Key matrix bits (active low) for the rows selected by the high port
    /// byte. Bits 0-4 are read on port 254, bits 5-7 on port 249.
    fn keyboard(&self, _rows: u8) -> u8 {
        0xFF
    }
}

pub trait Mouse {
    /// Next nibble of the mouse data sequence.
    fn read(&mut self) -> u8 {
        0xFF
    }

    /// The interface timed out between reads; restart the sequence.
    fn reset(&mut self) {}
}

pub trait Sampler {
    /// Port write. Returns the clock period to run at, or `None` to stop
    /// the clock.
    fn out(&mut self, _port: u16, _value: u8) -> Option<u32> {
        None
    }

    fn read(&mut self, _port: u16) -> u8 {
        0xFF
    }

    /// Clock tick. Returns the period until the next one.
    fn clock(&mut self) -> Option<u32> {
        None
    }

    /// Machine reset: the sampler clock has been stopped.
    fn reset(&mut self) {}
}

pub trait Tape {
    /// Cycles until the next EAR edge, or `None` at the end of the tape.
    fn next_edge(&mut self) -> Option<u32> {
        None
    }
}

pub trait MidiOut {
    fn send(&mut self, _byte: u8) {}
}

/// Nothing connected.
#[derive(Debug, Default, Clone, Copy)]
pub struct Detached;

impl SoundChip for Detached {}
impl Display for Detached {}
impl InputSource for Detached {}
impl Mouse for Detached {}
impl Sampler for Detached {}
impl Tape for Detached {}
impl MidiOut for Detached {}

/// Everything outside the core the machine talks to.
pub struct Peripherals {
    pub sound: Box<dyn SoundChip>,
    pub display: Box<dyn Display>,
    pub input: Box<dyn InputSource>,
    pub mouse: Box<dyn Mouse>,
    pub sampler: Box<dyn Sampler>,
    pub tape: Box<dyn Tape>,
    pub midi: Box<dyn MidiOut>,
}

impl Default for Peripherals {
    fn default() -> Self {
        Self {
            sound: Box::new(Detached),
            display: Box::new(Detached),
            input: Box::new(Detached),
            mouse: Box::new(Detached),
            sampler: Box::new(Detached),
            tape: Box::new(Detached),
            midi: Box::new(Detached),
        }
    }
}

impl SamBus {
    pub(crate) fn port_in(&mut self, port: u16) -> u8 {
        let high = (port >> 8) as u8;
        match port as u8 {
            0xE0..=0xE7 => self.drive1.as_mut().map_or(0xFF, |d| d.in_port(port)),
            0xF0..=0xF7 => self.drive2.as_mut().map_or(0xFF, |d| d.in_port(port)),
            LEPR_PORT => self.memory.lepr(),
            HEPR_PORT => self.memory.hepr(),
            SAMPLER_PORT => self.peripherals.sampler.read(port),
            CLUT_PORT if high & 1 != 0 => self.hpen(),
            CLUT_PORT => self.lpen(),
            STATUS_PORT => {
                (self.status & int::MASK) | (self.peripherals.input.keyboard(high) & !int::MASK)
            }
            LMPR_PORT => self.memory.lmpr(),
            HMPR_PORT => self.memory.hmpr(),
            VMPR_PORT => self.vmpr,
            KEYBOARD_PORT => self.keyboard_in(high),
            _ => 0xFF,
        }
    }

    pub(crate) fn port_out(&mut self, port: u16, value: u8) {
        let high = (port >> 8) as u8;
        match port as u8 {
            0xE0..=0xE7 => {
                if let Some(drive) = self.drive1.as_mut() {
                    drive.out_port(port, value);
                }
            }
            0xF0..=0xF7 => {
                if let Some(drive) = self.drive2.as_mut() {
                    drive.out_port(port, value);
                }
            }
            LEPR_PORT => self.memory.set_lepr(value),
            HEPR_PORT => self.memory.set_hepr(value),
            SAMPLER_PORT => {
                let period = self.peripherals.sampler.out(port, value);
                self.events.cancel(EventKind::SamplerClock);
                if let Some(period) = period {
                    self.schedule_in(EventKind::SamplerClock, u64::from(period.max(1)));
                }
            }
            CLUT_PORT => {
                if self.asic_starting {
                    trace!("Palette write {value:#04X} during ASIC start-up ignored");
                } else {
                    self.clut[usize::from(high & 0x0F)] = value & 0x7F;
                }
            }
            STATUS_PORT => self.set_line_interrupt(value),
            LMPR_PORT => self.memory.set_lmpr(value),
            HMPR_PORT => self.memory.set_hmpr(value),
            VMPR_PORT => self.vmpr = value,
            MIDI_PORT => self.midi_out(value),
            KEYBOARD_PORT => self.border = value,
            SOUND_PORT => {
                let frame_cycles = self.frame_cycles();
                self.peripherals.sound.out(port, value, frame_cycles);
            }
            _ => {}
        }
    }

    /// Horizontal position within the screen window, with the MIDI
    /// transmitter state in bit 1.
    fn lpen(&self) -> u8 {
        let position = self
            .screen_position()
            .map_or(0, |pos| (pos as u8) & 0xFC);
        let busy = if self.midi_busy { LPEN_TXFMST } else { 0 };
        position | busy
    }

    /// Current screen line, or 192 in the border.
    fn hpen(&self) -> u8 {
        self.line
            .checked_sub(TOP_BORDER_LINES)
            .filter(|&line| line < SCREEN_LINES)
            .map_or(SCREEN_LINES as u8, |line| line as u8)
    }

    fn keyboard_in(&mut self, high: u8) -> u8 {
        let keys = self.peripherals.input.keyboard(high);
        if high == 0xFF {
            let nibble = self.peripherals.mouse.read();
            self.events.cancel(EventKind::MouseReset);
            self.schedule_in(EventKind::MouseReset, MOUSE_RESET_TIME);
            return (keys & 0xE0) | (nibble & 0x1F);
        }
        let ear = if self.ear { 0x40 } else { 0x00 };
        (keys & 0x1F) | 0xA0 | ear
    }

    fn set_line_interrupt(&mut self, line: u8) {
        self.line_int = line;
        self.events.cancel(EventKind::LineIntStart);
        if u64::from(line) < SCREEN_LINES {
            self.schedule_periodic(
                EventKind::LineIntStart,
                (TOP_BORDER_LINES + u64::from(line)) * TSTATES_PER_LINE,
            );
        }
    }

    fn midi_out(&mut self, value: u8) {
        if self.midi_busy {
            trace!("MIDI byte {value:#04X} dropped, transmitter busy");
            return;
        }
        self.midi_busy = true;
        self.peripherals.midi.send(value);
        self.schedule_in(EventKind::MidiTransmitEnd, MIDI_TRANSMIT_TIME);
        self.schedule_in(EventKind::MidiOutStart, MIDI_TRANSMIT_TIME);
    }
}
