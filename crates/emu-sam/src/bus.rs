//! SAM bus: the cycle counter, memory contention and event dispatch.
//!
//! Every CPU access comes through here and is charged before it happens:
//! 4 cycles for an opcode fetch or port access, 3 for any other memory
//! access. Internal CPU cycles arrive through `delay`.
//!
//! # Contention
//!
//! While the video fetches screen data, CPU access to internal RAM waits
//! for the next 8-cycle slot. That applies on screen lines (unless the
//! screen is switched off), inside the 256-cycle screen window, and only for
//! internal RAM: ROM and external memory are never held up. ASIC ports
//! (low byte 0xF8 and up) always wait for an 8-cycle slot.
//!
//! # Frame timing
//!
//! 384 cycles per line, 312 lines per frame. Events are due at absolute
//! cycle counts; `frame_start` marks where the current frame began.

use emu_core::Bus;
use log::{debug, info, trace};
use wd1772::Drive;

use crate::config::SamConfig;
use crate::error::SamError;
use crate::events::{EventKind, EventQueue};
use crate::io::{BORDER_SOFF, Peripherals, Screen};
use crate::memory::Memory;

pub const TSTATES_PER_LINE: u64 = 384;
pub const LINES_PER_FRAME: u64 = 312;
pub const TSTATES_PER_FRAME: u64 = TSTATES_PER_LINE * LINES_PER_FRAME;

pub const TOP_BORDER_LINES: u64 = 68;
pub const SCREEN_LINES: u64 = 192;

/// Screen window within a line, after the video pipeline delay.
pub const SCREEN_START: u64 = 96;
pub const SCREEN_END: u64 = SCREEN_START + 256;
pub const VIDEO_DELAY: u64 = 16;

/// Frame interrupt at the start of the bottom border.
pub const FRAME_INT_TIME: u64 = (TOP_BORDER_LINES + SCREEN_LINES) * TSTATES_PER_LINE;
/// How long the frame and line interrupts hold the INT line.
pub const INT_ACTIVE_TIME: u64 = 128;

/// One MIDI byte at 31.25 kbaud.
pub const MIDI_TRANSMIT_TIME: u64 = 1920;
pub const MIDI_INT_ACTIVE_TIME: u64 = 16;

/// Idle time after which the mouse interface restarts its sequence.
pub const MOUSE_RESET_TIME: u64 = 300;

/// Palette writes are ignored for this long after power-on.
pub const ASIC_STARTUP_DELAY: u64 = 40_000;

/// Input is polled mid-frame, away from the frame interrupt.
pub const INPUT_UPDATE_TIME: u64 = TSTATES_PER_FRAME / 2;

/// Status port (249) interrupt bits, active low.
pub mod int {
    pub const LINE: u8 = 0x01;
    pub const MOUSE: u8 = 0x02;
    pub const MIDI_IN: u8 = 0x04;
    pub const FRAME: u8 = 0x08;
    pub const MIDI_OUT: u8 = 0x10;
    pub const MASK: u8 = 0x1F;
}

/// The SAM bus, implementing `emu_core::Bus`.
///
/// Owns memory, both drives, the ASIC registers and the event queue.
pub struct SamBus {
    pub memory: Memory,
    pub drive1: Option<Drive>,
    pub drive2: Option<Drive>,
    pub peripherals: Peripherals,
    pub(crate) events: EventQueue,
    cycles: u64,
    frame_start: u64,
    /// Line within the frame, advanced by the end-of-line event.
    pub(crate) line: u64,
    frame_end: bool,
    /// The current line can contend (screen line, screen on).
    maybe_contended: bool,
    /// Interrupt status bits (active low).
    pub(crate) status: u8,
    pub(crate) line_int: u8,
    pub(crate) vmpr: u8,
    pub(crate) border: u8,
    pub(crate) clut: [u8; 16],
    pub(crate) midi_busy: bool,
    pub(crate) asic_starting: bool,
    asic_startup_delay: bool,
    /// Tape signal on the EAR input.
    pub(crate) ear: bool,
}

impl SamBus {
    pub fn new(config: &SamConfig, rom: &[u8]) -> Result<Self, SamError> {
        config.validate()?;
        let memory = Memory::new(config.main_memory, config.external_memory_mb, rom)?;
        let mut bus = Self {
            memory,
            drive1: config.drive1.then(Drive::new),
            drive2: config.drive2.then(Drive::new),
            peripherals: Peripherals::default(),
            events: EventQueue::new(),
            cycles: 0,
            frame_start: 0,
            line: 0,
            frame_end: false,
            maybe_contended: false,
            status: int::MASK,
            line_int: 0xFF,
            vmpr: 0,
            border: 0,
            clut: [0; 16],
            midi_busy: false,
            asic_starting: false,
            asic_startup_delay: config.asic_startup_delay,
            ear: false,
        };
        bus.schedule_standard_events();
        Ok(bus)
    }

    /// Reset the ASIC, paging and controllers. Disks stay inserted and the
    /// frame position is kept.
    pub fn reset(&mut self) {
        info!("SAM reset at cycle {}", self.cycles);
        self.memory.reset();
        for drive in [&mut self.drive1, &mut self.drive2].into_iter().flatten() {
            drive.reset();
        }
        self.status = int::MASK;
        self.line_int = 0xFF;
        self.vmpr = 0;
        self.border = 0;
        self.midi_busy = false;

        // The tape deck is outside the machine and keeps playing
        let tape_edge = self
            .events
            .is_pending(EventKind::TapeEdge)
            .then(|| self.time_until(EventKind::TapeEdge));
        if tape_edge.is_none() {
            self.ear = false;
        }
        self.peripherals.mouse.reset();
        if self.events.is_pending(EventKind::SamplerClock) {
            debug!("Sampler clock stopped by reset");
        }
        self.peripherals.sampler.reset();
        self.schedule_standard_events();
        if let Some(delta) = tape_edge {
            self.schedule_in(EventKind::TapeEdge, delta);
        }
    }

    /// Drop all pending events and schedule the ones that always run.
    fn schedule_standard_events(&mut self) {
        self.events.clear();
        self.events.add(
            EventKind::EndOfLine,
            self.frame_start + (self.line + 1) * TSTATES_PER_LINE,
        );
        self.schedule_periodic(EventKind::FrameIntStart, FRAME_INT_TIME);
        self.schedule_periodic(EventKind::InputUpdate, INPUT_UPDATE_TIME);
        self.asic_starting = self.asic_startup_delay;
        if self.asic_starting {
            self.schedule_in(EventKind::AsicReady, ASIC_STARTUP_DELAY);
        }
        self.update_contention();
    }

    /// Schedule `kind` at `offset` into the current frame, or into the next
    /// frame if that point has passed.
    pub(crate) fn schedule_periodic(&mut self, kind: EventKind, offset: u64) {
        let mut due = self.frame_start + offset;
        if due <= self.cycles {
            due += TSTATES_PER_FRAME;
        }
        self.events.add(kind, due);
    }

    /// Schedule `kind` `delta` cycles from now.
    pub(crate) fn schedule_in(&mut self, kind: EventKind, delta: u64) {
        self.events.add(kind, self.cycles + delta);
    }

    fn dispatch(&mut self, kind: EventKind, due: u64) {
        trace!("Event {kind:?} due {due} at {}", self.cycles);
        match kind {
            EventKind::FrameIntStart => {
                self.status &= !int::FRAME;
                self.events.add(EventKind::FrameIntEnd, due + INT_ACTIVE_TIME);
                self.events.add(EventKind::FrameIntStart, due + TSTATES_PER_FRAME);
            }
            EventKind::FrameIntEnd => self.status |= int::FRAME,
            EventKind::LineIntStart => {
                self.status &= !int::LINE;
                self.events.add(EventKind::LineIntEnd, due + INT_ACTIVE_TIME);
                self.events.add(EventKind::LineIntStart, due + TSTATES_PER_FRAME);
            }
            EventKind::LineIntEnd => self.status |= int::LINE,
            EventKind::MidiOutStart => {
                self.status &= !int::MIDI_OUT;
                self.events.add(EventKind::MidiOutEnd, due + MIDI_INT_ACTIVE_TIME);
            }
            EventKind::MidiOutEnd => self.status |= int::MIDI_OUT,
            EventKind::MidiTransmitEnd => self.midi_busy = false,
            EventKind::MouseReset => self.peripherals.mouse.reset(),
            EventKind::SamplerClock => {
                if let Some(period) = self.peripherals.sampler.clock() {
                    self.events
                        .add(EventKind::SamplerClock, due + u64::from(period.max(1)));
                }
            }
            EventKind::TapeEdge => {
                self.ear = !self.ear;
                if let Some(interval) = self.peripherals.tape.next_edge() {
                    self.events
                        .add(EventKind::TapeEdge, due + u64::from(interval.max(1)));
                }
            }
            EventKind::AsicReady => self.asic_starting = false,
            EventKind::InputUpdate => {
                self.peripherals.input.update();
                self.events.add(EventKind::InputUpdate, due + TSTATES_PER_FRAME);
            }
            EventKind::EndOfLine => {
                self.line += 1;
                if self.line >= LINES_PER_FRAME {
                    self.frame_end = true;
                }
                self.update_contention();
                self.events.add(EventKind::EndOfLine, due + TSTATES_PER_LINE);
            }
        }
    }

    fn update_contention(&mut self) {
        let screen_line = (TOP_BORDER_LINES..TOP_BORDER_LINES + SCREEN_LINES).contains(&self.line);
        self.maybe_contended = screen_line && !self.screen_off();
    }

    /// SOFF blanks the display in modes 3 and 4, freeing the bus.
    fn screen_off(&self) -> bool {
        let mode = (self.vmpr >> 5) & 3;
        self.border & BORDER_SOFF != 0 && mode >= 2
    }

    /// Position in the 256-cycle screen window, if the video is in it.
    pub(crate) fn screen_position(&self) -> Option<u64> {
        let pos = (self.line_cycle() + TSTATES_PER_LINE - VIDEO_DELAY) % TSTATES_PER_LINE;
        (SCREEN_START..SCREEN_END)
            .contains(&pos)
            .then(|| pos - SCREEN_START)
    }

    fn contend(&mut self, addr: u16) {
        if self.maybe_contended
            && self.memory.is_contended(addr)
            && self.screen_position().is_some()
        {
            self.cycles = (self.cycles + 7) & !7;
        }
    }

    /// Begin the next frame once the current one has ended.
    pub fn start_frame(&mut self) {
        self.frame_end = false;
        self.frame_start += TSTATES_PER_FRAME;
        self.line = 0;
        self.update_contention();
    }

    /// Hand the finished frame's video state to the display.
    pub fn present_frame(&mut self) {
        let screen = Screen {
            memory: &self.memory,
            vmpr: self.vmpr,
            border: self.border,
            clut: &self.clut,
        };
        self.peripherals.display.end_frame(&screen);
    }

    /// Let time pass with the CPU held, until the frame ends.
    pub fn idle_to_frame_end(&mut self) {
        while !self.frame_end {
            match self.events.next_due() {
                Some(due) => {
                    self.cycles = self.cycles.max(due);
                    self.check_events();
                }
                None => {
                    self.cycles = self.frame_start + TSTATES_PER_FRAME;
                    self.frame_end = true;
                }
            }
        }
    }

    /// Total cycles since power-on.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Cycles since the current frame started.
    #[must_use]
    pub fn frame_cycles(&self) -> u64 {
        self.cycles - self.frame_start
    }

    #[must_use]
    pub fn line_cycle(&self) -> u64 {
        self.frame_cycles() % TSTATES_PER_LINE
    }

    #[must_use]
    pub fn line(&self) -> u64 {
        self.line
    }

    #[must_use]
    pub fn frame_end(&self) -> bool {
        self.frame_end
    }

    /// Interrupt status bits (active low).
    #[must_use]
    pub fn status(&self) -> u8 {
        self.status
    }

    #[must_use]
    pub fn vmpr(&self) -> u8 {
        self.vmpr
    }

    #[must_use]
    pub fn border(&self) -> u8 {
        self.border
    }

    #[must_use]
    pub fn line_interrupt(&self) -> u8 {
        self.line_int
    }

    #[must_use]
    pub fn clut(&self) -> &[u8; 16] {
        &self.clut
    }

    #[must_use]
    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    /// Cycles until the next `kind` event, or 0 if none is pending.
    #[must_use]
    pub fn time_until(&self, kind: EventKind) -> u64 {
        self.events.time_until(kind, self.cycles)
    }

    pub fn drive_mut(&mut self, drive: u8) -> Option<&mut Drive> {
        match drive {
            1 => self.drive1.as_mut(),
            2 => self.drive2.as_mut(),
            _ => None,
        }
    }

    #[must_use]
    pub fn drive(&self, drive: u8) -> Option<&Drive> {
        match drive {
            1 => self.drive1.as_ref(),
            2 => self.drive2.as_ref(),
            _ => None,
        }
    }

    /// Start the tape edge clock from the tape's first interval.
    pub fn start_tape(&mut self) {
        self.events.cancel(EventKind::TapeEdge);
        if let Some(interval) = self.peripherals.tape.next_edge() {
            self.schedule_in(EventKind::TapeEdge, u64::from(interval.max(1)));
        }
    }

    pub fn stop_tape(&mut self) {
        self.events.cancel(EventKind::TapeEdge);
    }

    #[must_use]
    pub fn tape_running(&self) -> bool {
        self.events.is_pending(EventKind::TapeEdge)
    }
}

impl Bus for SamBus {
    fn fetch(&mut self, addr: u16) -> u8 {
        self.cycles += 4;
        self.contend(addr);
        self.memory.read(addr)
    }

    fn read(&mut self, addr: u16) -> u8 {
        self.cycles += 3;
        self.contend(addr);
        self.memory.read(addr)
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.cycles += 3;
        self.contend(addr);
        self.memory.write(addr, value);
    }

    fn io_read(&mut self, port: u16) -> u8 {
        self.cycles += 4;
        if port & 0xFF >= 0xF8 {
            self.cycles = (self.cycles + 7) & !7;
        }
        self.port_in(port)
    }

    fn io_write(&mut self, port: u16, value: u8) {
        self.cycles += 4;
        if port & 0xFF >= 0xF8 {
            self.cycles = (self.cycles + 7) & !7;
        }
        self.port_out(port, value);
    }

    fn delay(&mut self, cycles: u32) {
        self.cycles += u64::from(cycles);
    }

    fn check_events(&mut self) {
        while let Some((kind, due)) = self.events.pop_due(self.cycles) {
            self.dispatch(kind, due);
        }
    }

    fn int_active(&self) -> bool {
        self.status & int::MASK != int::MASK
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{
        CLUT_PORT, InputSource, LPEN_TXFMST, MIDI_PORT, MidiOut, Mouse, STATUS_PORT, Sampler,
        Tape, VMPR_PORT,
    };
    use crate::memory::ROM_SIZE;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn make_bus() -> SamBus {
        let config = SamConfig {
            asic_startup_delay: false,
            ..SamConfig::default()
        };
        SamBus::new(&config, &vec![0; ROM_SIZE]).expect("valid bus")
    }

    /// Let time pass to an absolute cycle, firing events on the way.
    fn run_to(bus: &mut SamBus, cycle: u64) {
        bus.delay((cycle - bus.cycles()) as u32);
        bus.check_events();
    }

    /// Cycle at which `line` starts, offset into the screen window.
    fn screen_cycle(line: u64, pos: u64) -> u64 {
        line * TSTATES_PER_LINE + VIDEO_DELAY + SCREEN_START + pos
    }

    #[test]
    fn uncontended_costs_sum_exactly() {
        let mut bus = make_bus();
        bus.fetch(0x0000);
        bus.read(0x4000);
        bus.write(0x8000, 1);
        bus.read_word(0x8000);
        bus.write_word(0x8000, 0x1234);
        bus.io_read(0x00E0);
        bus.delay(5);
        assert_eq!(bus.cycles(), 4 + 3 + 3 + 6 + 6 + 4 + 5);
    }

    #[test]
    fn screen_ram_access_waits_for_slot() {
        let mut bus = make_bus();
        run_to(&mut bus, screen_cycle(100, 0));
        assert_eq!(bus.line(), 100);

        // RAM page 1 in section B
        bus.read(0x4000);
        assert_eq!(bus.cycles() % 8, 0);
        assert!(bus.cycles() > screen_cycle(100, 3));

        // ROM is never contended
        let before = bus.cycles();
        bus.read(0x0000);
        assert_eq!(bus.cycles(), before + 3);
    }

    #[test]
    fn word_read_charges_each_byte_in_order() {
        let mut bus = make_bus();
        bus.memory.write(0x4000, 0x12);
        let start = screen_cycle(100, 1);
        run_to(&mut bus, start);

        // Low byte from ROM at full speed, high byte from RAM on the next slot
        assert_eq!(bus.read_word(0x3FFF), 0x1200);
        assert_eq!(bus.cycles(), start + 7);
    }

    #[test]
    fn word_write_low_byte_first() {
        let mut bus = make_bus();
        let start = screen_cycle(100, 1);
        run_to(&mut bus, start);

        // The ROM write is dropped; only the second byte lands and waits
        bus.write_word(0x3FFF, 0xABCD);
        assert_eq!(bus.cycles(), start + 7);
        assert_eq!(bus.memory.read(0x4000), 0xAB);

        bus.write_word(0x7FFF, 0x5678);
        assert_eq!(bus.memory.read(0x7FFF), 0x78);
        assert_eq!(bus.memory.read(0x8000), 0x56);
    }

    #[test]
    fn border_lines_not_contended() {
        let mut bus = make_bus();
        run_to(&mut bus, screen_cycle(10, 1));
        let before = bus.cycles();
        bus.read(0x4000);
        assert_eq!(bus.cycles(), before + 3);
    }

    #[test]
    fn outside_screen_window_not_contended() {
        let mut bus = make_bus();
        run_to(&mut bus, 100 * TSTATES_PER_LINE + 1);
        let before = bus.cycles();
        bus.write(0x4000, 0);
        assert_eq!(bus.cycles(), before + 3);
    }

    #[test]
    fn screen_off_removes_contention() {
        let mut bus = make_bus();
        // Mode 4 with SOFF set
        bus.io_write(u16::from(VMPR_PORT), 0x60);
        bus.io_write(0x00FE, BORDER_SOFF);
        run_to(&mut bus, screen_cycle(100, 1));
        let before = bus.cycles();
        bus.read(0x4000);
        assert_eq!(bus.cycles(), before + 3);
    }

    #[test]
    fn asic_ports_round_to_slot() {
        let mut bus = make_bus();
        bus.delay(1);
        bus.io_read(0x00FE);
        assert_eq!(bus.cycles(), 8);
        bus.delay(1);
        bus.io_read(0x00E0);
        assert_eq!(bus.cycles(), 13);
    }

    #[test]
    fn frame_interrupt_window() {
        let mut bus = make_bus();
        run_to(&mut bus, FRAME_INT_TIME - 1);
        assert!(!bus.int_active());
        run_to(&mut bus, FRAME_INT_TIME);
        assert!(bus.int_active());
        assert_eq!(bus.status() & int::FRAME, 0);
        assert_eq!(bus.io_read(u16::from(STATUS_PORT)) & int::MASK, int::MASK & !int::FRAME);
        run_to(&mut bus, FRAME_INT_TIME + INT_ACTIVE_TIME);
        assert!(!bus.int_active());
    }

    #[test]
    fn frame_ends_after_312_lines() {
        let mut bus = make_bus();
        run_to(&mut bus, TSTATES_PER_FRAME - 1);
        assert!(!bus.frame_end());
        run_to(&mut bus, TSTATES_PER_FRAME);
        assert!(bus.frame_end());
        bus.start_frame();
        assert_eq!(bus.frame_cycles(), 0);
        assert_eq!(bus.line(), 0);
        assert_eq!(bus.time_until(EventKind::FrameIntStart), FRAME_INT_TIME);
    }

    #[test]
    fn check_events_is_idempotent() {
        let mut bus = make_bus();
        run_to(&mut bus, 5 * TSTATES_PER_LINE);
        let line = bus.line();
        let pending: Vec<_> = bus.events().iter().collect();
        bus.check_events();
        assert_eq!(bus.line(), line);
        assert_eq!(bus.events().iter().collect::<Vec<_>>(), pending);
    }

    #[test]
    fn line_interrupt_on_selected_line() {
        let mut bus = make_bus();
        bus.io_write(u16::from(STATUS_PORT), 10);
        let due = (TOP_BORDER_LINES + 10) * TSTATES_PER_LINE;
        assert_eq!(bus.time_until(EventKind::LineIntStart), due - bus.cycles());
        run_to(&mut bus, due);
        assert_eq!(bus.status() & int::LINE, 0);
        run_to(&mut bus, due + INT_ACTIVE_TIME);
        assert_eq!(bus.status() & int::LINE, int::LINE);

        // Lines past the screen disable it
        bus.io_write(u16::from(STATUS_PORT), 200);
        assert!(!bus.events().is_pending(EventKind::LineIntStart));
    }

    #[test]
    fn line_interrupt_already_passed_waits_a_frame() {
        let mut bus = make_bus();
        run_to(&mut bus, 200 * TSTATES_PER_LINE);
        bus.io_write(u16::from(STATUS_PORT), 0);
        let due = TSTATES_PER_FRAME + TOP_BORDER_LINES * TSTATES_PER_LINE;
        assert_eq!(bus.time_until(EventKind::LineIntStart), due - bus.cycles());
    }

    #[derive(Default)]
    struct Recorder {
        sent: Rc<RefCell<Vec<u8>>>,
    }

    impl MidiOut for Recorder {
        fn send(&mut self, byte: u8) {
            self.sent.borrow_mut().push(byte);
        }
    }

    #[test]
    fn midi_transmit_window() {
        let mut bus = make_bus();
        let recorder = Recorder::default();
        let sent = Rc::clone(&recorder.sent);
        bus.peripherals.midi = Box::new(recorder);

        bus.io_write(u16::from(MIDI_PORT), 0x90);
        let start = bus.cycles();
        assert_ne!(bus.io_read(u16::from(CLUT_PORT)) & LPEN_TXFMST, 0);
        // A second byte while busy is dropped
        bus.io_write(u16::from(MIDI_PORT), 0x40);
        assert_eq!(*sent.borrow(), [0x90]);

        run_to(&mut bus, start + MIDI_TRANSMIT_TIME);
        assert_eq!(bus.io_read(u16::from(CLUT_PORT)) & LPEN_TXFMST, 0);
        assert_eq!(bus.status() & int::MIDI_OUT, 0);
        run_to(&mut bus, start + MIDI_TRANSMIT_TIME + MIDI_INT_ACTIVE_TIME);
        assert_eq!(bus.status() & int::MIDI_OUT, int::MIDI_OUT);
    }

    #[test]
    fn palette_locked_during_asic_startup() {
        let mut bus = SamBus::new(&SamConfig::default(), &vec![0; ROM_SIZE]).expect("valid bus");
        bus.io_write(0x03F8, 0x12);
        assert_eq!(bus.clut()[3], 0);
        run_to(&mut bus, ASIC_STARTUP_DELAY);
        bus.io_write(0x03F8, 0x12);
        assert_eq!(bus.clut()[3], 0x12);
    }

    struct Keys;

    impl InputSource for Keys {
        fn keyboard(&self, rows: u8) -> u8 {
            // Row A8 low: key in bit 0 and bit 6 held
            if rows & 1 == 0 { 0b1011_1110 } else { 0xFF }
        }
    }

    #[test]
    fn keyboard_split_over_two_ports() {
        let mut bus = make_bus();
        bus.peripherals.input = Box::new(Keys);
        assert_eq!(bus.io_read(0xFEFE) & 0x1F, 0x1E);
        assert_eq!(bus.io_read(0xFEF9) & 0xE0, 0xA0);
        assert_eq!(bus.io_read(0xFDFE) & 0x1F, 0x1F);
    }

    struct Ticker {
        ticks: Rc<RefCell<u32>>,
    }

    impl Sampler for Ticker {
        fn out(&mut self, _port: u16, value: u8) -> Option<u32> {
            (value != 0).then_some(1000)
        }

        fn clock(&mut self) -> Option<u32> {
            *self.ticks.borrow_mut() += 1;
            Some(1000)
        }
    }

    #[test]
    fn sampler_clock_runs_until_stopped() {
        let mut bus = make_bus();
        let ticks = Rc::new(RefCell::new(0));
        bus.peripherals.sampler = Box::new(Ticker {
            ticks: Rc::clone(&ticks),
        });
        bus.io_write(0x007F, 1);
        let start = bus.cycles();
        run_to(&mut bus, start + 3500);
        assert_eq!(*ticks.borrow(), 3);
        bus.io_write(0x007F, 0);
        run_to(&mut bus, start + 10_000);
        assert_eq!(*ticks.borrow(), 3);
    }

    struct Square;

    impl Tape for Square {
        fn next_edge(&mut self) -> Option<u32> {
            Some(500)
        }
    }

    #[test]
    fn tape_edges_toggle_ear() {
        let mut bus = make_bus();
        bus.peripherals.tape = Box::new(Square);
        bus.start_tape();
        assert!(bus.tape_running());
        let start = bus.cycles();
        assert_eq!(bus.io_read(0xFEFE) & 0x40, 0);
        run_to(&mut bus, start + 500);
        assert_eq!(bus.io_read(0xFEFE) & 0x40, 0x40);
        bus.stop_tape();
        run_to(&mut bus, start + 5000);
        assert_eq!(bus.io_read(0xFEFE) & 0x40, 0x40);
    }

    #[test]
    fn missing_drive_reads_ff() {
        let mut bus = make_bus();
        assert_eq!(bus.io_read(0x00F1), 0xFF);
        bus.io_write(0x00E1, 5);
        assert_eq!(bus.io_read(0x00E1), 5);
    }

    #[derive(Default)]
    struct ResetCounts {
        mouse: Rc<RefCell<u32>>,
        sampler: Rc<RefCell<u32>>,
    }

    struct CountingMouse(Rc<RefCell<u32>>);

    impl Mouse for CountingMouse {
        fn reset(&mut self) {
            *self.0.borrow_mut() += 1;
        }
    }

    struct CountingSampler(Rc<RefCell<u32>>);

    impl Sampler for CountingSampler {
        fn out(&mut self, _port: u16, _value: u8) -> Option<u32> {
            Some(1000)
        }

        fn clock(&mut self) -> Option<u32> {
            Some(1000)
        }

        fn reset(&mut self) {
            *self.0.borrow_mut() += 1;
        }
    }

    #[test]
    fn reset_restarts_peripherals() {
        let mut bus = make_bus();
        let counts = ResetCounts::default();
        bus.peripherals.mouse = Box::new(CountingMouse(Rc::clone(&counts.mouse)));
        bus.peripherals.sampler = Box::new(CountingSampler(Rc::clone(&counts.sampler)));
        bus.peripherals.tape = Box::new(Square);

        bus.io_write(0x007F, 1);
        bus.start_tape();
        let start = bus.cycles();
        run_to(&mut bus, start + 100);
        let edge_in = bus.time_until(EventKind::TapeEdge);

        bus.reset();
        assert_eq!(*counts.mouse.borrow(), 1);
        assert_eq!(*counts.sampler.borrow(), 1);
        assert!(!bus.events().is_pending(EventKind::SamplerClock));

        // The tape keeps its edge timing across the reset
        assert_eq!(bus.time_until(EventKind::TapeEdge), edge_in);
        run_to(&mut bus, start + 500);
        assert_eq!(bus.io_read(0xFEFE) & 0x40, 0x40);
    }

    #[test]
    fn reset_clears_asic_state() {
        let mut bus = make_bus();
        bus.io_write(0x00FA, 0x25);
        bus.io_write(u16::from(STATUS_PORT), 50);
        run_to(&mut bus, FRAME_INT_TIME);
        bus.reset();
        assert_eq!(bus.memory.lmpr(), 0);
        assert_eq!(bus.status(), int::MASK);
        assert!(!bus.events().is_pending(EventKind::LineIntStart));
        assert!(bus.events().is_pending(EventKind::FrameIntStart));
        assert!(bus.events().is_pending(EventKind::EndOfLine));
    }
}
