//! Top-level SAM Coupé system.

use emu_core::{Cpu, Observable, Value};
use log::info;
use wd1772::{Disk, DiskImage};
use zilog_z80::Z80;

use crate::bus::SamBus;
use crate::config::SamConfig;
use crate::error::SamError;

/// SAM Coupé system.
pub struct Sam {
    cpu: Z80,
    bus: SamBus,
    /// Completed frame counter.
    frame_count: u64,
    /// Skip sound and video output; emulated timing is unchanged.
    turbo: bool,
    nmi_pending: bool,
    reset_pending: bool,
    /// Reset button held down: the CPU does nothing until it is released.
    reset_held: bool,
}

impl Sam {
    /// Create a SAM from a configuration and a 32K ROM image.
    pub fn new(config: &SamConfig, rom: &[u8]) -> Result<Self, SamError> {
        Ok(Self {
            cpu: Z80::new(),
            bus: SamBus::new(config, rom)?,
            frame_count: 0,
            turbo: config.turbo,
            nmi_pending: false,
            reset_pending: false,
            reset_held: false,
        })
    }

    /// Run the CPU to the end of the frame, without any output.
    ///
    /// Pending NMI and reset requests are taken at the start of the frame.
    /// The last instruction may run past the frame end; the overrun counts
    /// towards the next frame, so the frame grid itself never drifts.
    ///
    /// Returns the number of T-states executed.
    pub fn execute_frame(&mut self) -> u64 {
        let start = self.bus.cycles();

        if self.reset_pending {
            self.reset_pending = false;
            info!("CPU reset");
            self.cpu.reset();
            self.bus.reset();
        }

        if self.reset_held {
            self.bus.idle_to_frame_end();
        } else {
            if self.nmi_pending {
                self.nmi_pending = false;
                self.cpu.nmi(&mut self.bus);
            }
            while !self.bus.frame_end() {
                self.cpu.step(&mut self.bus);
            }
        }

        let elapsed = self.bus.cycles() - start;
        self.bus.start_frame();
        elapsed
    }

    /// Run one complete frame and hand its output to the peripherals.
    ///
    /// Returns the number of T-states executed.
    pub fn run_frame(&mut self) -> u64 {
        let tstates = self.execute_frame();

        for drive in [&mut self.bus.drive1, &mut self.bus.drive2]
            .into_iter()
            .flatten()
        {
            drive.frame_end();
        }

        if !self.turbo {
            self.bus.peripherals.sound.update();
            self.bus.present_frame();
        }

        self.frame_count += 1;
        tstates
    }

    /// Run `frames` frames, returning the total T-states executed.
    pub fn run(&mut self, frames: u32) -> u64 {
        (0..frames).map(|_| self.run_frame()).sum()
    }

    /// Press the NMI button. Taken at the start of the next frame.
    pub fn nmi(&mut self) {
        self.nmi_pending = true;
    }

    /// Press and release the reset button.
    pub fn reset(&mut self) {
        self.reset_pending = true;
    }

    /// Hold or release the reset button.
    pub fn hold_reset(&mut self, held: bool) {
        if held && !self.reset_held {
            self.reset_pending = true;
        }
        self.reset_held = held;
    }

    #[must_use]
    pub fn reset_held(&self) -> bool {
        self.reset_held
    }

    pub fn set_turbo(&mut self, turbo: bool) {
        self.turbo = turbo;
    }

    #[must_use]
    pub fn turbo(&self) -> bool {
        self.turbo
    }

    /// Insert a disk into drive 1 or 2.
    pub fn insert_disk(&mut self, drive: u8, disk: Box<dyn Disk>) -> Result<(), SamError> {
        self.bus
            .drive_mut(drive)
            .ok_or(SamError::NoDrive(drive))?
            .insert(disk);
        Ok(())
    }

    /// Insert an MGT image into drive 1 or 2.
    pub fn insert_mgt(&mut self, drive: u8, data: &[u8]) -> Result<(), SamError> {
        let image = DiskImage::from_mgt(data)?;
        self.insert_disk(drive, Box::new(image))
    }

    /// Remove the disk from a drive, returning it.
    pub fn eject_disk(&mut self, drive: u8) -> Option<Box<dyn Disk>> {
        self.bus.drive_mut(drive).and_then(wd1772::Drive::eject)
    }

    /// Start the tape in [`Peripherals::tape`](crate::Peripherals).
    pub fn start_tape(&mut self) {
        self.bus.start_tape();
    }

    pub fn stop_tape(&mut self) {
        self.bus.stop_tape();
    }

    /// Reference to the CPU.
    #[must_use]
    pub fn cpu(&self) -> &Z80 {
        &self.cpu
    }

    /// Mutable reference to the CPU.
    pub fn cpu_mut(&mut self) -> &mut Z80 {
        &mut self.cpu
    }

    /// Reference to the bus.
    #[must_use]
    pub fn bus(&self) -> &SamBus {
        &self.bus
    }

    /// Mutable reference to the bus.
    pub fn bus_mut(&mut self) -> &mut SamBus {
        &mut self.bus
    }

    /// Completed frame count.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl Observable for Sam {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("cpu.") {
            self.cpu.query(rest)
        } else if let Some(rest) = path.strip_prefix("fdc1.") {
            self.bus.drive(1)?.query(rest)
        } else if let Some(rest) = path.strip_prefix("fdc2.") {
            self.bus.drive(2)?.query(rest)
        } else if let Some(rest) = path.strip_prefix("memory.") {
            let addr = if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
                u16::from_str_radix(hex, 16).ok()
            } else if let Some(hex) = rest.strip_prefix('$') {
                u16::from_str_radix(hex, 16).ok()
            } else {
                rest.parse().ok()
            };
            addr.map(|a| Value::U8(self.bus.memory.read(a)))
        } else {
            let value: Value = match path {
                "cycles" => self.bus.cycles().into(),
                "frame_cycles" => self.bus.frame_cycles().into(),
                "line" => self.bus.line().into(),
                "status" => self.bus.status().into(),
                "lmpr" => self.bus.memory.lmpr().into(),
                "hmpr" => self.bus.memory.hmpr().into(),
                "vmpr" => self.bus.vmpr().into(),
                "lepr" => self.bus.memory.lepr().into(),
                "hepr" => self.bus.memory.hepr().into(),
                "border" => self.bus.border().into(),
                "line_int" => self.bus.line_interrupt().into(),
                "frame_count" => self.frame_count.into(),
                "turbo" => self.turbo.into(),
                _ => return self.cpu.query(path),
            };
            Some(value)
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "cpu.<z80_paths>",
            "fdc1.<drive_paths>",
            "fdc2.<drive_paths>",
            "memory.<address>",
            "cycles",
            "frame_cycles",
            "line",
            "status",
            "lmpr",
            "hmpr",
            "vmpr",
            "lepr",
            "hepr",
            "border",
            "line_int",
            "frame_count",
            "turbo",
        ]
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::bus::TSTATES_PER_FRAME;
    use crate::io::{Display, Screen};
    use crate::memory::ROM_SIZE;

    /// ROM with `program` at 0x0000.
    fn make_sam(program: &[u8]) -> Sam {
        let mut rom = vec![0u8; ROM_SIZE];
        rom[..program.len()].copy_from_slice(program);
        Sam::new(&SamConfig::default(), &rom).expect("valid ROM")
    }

    #[derive(Default)]
    struct FrameCounter(Rc<Cell<u32>>);

    impl Display for FrameCounter {
        fn end_frame(&mut self, _screen: &Screen<'_>) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn run_frame_returns_tstate_count() {
        // DI; HALT
        let mut sam = make_sam(&[0xF3, 0x76]);
        let tstates = sam.run_frame();
        // The instruction that crosses the frame end completes
        assert!(
            (TSTATES_PER_FRAME..=TSTATES_PER_FRAME + 4).contains(&tstates),
            "Expected ~119808 T-states, got {tstates}"
        );
        assert_eq!(sam.frame_count(), 1);
    }

    #[test]
    fn frames_do_not_drift() {
        let mut sam = make_sam(&[0xF3, 0x76]);
        let total = sam.run(10);
        // Only the last frame's overrun is outstanding
        assert!(total >= 10 * TSTATES_PER_FRAME && total <= 10 * TSTATES_PER_FRAME + 4);
        assert!(sam.bus().frame_cycles() <= 4);
    }

    #[test]
    fn nmi_taken_at_frame_start() {
        // DI; HALT, with INC B; HALT at 0x0066
        let mut program = vec![0u8; 0x68];
        program[0] = 0xF3;
        program[1] = 0x76;
        program[0x66] = 0x04;
        program[0x67] = 0x76;
        let mut sam = make_sam(&program);
        sam.run_frame();
        assert_eq!(sam.query("cpu.b"), Some(Value::U8(0)));

        sam.nmi();
        sam.run_frame();
        assert_eq!(sam.query("cpu.b"), Some(Value::U8(1)));
        assert_eq!(sam.query("cpu.pc"), Some(Value::U16(0x0067)));
        assert_eq!(sam.query("cpu.halted"), Some(Value::Bool(true)));
    }

    #[test]
    fn held_reset_stops_the_cpu() {
        // LD A,0x25; OUT (250),A; DI; HALT
        let program = [0x3E, 0x25, 0xD3, 0xFA, 0xF3, 0x76];
        let mut sam = make_sam(&program);
        sam.hold_reset(true);
        let tstates = sam.run_frame();
        assert_eq!(tstates, TSTATES_PER_FRAME);
        assert_eq!(sam.query("cpu.pc"), Some(Value::U16(0)));
        assert_eq!(sam.query("lmpr"), Some(Value::U8(0)));

        sam.hold_reset(false);
        sam.run_frame();
        assert_eq!(sam.query("lmpr"), Some(Value::U8(0x25)));
    }

    #[test]
    fn reset_restarts_from_zero() {
        // XOR A; INC A; OUT (254),A; DI; HALT
        let program = [0xAF, 0x3C, 0xD3, 0xFE, 0xF3, 0x76];
        let mut sam = make_sam(&program);
        sam.run_frame();
        assert_eq!(sam.query("border"), Some(Value::U8(1)));
        assert_eq!(sam.query("cpu.pc"), Some(Value::U16(5)));

        sam.bus_mut().memory.set_hmpr(3);
        sam.reset();
        sam.run_frame();
        // The program ran again from 0x0000 with paging reset
        assert_eq!(sam.query("hmpr"), Some(Value::U8(0)));
        assert_eq!(sam.query("cpu.pc"), Some(Value::U16(5)));
    }

    #[test]
    fn turbo_skips_output_only() {
        let frames = Rc::new(Cell::new(0));
        let mut sam = make_sam(&[0xF3, 0x76]);
        sam.bus_mut().peripherals.display = Box::new(FrameCounter(Rc::clone(&frames)));

        sam.run_frame();
        assert_eq!(frames.get(), 1);

        sam.set_turbo(true);
        let tstates = sam.run_frame();
        assert_eq!(frames.get(), 1);
        assert!(tstates >= TSTATES_PER_FRAME - 4 && tstates <= TSTATES_PER_FRAME + 4);
        assert_eq!(sam.frame_count(), 2);
    }

    #[test]
    fn disks_need_a_fitted_drive() {
        let mut sam = make_sam(&[0xF3, 0x76]);
        assert!(sam.insert_disk(1, Box::new(DiskImage::blank())).is_ok());
        assert!(matches!(
            sam.insert_disk(2, Box::new(DiskImage::blank())),
            Err(SamError::NoDrive(2))
        ));
        assert_eq!(sam.query("fdc1.disk"), Some(Value::Bool(true)));
        assert_eq!(sam.query("fdc2.disk"), None);
        assert!(sam.eject_disk(1).is_some());
        assert_eq!(sam.query("fdc1.disk"), Some(Value::Bool(false)));
    }

    #[test]
    fn bad_mgt_image_rejected() {
        let mut sam = make_sam(&[0xF3, 0x76]);
        assert!(matches!(
            sam.insert_mgt(1, &[0; 100]),
            Err(SamError::Image(_))
        ));
    }

    #[test]
    fn observable_cpu_pc() {
        let sam = make_sam(&[0xF3, 0x76]);
        assert_eq!(sam.query("cpu.pc"), Some(Value::U16(0)));
        assert_eq!(sam.query("pc"), Some(Value::U16(0)));
    }

    #[test]
    fn observable_memory() {
        let mut sam = make_sam(&[0xF3, 0x76]);
        assert_eq!(sam.query("memory.0x0000"), Some(Value::U8(0xF3)));
        assert_eq!(sam.query("memory.$0001"), Some(Value::U8(0x76)));

        sam.bus_mut().memory.write(0x8000, 0xAB);
        assert_eq!(sam.query("memory.32768"), Some(Value::U8(0xAB)));
        assert_eq!(sam.query("memory.nowhere"), None);
    }

    #[test]
    fn observable_asic() {
        let sam = make_sam(&[0xF3, 0x76]);
        assert_eq!(sam.query("status"), Some(Value::U8(0x1F)));
        assert_eq!(sam.query("line_int"), Some(Value::U8(0xFF)));
        assert_eq!(sam.query("cycles"), Some(Value::U64(0)));
        assert_eq!(sam.query("turbo"), Some(Value::Bool(false)));
    }
}
